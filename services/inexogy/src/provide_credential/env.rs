use crate::{constants::*, Credential};
use async_trait::async_trait;
use metersign_core::{Context, ProvideCredential, Result};

/// EnvCredentialProvider loads a pre-obtained token from environment
/// variables, bypassing the handshake entirely.
///
/// This provider looks for the following environment variables:
/// - `INEXOGY_CONSUMER_KEY`
/// - `INEXOGY_CONSUMER_SECRET`
/// - `INEXOGY_TOKEN`
/// - `INEXOGY_TOKEN_SECRET`
///
/// All four must be present; a partial set yields nothing so the chain can
/// fall through to the handshake.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let envs = ctx.env_vars();

        let consumer_key = envs.get(INEXOGY_CONSUMER_KEY);
        let consumer_secret = envs.get(INEXOGY_CONSUMER_SECRET);
        let token = envs.get(INEXOGY_TOKEN);
        let token_secret = envs.get(INEXOGY_TOKEN_SECRET);

        match (consumer_key, consumer_secret, token, token_secret) {
            (Some(ck), Some(cs), Some(t), Some(ts)) => Ok(Some(Credential {
                consumer_key: ck.clone(),
                consumer_secret: cs.clone(),
                token: t.clone(),
                token_secret: ts.clone(),
            })),
            _ => Ok(None),
        }
    }
}
