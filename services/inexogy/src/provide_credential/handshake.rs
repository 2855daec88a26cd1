use crate::constants::MAX_ATTEMPTS;
use crate::handshake::Handshake;
use crate::{Config, Credential};
use async_trait::async_trait;
use metersign_core::{Context, Error, ProvideCredential, Result};
use std::time::Duration;

/// HandshakeCredentialProvider obtains a credential by running the four-step
/// OAuth 1.0 handshake.
///
/// The provider endpoint is rate limited and occasionally slow to answer, so
/// a failed handshake is retried from step one: up to 5 attempts, sleeping
/// `attempt` seconds in between (1 s, 2 s, 3 s, 4 s). The 5th failure is
/// terminal and wraps the last step's error.
#[derive(Debug, Clone)]
pub struct HandshakeCredentialProvider {
    handshake: Handshake,
}

impl HandshakeCredentialProvider {
    /// Create a provider for the given account.
    pub fn new(client: &str, email: &str, password: &str, base_url: &str) -> Self {
        Self {
            handshake: Handshake::new(client, email, password, base_url),
        }
    }

    /// Create a provider from a config carrying client, email and password.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config
            .client
            .as_deref()
            .ok_or_else(|| Error::config_invalid("client is required"))?;
        let email = config
            .email
            .as_deref()
            .ok_or_else(|| Error::config_invalid("email is required"))?;
        let password = config
            .password
            .as_deref()
            .ok_or_else(|| Error::config_invalid("password is required"))?;

        Ok(Self::new(client, email, password, &config.base_url))
    }
}

#[async_trait]
impl ProvideCredential for HandshakeCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.handshake.run(ctx).await {
                Ok(credential) => return Ok(Some(credential)),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    log::debug!("handshake: attempt {attempt} failed: {e}");
                    // Give the API a chance to answer before the next round.
                    tokio::time::sleep(Duration::from_secs(attempt)).await;
                }
                Err(e) => {
                    return Err(
                        Error::authorization_failed("session creation failed").with_source(e)
                    )
                }
            }
        }
    }
}
