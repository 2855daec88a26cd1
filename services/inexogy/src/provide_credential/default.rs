use crate::provide_credential::{
    CachedCredentialProvider, EnvCredentialProvider, HandshakeCredentialProvider,
};
use crate::{Config, Credential};
use async_trait::async_trait;
use metersign_core::{Context, DiskCache, Error, ProvideCredential, ProvideCredentialChain, Result};

/// DefaultCredentialProvider is a loader that will try to load credential via
/// default chains.
///
/// Resolution order:
///
/// 1. Environment variables carrying a pre-obtained token
/// 2. The cached OAuth 1.0 handshake
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    chain: ProvideCredentialChain<Credential>,
}

impl DefaultCredentialProvider {
    /// Create a new `DefaultCredentialProvider` instance.
    ///
    /// `cache` decides where and for how long the handshake result is shared
    /// between processes; build it from the config's cache directory and TTL.
    pub fn new(config: &Config, cache: DiskCache) -> Result<Self> {
        let email = config
            .email
            .as_deref()
            .ok_or_else(|| Error::config_invalid("email is required"))?;
        let handshake = HandshakeCredentialProvider::from_config(config)?;

        let chain = ProvideCredentialChain::new()
            .push(EnvCredentialProvider::new())
            .push(CachedCredentialProvider::new(handshake, cache, email));

        Ok(Self { chain })
    }

    /// Create with a custom credential chain.
    pub fn with_chain(chain: ProvideCredentialChain<Credential>) -> Self {
        Self { chain }
    }

    /// Add a credential provider to the front of the default chain.
    ///
    /// This allows adding a high-priority credential source that will be tried
    /// before all other providers in the default chain.
    pub fn push_front(
        mut self,
        provider: impl ProvideCredential<Credential = Credential> + 'static,
    ) -> Self {
        self.chain = self.chain.push_front(provider);
        self
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.chain.provide_credential(ctx).await
    }
}
