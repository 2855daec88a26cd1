use crate::{Context, ProvideCredential, Result};
use std::collections::VecDeque;
use std::fmt::Debug;

/// ProvideCredentialChain tries a list of providers in order and returns the
/// first credential found.
///
/// A provider that returns `Ok(None)` is skipped; a provider that returns an
/// error aborts the whole chain, since a failing source is not the same as an
/// empty one.
pub struct ProvideCredentialChain<K> {
    providers: VecDeque<Box<dyn ProvideCredential<Credential = K>>>,
}

impl<K> Debug for ProvideCredentialChain<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvideCredentialChain")
            .field("providers", &self.providers)
            .finish()
    }
}

impl<K: Send + Sync + Unpin + 'static> Default for ProvideCredentialChain<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Send + Sync + Unpin + 'static> ProvideCredentialChain<K> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            providers: VecDeque::new(),
        }
    }

    /// Append a provider to the end of the chain.
    pub fn push(mut self, provider: impl ProvideCredential<Credential = K> + 'static) -> Self {
        self.providers.push_back(Box::new(provider));
        self
    }

    /// Add a provider to the front of the chain.
    ///
    /// This allows adding a high-priority credential source that will be
    /// tried before all other providers in the chain.
    pub fn push_front(
        mut self,
        provider: impl ProvideCredential<Credential = K> + 'static,
    ) -> Self {
        self.providers.push_front(Box::new(provider));
        self
    }

    /// Resolve the chain against the given context.
    pub async fn provide_credential(&self, ctx: &Context) -> Result<Option<K>> {
        for provider in &self.providers {
            if let Some(credential) = provider.provide_credential(ctx).await? {
                return Ok(Some(credential));
            }
        }

        Ok(None)
    }
}

#[async_trait::async_trait]
impl<K: Send + Sync + Unpin + 'static> ProvideCredential for ProvideCredentialChain<K> {
    type Credential = K;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        ProvideCredentialChain::provide_credential(self, ctx).await
    }
}
