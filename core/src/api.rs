use crate::{Context, Result};
use std::fmt::Debug;

/// SigningCredential is the trait used by the signer as the signing key.
pub trait SigningCredential: Clone + Debug + Send + Sync + Unpin + 'static {
    /// Check if the credential is valid.
    fn is_valid(&self) -> bool;
}

impl<T: SigningCredential> SigningCredential for Option<T> {
    fn is_valid(&self) -> bool {
        let Some(cred) = self else {
            return false;
        };

        cred.is_valid()
    }
}

/// ProvideCredential is the trait used by the signer to load the credential.
///
/// A provider may read the credential from the environment, reconstruct it
/// from a cache file, or run the full authorization handshake against the
/// provider API. Returning `Ok(None)` means "this source has nothing", so a
/// chain can fall through to the next provider.
#[async_trait::async_trait]
pub trait ProvideCredential: Debug + Send + Sync + Unpin + 'static {
    /// Credential returned by this provider.
    type Credential: Send + Sync + Unpin + 'static;

    /// Load credential from the given context.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>>;
}

/// SignRequest is the trait used by the signer to mutate a request so the
/// provider accepts it.
#[async_trait::async_trait]
pub trait SignRequest: Debug + Send + Sync + Unpin + 'static {
    /// Credential used by this request signer.
    type Credential: Send + Sync + Unpin + 'static;

    /// Sign the request parts in place.
    ///
    /// Implementations decide what "signing" means for their protocol; the
    /// OAuth 1.0 implementation computes an HMAC-SHA1 signature over the
    /// query parameters and injects an `Authorization: OAuth ...` header.
    async fn sign_request(
        &self,
        ctx: &Context,
        req: &mut http::request::Parts,
        credential: Option<&Self::Credential>,
    ) -> Result<()>;
}
