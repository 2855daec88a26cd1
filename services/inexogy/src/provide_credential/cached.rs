use crate::constants::OAUTH_CACHE_SCOPE;
use crate::Credential;
use async_trait::async_trait;
use metersign_core::{CacheKey, Context, DiskCache, Error, ProvideCredential, Result};

/// CachedCredentialProvider persists the wrapped provider's result so many
/// independent processes share one authorization.
///
/// The cache entry is `.oauth.<hash>.json` where `<hash>` digests the account
/// identifier; its payload is the credential's 4-string array form. A fresh
/// entry reconstructs the credential without invoking the inner provider at
/// all; otherwise the disk cache elects a single producer across processes
/// and everyone else reuses what it writes.
#[derive(Debug)]
pub struct CachedCredentialProvider<P> {
    inner: P,
    cache: DiskCache,
    key: CacheKey,
}

impl<P> CachedCredentialProvider<P> {
    /// Wrap `inner` with the given cache, keyed on the account identifier.
    pub fn new(inner: P, cache: DiskCache, identity: &str) -> Self {
        Self {
            inner,
            cache,
            key: CacheKey::new(OAUTH_CACHE_SCOPE, identity),
        }
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P> ProvideCredential for CachedCredentialProvider<P>
where
    P: ProvideCredential<Credential = Credential>,
{
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let inner = &self.inner;

        let secrets: [String; 4] = self
            .cache
            .get_or_produce(&self.key, || async move {
                match inner.provide_credential(ctx).await? {
                    Some(credential) => Ok(credential.to_array()),
                    // There is no cacheable representation of "nothing", so a
                    // wrapped provider must actually produce here.
                    None => Err(Error::credential_invalid(
                        "credential provider returned no credential",
                    )),
                }
            })
            .await?;

        Ok(Some(Credential::from_array(secrets)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProvideCredential for Counting {
        type Credential = Credential;

        async fn provide_credential(&self, _: &Context) -> Result<Option<Credential>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Credential {
                consumer_key: "ck".to_string(),
                consumer_secret: "cs".to_string(),
                token: "t".to_string(),
                token_secret: "ts".to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner_provider() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = Context::new();

        let cache = || {
            DiskCache::new(Some(dir.path().to_path_buf()))
                .unwrap()
                .with_ttl(3600)
        };

        let first = CachedCredentialProvider::new(
            Counting {
                calls: calls.clone(),
            },
            cache(),
            "user@example.com",
        );
        let cred = first.provide_credential(&ctx).await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A separate provider instance over the same cache directory models a
        // second process; it must reconstruct the credential from disk.
        let second = CachedCredentialProvider::new(
            Counting {
                calls: calls.clone(),
            },
            cache(),
            "user@example.com",
        );
        let reloaded = second.provide_credential(&ctx).await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reloaded, cred);
    }

    #[tokio::test]
    async fn test_cache_file_holds_secret_array() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(Some(dir.path().to_path_buf()))
            .unwrap()
            .with_ttl(3600);

        let provider = CachedCredentialProvider::new(
            Counting {
                calls: Arc::new(AtomicUsize::new(0)),
            },
            cache,
            "user@example.com",
        );
        provider.provide_credential(&Context::new()).await.unwrap();

        let entry = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap())
            .find(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.starts_with(".oauth.") && name.ends_with(".json")
            })
            .expect("cache entry must exist");

        let secrets: [String; 4] =
            serde_json::from_slice(&std::fs::read(entry.path()).unwrap()).unwrap();
        assert_eq!(
            secrets,
            [
                "ck".to_string(),
                "cs".to_string(),
                "t".to_string(),
                "ts".to_string()
            ]
        );
    }
}
