use crate::constants::{MAX_ATTEMPTS, METERS_CACHE_SCOPE};
use crate::meter::Meter;
use crate::provide_credential::DefaultCredentialProvider;
use crate::reading::Reading;
use crate::sign_request::RequestSigner;
use crate::transport::{dispatch, TransportInfo};
use crate::{Config, Credential};
use bytes::Bytes;
use metersign_core::{
    CacheKey, Context, DiskCache, Error, ProvideCredential, Result, Signer,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The provider's GET endpoints, resolved to URL path segments at compile
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Meter catalog of the account.
    Meters,
    /// Raw readings of one meter.
    Readings,
    /// Most recent reading of one meter.
    LastReading,
    /// Aggregated statistics of one meter.
    Statistics,
    /// Load profile of an RLM meter.
    LoadProfile,
    /// Unprocessed load profile of an RLM meter.
    RawLoadProfile,
    /// Appliance-level disaggregation.
    Disaggregation,
    /// Detected appliance activities.
    Activities,
    /// Devices attached to a meter.
    Devices,
    /// Channel names a meter reports.
    FieldNames,
    /// Access code for the provider's web portal.
    WebsiteAccessCode,
    /// Virtual meters of the account.
    VirtualMeters,
}

impl Endpoint {
    /// The URL path segment under the API base.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Meters => "meters",
            Endpoint::Readings => "readings",
            Endpoint::LastReading => "last_reading",
            Endpoint::Statistics => "statistics",
            Endpoint::LoadProfile => "load_profile",
            Endpoint::RawLoadProfile => "raw_load_profile",
            Endpoint::Disaggregation => "disaggregation",
            Endpoint::Activities => "activities",
            Endpoint::Devices => "devices",
            Endpoint::FieldNames => "field_names",
            Endpoint::WebsiteAccessCode => "website_access_code",
            Endpoint::VirtualMeters => "virtual_meters",
        }
    }
}

/// Client for the inexogy API.
///
/// Wraps one signed session: credential loading (with its cross-process
/// cache), OAuth 1.0 request signing, and the meter catalog with its own
/// disk cache and retry policy.
#[derive(Debug)]
pub struct Client {
    ctx: Context,
    signer: Signer<Credential>,
    base_url: String,
    meters_cache: DiskCache,
    catalog_key: CacheKey,
    meters: Mutex<Option<Arc<Vec<Meter>>>>,
}

impl Client {
    /// Create a client with the default credential chain (environment token,
    /// then the cached handshake).
    pub fn new(config: Config, ctx: Context) -> Result<Self> {
        let cache_dir = resolve_cache_dir(&config, &ctx)?;
        let oauth_cache = DiskCache::new(cache_dir)?.with_ttl(config.ttl);
        let provider = DefaultCredentialProvider::new(&config, oauth_cache)?;

        Self::with_provider(config, ctx, provider)
    }

    /// Create a client with a custom credential provider.
    pub fn with_provider(
        config: Config,
        ctx: Context,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Result<Self> {
        let email = config
            .email
            .clone()
            .ok_or_else(|| Error::config_invalid("email is required"))?;

        let cache_dir = resolve_cache_dir(&config, &ctx)?;
        let meters_cache = DiskCache::new(cache_dir)?.with_ttl(config.meters_ttl);

        let signer = Signer::new(ctx.clone(), provider, RequestSigner::new());

        Ok(Self {
            ctx,
            signer,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            meters_cache,
            catalog_key: CacheKey::new(METERS_CACHE_SCOPE, &email),
            meters: Mutex::new(None),
        })
    }

    /// The meter catalog cache, exposed for its lock-wait counter.
    pub fn meters_cache(&self) -> &DiskCache {
        &self.meters_cache
    }

    /// Signed GET against a typed endpoint.
    pub async fn get(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> Result<Value> {
        self.get_path(endpoint.path(), params).await
    }

    /// Signed GET against an arbitrary endpoint path.
    ///
    /// Escape hatch for provider endpoints that have no [`Endpoint`] variant
    /// yet; parameters are forwarded verbatim.
    pub async fn get_path(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let (body, info) = self.get_with_info(path, params).await?;

        serde_json::from_str(&body)
            .map_err(|e| Error::unexpected(format!("undecodable response: {info}")).with_source(e))
    }

    /// All meters of the account.
    ///
    /// Lazy: memoized in memory for the lifetime of the client, persisted in
    /// the shared disk cache for other processes. A cache miss fetches the
    /// catalog with up to 5 attempts, sleeping `attempt` seconds in between.
    pub async fn meters(&self) -> Result<Arc<Vec<Meter>>> {
        if let Some(meters) = self.meters.lock().expect("lock poisoned").clone() {
            return Ok(meters);
        }

        let catalog: Vec<Value> = self
            .meters_cache
            .get_or_produce(&self.catalog_key, || self.fetch_catalog())
            .await?;

        let meters = catalog
            .into_iter()
            .map(Meter::from_raw)
            .collect::<Result<Vec<_>>>()?;
        let meters = Arc::new(meters);

        *self.meters.lock().expect("lock poisoned") = Some(meters.clone());
        Ok(meters)
    }

    /// Look up one meter by any of its identifiers.
    ///
    /// Tries `meterId`, `serialNumber`, `fullSerialNumber` and a trailing-8
    /// characters match on the full serial.
    pub async fn meter(&self, id: &str) -> Result<Meter> {
        let meters = self.meters().await?;

        meters
            .iter()
            .find(|m| m.matches(id))
            .cloned()
            .ok_or_else(|| Error::meter_not_found(format!("unknown meter: {id}")))
    }

    /// Readings of one meter; `params` carries `fields`, `from`, `to`,
    /// `resolution` and friends.
    pub async fn readings(&self, meter_id: &str, params: &[(&str, &str)]) -> Result<Vec<Reading>> {
        let value = self
            .get_for_meter(Endpoint::Readings, meter_id, params)
            .await?;

        serde_json::from_value(value)
            .map_err(|e| Error::unexpected("undecodable readings response").with_source(e))
    }

    /// The most recent reading of one meter.
    pub async fn last_reading(&self, meter_id: &str) -> Result<Reading> {
        let value = self
            .get_for_meter(Endpoint::LastReading, meter_id, &[])
            .await?;

        serde_json::from_value(value)
            .map_err(|e| Error::unexpected("undecodable reading response").with_source(e))
    }

    /// Aggregated statistics of one meter.
    pub async fn statistics(&self, meter_id: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.get_for_meter(Endpoint::Statistics, meter_id, params)
            .await
    }

    /// Load profile of an RLM meter.
    pub async fn load_profile(&self, meter_id: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.get_for_meter(Endpoint::LoadProfile, meter_id, params)
            .await
    }

    /// Unprocessed load profile of an RLM meter.
    pub async fn raw_load_profile(&self, meter_id: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.get_for_meter(Endpoint::RawLoadProfile, meter_id, params)
            .await
    }

    /// Appliance-level disaggregation of one meter.
    pub async fn disaggregation(&self, meter_id: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.get_for_meter(Endpoint::Disaggregation, meter_id, params)
            .await
    }

    /// Detected appliance activities of one meter.
    pub async fn activities(&self, meter_id: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.get_for_meter(Endpoint::Activities, meter_id, params)
            .await
    }

    /// Devices attached to one meter.
    pub async fn devices(&self, meter_id: &str) -> Result<Value> {
        self.get_for_meter(Endpoint::Devices, meter_id, &[]).await
    }

    /// Channel names one meter reports.
    pub async fn field_names(&self, meter_id: &str) -> Result<Value> {
        self.get_for_meter(Endpoint::FieldNames, meter_id, &[])
            .await
    }

    /// Access code for the provider's web portal.
    pub async fn website_access_code(&self, email: &str) -> Result<Value> {
        self.get(Endpoint::WebsiteAccessCode, &[("email", email)])
            .await
    }

    /// Virtual meters of the account.
    pub async fn virtual_meters(&self) -> Result<Value> {
        self.get(Endpoint::VirtualMeters, &[]).await
    }

    async fn get_for_meter(
        &self,
        endpoint: Endpoint,
        meter_id: &str,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("meterId", meter_id));
        all.extend_from_slice(params);

        self.get(endpoint, &all).await
    }

    async fn get_with_info(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<(String, TransportInfo)> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let uri = if params.is_empty() {
            url
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish();
            format!("{url}?{query}")
        };

        let mut parts = http::Request::builder()
            .method(http::Method::GET)
            .uri(&uri)
            .body(())?
            .into_parts()
            .0;

        self.signer.sign(&mut parts).await?;

        dispatch(&self.ctx, http::Request::from_parts(parts, Bytes::new())).await
    }

    async fn fetch_catalog(&self) -> Result<Vec<Value>> {
        let mut last_failure = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.get_with_info(Endpoint::Meters.path(), &[]).await {
                Ok((body, info)) => match serde_json::from_str::<Vec<Value>>(&body) {
                    Ok(catalog) if !catalog.is_empty() => return Ok(catalog),
                    _ => last_failure = info.to_string(),
                },
                Err(e) => last_failure = e.to_string(),
            }

            if attempt < MAX_ATTEMPTS {
                log::debug!("catalog: attempt {attempt} failed, backing off");
                // Give the API a chance to answer before the next round.
                tokio::time::sleep(Duration::from_secs(attempt)).await;
            }
        }

        Err(Error::catalog_unavailable(format!(
            "no usable meter catalog after {MAX_ATTEMPTS} attempts: {last_failure}"
        )))
    }
}

fn resolve_cache_dir(config: &Config, ctx: &Context) -> Result<Option<PathBuf>> {
    match &config.cache_dir {
        None => Ok(None),
        Some(dir) => {
            let expanded = ctx.expand_home_dir(dir).ok_or_else(|| {
                Error::config_invalid("cache_dir needs a home directory to expand `~`")
            })?;
            Ok(Some(PathBuf::from(expanded)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        let cases = [
            (Endpoint::Meters, "meters"),
            (Endpoint::LastReading, "last_reading"),
            (Endpoint::RawLoadProfile, "raw_load_profile"),
            (Endpoint::WebsiteAccessCode, "website_access_code"),
        ];

        for (endpoint, path) in cases {
            assert_eq!(endpoint.path(), path);
        }
    }

    #[test]
    fn test_client_requires_email() {
        let config = Config {
            client: Some("app".to_string()),
            password: Some("secret".to_string()),
            cache_dir: Some(
                tempfile::tempdir()
                    .unwrap()
                    .path()
                    .to_string_lossy()
                    .into_owned(),
            ),
            ..Default::default()
        };

        let err = Client::new(config, Context::new()).unwrap_err();
        assert_eq!(err.kind(), metersign_core::ErrorKind::ConfigInvalid);
    }
}
