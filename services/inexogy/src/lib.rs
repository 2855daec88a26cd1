//! inexogy smart meter API client for metersign.
//!
//! This crate implements the OAuth 1.0 session protocol of the inexogy
//! (formerly Discovergy) metering API: the HMAC-SHA1 request signing scheme,
//! the four-step authorization handshake, and the disk-backed credential
//! cache that lets many independent processes share one authorization.
//!
//! ## Overview
//!
//! The provider hands out long-lived credentials through a slow, rate-limited
//! handshake. Running it once per process would both waste time and trip the
//! rate limit, so the handshake result is persisted under the cache directory
//! and coordinated across processes with lock files; see
//! [`metersign_core::DiskCache`] for the protocol.
//!
//! ## Quick Start
//!
//! ```no_run
//! use metersign_core::{Context, OsEnv, Result};
//! use metersign_http_send_reqwest::ReqwestHttpSend;
//! use metersign_inexogy::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new()
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!
//!     let config = Config {
//!         client: Some("my-app".to_string()),
//!         email: Some("user@example.com".to_string()),
//!         password: Some("password".to_string()),
//!         cache_dir: Some("~/.cache/metersign".to_string()),
//!         ttl: 86400,
//!         ..Default::default()
//!     };
//!
//!     let client = Client::new(config, ctx)?;
//!
//!     for meter in client.meters().await?.iter() {
//!         println!("{}: {}", meter.meter_id, meter.address());
//!     }
//!
//!     let reading = client.last_reading("c0ffee1234").await?;
//!     println!("power: {:?}", reading.channel("power"));
//!     Ok(())
//! }
//! ```
//!
//! ## Credential Sources
//!
//! ### Environment Variables
//!
//! A pre-obtained token bypasses the handshake entirely:
//!
//! ```bash
//! export INEXOGY_CONSUMER_KEY=...
//! export INEXOGY_CONSUMER_SECRET=...
//! export INEXOGY_TOKEN=...
//! export INEXOGY_TOKEN_SECRET=...
//! ```
//!
//! ### Cached handshake
//!
//! With account credentials configured, the default chain runs the handshake
//! at most once per TTL window and shares the result through
//! `<cacheDir>/.oauth.<hash>.json`.
//!
//! ## Endpoints
//!
//! All resource endpoints are served through one signed GET mechanism: the
//! typed [`Endpoint`] enum for the known paths, [`Client::get_path`] as the
//! escape hatch for new ones, and convenience methods (`readings`,
//! `statistics`, `load_profile`, ...) that inject the `meterId` parameter.

mod constants;

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod sign_request;
pub use sign_request::{
    authorization_header, base_oauth_fields, percent_encode, sign, signature_base_string,
    RequestSigner, OAUTH_ENCODE_SET,
};

mod transport;
pub use transport::TransportInfo;

mod handshake;
pub use handshake::Handshake;

mod provide_credential;
pub use provide_credential::*;

mod client;
pub use client::{Client, Endpoint};

mod meter;
pub use meter::{Location, Meter, MeterType};

mod reading;
pub use reading::{NormalizedReading, Reading};
