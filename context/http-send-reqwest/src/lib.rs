//! Reqwest-based HTTP sending implementation for metersign.
//!
//! This crate provides [`ReqwestHttpSend`], which implements the `HttpSend`
//! trait from `metersign_core` on top of a reusable [`reqwest::Client`].
//!
//! ## Certificate verification
//!
//! The telemetry provider's endpoint has been observed serving an incomplete
//! certificate chain. [`ReqwestHttpSend::accepting_invalid_certs`] builds a
//! client that skips TLS verification for exactly that situation. Skipping
//! verification removes the transport's server-identity guarantee, so only
//! enable it deliberately, and prefer the default verifying client wherever
//! the chain validates.
//!
//! ## Example
//!
//! ```no_run
//! use metersign_core::Context;
//! use metersign_http_send_reqwest::ReqwestHttpSend;
//!
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use metersign_core::{Error, HttpSend, Result};
use reqwest::{Client, Request};

/// HttpSend implementation backed by a reusable [`reqwest::Client`].
#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client that does not verify the server certificate.
    ///
    /// This is an explicit security trade-off for providers whose certificate
    /// chain does not validate; see the crate docs.
    pub fn accepting_invalid_certs() -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::unexpected("failed to build reqwest client").with_source(e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req)
            .map_err(|e| Error::request_invalid("invalid http request").with_source(e))?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::unexpected("http request failed").with_source(e))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::unexpected("failed to read response body").with_source(e))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}
