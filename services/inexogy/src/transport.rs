use bytes::Bytes;
use http::Method;
use metersign_core::utils::truncate_body;
use metersign_core::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// How much of a response body ends up in trace lines and error messages.
const BODY_SNIPPET_LIMIT: usize = 256;

/// Diagnostics captured for every transport call.
///
/// Handshake and catalog errors embed the last of these so a failure report
/// carries the HTTP status, timing and (truncated) body that produced it.
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// HTTP method of the call.
    pub method: String,
    /// Full request URL, query string included.
    pub url: String,
    /// HTTP status code of the response.
    pub status: u16,
    /// Wall-clock duration of the exchange.
    pub elapsed_ms: u128,
    /// Truncated response body.
    pub body: String,
}

impl fmt::Display for TransportInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} in {} ms: {}",
            self.method, self.url, self.status, self.elapsed_ms, self.body
        )
    }
}

/// URL-encode a field set as an `application/x-www-form-urlencoded` string.
pub(crate) fn encode_form(fields: &BTreeMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter())
        .finish()
}

/// GET with non-empty fields appended as a query string.
pub(crate) async fn fetch_get(
    ctx: &Context,
    url: &str,
    fields: &BTreeMap<String, String>,
) -> Result<(String, TransportInfo)> {
    let url = if fields.is_empty() {
        url.to_string()
    } else {
        format!("{}?{}", url, encode_form(fields))
    };

    let req = http::Request::builder()
        .method(Method::GET)
        .uri(&url)
        .body(Bytes::new())?;

    dispatch(ctx, req).await
}

/// POST with the fields sent as a URL-encoded body.
pub(crate) async fn fetch_post(
    ctx: &Context,
    url: &str,
    fields: &BTreeMap<String, String>,
) -> Result<(String, TransportInfo)> {
    let req = http::Request::builder()
        .method(Method::POST)
        .uri(url)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Bytes::from(encode_form(fields)))?;

    dispatch(ctx, req).await
}

/// Send a prepared request and capture timing and diagnostics.
///
/// The raw body is returned unconditionally; HTTP error codes are not
/// special-cased here. Callers detect failure by the absence of expected
/// fields in the decoded response.
pub(crate) async fn dispatch(
    ctx: &Context,
    req: http::Request<Bytes>,
) -> Result<(String, TransportInfo)> {
    let method = req.method().to_string();
    let url = req.uri().to_string();
    log::debug!("{method} > {url}");

    let started = Instant::now();
    let resp = match ctx.http_send_as_string(req).await {
        Ok(resp) => resp,
        Err(e) => {
            log::debug!(
                "{method} < error after {} ms: {e}",
                started.elapsed().as_millis()
            );
            return Err(e);
        }
    };
    let elapsed_ms = started.elapsed().as_millis();

    let status = resp.status().as_u16();
    let body = resp.into_body();

    let info = TransportInfo {
        method,
        url,
        status,
        elapsed_ms,
        body: truncate_body(&body, BODY_SNIPPET_LIMIT).to_string(),
    };
    log::debug!(
        "{} < {} in {} ms: {}",
        info.method,
        info.status,
        info.elapsed_ms,
        info.body
    );

    Ok((body, info))
}
