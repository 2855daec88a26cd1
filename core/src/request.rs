use std::mem;
use std::str::FromStr;

use crate::{Error, Result};
use http::uri::Authority;
use http::uri::PathAndQuery;
use http::uri::Scheme;
use http::HeaderMap;
use http::Method;
use http::Uri;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// AsciiSet for query strings rebuilt by [`SigningRequest::apply`].
///
/// Everything but RFC 3986 unreserved characters is percent-encoded;
/// [`SigningRequest::build`] decoded the pairs, so this restores a valid URI
/// without double-encoding.
static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Signing context for request.
///
/// The request parts are taken apart so the signer can inspect and extend the
/// query, then put back together by [`SigningRequest::apply`].
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path.
    pub path: String,
    /// HTTP query parameters.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTP),
            authority: uri.authority.ok_or_else(|| {
                Error::request_invalid("request without authority is invalid for signing")
            })?,
            path: paq.path().to_string(),
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the context.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing context back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        let query_size = self.query_size();

        // Return headers back.
        mem::swap(&mut parts.headers, &mut self.headers);
        parts.method = self.method;
        parts.uri = {
            let mut uri_parts = mem::take(&mut parts.uri).into_parts();
            // Return scheme back.
            uri_parts.scheme = Some(self.scheme);
            // Return authority back.
            uri_parts.authority = Some(self.authority);
            // Build path and query.
            uri_parts.path_and_query = {
                let paq = if query_size == 0 {
                    self.path
                } else {
                    let mut s = self.path;
                    s.reserve(query_size + 1);

                    s.push('?');
                    for (i, (k, v)) in self.query.iter().enumerate() {
                        if i > 0 {
                            s.push('&');
                        }

                        s.extend(utf8_percent_encode(k, &QUERY_ENCODE_SET));
                        if !v.is_empty() {
                            s.push('=');
                            s.extend(utf8_percent_encode(v, &QUERY_ENCODE_SET));
                        }
                    }

                    s
                };

                Some(PathAndQuery::from_str(&paq)?)
            };
            Uri::from_parts(uri_parts)?
        };

        Ok(())
    }

    /// The URL with scheme, authority and path, without any query string.
    ///
    /// OAuth 1.0 signs the base URI and the parameter set separately, so the
    /// two must never be concatenated before signing.
    pub fn url_without_query(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path)
    }

    /// Get query size.
    #[inline]
    pub fn query_size(&self) -> usize {
        self.query
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
    }

    /// Push a new query pair into query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_for(uri: &str) -> http::request::Parts {
        http::Request::get(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_build_and_apply_round_trip() {
        let mut parts = parts_for("https://api.example.com/public/v1/meters?a=1&b=2");

        let req = SigningRequest::build(&mut parts).unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(
            req.url_without_query(),
            "https://api.example.com/public/v1/meters"
        );
        assert_eq!(
            req.query,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );

        req.apply(&mut parts).unwrap();
        assert_eq!(
            parts.uri.to_string(),
            "https://api.example.com/public/v1/meters?a=1&b=2"
        );
    }

    #[test]
    fn test_build_without_authority_fails() {
        let mut parts = parts_for("/relative/only");
        assert!(SigningRequest::build(&mut parts).is_err());
    }

    #[test]
    fn test_query_push() {
        let mut parts = parts_for("https://api.example.com/public/v1/meters");
        let mut req = SigningRequest::build(&mut parts).unwrap();
        assert!(req.query.is_empty());

        req.query_push("meterId", "abc");
        req.apply(&mut parts).unwrap();
        assert_eq!(
            parts.uri.to_string(),
            "https://api.example.com/public/v1/meters?meterId=abc"
        );
    }

    #[test]
    fn test_apply_re_encodes_decoded_values() {
        let mut parts = parts_for("https://api.example.com/v1/readings?fields=power%20energy");

        let req = SigningRequest::build(&mut parts).unwrap();
        // Build decodes; the signature must cover the decoded value.
        assert_eq!(req.query[0].1, "power energy");

        req.apply(&mut parts).unwrap();
        assert_eq!(
            parts.uri.to_string(),
            "https://api.example.com/v1/readings?fields=power%20energy"
        );
    }
}
