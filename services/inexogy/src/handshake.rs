use crate::credential::Credential;
use crate::sign_request::{base_oauth_fields, sign};
use crate::transport::{fetch_get, fetch_post, TransportInfo};
use metersign_core::{Context, Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// The four-step OAuth 1.0 handshake against the provider.
///
/// State machine: consumer token -> request token -> user authorization ->
/// access token. Any step whose response misses the expected fields aborts
/// the whole handshake; the caller decides whether to retry from step one.
#[derive(Debug, Clone)]
pub struct Handshake {
    client: String,
    email: String,
    password: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ConsumerToken {
    key: String,
    secret: String,
}

impl Handshake {
    /// Create a handshake for the given account.
    pub fn new(client: &str, email: &str, password: &str, base_url: &str) -> Self {
        Self {
            client: client.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run all four steps and return the resulting credential.
    pub async fn run(&self, ctx: &Context) -> Result<Credential> {
        log::debug!("handshake: authorize {}", self.email);

        // ------------------------------------------------------------------
        // 1. Get consumer token
        // ------------------------------------------------------------------

        let url = format!("{}/oauth1/consumer_token", self.base_url);
        let fields = BTreeMap::from_iter([("client".to_string(), self.client.clone())]);
        let (body, info) = fetch_post(ctx, &url, &fields).await?;

        let consumer: ConsumerToken = serde_json::from_str(&body)
            .map_err(|_| step_error("get consumer token failed (1)", &info))?;

        // ------------------------------------------------------------------
        // 2. Get request token
        // ------------------------------------------------------------------

        let url = format!("{}/oauth1/request_token", self.base_url);
        let mut fields = base_oauth_fields(&consumer.key);

        // No token secret yet, so the signing key keeps its trailing `&`.
        let secret = format!("{}&", consumer.secret);
        let signature = sign("POST", &url, &fields, &secret);
        fields.insert("oauth_signature".to_string(), signature);

        let (body, info) = fetch_post(ctx, &url, &fields).await?;

        let (token, token_secret) = parse_token_response(&body)
            .ok_or_else(|| step_error("get request token failed (2)", &info))?;

        // ------------------------------------------------------------------
        // 3. Authorize user
        // ------------------------------------------------------------------

        // The account credential pair goes over TLS directly; this step is
        // deliberately unsigned.
        let url = format!("{}/oauth1/authorize", self.base_url);
        let fields = BTreeMap::from_iter([
            ("oauth_token".to_string(), token.clone()),
            ("email".to_string(), self.email.clone()),
            ("password".to_string(), self.password.clone()),
        ]);

        let (body, info) = fetch_get(ctx, &url, &fields).await?;

        let verifier = parse_urlencoded(&body)
            .remove("oauth_verifier")
            .ok_or_else(|| step_error("authorize user failed (3)", &info))?;

        // ------------------------------------------------------------------
        // 4. Get access token
        // ------------------------------------------------------------------

        let url = format!("{}/oauth1/access_token", self.base_url);
        let mut fields = base_oauth_fields(&consumer.key);
        fields.insert("oauth_token".to_string(), token);
        fields.insert("oauth_verifier".to_string(), verifier);

        let secret = format!("{}&{}", consumer.secret, token_secret);
        let signature = sign("POST", &url, &fields, &secret);
        fields.insert("oauth_signature".to_string(), signature);

        let (body, info) = fetch_post(ctx, &url, &fields).await?;

        let (token, token_secret) = parse_token_response(&body)
            .ok_or_else(|| step_error("get access token failed (4)", &info))?;

        log::debug!("handshake: authorized {}", self.email);

        Ok(Credential {
            consumer_key: consumer.key,
            consumer_secret: consumer.secret,
            token,
            token_secret,
        })
    }
}

fn step_error(message: &str, info: &TransportInfo) -> Error {
    Error::authorization_failed(format!("{message}: {info}"))
}

fn parse_urlencoded(body: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Extract `oauth_token` and `oauth_token_secret` from a URL-encoded token
/// response.
fn parse_token_response(body: &str) -> Option<(String, String)> {
    let mut parsed = parse_urlencoded(body);
    let token = parsed.remove("oauth_token")?;
    let token_secret = parsed.remove("oauth_token_secret")?;
    Some((token, token_secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response() {
        let parsed = parse_token_response("oauth_token=tok&oauth_token_secret=sec&extra=1");
        assert_eq!(parsed, Some(("tok".to_string(), "sec".to_string())));

        assert!(parse_token_response("oauth_token=tok").is_none());
        assert!(parse_token_response("").is_none());
    }

    #[test]
    fn test_parse_urlencoded_decodes() {
        let parsed = parse_urlencoded("oauth_verifier=a%2Bb&x=1");
        assert_eq!(parsed["oauth_verifier"], "a+b");
    }

    #[test]
    fn test_consumer_token_requires_both_fields() {
        assert!(serde_json::from_str::<ConsumerToken>(r#"{"key":"k","secret":"s"}"#).is_ok());
        assert!(serde_json::from_str::<ConsumerToken>(r#"{"key":"k"}"#).is_err());
        assert!(serde_json::from_str::<ConsumerToken>("Service Unavailable").is_err());
    }
}
