use metersign_core::utils::Redact;
use metersign_core::SigningCredential;
use std::fmt::{Debug, Formatter};

/// Credential that holds the four opaque strings produced by a successful
/// OAuth 1.0 handshake.
///
/// Immutable once obtained; this is the only handshake state that is ever
/// persisted.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Consumer key identifying the application.
    pub consumer_key: String,
    /// Consumer secret, first half of the signing key.
    pub consumer_secret: String,
    /// Access token identifying the authorized account.
    pub token: String,
    /// Token secret, second half of the signing key.
    pub token_secret: String,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("consumer_key", &Redact::from(&self.consumer_key))
            .field("consumer_secret", &Redact::from(&self.consumer_secret))
            .field("token", &Redact::from(&self.token))
            .field("token_secret", &Redact::from(&self.token_secret))
            .finish()
    }
}

impl Credential {
    /// The HMAC-SHA1 key for signed API calls: `consumer_secret&token_secret`.
    pub fn signing_secret(&self) -> String {
        format!("{}&{}", self.consumer_secret, self.token_secret)
    }

    /// The persisted cache form: `[consumerKey, consumerSecret, token,
    /// tokenSecret]`.
    ///
    /// Other consumers of the cache directory read this exact array, so the
    /// order is part of the interface.
    pub fn to_array(&self) -> [String; 4] {
        [
            self.consumer_key.clone(),
            self.consumer_secret.clone(),
            self.token.clone(),
            self.token_secret.clone(),
        ]
    }

    /// Rebuild a credential from its persisted cache form.
    pub fn from_array(secrets: [String; 4]) -> Self {
        let [consumer_key, consumer_secret, token, token_secret] = secrets;
        Self {
            consumer_key,
            consumer_secret,
            token,
            token_secret,
        }
    }
}

impl SigningCredential for Credential {
    fn is_valid(&self) -> bool {
        !self.consumer_key.is_empty()
            && !self.consumer_secret.is_empty()
            && !self.token.is_empty()
            && !self.token_secret.is_empty()
    }
}
