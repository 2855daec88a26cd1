use super::constants::*;
use metersign_core::utils::Redact;
use metersign_core::Context;
use std::fmt::{Debug, Formatter};

/// Config carries all the configuration for the inexogy client.
#[derive(Clone)]
pub struct Config {
    /// `client` identifies the calling application during the consumer token
    /// step. Will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`INEXOGY_CLIENT`]
    pub client: Option<String>,
    /// `email` is the account identifier. Will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`INEXOGY_EMAIL`]
    pub email: Option<String>,
    /// `password` is the account secret, submitted once during the user
    /// authorization step. Will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`INEXOGY_PASSWORD`]
    pub password: Option<String>,
    /// API base URL.
    ///
    /// - defaults to the public v1 endpoint
    /// - env value: [`INEXOGY_BASE_URL`]
    pub base_url: String,
    /// Cache directory shared by all processes of this account.
    ///
    /// - `None` uses the system temp directory
    /// - a leading `~` is expanded through the [`Context`] environment
    /// - env value: [`INEXOGY_CACHE_DIR`]
    pub cache_dir: Option<String>,
    /// Authorization cache TTL in seconds. 0 disables caching, negative
    /// values clamp to 0.
    ///
    /// - env value: [`INEXOGY_TTL`]
    pub ttl: i64,
    /// Meter catalog cache TTL in seconds, default one hour.
    ///
    /// - env value: [`INEXOGY_METERS_TTL`]
    pub meters_ttl: i64,
    /// Skip TLS certificate verification for the provider endpoint.
    ///
    /// The provider has been observed serving an incomplete certificate
    /// chain; see the transport crate docs for the trade-off. Consumed when
    /// building the HTTP sender, not by the client itself.
    ///
    /// - env value: [`INEXOGY_ACCEPT_INVALID_CERTS`] (`1` or `true`)
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: None,
            email: None,
            password: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: None,
            ttl: 0,
            meters_ttl: DEFAULT_METERS_TTL,
            accept_invalid_certs: false,
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client", &self.client)
            .field("email", &self.email)
            .field("password", &Redact::from(&self.password))
            .field("base_url", &self.base_url)
            .field("cache_dir", &self.cache_dir)
            .field("ttl", &self.ttl)
            .field("meters_ttl", &self.meters_ttl)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl Config {
    /// Load config from env.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        if let Some(v) = ctx.env_var(INEXOGY_CLIENT) {
            self.client.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(INEXOGY_EMAIL) {
            self.email.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(INEXOGY_PASSWORD) {
            self.password.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(INEXOGY_BASE_URL) {
            self.base_url = v;
        }
        if let Some(v) = ctx.env_var(INEXOGY_CACHE_DIR) {
            self.cache_dir.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(INEXOGY_TTL) {
            if let Ok(ttl) = v.parse() {
                self.ttl = ttl;
            }
        }
        if let Some(v) = ctx.env_var(INEXOGY_METERS_TTL) {
            if let Ok(ttl) = v.parse() {
                self.meters_ttl = ttl;
            }
        }
        if let Some(v) = ctx.env_var(INEXOGY_ACCEPT_INVALID_CERTS) {
            self.accept_invalid_certs = v == "1" || v.eq_ignore_ascii_case("true");
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metersign_core::StaticEnv;
    use std::collections::HashMap;

    #[test]
    fn test_from_env() {
        let ctx = Context::new().with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from_iter([
                (INEXOGY_EMAIL.to_string(), "user@example.com".to_string()),
                (INEXOGY_PASSWORD.to_string(), "secret".to_string()),
                (INEXOGY_TTL.to_string(), "86400".to_string()),
            ]),
        });

        let config = Config::default().from_env(&ctx);
        assert_eq!(config.email.as_deref(), Some("user@example.com"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.ttl, 86400);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.meters_ttl, DEFAULT_METERS_TTL);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_accept_invalid_certs_from_env() {
        let ctx = Context::new().with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from_iter([(
                INEXOGY_ACCEPT_INVALID_CERTS.to_string(),
                "true".to_string(),
            )]),
        });

        assert!(Config::default().from_env(&ctx).accept_invalid_certs);
    }

    #[test]
    fn test_explicit_fields_win_over_env() {
        let ctx = Context::new().with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from_iter([(
                INEXOGY_EMAIL.to_string(),
                "env@example.com".to_string(),
            )]),
        });

        let config = Config {
            email: Some("explicit@example.com".to_string()),
            ..Default::default()
        }
        .from_env(&ctx);

        assert_eq!(config.email.as_deref(), Some("explicit@example.com"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config {
            password: Some("super-secret-password".to_string()),
            ..Default::default()
        };

        let formatted = format!("{config:?}");
        assert!(!formatted.contains("super-secret-password"));
    }
}
