mod handshake;
pub use handshake::HandshakeCredentialProvider;

mod cached;
pub use cached::CachedCredentialProvider;

mod default;
pub use default::DefaultCredentialProvider;

mod env;
pub use env::EnvCredentialProvider;

mod r#static;
pub use r#static::StaticCredentialProvider;
