//! Core components for the metersign session protocol.
//!
//! This crate provides the foundational types for signing smart-meter API
//! requests and for sharing one authorization between many independent OS
//! processes, using only the filesystem as a coordination medium.
//!
//! ## Overview
//!
//! The crate is built around several key concepts:
//!
//! - **Context**: a container holding the HTTP sending and environment access
//!   implementations
//! - **Traits**: abstract interfaces for credential loading
//!   ([`ProvideCredential`]) and request signing ([`SignRequest`])
//! - **DiskCache**: cross-process cache-and-lock coordination for expensive
//!   credential loads
//! - **Signer**: the orchestrator that coordinates credential loading and
//!   request signing
//!
//! ## Example
//!
//! ```no_run
//! use metersign_core::{Context, Signer, ProvideCredential, SignRequest, SigningCredential, Result};
//! use async_trait::async_trait;
//!
//! // Define your credential type
//! #[derive(Clone, Debug)]
//! struct MyCredential {
//!     token: String,
//!     token_secret: String,
//! }
//!
//! impl SigningCredential for MyCredential {
//!     fn is_valid(&self) -> bool {
//!         !self.token.is_empty() && !self.token_secret.is_empty()
//!     }
//! }
//!
//! // Implement credential loader
//! #[derive(Debug)]
//! struct MyLoader;
//!
//! #[async_trait]
//! impl ProvideCredential for MyLoader {
//!     type Credential = MyCredential;
//!
//!     async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
//!         Ok(Some(MyCredential {
//!             token: "token".to_string(),
//!             token_secret: "token-secret".to_string(),
//!         }))
//!     }
//! }
//!
//! // Implement request signer
//! #[derive(Debug)]
//! struct MySigner;
//!
//! #[async_trait]
//! impl SignRequest for MySigner {
//!     type Credential = MyCredential;
//!
//!     async fn sign_request(
//!         &self,
//!         _ctx: &Context,
//!         _req: &mut http::request::Parts,
//!         _cred: Option<&Self::Credential>,
//!     ) -> Result<()> {
//!         // Build your signature here
//!         todo!()
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::default();
//! let signer = Signer::new(ctx, MyLoader, MySigner);
//!
//! let mut parts = http::Request::builder()
//!     .method("GET")
//!     .uri("https://example.com")
//!     .body(())
//!     .unwrap()
//!     .into_parts()
//!     .0;
//!
//! signer.sign(&mut parts).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Traits
//!
//! This crate defines several important traits:
//!
//! - [`HttpSend`]: for sending HTTP requests
//! - [`Env`]: for environment variable access
//! - [`ProvideCredential`]: for loading credentials from various sources
//! - [`SignRequest`]: for building protocol-specific signatures
//! - [`SigningCredential`]: for validating credentials
//!
//! ## Utilities
//!
//! The crate also provides utility modules:
//!
//! - [`hash`]: cryptographic hashing utilities
//! - [`time`]: time manipulation utilities
//! - [`utils`]: general utilities including data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::{Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};

mod error;
pub use error::{Error, ErrorKind, Result};

mod cache;
pub use cache::{CacheKey, DiskCache};

mod api;
pub use api::{ProvideCredential, SignRequest, SigningCredential};
mod chain;
pub use chain::ProvideCredentialChain;
mod request;
pub use request::SigningRequest;
mod signer;
pub use signer::Signer;
