//! Bearer token verification against an identity provider's published keys
//!
//! An [`Authority`] takes the raw value of an `Authorization` header and
//! either produces the token's claims or refuses it with an opaque
//! [`Unauthorized`]. Signing keys are fetched from the issuer's JSON Web Key
//! Set (JWKS) endpoint by a [`KeyCache`], which keeps them fresh, reloads
//! them when a token names an unknown key, and makes concurrent callers
//! share a single fetch.
//!
//! ```no_run
//! use std::time::Duration;
//! use warden_oidc::{Authority, AuthorityConfig};
//!
//! # async fn handle(authorization: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorityConfig::new("https://issuer.example")
//!     .add_audience("my_api")
//!     .with_clock_tolerance(Duration::from_secs(30));
//!
//! let authority = Authority::from_config(&config)?;
//!
//! match authority.verify(authorization).await {
//!     Ok(claims) => println!("hello, {:?}", claims.sub()),
//!     Err(refused) => println!("{} ({})", refused, refused.status()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! This crate does not enable TLS support in `reqwest` by itself. If your
//! application already uses `reqwest` with some TLS settings, this crate
//! uses those settings automatically. Otherwise, enable the `default-tls`
//! or `rustls-tls` feature to fetch keys from an HTTPS endpoint.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authority;
mod cache;
pub mod config;
pub mod error;
pub mod oidc;
mod resolver;
mod source;

pub use authority::{Authority, AuthorityError, Category, Stage, Unauthorized};
pub use cache::{KeyCache, KeyCacheConfig};
pub use config::AuthorityConfig;
pub use resolver::{KeyResolver, LocalKeys};
pub use source::{HttpKeySource, KeySource};
