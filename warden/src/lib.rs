//! This crate verifies bearer tokens signed according to the Javascript/JSON
//! Object Signing and Encryption (JOSE) standards:
//!
//! * JSON Web Signature (JWS): [RFC7515][]
//! * JSON Web Key (JWK): [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//! * CFRG Edwards-curve signatures in JOSE: [RFC8037][]
//!
//! Only verification with public keys is offered. Symmetric algorithms are
//! recognized so that they can be rejected explicitly.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//! [RFC8037]: https://tools.ietf.org/html/rfc8037
//!
//! # Example
//!
//! ```
//! use warden::{jwa, jwt, Jwks, JwtRef};
//!
//! let jwks: Jwks = serde_json::from_str(r#"{"keys": []}"#).unwrap();
//!
//! let validator = jwt::CoreValidator::default()
//!     .add_approved_algorithm(jwa::Algorithm::RS256)
//!     .require_issuer(jwt::Issuer::from_static("https://issuer.example"))
//!     .add_allowed_audience(jwt::Audience::from_static("my_api"));
//!
//! let token = JwtRef::from_str(concat!(
//!     "eyJhbGciOiJIUzI1NiJ9.",
//!     "eyJzdWIiOiJ3YXJkZW4ifQ.",
//!     "c2lnbmF0dXJl"
//! ));
//!
//! let decomposed = token.decompose().unwrap();
//!
//! // HS256 is not on the allow-list, so no key is ever consulted
//! assert!(validator.check_algorithm(decomposed.header()).is_err());
//! # let _ = jwks;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod b64;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;

#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{ClaimSet, Jwt, JwtRef};
