//! Implementations of the JSON Web Algorithms (JWA) standard
//!
//! The specifications for these algorithms can be found in [RFC7518][].
//! Edwards-curve keys follow [RFC8037][].
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC8037]: https://tools.ietf.org/html/rfc8037

pub mod ec;
pub mod oct;
pub mod okp;
pub mod rsa;

mod algorithm;
mod usage;

pub use algorithm::{Algorithm, KeyType};
pub use usage::{KeyOperation, Usage};
