//! # auth-adapters
//!
//! Implementations of [`domains::IdentityVerifier`].

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::{JwtVerifier, SignError};
