//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for hash algorithms and digest values
//! with size validation.

mod digest_bytes;
mod hash;

pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::HashAlgorithm;
