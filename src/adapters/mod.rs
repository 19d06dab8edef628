//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - signing identities backed by OpenSSL key material
//! - the remote key holder, reached through the signing coordinator and relay

pub mod identity;
pub mod remote;
