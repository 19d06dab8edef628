//! Hash algorithm domain type.
//!
//! Provides the core `HashAlgorithm` enumeration supporting SHA-256, SHA-384,
//! and SHA-512, together with the OID and OpenSSL mappings the PKCS#7 layer
//! needs to name and check a digest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::DigestBytes;
use crate::domain::constants;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// OID content octets of the digest algorithm.
    #[must_use]
    pub fn oid_bytes(&self) -> &'static [u8] {
        match self {
            HashAlgorithm::Sha256 => constants::SHA256_ALGORITHM_OID,
            HashAlgorithm::Sha384 => constants::SHA384_ALGORITHM_OID,
            HashAlgorithm::Sha512 => constants::SHA512_ALGORITHM_OID,
        }
    }

    /// Map digest OID content octets back to an algorithm.
    #[must_use]
    pub fn from_oid_bytes(oid: &[u8]) -> Option<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|algo| algo.oid_bytes() == oid)
    }

    /// ecdsa-with-SHAx signature algorithm OID paired with this digest.
    #[must_use]
    pub fn ecdsa_signature_oid(&self) -> &'static [u8] {
        match self {
            HashAlgorithm::Sha256 => constants::ECDSA_WITH_SHA256_OID,
            HashAlgorithm::Sha384 => constants::ECDSA_WITH_SHA384_OID,
            HashAlgorithm::Sha512 => constants::ECDSA_WITH_SHA512_OID,
        }
    }

    #[must_use]
    pub fn message_digest(&self) -> openssl::hash::MessageDigest {
        match self {
            HashAlgorithm::Sha256 => openssl::hash::MessageDigest::sha256(),
            HashAlgorithm::Sha384 => openssl::hash::MessageDigest::sha384(),
            HashAlgorithm::Sha512 => openssl::hash::MessageDigest::sha512(),
        }
    }

    #[must_use]
    pub fn md(&self) -> &'static openssl::md::MdRef {
        match self {
            HashAlgorithm::Sha256 => openssl::md::Md::sha256(),
            HashAlgorithm::Sha384 => openssl::md::Md::sha384(),
            HashAlgorithm::Sha512 => openssl::md::Md::sha512(),
        }
    }

    /// Hash `data` in one shot.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> DigestBytes {
        self.digest_parts(&[data])
    }

    /// Hash the concatenation of `parts` without materialising it.
    #[must_use]
    pub fn digest_parts(&self, parts: &[&[u8]]) -> DigestBytes {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }
        let bytes = match self {
            HashAlgorithm::Sha256 => run::<Sha256>(parts),
            HashAlgorithm::Sha384 => run::<Sha384>(parts),
            HashAlgorithm::Sha512 => run::<Sha512>(parts),
        };
        DigestBytes::computed(*self, bytes)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(format!("unsupported hash algorithm: {other}")),
        }
    }
}
