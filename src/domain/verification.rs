//! Verification domain types for signed PDF documents.
//!
//! A report is always produced, even for documents that are not signed at
//! all; callers branch on [`VerificationReport::success`] and, on failure,
//! on the [`VerificationFailure`] reason.

use std::time::SystemTime;

use serde::Serialize;

use crate::domain::crypto::HashAlgorithm;
use crate::domain::pdf::ByteRange;
use crate::SigningError;

/// Why a document failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationFailure {
    /// No `/ByteRange` field in the document.
    ByteRangeNotFound,
    /// The ByteRange is unparsable or inconsistent with the file.
    MalformedByteRange,
    /// The embedded blob is not a usable PKCS#7 `SignedData`.
    MalformedPkcs7,
    /// The signature over the authenticated attributes does not verify.
    InvalidAuthenticatedAttributes,
    /// The attributes verify but the covered bytes were changed.
    InvalidContentDigest,
}

impl VerificationFailure {
    /// Classify an error raised during verification.
    #[must_use]
    pub fn from_error(error: &SigningError) -> Self {
        match error {
            SigningError::ByteRangeNotFound => Self::ByteRangeNotFound,
            SigningError::MalformedByteRange(_) => Self::MalformedByteRange,
            SigningError::InvalidAuthenticatedAttributes(_) => Self::InvalidAuthenticatedAttributes,
            SigningError::InvalidContentDigest => Self::InvalidContentDigest,
            _ => Self::MalformedPkcs7,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByteRangeNotFound => "ByteRange not found",
            Self::MalformedByteRange => "malformed ByteRange",
            Self::MalformedPkcs7 => "malformed PKCS#7 signature",
            Self::InvalidAuthenticatedAttributes => "authenticated attributes signature mismatch",
            Self::InvalidContentDigest => "content digest mismatch",
        }
    }
}

/// What a valid signature tells us about its signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDetails {
    pub byte_range: ByteRange,
    pub digest_algorithm: HashAlgorithm,
    /// Subject common name of the embedded signer certificate.
    pub signer_common_name: Option<String>,
    pub signing_time: Option<SystemTime>,
}

/// Result of verifying a signed PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub failure: Option<VerificationFailure>,
    /// Human-readable cause, when verification failed.
    pub message: Option<String>,
    pub details: Option<SignatureDetails>,
}

impl VerificationReport {
    #[must_use]
    pub fn valid(details: SignatureDetails) -> Self {
        Self {
            failure: None,
            message: None,
            details: Some(details),
        }
    }

    #[must_use]
    pub fn invalid(error: &SigningError) -> Self {
        Self {
            failure: Some(VerificationFailure::from_error(error)),
            message: Some(error.to_string()),
            details: None,
        }
    }

    /// Overall success indicator.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}
