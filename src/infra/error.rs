//! Error types for PDF signing and verification.
//! Error handling types and result definitions shared by every layer.

use std::time::Duration;
use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Comprehensive error types for signing operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("ByteRange placeholder not found in document")]
    #[diagnostic(help("the document carries no /ByteRange; it is probably unsigned"))]
    ByteRangeNotFound,

    #[error("Malformed ByteRange: {0}")]
    MalformedByteRange(String),

    #[error("Malformed signature placeholder: {0}")]
    MalformedPlaceholder(String),

    #[error("Signature too large: needs {required} hex characters, placeholder holds {available}")]
    #[diagnostic(help("increase `signature_capacity` in the configuration"))]
    SignatureTooLarge { required: usize, available: usize },

    #[error("Remote signer is not connected")]
    SignerUnavailable,

    #[error("Remote signer is busy with another request")]
    SignerBusy,

    #[error("Remote signer disconnected before responding")]
    SignerDisconnected,

    #[error("Remote signer did not respond within {0:?}")]
    SignerTimeout(Duration),

    #[error("Remote signer rejected the request: {0}")]
    RemoteSignerRejected(String),

    #[error("Invalid authenticated attributes: {0}")]
    InvalidAuthenticatedAttributes(String),

    #[error("Content digest does not match the signed byte ranges")]
    InvalidContentDigest,

    #[error("Malformed PKCS#7 structure: {0}")]
    MalformedPkcs7(String),

    #[error("PDF document error: {0}")]
    PdfError(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Coarse grouping of failures for callers that only need to know who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The submitted document is malformed or unsuitable.
    Document,
    /// The remote key holder could not be reached or refused.
    Signer,
    /// The embedded signature is structurally or cryptographically invalid.
    Signature,
    /// Local environment: I/O, configuration, key material.
    Environment,
}

impl SigningError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            SigningError::ByteRangeNotFound
            | SigningError::MalformedByteRange(_)
            | SigningError::MalformedPlaceholder(_)
            | SigningError::PdfError(_)
            | SigningError::InvalidInput(_) => ErrorCategory::Document,
            SigningError::SignerUnavailable
            | SigningError::SignerBusy
            | SigningError::SignerDisconnected
            | SigningError::SignerTimeout(_)
            | SigningError::RemoteSignerRejected(_)
            | SigningError::ProtocolError(_) => ErrorCategory::Signer,
            SigningError::InvalidAuthenticatedAttributes(_)
            | SigningError::InvalidContentDigest
            | SigningError::MalformedPkcs7(_) => ErrorCategory::Signature,
            SigningError::SignatureTooLarge { .. }
            | SigningError::CertificateError(_)
            | SigningError::CryptographicError(_)
            | SigningError::IoError(_)
            | SigningError::ConfigurationError(_) => ErrorCategory::Environment,
        }
    }

    /// Stable machine-readable code, used on the relay wire.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SigningError::ByteRangeNotFound => "BYTE_RANGE_NOT_FOUND",
            SigningError::MalformedByteRange(_) => "MALFORMED_BYTE_RANGE",
            SigningError::MalformedPlaceholder(_) => "MALFORMED_PLACEHOLDER",
            SigningError::SignatureTooLarge { .. } => "SIGNATURE_TOO_LARGE",
            SigningError::SignerUnavailable => "SIGNER_UNAVAILABLE",
            SigningError::SignerBusy => "SIGNER_BUSY",
            SigningError::SignerDisconnected => "SIGNER_DISCONNECTED",
            SigningError::SignerTimeout(_) => "SIGNER_TIMEOUT",
            SigningError::RemoteSignerRejected(_) => "SIGNER_REJECTED",
            SigningError::InvalidAuthenticatedAttributes(_) => "INVALID_AUTHENTICATED_ATTRIBUTES",
            SigningError::InvalidContentDigest => "INVALID_CONTENT_DIGEST",
            SigningError::MalformedPkcs7(_) => "MALFORMED_PKCS7",
            SigningError::PdfError(_) => "PDF_ERROR",
            SigningError::CertificateError(_) => "CERTIFICATE_ERROR",
            SigningError::CryptographicError(_) => "CRYPTO_ERROR",
            SigningError::ProtocolError(_) => "PROTOCOL_ERROR",
            SigningError::IoError(_) => "IO_ERROR",
            SigningError::InvalidInput(_) => "INVALID_INPUT",
            SigningError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<lopdf::Error> for SigningError {
    fn from(error: lopdf::Error) -> Self {
        SigningError::PdfError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::MalformedPkcs7(error.to_string())
    }
}

impl From<serde_json::Error> for SigningError {
    fn from(error: serde_json::Error) -> Self {
        SigningError::ProtocolError(error.to_string())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}
