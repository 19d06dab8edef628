//! PDF Remote Signer Library
//!
//! Detached PKCS#7 signing and verification of PDF documents. The signature
//! is embedded in a fixed-width `/Contents` placeholder and covers every byte
//! of the file except that placeholder, as declared by `/ByteRange`. The
//! private key may live in-process or with a remote key holder reached
//! through the signing coordinator.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

use std::path::Path;

pub use adapters::identity::{LocalKeyIdentity, SigningIdentity};
pub use adapters::remote::{CoordinatorConfig, CoordinatorHandle, SignIntent, SigningCoordinator};
pub use domain::crypto::{DigestBytes, HashAlgorithm};
pub use domain::pdf::{ByteRange, SelectionRect, SignaturePlacement};
pub use domain::verification::{SignatureDetails, VerificationFailure, VerificationReport};
pub use infra::config::{ConfigManager, SigningConfiguration};
pub use infra::error::{ErrorCategory, SigningError, SigningResult};
pub use pipelines::{PendingSignature, SignWorkflow, VerifyWorkflow};

/// Sign `pdf` in one call with a key available in-process.
pub fn sign_pdf(
    pdf: &[u8],
    placement: &SignaturePlacement,
    signer_label: &str,
    identity: &dyn SigningIdentity,
    config: &SigningConfiguration,
) -> SigningResult<Vec<u8>> {
    SignWorkflow::from_config(config)?.sign_with_identity(pdf, placement, signer_label, identity)
}

/// Verify a signed PDF held in memory.
#[must_use]
pub fn verify_pdf(pdf: &[u8]) -> VerificationReport {
    VerifyWorkflow::new().run(pdf)
}

/// Verify a signed PDF on disk.
pub fn verify_pdf_file<P: AsRef<Path>>(path: P) -> SigningResult<VerificationReport> {
    VerifyWorkflow::new().run_file(path)
}
