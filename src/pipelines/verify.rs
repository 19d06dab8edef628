//! `VerifyWorkflow`: high-level facade for verifying signed PDF files.
//!
//! Delegates to `VerificationService`; keeps symmetry with the sign workflow.

use std::path::Path;

use crate::{
    domain::verification::VerificationReport, services::verification::VerificationService,
    SigningError, SigningResult,
};

/// Orchestrates verification steps for a signed PDF.
pub struct VerifyWorkflow {
    svc: VerificationService,
}

impl Default for VerifyWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            svc: VerificationService::new(),
        }
    }

    /// Run verification over provided signed PDF bytes.
    #[must_use]
    pub fn run(&self, signed_pdf: &[u8]) -> VerificationReport {
        self.svc.verify(signed_pdf)
    }

    /// Read `path` and verify it. Only I/O problems surface as errors.
    pub fn run_file<P: AsRef<Path>>(&self, path: P) -> SigningResult<VerificationReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            SigningError::IoError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(self.run(&bytes))
    }
}
