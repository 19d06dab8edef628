//! PDF Signature Embedder Service
//!
//! Writes the hex-encoded PKCS#7 blob into the zero-filled `/Contents`
//! placeholder of a resolved document. The document length never changes.

use crate::{
    domain::pkcs7::Pkcs7SignedData,
    infra::error::{SigningError, SigningResult},
    services::resolver::PreparedDocument,
};

pub struct PdfSignatureEmbedderService;

impl Default for PdfSignatureEmbedderService {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfSignatureEmbedderService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Embed `pkcs7` and return the signed document bytes.
    pub fn embed(
        &self,
        prepared: PreparedDocument,
        pkcs7: &Pkcs7SignedData,
    ) -> SigningResult<Vec<u8>> {
        let (mut buffer, byte_range, span) = prepared.into_parts();
        let available = span.hex_capacity();
        let required = pkcs7.len() * 2;
        if required > available {
            return Err(SigningError::SignatureTooLarge {
                required,
                available,
            });
        }

        let mut hex = hex::encode(pkcs7.as_der()).into_bytes();
        hex.resize(available, b'0');

        let original_len = buffer.len();
        buffer.overwrite(span.open + 1, &hex)?;
        debug_assert_eq!(buffer.len(), original_len);

        log::info!(
            "Embedded {} byte signature ({} of {} hex characters used), ByteRange {}",
            pkcs7.len(),
            required,
            available,
            byte_range
        );
        Ok(buffer.into_bytes())
    }
}
