//! Verification service: checks the detached PKCS#7 signature of a PDF.
//!
//! Order matters and is fixed: ByteRange, then PKCS#7 structure, then the
//! signature over the authenticated attributes, and only then the content
//! digest. A document whose attributes verify but whose bytes were changed is
//! therefore reported as a content-digest failure, not an attribute failure.

use openssl::nid::Nid;
use openssl::pkey::{PKey, Public};
use openssl::sign::Verifier;
use openssl::x509::X509;

use crate::{
    domain::{
        crypto::HashAlgorithm,
        pdf::{locate_field, ByteRange},
        verification::{SignatureDetails, VerificationReport},
    },
    services::pkcs7_parser::{encoded_len, parse_signed_data, signer_certificate},
    SigningError, SigningResult,
};

/// Whether `signature` over `data` verifies under `key`.
///
/// OpenSSL reports some mismatches (wrong length, bad padding) as errors
/// rather than `false`; both mean "does not verify".
#[must_use]
pub fn signature_matches(
    key: &PKey<Public>,
    algorithm: HashAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(mut verifier) = Verifier::new(algorithm.message_digest(), key) else {
        return false;
    };
    verifier.update(data).is_ok() && verifier.verify(signature).unwrap_or(false)
}

/// Subject common name of a certificate, if it has one.
#[must_use]
pub fn common_name(cert: &X509) -> Option<String> {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|name| name.to_string())
}

/// Service performing structural & cryptographic verification of a signed PDF.
pub struct VerificationService;

impl Default for VerificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Verify and always produce a report.
    #[must_use]
    pub fn verify(&self, pdf: &[u8]) -> VerificationReport {
        match self.verify_strict(pdf) {
            Ok(details) => {
                log::info!(
                    "Signature valid (signer: {}, ByteRange {})",
                    details.signer_common_name.as_deref().unwrap_or("unknown"),
                    details.byte_range
                );
                VerificationReport::valid(details)
            }
            Err(error) => {
                log::warn!("Signature verification failed: {error}");
                VerificationReport::invalid(&error)
            }
        }
    }

    /// Verify, surfacing the first failure as an error.
    pub fn verify_strict(&self, pdf: &[u8]) -> SigningResult<SignatureDetails> {
        let (byte_range, der) = self.extract_signature(pdf)?;
        let view = parse_signed_data(&der)?;
        let algorithm = view.signer.digest_algorithm;

        let cert = X509::from_der(signer_certificate(&view)?).map_err(|e| {
            SigningError::MalformedPkcs7(format!("embedded certificate is unreadable: {e}"))
        })?;
        let key = cert.public_key().map_err(|e| {
            SigningError::MalformedPkcs7(format!("embedded certificate has no usable key: {e}"))
        })?;

        let attributes = &view.signer.signed_attributes;
        if !signature_matches(&key, algorithm, attributes.set_der(), &view.signer.signature) {
            return Err(SigningError::InvalidAuthenticatedAttributes(
                "signature does not match the authenticated attributes".to_string(),
            ));
        }

        let expected = attributes.message_digest()?;
        let actual = algorithm.digest_parts(&byte_range.covered(pdf));
        if expected != actual.as_slice() {
            log::debug!(
                "messageDigest {} != computed {}",
                hex::encode(expected),
                actual.to_hex()
            );
            return Err(SigningError::InvalidContentDigest);
        }

        Ok(SignatureDetails {
            byte_range,
            digest_algorithm: algorithm,
            signer_common_name: common_name(&cert),
            signing_time: attributes.signing_time(),
        })
    }

    /// Locate the ByteRange and return it with the embedded DER blob, padding removed.
    pub fn extract_signature(&self, pdf: &[u8]) -> SigningResult<(ByteRange, Vec<u8>)> {
        let field = locate_field(pdf)?;
        let byte_range = ByteRange::parse(field.array_text(pdf), pdf.len())?;

        let excluded = byte_range.excluded();
        if excluded.len() < 2 || pdf[excluded.start] != b'<' || pdf[excluded.end - 1] != b'>' {
            return Err(SigningError::MalformedPkcs7(
                "ByteRange gap is not a hex string".to_string(),
            ));
        }

        let hex_text = &pdf[excluded.start + 1..excluded.end - 1];
        let bytes = hex::decode(hex_text)
            .map_err(|e| SigningError::MalformedPkcs7(format!("signature is not valid hex: {e}")))?;

        let der_len = encoded_len(&bytes)?;
        if bytes[der_len..].iter().any(|b| *b != 0) {
            return Err(SigningError::MalformedPkcs7(
                "non-zero bytes after the PKCS#7 structure".to_string(),
            ));
        }

        Ok((byte_range, bytes[..der_len].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::VerificationFailure;

    #[test]
    fn unsigned_document_reports_missing_byte_range() {
        let report = VerificationService::new().verify(b"%PDF-1.7\n%%EOF\n");
        assert!(!report.success());
        assert_eq!(report.failure, Some(VerificationFailure::ByteRangeNotFound));
    }

    #[test]
    fn unresolved_placeholder_is_malformed_byte_range() {
        let doc = b"/ByteRange[0/**********/**********/**********]/Contents<0000>";
        let report = VerificationService::new().verify(doc);
        assert_eq!(report.failure, Some(VerificationFailure::MalformedByteRange));
    }

    #[test]
    fn garbage_signature_is_malformed_pkcs7() {
        let doc = b"/ByteRange[0 30 36 0]/Contents<zz00>";
        assert_eq!(doc.len(), 36);
        let report = VerificationService::new().verify(doc);
        assert_eq!(report.failure, Some(VerificationFailure::MalformedPkcs7));
    }

    #[test]
    fn trailing_garbage_after_der_is_rejected() {
        let doc = b"/ByteRange[0 30 40 0]/Contents<30000100>";
        assert_eq!(doc.len(), 40);
        let err = VerificationService::new().extract_signature(doc).unwrap_err();
        assert!(matches!(err, SigningError::MalformedPkcs7(_)));
    }

    #[test]
    fn zero_padding_is_stripped() {
        let doc = b"/ByteRange[0 30 40 0]/Contents<30000000>";
        let (range, der) = VerificationService::new().extract_signature(doc).unwrap();
        assert_eq!(range.as_array(), [0, 30, 40, 0]);
        assert_eq!(der, vec![0x30, 0x00]);
    }
}
