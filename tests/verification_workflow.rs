//! Verification Workflow Tests
//!
//! Tamper with signed documents in the ways a verifier has to notice and check
//! that each one is classified correctly.

mod common;

use common::{first_page_placement, rfind, single_page_pdf, test_identity, three_page_pdf};
use pdf_remote_signer::{
    services::verification::VerificationService, verify_pdf, verify_pdf_file, SignWorkflow,
    VerificationFailure, VerifyWorkflow,
};
use tempfile::NamedTempFile;

fn signed_document() -> Vec<u8> {
    let identity = test_identity("Verifier Fixture");
    SignWorkflow::default()
        .sign_with_identity(&single_page_pdf(), &first_page_placement(), "Verifier", &identity)
        .expect("signing should succeed")
}

fn failure_of(pdf: &[u8]) -> Option<VerificationFailure> {
    verify_pdf(pdf).failure
}

/// Replace the hex digit at `offset` with a different hex digit.
fn flip_hex_digit(pdf: &mut [u8], offset: usize) {
    pdf[offset] = if pdf[offset] == b'0' { b'1' } else { b'0' };
}

#[test]
fn test_untouched_document_verifies() {
    let signed = signed_document();
    let report = VerifyWorkflow::new().run(&signed);
    assert!(report.success());
    assert!(report.message.is_none());
}

#[test]
fn test_modified_byte_before_signature_is_detected() {
    let mut signed = signed_document();
    signed[12] ^= 0x20;
    assert_eq!(
        failure_of(&signed),
        Some(VerificationFailure::InvalidContentDigest)
    );
}

#[test]
fn test_modified_byte_after_signature_is_detected() {
    let mut signed = signed_document();
    let range = verify_pdf(&signed).details.expect("details").byte_range;

    // Somewhere in the trailing span, clear of the ByteRange field itself.
    let target = signed.len() - 3;
    assert!(target >= range.start1);
    signed[target] ^= 0x01;
    assert_eq!(
        failure_of(&signed),
        Some(VerificationFailure::InvalidContentDigest)
    );
}

#[test]
fn test_page_content_change_is_detected() {
    let mut signed = signed_document();
    let at = rfind(&signed, b"Page 1").expect("page text present");
    signed[at + 5] = b'9';
    assert_eq!(
        failure_of(&signed),
        Some(VerificationFailure::InvalidContentDigest)
    );
}

#[test]
fn test_corrupted_signature_value_is_detected() {
    let mut signed = signed_document();
    let service = VerificationService::new();
    let (range, der) = service.extract_signature(&signed).expect("signature present");

    // The RSA signature value is the tail of the DER blob.
    let hex_offset = range.length0 + 1 + 2 * (der.len() - 20);
    flip_hex_digit(&mut signed, hex_offset);

    assert_eq!(
        failure_of(&signed),
        Some(VerificationFailure::InvalidAuthenticatedAttributes)
    );
}

#[test]
fn test_non_hex_signature_is_malformed() {
    let mut signed = signed_document();
    let range = verify_pdf(&signed).details.expect("details").byte_range;
    signed[range.length0 + 1] = b'z';

    assert_eq!(failure_of(&signed), Some(VerificationFailure::MalformedPkcs7));
}

#[test]
fn test_garbage_in_padding_is_malformed() {
    let mut signed = signed_document();
    let range = verify_pdf(&signed).details.expect("details").byte_range;
    let closing = range.start1 - 1;
    assert_eq!(signed[closing], b'>');
    signed[closing - 1] = b'7';

    assert_eq!(failure_of(&signed), Some(VerificationFailure::MalformedPkcs7));
}

#[test]
fn test_byte_range_beyond_document_is_malformed() {
    let mut signed = signed_document();
    let marker = rfind(&signed, b"/ByteRange").expect("ByteRange present");
    let open = marker + signed[marker..].iter().position(|b| *b == b'[').expect("array");
    let close = open + signed[open..].iter().position(|b| *b == b']').expect("array end");

    let mut replacement = b"0 10 20 99999999".to_vec();
    assert!(replacement.len() <= close - open - 1);
    replacement.resize(close - open - 1, b' ');
    signed[open + 1..close].copy_from_slice(&replacement);

    assert_eq!(
        failure_of(&signed),
        Some(VerificationFailure::MalformedByteRange)
    );
}

#[test]
fn test_unsigned_document_has_no_byte_range() {
    let report = verify_pdf(&three_page_pdf());
    assert!(!report.success());
    assert_eq!(report.failure, Some(VerificationFailure::ByteRangeNotFound));
    assert_eq!(
        report.failure.map(|f| f.as_str()),
        Some("ByteRange not found")
    );
}

#[test]
fn test_verify_from_disk() {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(file.path(), signed_document()).expect("write signed PDF");

    let report = verify_pdf_file(file.path()).expect("file should be readable");
    assert!(report.success());
    assert_eq!(
        report.details.and_then(|d| d.signer_common_name).as_deref(),
        Some("Verifier Fixture")
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = verify_pdf_file(dir.path().join("missing.pdf"));
    assert!(matches!(
        result,
        Err(pdf_remote_signer::SigningError::IoError(_))
    ));
}
