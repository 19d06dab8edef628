//! End-to-End Signing Integration Tests
//!
//! Sign generated PDFs with a self-signed in-process identity and run the
//! results back through the verifier.

mod common;

use common::{
    first_page_placement, producer_pdf, rfind, scenario_placement, single_page_pdf,
    test_identity, three_page_pdf, PAGE_HEIGHT,
};
use lopdf::{Document, Object};
use pdf_remote_signer::{
    services::placeholder::PlaceholderOptions, sign_pdf, verify_pdf, verify_pdf_file,
    HashAlgorithm, SelectionRect, SignWorkflow, SignaturePlacement, SigningConfiguration,
    SigningError, SigningIdentity,
};
use tempfile::NamedTempFile;

#[test]
fn test_three_page_document_signed_on_second_page() {
    let pdf = three_page_pdf();
    let identity = test_identity("Integration Signer");
    let workflow = SignWorkflow::default();

    let signed = workflow
        .sign_with_identity(&pdf, &scenario_placement(), "Integration Signer", &identity)
        .expect("signing should succeed");

    let report = verify_pdf(&signed);
    assert!(report.success(), "verification failed: {:?}", report.message);

    let details = report.details.expect("valid report carries details");
    let range = details.byte_range;
    let placeholder_width = workflow.placeholder_options().signature_capacity * 2 + 2;
    assert_eq!(range.start0, 0);
    assert_eq!(range.length0 + range.length1, signed.len() - placeholder_width);
    assert_eq!(range.start1, range.length0 + placeholder_width);
    assert_eq!(range.start1 + range.length1, signed.len());
    assert_eq!(details.digest_algorithm, HashAlgorithm::Sha256);
    assert_eq!(details.signer_common_name.as_deref(), Some("Integration Signer"));
    assert!(details.signing_time.is_some());

    println!("✅ Signed {} -> {} bytes, {}", pdf.len(), signed.len(), range);
}

#[test]
fn test_document_with_object_streams_signs_and_reloads() {
    let pdf = producer_pdf();
    assert!(pdf.starts_with(b"%PDF-1.5"));
    assert!(rfind(&pdf, b"/Type /ObjStm").is_some());
    assert!(rfind(&pdf, b"/Type /XRef").is_some());
    let page_count = Document::load_mem(&pdf)
        .expect("fixture parses")
        .get_pages()
        .len();
    assert!(page_count > 1);

    let identity = test_identity("Producer Check");
    let signed = SignWorkflow::default()
        .sign_with_identity(&pdf, &scenario_placement(), "Producer Check", &identity)
        .expect("signing should succeed");

    let report = verify_pdf(&signed);
    assert!(report.success(), "verification failed: {:?}", report.message);
    let range = report.details.expect("details").byte_range;
    assert_eq!(range.start1 + range.length1, signed.len());

    let reloaded = Document::load_mem(&signed).expect("signed output should still parse");
    assert_eq!(reloaded.get_pages().len(), page_count);
    let signature_fields = reloaded
        .objects
        .values()
        .filter_map(|object| object.as_dict().ok())
        .filter(|dict| dict.get(b"FT").and_then(Object::as_name).ok() == Some(&b"Sig"[..]))
        .count();
    assert_eq!(signature_fields, 1);
}

#[test]
fn test_excluded_span_is_exactly_the_contents_string() {
    let identity = test_identity("Gap Check");
    let signed = SignWorkflow::default()
        .sign_with_identity(&single_page_pdf(), &first_page_placement(), "Gap Check", &identity)
        .expect("signing should succeed");

    let range = verify_pdf(&signed).details.expect("details").byte_range;
    let gap = &signed[range.excluded()];
    assert_eq!(gap.first(), Some(&b'<'));
    assert_eq!(gap.last(), Some(&b'>'));
    assert!(gap[1..gap.len() - 1].iter().all(u8::is_ascii_hexdigit));

    let before = &signed[..range.length0];
    assert!(
        before.ends_with(b"/Contents"),
        "the gap must start right after /Contents"
    );
    assert!(rfind(&signed, b"/ByteRange").is_some_and(|pos| pos < range.length0));
    assert!(!signed.windows(10).any(|w| w == b"**********"));
}

#[test]
fn test_signature_widget_is_on_requested_page() {
    let identity = test_identity("Widget Check");
    let signed = SignWorkflow::default()
        .sign_with_identity(&three_page_pdf(), &scenario_placement(), "Widget Check", &identity)
        .expect("signing should succeed");

    let doc = Document::load_mem(&signed).expect("signed output should still parse");
    let pages: Vec<_> = doc.get_pages().into_values().collect();
    assert_eq!(pages.len(), 3);

    let annots_of = |page_id| -> Vec<Object> {
        doc.get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"Annots").ok())
            .and_then(|annots| annots.as_array().ok())
            .cloned()
            .unwrap_or_default()
    };
    assert!(annots_of(pages[0]).is_empty());
    assert!(annots_of(pages[2]).is_empty());

    let annots = annots_of(pages[1]);
    assert_eq!(annots.len(), 1);
    let widget = doc
        .get_dictionary(annots[0].as_reference().expect("annotation reference"))
        .expect("widget dictionary");
    assert_eq!(widget.get(b"FT").and_then(Object::as_name).ok(), Some(&b"Sig"[..]));

    let rect: Vec<f32> = widget
        .get(b"Rect")
        .and_then(Object::as_array)
        .expect("widget rect")
        .iter()
        .map(|v| v.as_float().expect("numeric rect entry"))
        .collect();
    let height = PAGE_HEIGHT as f32;
    assert_eq!(rect, vec![100.0, height - 250.0, 300.0, height - 200.0]);
}

#[test]
fn test_single_page_round_trip_with_sha512() {
    let identity = test_identity("SHA-512 Signer");
    let workflow = SignWorkflow::new(HashAlgorithm::Sha512, PlaceholderOptions::default());

    let signed = workflow
        .sign_with_identity(&single_page_pdf(), &first_page_placement(), "SHA-512", &identity)
        .expect("signing should succeed");

    let report = verify_pdf(&signed);
    assert!(report.success(), "verification failed: {:?}", report.message);
    assert_eq!(
        report.details.map(|d| d.digest_algorithm),
        Some(HashAlgorithm::Sha512)
    );
}

#[test]
fn test_signature_larger_than_placeholder_is_rejected() {
    let identity = test_identity("Tiny Placeholder");
    let options = PlaceholderOptions {
        signature_capacity: 64,
        ..PlaceholderOptions::default()
    };
    let workflow = SignWorkflow::new(HashAlgorithm::Sha256, options);

    let result =
        workflow.sign_with_identity(&single_page_pdf(), &first_page_placement(), "x", &identity);
    match result {
        Err(SigningError::SignatureTooLarge {
            required,
            available,
        }) => {
            assert_eq!(available, 128);
            assert!(required > available);
        }
        other => panic!("expected SignatureTooLarge, got {other:?}"),
    }
}

#[test]
fn test_page_index_out_of_range() {
    let identity = test_identity("Out Of Range");
    let placement = SignaturePlacement::new(7, SelectionRect::new(0.0, 0.0, 10.0, 10.0));

    let result =
        SignWorkflow::default().sign_with_identity(&three_page_pdf(), &placement, "x", &identity);
    assert!(matches!(result, Err(SigningError::InvalidInput(_))));
}

#[test]
fn test_non_pdf_input_is_rejected() {
    let identity = test_identity("Garbage");
    let result = SignWorkflow::default().sign_with_identity(
        b"definitely not a PDF",
        &first_page_placement(),
        "x",
        &identity,
    );
    assert!(matches!(result, Err(SigningError::PdfError(_))));
}

#[test]
fn test_two_phase_signing_matches_local_identity() {
    let identity = test_identity("Two Phase");
    let pending = SignWorkflow::default()
        .prepare(&single_page_pdf(), &first_page_placement(), "Two Phase")
        .expect("prepare should succeed");

    assert_eq!(pending.hash_algorithm(), HashAlgorithm::Sha256);
    assert_eq!(pending.content_digest().as_slice().len(), 32);
    assert_ne!(pending.digest_to_sign().as_slice(), pending.content_digest().as_slice());

    let signature = identity
        .sign_digest(&pending.digest_to_sign())
        .expect("local signing");
    let cert = identity.certificate_der().expect("certificate");
    let signed = pending.complete(&cert, &signature).expect("complete");

    assert!(verify_pdf(&signed).success());
}

#[test]
fn test_signature_from_other_key_is_rejected_before_embedding() {
    let signer = test_identity("Real Signer");
    let impostor = test_identity("Impostor");

    let pending = SignWorkflow::default()
        .prepare(&single_page_pdf(), &first_page_placement(), "Real Signer")
        .expect("prepare should succeed");
    let signature = impostor
        .sign_digest(&pending.digest_to_sign())
        .expect("impostor signs");
    let result = pending.complete(&signer.certificate_der().expect("certificate"), &signature);

    assert!(matches!(
        result,
        Err(SigningError::InvalidAuthenticatedAttributes(_))
    ));
}

#[test]
fn test_library_facade_signs_to_disk() {
    let identity = test_identity("Facade Signer");
    let config = SigningConfiguration::default();

    let signed = sign_pdf(
        &three_page_pdf(),
        &scenario_placement(),
        "Facade Signer",
        &identity,
        &config,
    )
    .expect("sign_pdf should succeed");

    let output = NamedTempFile::new().expect("Failed to create temp output file");
    std::fs::write(output.path(), &signed).expect("write signed PDF");

    let report = verify_pdf_file(output.path()).expect("file should be readable");
    assert!(report.success());
    assert_eq!(
        report.details.and_then(|d| d.signer_common_name).as_deref(),
        Some("Facade Signer")
    );
}

#[test]
fn test_facade_rejects_invalid_configuration() {
    let identity = test_identity("Bad Config");
    let config = SigningConfiguration {
        hash_algorithm: "md5".to_string(),
        ..SigningConfiguration::default()
    };

    let result = sign_pdf(&single_page_pdf(), &first_page_placement(), "x", &identity, &config);
    assert!(matches!(result, Err(SigningError::ConfigurationError(_))));
}
