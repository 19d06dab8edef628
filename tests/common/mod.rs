//! Shared fixtures for integration tests.
//!
//! PDFs are generated with `lopdf` so the tests need no binary assets, and
//! every run signs with a freshly generated self-signed RSA-2048 identity.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use pdf_remote_signer::{LocalKeyIdentity, SelectionRect, SignaturePlacement};

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;

const FILLER: &str = "The quick brown fox jumps over the lazy dog while the contract terms apply.";

fn page_content(page_number: usize, lines: usize) -> Vec<u8> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("TL", vec![12.into()]),
        Operation::new("Td", vec![50.into(), (PAGE_HEIGHT - 50).into()]),
        Operation::new(
            "Tj",
            vec![Object::string_literal(format!("Page {page_number}"))],
        ),
    ];
    for line in 0..lines {
        operations.push(Operation::new("T*", vec![]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(format!("{line:04} {FILLER}"))],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
        .encode()
        .expect("content stream encodes")
}

/// Build an uncompressed PDF with `pages` US Letter pages of `lines_per_page`
/// text lines each.
pub fn build_pdf(pages: usize, lines_per_page: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id: ObjectId = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in 0..pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            page_content(page + 1, lines_per_page),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

/// One page with a little text.
pub fn single_page_pdf() -> Vec<u8> {
    build_pdf(1, 20)
}

/// Three pages, roughly 50 KB.
pub fn three_page_pdf() -> Vec<u8> {
    let pdf = build_pdf(3, 200);
    assert!(
        (40_000..70_000).contains(&pdf.len()),
        "fixture should be about 50 KB, got {}",
        pdf.len()
    );
    pdf
}

/// A PDF 1.5 document from a real producer: object streams plus an
/// xref stream, the layout most modern writers emit.
pub fn producer_pdf() -> Vec<u8> {
    include_bytes!("../fixtures/shared-mime-info.pdf").to_vec()
}

pub fn test_identity(common_name: &str) -> LocalKeyIdentity {
    LocalKeyIdentity::generate_self_signed(common_name, 2048).expect("generate test identity")
}

/// Page index 1, `{100, 200, 300, 250}` in viewer coordinates.
pub fn scenario_placement() -> SignaturePlacement {
    SignaturePlacement::new(1, SelectionRect::new(100.0, 200.0, 300.0, 250.0))
}

pub fn first_page_placement() -> SignaturePlacement {
    SignaturePlacement::new(0, SelectionRect::new(50.0, 50.0, 250.0, 110.0))
}

/// Offset of the last occurrence of `needle`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
