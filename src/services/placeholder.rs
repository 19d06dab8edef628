//! Placeholder Allocator Service
//!
//! Loads the document into the `lopdf` object model, adds a visible signature
//! widget on the requested page and a signature dictionary whose `/ByteRange`
//! holds sentinel names and whose `/Contents` is a zero-filled hex string of
//! fixed width. The document is then re-serialised; every later step works on
//! raw bytes only.

use std::time::SystemTime;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::{
    domain::{
        constants,
        pdf::{PdfBuffer, PdfRect, SignaturePlacement},
    },
    infra::config::{SigningConfiguration, DEFAULT_SIGNATURE_CAPACITY},
    SigningError, SigningResult,
};

const SENTINEL_NAME: &[u8] = b"**********";
const FONT_SIZE: f64 = 10.0;
const TEXT_INSET: f64 = 10.0;

/// Tunables for the signature dictionary and form field.
#[derive(Debug, Clone)]
pub struct PlaceholderOptions {
    /// Raw bytes reserved for the DER signature.
    pub signature_capacity: usize,
    pub reason: String,
    pub field_name: String,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self::from(&SigningConfiguration::default())
    }
}

impl From<&SigningConfiguration> for PlaceholderOptions {
    fn from(config: &SigningConfiguration) -> Self {
        Self {
            signature_capacity: config.signature_capacity,
            reason: config.reason.clone(),
            field_name: config.field_name.clone(),
        }
    }
}

/// What the visible annotation says.
#[derive(Debug, Clone)]
pub struct SignatureAppearance {
    pub signer_label: String,
    pub signing_time: SystemTime,
}

pub struct PlaceholderAllocator {
    options: PlaceholderOptions,
}

impl Default for PlaceholderAllocator {
    fn default() -> Self {
        Self::new(PlaceholderOptions::default())
    }
}

impl PlaceholderAllocator {
    #[must_use]
    pub fn new(options: PlaceholderOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &PlaceholderOptions {
        &self.options
    }

    /// Width of the zero-filled `/Contents` hex string, without brackets.
    #[must_use]
    pub fn hex_width(&self) -> usize {
        self.options.signature_capacity * 2
    }

    /// Produce a placeholdered copy of `pdf`.
    pub fn allocate(
        &self,
        pdf: &[u8],
        placement: &SignaturePlacement,
        appearance: &SignatureAppearance,
    ) -> SigningResult<PdfBuffer> {
        if self.options.signature_capacity == 0 {
            return Err(SigningError::ConfigurationError(format!(
                "signature capacity must be positive (default {DEFAULT_SIGNATURE_CAPACITY})"
            )));
        }

        let mut doc = Document::load_mem(pdf)?;
        let page_id = page_id(&doc, placement.page_index)?;
        let media_box = media_box(&doc, page_id)?;
        let rect = PdfRect::from_selection(&placement.selection, &media_box)?;

        log::info!(
            "Allocating signature placeholder on page {} at [{:.1} {:.1} {:.1} {:.1}] ({} bytes)",
            placement.page_index,
            rect.llx,
            rect.lly,
            rect.urx,
            rect.ury,
            self.options.signature_capacity
        );

        let sig_id = doc.add_object(Object::Dictionary(self.signature_dictionary(appearance)?));
        let appearance_id = doc.add_object(Object::Stream(appearance_stream(&rect, appearance)?));
        let widget_id = doc.add_object(Object::Dictionary(self.widget_dictionary(
            &rect,
            sig_id,
            appearance_id,
            page_id,
        )));

        add_to_page_annots(&mut doc, page_id, widget_id)?;
        add_to_acroform(&mut doc, widget_id)?;

        let mut out = Vec::with_capacity(pdf.len() + self.hex_width() + 4096);
        doc.save_to(&mut out)?;
        log::debug!("Placeholdered document is {} bytes", out.len());
        Ok(PdfBuffer::new(out))
    }

    fn signature_dictionary(&self, appearance: &SignatureAppearance) -> SigningResult<Dictionary> {
        let mut sig = Dictionary::new();
        sig.set("Type", Object::Name(b"Sig".to_vec()));
        sig.set("Filter", Object::Name(b"Adobe.PPKLite".to_vec()));
        sig.set("SubFilter", Object::Name(constants::SUBFILTER_PKCS7_DETACHED.to_vec()));
        sig.set(
            "Reason",
            Object::String(self.options.reason.as_bytes().to_vec(), StringFormat::Literal),
        );
        sig.set(
            "M",
            Object::String(
                pdf_date(appearance.signing_time)?.into_bytes(),
                StringFormat::Literal,
            ),
        );
        sig.set(
            "Name",
            Object::String(appearance.signer_label.as_bytes().to_vec(), StringFormat::Literal),
        );
        // ByteRange must directly precede Contents.
        sig.set(
            "ByteRange",
            Object::Array(vec![
                Object::Integer(0),
                Object::Name(SENTINEL_NAME.to_vec()),
                Object::Name(SENTINEL_NAME.to_vec()),
                Object::Name(SENTINEL_NAME.to_vec()),
            ]),
        );
        sig.set(
            "Contents",
            Object::String(
                vec![0; self.options.signature_capacity],
                StringFormat::Hexadecimal,
            ),
        );
        Ok(sig)
    }

    fn widget_dictionary(
        &self,
        rect: &PdfRect,
        sig_id: ObjectId,
        appearance_id: ObjectId,
        page_id: ObjectId,
    ) -> Dictionary {
        let mut ap = Dictionary::new();
        ap.set("N", Object::Reference(appearance_id));

        let mut widget = Dictionary::new();
        widget.set("Type", Object::Name(b"Annot".to_vec()));
        widget.set("Subtype", Object::Name(b"Widget".to_vec()));
        widget.set("FT", Object::Name(b"Sig".to_vec()));
        widget.set(
            "T",
            Object::String(
                self.options.field_name.as_bytes().to_vec(),
                StringFormat::Literal,
            ),
        );
        widget.set(
            "Rect",
            Object::Array(
                [rect.llx, rect.lly, rect.urx, rect.ury]
                    .into_iter()
                    .map(|v| Object::Real(v as f32))
                    .collect(),
            ),
        );
        widget.set("V", Object::Reference(sig_id));
        widget.set("AP", Object::Dictionary(ap));
        widget.set("F", Object::Integer(4)); // Print
        widget.set("P", Object::Reference(page_id));
        widget
    }
}

fn page_id(doc: &Document, page_index: usize) -> SigningResult<ObjectId> {
    let pages = doc.get_pages();
    pages.values().nth(page_index).copied().ok_or_else(|| {
        SigningError::InvalidInput(format!(
            "page index {page_index} out of range (document has {} pages)",
            pages.len()
        ))
    })
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> SigningResult<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// `/MediaBox`, inherited through `/Parent` when the page omits it.
fn media_box(doc: &Document, page_id: ObjectId) -> SigningResult<PdfRect> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let node = doc.get_dictionary(id)?;
        if let Ok(entry) = node.get(b"MediaBox") {
            let values = resolve(doc, entry)?
                .as_array()
                .map_err(|_| SigningError::PdfError("MediaBox is not an array".to_string()))?
                .iter()
                .map(|v| resolve(doc, v).ok().and_then(number))
                .collect::<Option<Vec<f64>>>()
                .filter(|v| v.len() == 4)
                .ok_or_else(|| {
                    SigningError::PdfError("MediaBox must hold four numbers".to_string())
                })?;
            return Ok(PdfRect {
                llx: values[0].min(values[2]),
                lly: values[1].min(values[3]),
                urx: values[0].max(values[2]),
                ury: values[1].max(values[3]),
            });
        }
        depth += 1;
        if depth > 64 {
            break;
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Err(SigningError::PdfError(
        "page has no MediaBox in its inheritance chain".to_string(),
    ))
}

fn appearance_stream(rect: &PdfRect, appearance: &SignatureAppearance) -> SigningResult<Stream> {
    let width = rect.width();
    let height = rect.height();
    let first_line = (height - FONT_SIZE - 4.0).max(2.0);

    let content = format!(
        "q\n\
0 0 0 RG\n\
1 w\n\
0.5 0.5 {w} {h} re S\n\
0 0 0 rg\n\
BT\n\
/Helv {fs} Tf\n\
{x} {y} Td\n\
({signer}) Tj\n\
0 -{lead} Td\n\
({time}) Tj\n\
ET\n\
Q",
        w = width - 1.0,
        h = height - 1.0,
        fs = FONT_SIZE,
        x = TEXT_INSET.min(width / 2.0),
        y = first_line,
        lead = FONT_SIZE + 2.0,
        signer = escape_text(&format!("Signed by {}", appearance.signer_label)),
        time = escape_text(&display_time(appearance.signing_time)?),
    );

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let mut fonts = Dictionary::new();
    fonts.set("Helv", Object::Dictionary(font));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("FormType", Object::Integer(1));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ]),
    );
    dict.set("Resources", Object::Dictionary(resources));

    Ok(Stream::new(dict, content.into_bytes()))
}

fn dict_mut(doc: &mut Document, id: ObjectId) -> SigningResult<&mut Dictionary> {
    doc.get_object_mut(id)?
        .as_dict_mut()
        .map_err(|_| SigningError::PdfError(format!("object {} {} is not a dictionary", id.0, id.1)))
}

fn add_to_page_annots(doc: &mut Document, page_id: ObjectId, widget_id: ObjectId) -> SigningResult<()> {
    let existing = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();

    match existing {
        Some(Object::Reference(annots_id)) => {
            let annots = doc
                .get_object_mut(annots_id)?
                .as_array_mut()
                .map_err(|_| SigningError::PdfError("Annots reference is not an array".to_string()))?;
            annots.push(Object::Reference(widget_id));
        }
        Some(Object::Array(mut annots)) => {
            annots.push(Object::Reference(widget_id));
            dict_mut(doc, page_id)?.set("Annots", Object::Array(annots));
        }
        _ => {
            dict_mut(doc, page_id)?.set("Annots", Object::Array(vec![Object::Reference(widget_id)]));
        }
    }
    Ok(())
}

fn add_to_acroform(doc: &mut Document, widget_id: ObjectId) -> SigningResult<()> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| SigningError::PdfError("document has no catalog".to_string()))?;

    let existing = doc.get_dictionary(catalog_id)?.get(b"AcroForm").ok().cloned();
    let mut acroform = match &existing {
        Some(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut fields = match acroform.get(b"Fields") {
        Ok(Object::Array(fields)) => fields.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)?
            .as_array()
            .map_err(|_| SigningError::PdfError("AcroForm Fields is not an array".to_string()))?
            .clone(),
        _ => Vec::new(),
    };
    fields.push(Object::Reference(widget_id));
    acroform.set("Fields", Object::Array(fields));
    acroform.set("SigFlags", Object::Integer(3)); // SignaturesExist | AppendOnly

    match existing {
        Some(Object::Reference(id)) => {
            *dict_mut(doc, id)? = acroform;
        }
        _ => {
            dict_mut(doc, catalog_id)?.set("AcroForm", Object::Dictionary(acroform));
        }
    }
    Ok(())
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// `D:YYYYMMDDHHmmSSZ`
fn pdf_date(time: SystemTime) -> SigningResult<String> {
    let dt = der::DateTime::from_system_time(time)?;
    Ok(format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}Z",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minutes(),
        dt.seconds()
    ))
}

fn display_time(time: SystemTime) -> SigningResult<String> {
    let dt = der::DateTime::from_system_time(time)?;
    Ok(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minutes(),
        dt.seconds()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pdf_date_format() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(pdf_date(t).unwrap(), "D:20231114221320Z");
        assert_eq!(display_time(t).unwrap(), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn escapes_content_stream_text() {
        assert_eq!(escape_text("A (B) \\ C"), "A \\(B\\) \\\\ C");
        assert_eq!(escape_text("Zoë"), "Zo?");
    }

    #[test]
    fn hex_width_is_twice_capacity() {
        let allocator = PlaceholderAllocator::default();
        assert_eq!(allocator.hex_width(), 8192);
    }

    #[test]
    fn rejects_non_pdf_input() {
        let appearance = SignatureAppearance {
            signer_label: "Tester".into(),
            signing_time: SystemTime::now(),
        };
        let placement = SignaturePlacement::new(
            0,
            crate::domain::pdf::SelectionRect::new(0.0, 0.0, 10.0, 10.0),
        );
        let err = PlaceholderAllocator::default()
            .allocate(b"not a pdf", &placement, &appearance)
            .unwrap_err();
        assert!(matches!(err, SigningError::PdfError(_)));
    }
}
