//! ByteRange Resolver Service
//!
//! Finds the placeholder `/ByteRange` and the `/Contents` hex string that
//! follows it, computes the real ranges around that hex string and rewrites
//! the ByteRange field in place at its original width.

use crate::{
    domain::constants::CONTENTS_KEY,
    domain::crypto::{DigestBytes, HashAlgorithm},
    domain::pdf::{locate_placeholder_field, locator::find_from, ByteRange, PdfBuffer},
    SigningError, SigningResult,
};

/// Offsets of the `<hex>` placeholder in a resolved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSpan {
    /// Offset of `<`.
    pub open: usize,
    /// Offset of `>`.
    pub close: usize,
}

impl PlaceholderSpan {
    /// Hex characters between the brackets.
    #[must_use]
    pub fn hex_capacity(&self) -> usize {
        self.close - self.open - 1
    }

    /// Width including both brackets.
    #[must_use]
    pub fn width(&self) -> usize {
        self.close - self.open + 1
    }
}

/// A placeholdered document whose ByteRange has been filled in.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    buffer: PdfBuffer,
    byte_range: ByteRange,
    placeholder: PlaceholderSpan,
}

impl PreparedDocument {
    #[must_use]
    pub fn buffer(&self) -> &PdfBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    #[must_use]
    pub fn placeholder(&self) -> PlaceholderSpan {
        self.placeholder
    }

    /// Bytes the signature covers: everything except the `<hex>` placeholder.
    #[must_use]
    pub fn signed_content(&self) -> Vec<u8> {
        self.byte_range.signed_content(self.buffer.as_bytes())
    }

    /// Digest of [`Self::signed_content`].
    #[must_use]
    pub fn content_digest(&self, algorithm: HashAlgorithm) -> DigestBytes {
        algorithm.digest_parts(&self.byte_range.covered(self.buffer.as_bytes()))
    }

    pub(crate) fn into_parts(self) -> (PdfBuffer, ByteRange, PlaceholderSpan) {
        (self.buffer, self.byte_range, self.placeholder)
    }
}

pub struct ByteRangeResolver;

impl Default for ByteRangeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteRangeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve the placeholder ByteRange of `buffer`.
    pub fn resolve(&self, mut buffer: PdfBuffer) -> SigningResult<PreparedDocument> {
        let document = buffer.as_bytes();
        let field = locate_placeholder_field(document)?;

        let contents = find_from(document, CONTENTS_KEY, field.end()).ok_or_else(|| {
            SigningError::MalformedPlaceholder("no /Contents after the ByteRange".to_string())
        })?;
        let open = find_from(document, b"<", contents + CONTENTS_KEY.len()).ok_or_else(|| {
            SigningError::MalformedPlaceholder("/Contents has no hex string".to_string())
        })?;
        let close = find_from(document, b">", open + 1).ok_or_else(|| {
            SigningError::MalformedPlaceholder("/Contents hex string is not terminated".to_string())
        })?;
        let placeholder = PlaceholderSpan { open, close };

        let hex = &document[open + 1..close];
        if hex.is_empty() || hex.len() % 2 != 0 {
            return Err(SigningError::MalformedPlaceholder(format!(
                "placeholder holds {} hex characters, expected a positive even count",
                hex.len()
            )));
        }
        if !hex.iter().all(|b| *b == b'0') {
            return Err(SigningError::MalformedPlaceholder(
                "placeholder is not zero-filled".to_string(),
            ));
        }

        let total = document.len();
        let byte_range = ByteRange::new(0, open, close + 1, total - (close + 1), total)?;
        let rendered = field.render(document, &byte_range)?;
        buffer.overwrite(field.start, &rendered)?;

        log::info!(
            "Resolved ByteRange {byte_range} ({} hex characters reserved)",
            placeholder.hex_capacity()
        );

        Ok(PreparedDocument {
            buffer,
            byte_range,
            placeholder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"%PDF-1.7\n1 0 obj<</Type/Sig/ByteRange[0/**********/**********/**********]/Contents<0000000000>>>endobj\n%%EOF\n"
            .to_vec()
    }

    #[test]
    fn resolves_ranges_around_placeholder() {
        let original = sample();
        let prepared = ByteRangeResolver::new()
            .resolve(PdfBuffer::new(original.clone()))
            .unwrap();
        let bytes = prepared.buffer().as_bytes();
        let span = prepared.placeholder();
        let range = prepared.byte_range();

        assert_eq!(bytes.len(), original.len());
        assert_eq!(bytes[span.open], b'<');
        assert_eq!(bytes[span.close], b'>');
        assert_eq!(span.hex_capacity(), 10);
        assert_eq!(range.start0, 0);
        assert_eq!(range.length0, span.open);
        assert_eq!(range.start1, span.close + 1);
        assert_eq!(range.covered_len(), bytes.len() - span.width());

        let text = String::from_utf8_lossy(bytes);
        assert!(text.contains(&format!(
            "/ByteRange[0 {} {} {}",
            range.length0, range.start1, range.length1
        )));
    }

    #[test]
    fn missing_byte_range_is_reported() {
        let err = ByteRangeResolver::new()
            .resolve(PdfBuffer::new(b"%PDF-1.7 /Contents<00>".to_vec()))
            .unwrap_err();
        assert!(matches!(err, SigningError::ByteRangeNotFound));
    }

    #[test]
    fn odd_width_placeholder_is_rejected() {
        let doc = b"/ByteRange[0/**********/**********/**********]/Contents<000>".to_vec();
        let err = ByteRangeResolver::new()
            .resolve(PdfBuffer::new(doc))
            .unwrap_err();
        assert!(matches!(err, SigningError::MalformedPlaceholder(_)));
    }

    #[test]
    fn missing_contents_is_rejected() {
        let doc = b"/ByteRange[0/**********/**********/**********]/Other<00>".to_vec();
        let err = ByteRangeResolver::new()
            .resolve(PdfBuffer::new(doc))
            .unwrap_err();
        assert!(matches!(err, SigningError::MalformedPlaceholder(_)));
    }
}
