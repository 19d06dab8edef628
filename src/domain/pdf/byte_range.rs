//! `/ByteRange` value type and the locator for its textual field.

use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::locator::{find_from, find_last_before};
use crate::domain::constants::{BYTE_RANGE_MARKERS, BYTE_RANGE_SENTINEL};
use crate::{SigningError, SigningResult};

static BYTE_RANGE_VALUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s*$").expect("static ByteRange pattern")
});

/// The two covered spans of a signed PDF.
///
/// Invariant: `start0 <= start0 + length0 <= start1 <= start1 + length1 <= document length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start0: usize,
    pub length0: usize,
    pub start1: usize,
    pub length1: usize,
}

impl ByteRange {
    /// Build a range and check it against a document of `document_len` bytes.
    pub fn new(
        start0: usize,
        length0: usize,
        start1: usize,
        length1: usize,
        document_len: usize,
    ) -> SigningResult<Self> {
        let range = Self {
            start0,
            length0,
            start1,
            length1,
        };
        range.validate(document_len)?;
        Ok(range)
    }

    fn validate(&self, document_len: usize) -> SigningResult<()> {
        let end0 = self.start0.checked_add(self.length0);
        let end1 = self.start1.checked_add(self.length1);
        match (end0, end1) {
            (Some(end0), Some(end1))
                if end0 <= self.start1 && end1 <= document_len =>
            {
                Ok(())
            }
            _ => Err(SigningError::MalformedByteRange(format!(
                "{self} is inconsistent with a document of {document_len} bytes"
            ))),
        }
    }

    /// Parse the inside of a ByteRange array (`0 123 456 789`).
    pub fn parse(array_text: &[u8], document_len: usize) -> SigningResult<Self> {
        let captures = BYTE_RANGE_VALUES.captures(array_text).ok_or_else(|| {
            SigningError::MalformedByteRange(format!(
                "expected four integers, found '{}'",
                String::from_utf8_lossy(array_text)
            ))
        })?;

        let mut values = [0usize; 4];
        for (slot, value) in values.iter_mut().enumerate() {
            let digits = captures
                .get(slot + 1)
                .map(|m| m.as_bytes())
                .unwrap_or_default();
            *value = std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| {
                    SigningError::MalformedByteRange(format!(
                        "ByteRange entry {} is not a valid offset",
                        slot + 1
                    ))
                })?;
        }

        Self::new(values[0], values[1], values[2], values[3], document_len)
    }

    #[must_use]
    pub fn as_array(&self) -> [usize; 4] {
        [self.start0, self.length0, self.start1, self.length1]
    }

    /// Bytes between the two covered spans (the `<hex>` placeholder).
    #[must_use]
    pub fn excluded(&self) -> Range<usize> {
        self.start0 + self.length0..self.start1
    }

    #[must_use]
    pub fn covered_len(&self) -> usize {
        self.length0 + self.length1
    }

    /// Both covered spans of `document`, in order.
    #[must_use]
    pub fn covered<'a>(&self, document: &'a [u8]) -> [&'a [u8]; 2] {
        [
            &document[self.start0..self.start0 + self.length0],
            &document[self.start1..self.start1 + self.length1],
        ]
    }

    /// Concatenation of both covered spans.
    #[must_use]
    pub fn signed_content(&self, document: &[u8]) -> Vec<u8> {
        self.covered(document).concat()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            self.start0, self.length0, self.start1, self.length1
        )
    }
}

/// Location of a `/ByteRange[...]` field in the raw document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRangeField {
    /// Offset of the leading `/`.
    pub start: usize,
    /// Offset just past `[`.
    pub array_start: usize,
    /// Offset of the closing `]`.
    pub array_end: usize,
}

impl ByteRangeField {
    /// Offset just past `]`.
    #[must_use]
    pub fn end(&self) -> usize {
        self.array_end + 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end() - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn marker<'a>(&self, document: &'a [u8]) -> &'a [u8] {
        &document[self.start..self.array_start]
    }

    #[must_use]
    pub fn array_text<'a>(&self, document: &'a [u8]) -> &'a [u8] {
        &document[self.array_start..self.array_end]
    }

    /// Whether the array still holds the unresolved sentinel names.
    #[must_use]
    pub fn is_placeholder(&self, document: &[u8]) -> bool {
        find_from(self.array_text(document), BYTE_RANGE_SENTINEL, 0).is_some()
    }

    /// Rewrite this field as `values`, space-padded to the original width.
    pub fn render(&self, document: &[u8], values: &ByteRange) -> SigningResult<Vec<u8>> {
        let mut text = self.marker(document).to_vec();
        let [s0, l0, s1, l1] = values.as_array();
        text.extend_from_slice(format!("{s0} {l0} {s1} {l1}").as_bytes());
        if text.len() + 1 > self.len() {
            return Err(SigningError::MalformedPlaceholder(format!(
                "resolved ByteRange needs {} bytes but the field holds {}",
                text.len() + 1,
                self.len()
            )));
        }
        text.resize(self.len() - 1, b' ');
        text.push(b']');
        Ok(text)
    }
}

fn field_at(document: &[u8], start: usize, marker_len: usize) -> SigningResult<ByteRangeField> {
    let array_start = start + marker_len;
    let array_end = find_from(document, b"]", array_start).ok_or_else(|| {
        SigningError::MalformedByteRange("ByteRange array is not terminated".to_string())
    })?;
    Ok(ByteRangeField {
        start,
        array_start,
        array_end,
    })
}

/// Rightmost marker of either spelling that ends at or before `end`.
fn last_marker_before(document: &[u8], end: usize) -> Option<(usize, usize)> {
    BYTE_RANGE_MARKERS
        .iter()
        .filter_map(|marker| find_last_before(document, marker, end).map(|pos| (pos, marker.len())))
        .max_by_key(|(pos, _)| *pos)
}

/// The rightmost ByteRange field in the document.
pub fn locate_field(document: &[u8]) -> SigningResult<ByteRangeField> {
    let (start, marker_len) =
        last_marker_before(document, document.len()).ok_or(SigningError::ByteRangeNotFound)?;
    field_at(document, start, marker_len)
}

/// The rightmost ByteRange field whose array still holds the sentinel names.
pub fn locate_placeholder_field(document: &[u8]) -> SigningResult<ByteRangeField> {
    let mut end = document.len();
    while let Some((start, marker_len)) = last_marker_before(document, end) {
        if let Ok(field) = field_at(document, start, marker_len) {
            if field.is_placeholder(document) {
                return Ok(field);
            }
        }
        end = start + marker_len - 1;
    }
    Err(SigningError::ByteRangeNotFound)
}
