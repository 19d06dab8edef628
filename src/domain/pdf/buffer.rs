//! Owned PDF bytes with a single mutation primitive.

use std::fmt;
use std::ops::Range;

use crate::{SigningError, SigningResult};

/// A PDF document held in memory.
///
/// Once a placeholder has been allocated every byte offset in the document
/// is load-bearing, so the only way to change the contents is
/// [`PdfBuffer::overwrite`], which never changes the length.
#[derive(Clone, PartialEq, Eq)]
pub struct PdfBuffer {
    bytes: Vec<u8>,
}

impl PdfBuffer {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Bounds-checked view of `range`.
    pub fn slice(&self, range: Range<usize>) -> SigningResult<&[u8]> {
        self.bytes.get(range.clone()).ok_or_else(|| {
            SigningError::MalformedPlaceholder(format!(
                "range {}..{} outside document of {} bytes",
                range.start,
                range.end,
                self.bytes.len()
            ))
        })
    }

    /// Replace `replacement.len()` bytes starting at `offset`.
    pub fn overwrite(&mut self, offset: usize, replacement: &[u8]) -> SigningResult<()> {
        let end = offset
            .checked_add(replacement.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                SigningError::MalformedPlaceholder(format!(
                    "splice of {} bytes at {offset} exceeds document of {} bytes",
                    replacement.len(),
                    self.bytes.len()
                ))
            })?;
        self.bytes[offset..end].copy_from_slice(replacement);
        Ok(())
    }
}

impl From<Vec<u8>> for PdfBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for PdfBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PdfBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PdfBuffer(len={})", self.bytes.len())
    }
}
