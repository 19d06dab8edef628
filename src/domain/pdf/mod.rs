//! PDF byte-level domain types.
//!
//! Everything here works on raw bytes and offsets; the object model is only
//! touched by the placeholder allocator.

pub mod buffer;
pub mod byte_range;
pub mod geometry;
pub mod locator;

pub use buffer::PdfBuffer;
pub use byte_range::{locate_field, locate_placeholder_field, ByteRange, ByteRangeField};
pub use geometry::{PdfRect, SelectionRect, SignaturePlacement};
