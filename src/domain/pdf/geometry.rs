//! Selection geometry.
//!
//! Selections arrive in viewer coordinates (origin top-left, y grows down)
//! and are converted to PDF user space (origin bottom-left) against the
//! page's `/MediaBox`.

use serde::{Deserialize, Serialize};

use crate::{SigningError, SigningResult};

/// A rectangle dragged by the user, in top-left-origin page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRect {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl SelectionRect {
    #[must_use]
    pub fn new(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }
}

/// Where the visible signature goes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePlacement {
    /// Zero-based page index.
    pub page_index: usize,
    pub selection: SelectionRect,
}

impl SignaturePlacement {
    #[must_use]
    pub fn new(page_index: usize, selection: SelectionRect) -> Self {
        Self {
            page_index,
            selection,
        }
    }
}

/// Rectangle in PDF user space, `[llx lly urx ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PdfRect {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Map a top-left-origin selection onto a page with this media box.
    ///
    /// Reversed drags are normalised; a degenerate selection is rejected.
    pub fn from_selection(selection: &SelectionRect, media_box: &PdfRect) -> SigningResult<Self> {
        let coords = [
            selection.start_x,
            selection.start_y,
            selection.end_x,
            selection.end_y,
        ];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(SigningError::InvalidInput(
                "selection coordinates must be finite".to_string(),
            ));
        }

        let left = selection.start_x.min(selection.end_x);
        let right = selection.start_x.max(selection.end_x);
        let top = selection.start_y.min(selection.end_y);
        let bottom = selection.start_y.max(selection.end_y);
        if right - left <= 0.0 || bottom - top <= 0.0 {
            return Err(SigningError::InvalidInput(format!(
                "selection {left},{top} - {right},{bottom} has no area"
            )));
        }

        let page_height = media_box.height();
        Ok(Self {
            llx: media_box.llx + left,
            lly: media_box.lly + page_height - bottom,
            urx: media_box.llx + right,
            ury: media_box.lly + page_height - top,
        })
    }
}
