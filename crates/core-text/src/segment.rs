//! Normalization of the text carried by a single grid cell.
//!
//! The wire format allows any string per cell. The grid stores at most one
//! NFC-normalized grapheme cluster; anything after the first cluster is
//! dropped. Does not log content.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::egc_width;

/// First extended grapheme cluster of `text`, or `""` when empty.
pub fn first_grapheme(text: &str) -> &str {
    text.graphemes(true).next().unwrap_or("")
}

/// NFC-normalize `text` and keep only its first grapheme cluster.
///
/// ASCII input skips normalization entirely; it is by far the common case.
pub fn normalize_cell_text(text: &str) -> String {
    if text.is_ascii() {
        return first_grapheme(text).to_string();
    }
    let normalized: String = text.nfc().collect();
    first_grapheme(&normalized).to_string()
}

/// Total column width of a run of clusters, as a line of cells would lay it out.
pub fn display_width(text: &str) -> usize {
    text.graphemes(true).map(|g| egc_width(g) as usize).sum()
}
