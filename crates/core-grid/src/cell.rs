use crate::HighlightId;

/// One grid cell.
///
/// `text` holds at most one grapheme cluster. A wide glyph lives in the left
/// cell of its pair with `normal_width == false`; the right cell is padding
/// (empty text, also `normal_width == false`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub normal_width: bool,
    pub hl: HighlightId,
}

impl Cell {
    pub fn new(text: impl Into<String>, normal_width: bool, hl: HighlightId) -> Self {
        Self {
            text: text.into(),
            normal_width,
            hl,
        }
    }

    /// True for a never-written or cleared cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.hl == 0 && self.normal_width
    }

    /// Right half of a wide pair.
    #[inline]
    pub fn is_padding(&self) -> bool {
        self.text.is_empty() && !self.normal_width
    }

    /// Left half of a wide pair.
    #[inline]
    pub fn is_wide(&self) -> bool {
        !self.text.is_empty() && !self.normal_width
    }

    pub(crate) fn reset(&mut self) {
        self.text.clear();
        self.normal_width = true;
        self.hl = 0;
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            text: String::new(),
            normal_width: true,
            hl: 0,
        }
    }
}
