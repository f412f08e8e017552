//! Text measurement for grid cells.
//!
//! Two questions are answered here for the rest of the workspace:
//!
//! * how many columns a grapheme cluster occupies ([`egc_width`]);
//! * whether a cell's text is "normal width" as far as the renderer is
//!   concerned ([`GlyphWidth`]).
//!
//! The second is a trait because the answer ultimately belongs to the font:
//! a GUI front-end may measure the shaped glyph against the cell width, while
//! headless code (tests, replay) uses [`UnicodeGlyphWidth`].

pub mod segment;
pub mod width;

pub use segment::{display_width, first_grapheme, normalize_cell_text};
pub use width::{egc_width, is_cjk};

/// Decides whether a cell's text fits in one cell.
///
/// Implementations must be cheap; the grid calls this once per written cell.
pub trait GlyphWidth {
    fn is_normal_width(&self, text: &str) -> bool;
}

/// Width decision from Unicode properties alone.
///
/// ASCII (and empty text) is always normal width; CJK ideographs and syllabaries
/// are always wide; anything else is wide when [`egc_width`] says 2 columns.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeGlyphWidth;

impl GlyphWidth for UnicodeGlyphWidth {
    #[inline]
    fn is_normal_width(&self, text: &str) -> bool {
        match text.as_bytes().first() {
            None => true,
            Some(b) if b.is_ascii() => true,
            Some(_) => {
                if text.chars().next().is_some_and(is_cjk) {
                    return false;
                }
                egc_width(text) <= 1
            }
        }
    }
}

impl<F> GlyphWidth for F
where
    F: Fn(&str) -> bool,
{
    fn is_normal_width(&self, text: &str) -> bool {
        self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_width_decisions() {
        let w = UnicodeGlyphWidth;
        assert!(w.is_normal_width(""));
        assert!(w.is_normal_width("a"));
        assert!(w.is_normal_width("é"));
        assert!(!w.is_normal_width("漢"));
        assert!(!w.is_normal_width("😀"));
    }

    #[test]
    fn closure_adapter() {
        let all_wide = |_: &str| false;
        assert!(!all_wide.is_normal_width("a"));
    }
}
