//! Cell width classification for grid text.
//!
//! The editor sends one grapheme cluster per grid cell. A cluster is either
//! "normal width" (fits one cell) or wide (its glyph spans the cell it is
//! written to plus the following padding cell). Everything in the workspace
//! that needs that decision goes through [`egc_width`] or a [`GlyphWidth`]
//! implementation built on it.
//!
//! The classifier maps a cluster to a coarse [`EgcKind`] and the kind to a
//! column count. It deliberately over-estimates for emoji composites: an extra
//! padding cell is harmless, an under-estimate makes the glyph overlap its
//! right neighbour.
//!
//! [`GlyphWidth`]: crate::GlyphWidth

use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EgcKind {
    Ascii,
    Narrow,
    Wide,
    /// Any pictographic cluster: single emoji, modifier, keycap, flag, ZWJ.
    Emoji,
    /// Base + combining marks; `true` when the base itself is wide.
    Combining(bool),
}

const ZWJ: char = '\u{200D}';
const KEYCAP: char = '\u{20E3}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_skin_tone(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

// Emoji blocks plus the misc-symbol / dingbat ranges used with VS16.
fn is_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
        || ('\u{1AB0}'..='\u{1AFF}').contains(&c)
        || ('\u{1DC0}'..='\u{1DFF}').contains(&c)
        || ('\u{20D0}'..='\u{20FF}').contains(&c)
        || ('\u{FE20}'..='\u{FE2F}').contains(&c)
}

#[inline]
fn char_is_wide(c: char) -> bool {
    c.width().unwrap_or(1) == 2
}

/// Han, Hiragana, Katakana and Hangul codepoints.
///
/// These are always rendered wide regardless of what the width tables say
/// about ambiguous neighbours.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{11FF}'     // Hangul Jamo
        | '\u{3040}'..='\u{309F}'   // Hiragana
        | '\u{30A0}'..='\u{30FF}'   // Katakana
        | '\u{3130}'..='\u{318F}'   // Hangul compatibility Jamo
        | '\u{3400}'..='\u{4DBF}'   // CJK extension A
        | '\u{4E00}'..='\u{9FFF}'   // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}'   // Hangul syllables
        | '\u{F900}'..='\u{FAFF}'   // CJK compatibility ideographs
        | '\u{20000}'..='\u{2FA1F}' // CJK extensions B..F + supplement
    )
}

fn classify(egc: &str) -> EgcKind {
    let mut chars = egc.chars();
    let Some(first) = chars.next() else {
        return EgcKind::Narrow;
    };
    if chars.as_str().is_empty() {
        if first.is_ascii() {
            return EgcKind::Ascii;
        }
        if is_pictographic(first) {
            return EgcKind::Emoji;
        }
        if char_is_wide(first) || is_cjk(first) {
            return EgcKind::Wide;
        }
        return EgcKind::Narrow;
    }

    let mut pictographic = 0usize;
    let mut regional = 0usize;
    let mut zwj = false;
    let mut skin = false;
    let mut combining = false;
    let mut any_wide = false;
    let mut keycap = false;
    let base_wide = is_pictographic(first) || char_is_wide(first) || is_cjk(first);
    let mut last = first;
    for c in egc.chars() {
        pictographic += usize::from(is_pictographic(c));
        regional += usize::from(is_regional_indicator(c));
        zwj |= c == ZWJ;
        skin |= is_skin_tone(c);
        combining |= is_combining_mark(c);
        any_wide |= char_is_wide(c) || is_cjk(c);
        last = c;
    }
    if last == KEYCAP && (first.is_ascii_digit() || first == '#' || first == '*') {
        keycap = true;
    }

    if keycap || regional >= 2 || (zwj && pictographic >= 2) || (pictographic >= 1 && skin) {
        return EgcKind::Emoji;
    }
    if pictographic == 1 && !zwj {
        return EgcKind::Emoji;
    }
    if combining {
        return EgcKind::Combining(base_wide);
    }
    if any_wide {
        return EgcKind::Wide;
    }
    if pictographic > 0 || regional > 0 {
        return EgcKind::Emoji;
    }
    EgcKind::Narrow
}

#[inline]
fn width_for_kind(kind: EgcKind) -> u16 {
    match kind {
        EgcKind::Ascii | EgcKind::Narrow | EgcKind::Combining(false) => 1,
        EgcKind::Wide | EgcKind::Emoji | EgcKind::Combining(true) => 2,
    }
}

/// Column width of one grapheme cluster: 0 for empty input, otherwise 1 or 2.
///
/// `egc` is expected to already be a single cluster; grid cells never carry
/// more than one.
#[inline]
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }
    // Rendered narrow by the common monospace fonts despite its emoji block.
    if egc == "⚙" || egc == "⚙\u{FE0F}" {
        return 1;
    }
    let mut width = width_for_kind(classify(egc));
    if width == 1 && egc.chars().any(|c| is_pictographic(c) || is_regional_indicator(c)) {
        width = 2;
    }
    width
}
