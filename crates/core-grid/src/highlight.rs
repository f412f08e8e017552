//! Highlight attributes and the per-grid-set highlight table.
//!
//! Colors are stored exactly as defined; `reverse` is applied only when a
//! cell's effective colors are read (`Highlight::fg` / `Highlight::bg`).

use ahash::AHashMap;
use bitflags::bitflags;
use core_protocol::HlAttrs;

use crate::Color;

/// Engine-assigned highlight id. Id 0 is always the default highlight.
pub type HighlightId = u32;

/// First id handed out to interned legacy `highlight_set` attributes. Engine
/// ids in multigrid mode stay far below this.
pub const LEGACY_HL_BASE: HighlightId = 1 << 24;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HlFlags: u8 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        const UNDERLINE = 1 << 2;
        const UNDERCURL = 1 << 3;
        const STRIKETHROUGH = 1 << 4;
        const REVERSE = 1 << 5;
    }
}

/// Global fallback colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultColors {
    pub fg: Color,
    pub bg: Color,
    pub sp: Color,
}

impl Default for DefaultColors {
    fn default() -> Self {
        Self {
            fg: Color::WHITE,
            bg: Color::BLACK,
            sp: Color::WHITE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlight {
    pub id: HighlightId,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub special: Option<Color>,
    pub flags: HlFlags,
    pub blend: u8,
}

impl Highlight {
    pub fn from_attrs(id: HighlightId, attrs: &HlAttrs) -> Self {
        let mut flags = HlFlags::empty();
        flags.set(HlFlags::BOLD, attrs.bold);
        flags.set(HlFlags::ITALIC, attrs.italic);
        flags.set(HlFlags::UNDERLINE, attrs.underline);
        flags.set(HlFlags::UNDERCURL, attrs.undercurl);
        flags.set(HlFlags::STRIKETHROUGH, attrs.strikethrough);
        flags.set(HlFlags::REVERSE, attrs.reverse);
        Self {
            id,
            foreground: attrs.foreground.map(Color::from_rgb),
            background: attrs.background.map(Color::from_rgb),
            special: attrs.special.map(Color::from_rgb),
            flags,
            blend: attrs.blend,
        }
    }

    #[inline]
    pub fn is_bold(&self) -> bool {
        self.flags.contains(HlFlags::BOLD)
    }

    #[inline]
    pub fn is_italic(&self) -> bool {
        self.flags.contains(HlFlags::ITALIC)
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.flags.contains(HlFlags::REVERSE)
    }

    fn stored_fg(&self, defaults: &DefaultColors) -> Color {
        self.foreground.unwrap_or(defaults.fg)
    }

    fn stored_bg(&self, defaults: &DefaultColors) -> Color {
        self.background.unwrap_or(defaults.bg)
    }

    /// Effective foreground: stored (or default) foreground, swapped with the
    /// background when `reverse` is set.
    pub fn fg(&self, defaults: &DefaultColors) -> Color {
        if self.is_reverse() {
            self.stored_bg(defaults)
        } else {
            self.stored_fg(defaults)
        }
    }

    /// Effective background, see [`Highlight::fg`].
    pub fn bg(&self, defaults: &DefaultColors) -> Color {
        if self.is_reverse() {
            self.stored_fg(defaults)
        } else {
            self.stored_bg(defaults)
        }
    }

    /// Decoration color: special, else the effective foreground.
    pub fn special(&self, defaults: &DefaultColors) -> Color {
        self.special.unwrap_or_else(|| self.fg(defaults))
    }
}

/// Append/overwrite-only highlight table.
#[derive(Debug, Default)]
pub struct HighlightTable {
    entries: AHashMap<HighlightId, Highlight>,
    interned: AHashMap<HlAttrs, HighlightId>,
    next_legacy: HighlightId,
    fallback: Highlight,
}

impl HighlightTable {
    pub fn new() -> Self {
        Self {
            next_legacy: LEGACY_HL_BASE,
            ..Self::default()
        }
    }

    /// Define or redefine `id`.
    pub fn define(&mut self, id: HighlightId, attrs: &HlAttrs) {
        self.entries.insert(id, Highlight::from_attrs(id, attrs));
    }

    /// Return a stable id for an attribute set without an engine id.
    pub fn intern(&mut self, attrs: &HlAttrs) -> HighlightId {
        if *attrs == HlAttrs::default() {
            return 0;
        }
        if let Some(id) = self.interned.get(attrs) {
            return *id;
        }
        if self.next_legacy == 0 {
            self.next_legacy = LEGACY_HL_BASE;
        }
        let id = self.next_legacy;
        self.next_legacy = self.next_legacy.wrapping_add(1);
        self.define(id, attrs);
        self.interned.insert(attrs.clone(), id);
        id
    }

    /// Highlight for `id`; unknown ids resolve to the default highlight.
    pub fn get(&self, id: HighlightId) -> &Highlight {
        self.entries.get(&id).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, id: HighlightId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
