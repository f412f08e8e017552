//! Rasterized glyph cache for wide glyphs.
//!
//! Keyed by `(text, foreground, bold, italic)`. When the cache reaches
//! capacity it is purged wholesale. Font metric changes purge as well.

use ahash::AHashMap;
use core_grid::Color;

use crate::backend::{GlyphImage, TextStyle};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub text: String,
    pub fg: Color,
    pub bold: bool,
    pub italic: bool,
}

impl GlyphKey {
    pub fn new(text: &str, fg: Color, style: TextStyle) -> Self {
        Self {
            text: text.to_string(),
            fg,
            bold: style.bold,
            italic: style.italic,
        }
    }
}

#[derive(Debug)]
pub struct GlyphCache {
    map: AHashMap<GlyphKey, GlyphImage>,
    capacity: usize,
    hits: u64,
    misses: u64,
    purges: u64,
}

impl GlyphCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: AHashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
            purges: 0,
        }
    }

    /// Cached image for `key`, rasterizing it with `make` on a miss.
    pub fn get_or_insert_with(
        &mut self,
        key: GlyphKey,
        make: impl FnOnce() -> GlyphImage,
    ) -> GlyphImage {
        if let Some(img) = self.map.get(&key) {
            self.hits += 1;
            return *img;
        }
        self.misses += 1;
        if self.map.len() >= self.capacity {
            tracing::debug!(target: "render.paint", entries = self.map.len(), "glyph_cache_purge");
            self.purge();
        }
        let img = make();
        self.map.insert(key, img);
        img
    }

    pub fn purge(&mut self) {
        self.map.clear();
        self.purges += 1;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `(hits, misses, purges)`.
    pub fn stats(&self) -> (u64, u64, u64) {
        (self.hits, self.misses, self.purges)
    }
}
