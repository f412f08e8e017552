/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from a packed `0xRRGGBB` integer.
    #[inline]
    pub const fn from_rgb(rgb: u32) -> Self {
        Self::rgba((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
    }

    /// Color from a wire integer where any negative value means "unset";
    /// unset resolves to opaque white.
    pub fn from_wire(value: i64) -> Self {
        if value < 0 {
            Self::WHITE
        } else {
            Self::from_rgb((value & 0xFF_FFFF) as u32)
        }
    }

    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::rgba(self.r, self.g, self.b, a)
    }

    #[inline]
    pub const fn to_rgb(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_channels() {
        let c = Color::from_rgb(0x12_34_56);
        assert_eq!((c.r, c.g, c.b, c.a), (0x12, 0x34, 0x56, 255));
        assert_eq!(c.to_rgb(), 0x12_34_56);
    }

    #[test]
    fn negative_wire_value_is_white() {
        assert_eq!(Color::from_wire(-1), Color::WHITE);
        assert_eq!(Color::from_wire(0), Color::BLACK);
    }
}
