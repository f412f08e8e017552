//! Window separators.
//!
//! A non-floating window that stops short of the right screen edge gets its
//! separator column filled (override background, else default), a 1px black
//! hairline on the boundary and a fade darkening the window's rightmost
//! pixels. A window that stops short of the bottom edge gets the hairline and
//! fade only; the row below it is its status line.

use core_engine::WindowPlacement;
use core_grid::{Color, PixelRect};

use crate::backend::PaintBackend;

const HAIRLINE: Color = Color::BLACK;
const FADE_RGB: (u8, u8, u8) = (10, 10, 10);
const FADE_MAX_ALPHA: u32 = 125;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderStyle {
    pub cell_width: f32,
    pub line_height: f32,
    pub fade_px: u8,
    /// Separator fill when the window has no background override.
    pub default_bg: Color,
}

/// Pixel area a placement's borders may touch.
pub fn border_bounds(p: &WindowPlacement, style: &BorderStyle) -> PixelRect {
    let x = p.col as f32 * style.cell_width;
    let y = p.row as f32 * style.line_height;
    PixelRect::new(
        x,
        y,
        (p.cols + 1) as f32 * style.cell_width,
        p.rows as f32 * style.line_height + 1.0,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Split along y: the pieces keep the rect's x extent.
    Vertical,
    /// Split along x.
    Horizontal,
}

/// Pieces of `rect` that lie inside `painted`, with overlapping coverage
/// merged so no pixel is returned twice. Painted rects are cell aligned, so
/// splitting along one axis is exact.
fn covered(rect: PixelRect, painted: &[PixelRect], axis: Axis) -> Vec<PixelRect> {
    let (lo, hi) = match axis {
        Axis::Vertical => (rect.y, rect.bottom()),
        Axis::Horizontal => (rect.x, rect.right()),
    };
    let mut spans: Vec<(f32, f32)> = painted
        .iter()
        .filter(|p| p.intersects(&rect))
        .map(|p| match axis {
            Axis::Vertical => (p.y.max(lo), p.bottom().min(hi)),
            Axis::Horizontal => (p.x.max(lo), p.right().min(hi)),
        })
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f32, f32)> = Vec::with_capacity(spans.len());
    for (a, b) in spans {
        match merged.last_mut() {
            Some(last) if a <= last.1 => last.1 = last.1.max(b),
            _ => merged.push((a, b)),
        }
    }
    merged
        .into_iter()
        .map(|(a, b)| match axis {
            Axis::Vertical => PixelRect::new(rect.x, a, rect.width, b - a),
            Axis::Horizontal => PixelRect::new(a, rect.y, b - a, rect.height),
        })
        .collect()
}

/// Draw the borders of every placement over the pixels in `painted` (screen
/// coordinates, the regions repainted this cycle). Nothing outside `painted`
/// is touched, so the translucent fade only ever lands on fresh content.
/// Returns the number of windows that drew anything.
pub fn draw_borders<B: PaintBackend + ?Sized>(
    backend: &mut B,
    placements: &[WindowPlacement],
    screen_cols: usize,
    screen_rows: usize,
    style: &BorderStyle,
    painted: &[PixelRect],
) -> usize {
    let mut drawn = 0;
    for p in placements.iter().filter(|p| !p.floating) {
        let right = p.col + p.cols < screen_cols;
        let bottom = p.row + p.rows < screen_rows;
        if !right && !bottom {
            continue;
        }
        if !painted.iter().any(|r| r.intersects(&border_bounds(p, style))) {
            continue;
        }
        let mut fills = 0;
        if right {
            fills += draw_right(backend, p, style, painted);
        }
        if bottom {
            fills += draw_bottom(backend, p, style, painted);
        }
        if fills > 0 {
            drawn += 1;
        }
    }
    drawn
}

fn fade_color(step: u8, fade: u8) -> Color {
    let alpha = FADE_MAX_ALPHA * u32::from(fade - step) / u32::from(fade);
    Color::rgba(FADE_RGB.0, FADE_RGB.1, FADE_RGB.2, alpha as u8)
}

fn fill_covered<B: PaintBackend + ?Sized>(
    backend: &mut B,
    rect: PixelRect,
    color: Color,
    painted: &[PixelRect],
    axis: Axis,
) -> usize {
    let pieces = covered(rect, painted, axis);
    for piece in &pieces {
        backend.fill_rect(*piece, color);
    }
    pieces.len()
}

fn draw_right<B: PaintBackend + ?Sized>(
    backend: &mut B,
    p: &WindowPlacement,
    style: &BorderStyle,
    painted: &[PixelRect],
) -> usize {
    let (cw, lh) = (style.cell_width, style.line_height);
    let sep_x = (p.col + p.cols) as f32 * cw;
    let y = p.row as f32 * lh;
    let h = p.rows as f32 * lh;
    let fill = p
        .background_override
        .map(Color::from_rgb)
        .unwrap_or(style.default_bg);
    let mut n = fill_covered(backend, PixelRect::new(sep_x, y, cw, h), fill, painted, Axis::Vertical);
    n += fill_covered(backend, PixelRect::new(sep_x + cw - 1.0, y, 1.0, h), HAIRLINE, painted, Axis::Vertical);
    for i in 0..style.fade_px {
        let x = sep_x - 1.0 - f32::from(i);
        let color = fade_color(i, style.fade_px);
        n += fill_covered(backend, PixelRect::new(x, y, 1.0, h), color, painted, Axis::Vertical);
    }
    n
}

fn draw_bottom<B: PaintBackend + ?Sized>(
    backend: &mut B,
    p: &WindowPlacement,
    style: &BorderStyle,
    painted: &[PixelRect],
) -> usize {
    let (cw, lh) = (style.cell_width, style.line_height);
    let x = p.col as f32 * cw;
    let w = p.cols as f32 * cw;
    let edge = (p.row + p.rows) as f32 * lh;
    let mut n = fill_covered(backend, PixelRect::new(x, edge, w, 1.0), HAIRLINE, painted, Axis::Horizontal);
    for i in 0..style.fade_px {
        let y = edge - 1.0 - f32::from(i);
        let color = fade_color(i, style.fade_px);
        n += fill_covered(backend, PixelRect::new(x, y, w, 1.0), color, painted, Axis::Horizontal);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use pretty_assertions::assert_eq;

    const SCREEN: [PixelRect; 1] = [PixelRect { x: 0.0, y: 0.0, width: 800.0, height: 200.0 }];

    fn style(fade_px: u8) -> BorderStyle {
        BorderStyle {
            cell_width: 10.0,
            line_height: 20.0,
            fade_px,
            default_bg: Color::from_rgb(0x202020),
        }
    }

    #[test]
    fn left_window_of_vertical_split_gets_right_border() {
        let mut b = RecordingBackend::new();
        let left = WindowPlacement::new(2, 0, 0, 10, 39);
        let right = WindowPlacement::new(3, 0, 40, 10, 40);
        let n = draw_borders(&mut b, &[left, right], 80, 10, &style(2), &SCREEN);
        assert_eq!(n, 1);
        let fills = b.fills();
        assert_eq!(
            fills,
            vec![
                (PixelRect::new(390.0, 0.0, 10.0, 200.0), Color::from_rgb(0x202020)),
                (PixelRect::new(399.0, 0.0, 1.0, 200.0), Color::BLACK),
                (PixelRect::new(389.0, 0.0, 1.0, 200.0), Color::rgba(10, 10, 10, 125)),
                (PixelRect::new(388.0, 0.0, 1.0, 200.0), Color::rgba(10, 10, 10, 62)),
            ]
        );
    }

    #[test]
    fn override_background_fills_separator() {
        let mut b = RecordingBackend::new();
        let p = WindowPlacement::new(2, 0, 0, 5, 10).with_background(0x336699);
        draw_borders(&mut b, &[p], 20, 5, &style(0), &SCREEN);
        assert_eq!(b.fills()[0].1, Color::from_rgb(0x336699));
        assert_eq!(b.fills().len(), 2);
    }

    #[test]
    fn top_window_of_horizontal_split_gets_bottom_hairline_only() {
        let mut b = RecordingBackend::new();
        let top = WindowPlacement::new(2, 0, 0, 4, 20);
        draw_borders(&mut b, &[top], 20, 10, &style(1), &SCREEN);
        assert_eq!(
            b.fills(),
            vec![
                (PixelRect::new(0.0, 80.0, 200.0, 1.0), Color::BLACK),
                (PixelRect::new(0.0, 79.0, 200.0, 1.0), Color::rgba(10, 10, 10, 125)),
            ]
        );
    }

    #[test]
    fn floats_and_full_screen_windows_are_skipped() {
        let mut b = RecordingBackend::new();
        let full = WindowPlacement::new(2, 0, 0, 10, 80);
        let float = WindowPlacement::new(5, 2, 2, 3, 10).floating();
        assert_eq!(draw_borders(&mut b, &[full, float], 80, 10, &style(4), &SCREEN), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn painted_area_outside_border_skips_window() {
        let mut b = RecordingBackend::new();
        let p = WindowPlacement::new(2, 0, 0, 10, 39);
        let far = [PixelRect::new(600.0, 0.0, 10.0, 10.0)];
        assert_eq!(draw_borders(&mut b, &[p.clone()], 80, 10, &style(4), &far), 0);
        assert!(b.is_empty());
        let near = [PixelRect::new(390.0, 100.0, 10.0, 20.0)];
        assert_eq!(draw_borders(&mut b, &[p], 80, 10, &style(4), &near), 1);
    }

    #[test]
    fn fade_covers_only_repainted_rows() {
        let mut b = RecordingBackend::new();
        let p = WindowPlacement::new(2, 0, 0, 10, 9);
        // One repainted cell at the window's right edge, row 3.
        let painted = [PixelRect::new(80.0, 60.0, 10.0, 20.0)];
        assert_eq!(draw_borders(&mut b, &[p], 20, 10, &style(2), &painted), 1);
        assert_eq!(
            b.fills(),
            vec![
                (PixelRect::new(89.0, 60.0, 1.0, 20.0), Color::rgba(10, 10, 10, 125)),
                (PixelRect::new(88.0, 60.0, 1.0, 20.0), Color::rgba(10, 10, 10, 62)),
            ]
        );
    }

    #[test]
    fn overlapping_repaints_fade_once() {
        let mut b = RecordingBackend::new();
        let p = WindowPlacement::new(2, 0, 0, 10, 9);
        let painted = [
            PixelRect::new(0.0, 0.0, 200.0, 40.0),
            PixelRect::new(0.0, 20.0, 90.0, 60.0),
        ];
        draw_borders(&mut b, &[p], 20, 10, &style(1), &painted);
        assert_eq!(
            b.fills(),
            vec![
                (PixelRect::new(90.0, 0.0, 10.0, 40.0), Color::from_rgb(0x202020)),
                (PixelRect::new(99.0, 0.0, 1.0, 40.0), Color::BLACK),
                (PixelRect::new(89.0, 0.0, 1.0, 80.0), Color::rgba(10, 10, 10, 125)),
            ]
        );
    }
}
