//! Dynamic raster textures
//!
//! A [`DynamicTexture`] wraps an RGBA image that props draw into through a
//! small canvas-like [`DrawContext`]: fill style, rectangles and text. Text
//! uses a built-in set of 8x8 bitmap glyphs scaled to the font size.

use image::{Rgba, RgbaImage};

/// Horizontal anchoring of text relative to the `x` passed to
/// [`DrawContext::fill_text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Offscreen RGBA surface with a revision counter bumped by [`update`](Self::update)
#[derive(Debug, Clone)]
pub struct DynamicTexture {
    pub name: String,
    image: RgbaImage,
    revision: u32,
}

impl DynamicTexture {
    /// Transparent black surface
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            image: RgbaImage::new(width, height),
            revision: 0,
        }
    }

    pub fn context(&mut self) -> DrawContext<'_> {
        DrawContext {
            image: &mut self.image,
            fill_style: Rgba([0, 0, 0, 255]),
            font_px: 10,
            text_align: TextAlign::Left,
        }
    }

    /// Mark the drawn content as ready for upload
    pub fn update(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Number of times [`update`](Self::update) was called
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Canvas-style drawing state over a texture
pub struct DrawContext<'a> {
    image: &'a mut RgbaImage,
    fill_style: Rgba<u8>,
    font_px: u32,
    text_align: TextAlign,
}

impl DrawContext<'_> {
    /// Set the fill colour from a CSS hex string (`#rgb` or `#rrggbb`).
    /// Unparseable strings leave the current style in place.
    pub fn set_fill_style(&mut self, css: &str) {
        if let Some([r, g, b]) = parse_css_hex(css) {
            self.fill_style = Rgba([r, g, b, 255]);
        }
    }

    pub fn fill_style(&self) -> Rgba<u8> {
        self.fill_style
    }

    /// Glyph cell size in pixels
    pub fn set_font_size(&mut self, px: u32) {
        self.font_px = px.max(1);
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.text_align = align;
    }

    /// Fill an axis-aligned rectangle, clipped to the surface
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let x0 = (x as i64).clamp(0, w);
        let y0 = (y as i64).clamp(0, h);
        let x1 = (x as i64 + width as i64).clamp(0, w);
        let y1 = (y as i64 + height as i64).clamp(0, h);
        for py in y0..y1 {
            for px in x0..x1 {
                self.image.put_pixel(px as u32, py as u32, self.fill_style);
            }
        }
    }

    /// Draw text with its baseline at `y`
    ///
    /// Characters without a built-in glyph advance the pen but draw nothing.
    pub fn fill_text(&mut self, text: &str, x: i32, y: i32) {
        let cell = self.font_px as i32;
        let total = cell * text.chars().count() as i32;
        let mut pen_x = match self.text_align {
            TextAlign::Left => x,
            TextAlign::Center => x - total / 2,
            TextAlign::Right => x - total,
        };
        let top = y - cell;

        for ch in text.chars() {
            if let Some(rows) = glyph(ch) {
                self.blit_glyph(rows, pen_x, top, cell);
            }
            pen_x += cell;
        }
    }

    fn blit_glyph(&mut self, rows: &[u8; 8], left: i32, top: i32, cell: i32) {
        let (w, h) = (self.image.width() as i32, self.image.height() as i32);
        for dy in 0..cell {
            let py = top + dy;
            if py < 0 || py >= h {
                continue;
            }
            let row = rows[(dy * 8 / cell) as usize];
            for dx in 0..cell {
                let px = left + dx;
                if px < 0 || px >= w {
                    continue;
                }
                let bit = (dx * 8 / cell) as u32;
                if row & (0x80 >> bit) != 0 {
                    self.image.put_pixel(px as u32, py as u32, self.fill_style);
                }
            }
        }
    }
}

/// Parse `#rgb` / `#rrggbb`
pub fn parse_css_hex(css: &str) -> Option<[u8; 3]> {
    let hex = css.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (slot, digit) in out.iter_mut().zip(hex.chars()) {
                let v = digit.to_digit(16)? as u8;
                *slot = v * 17;
            }
            Some(out)
        }
        6 => {
            let value = u32::from_str_radix(hex, 16).ok()?;
            Some([(value >> 16) as u8, (value >> 8) as u8, value as u8])
        }
        _ => None,
    }
}

const DRAGON: [u8; 8] = [
    0b0000_0110,
    0b0000_1111,
    0b1001_1110,
    0b1111_1100,
    0b0111_1110,
    0b0011_1111,
    0b0110_0101,
    0b1100_0000,
];

const LOZENGE: [u8; 8] = [
    0b0001_1000,
    0b0010_0100,
    0b0100_0010,
    0b1000_0001,
    0b1000_0001,
    0b0100_0010,
    0b0010_0100,
    0b0001_1000,
];

const STAR: [u8; 8] = [
    0b0001_1000,
    0b0001_1000,
    0b1111_1111,
    0b0111_1110,
    0b0011_1100,
    0b0111_1110,
    0b0110_0110,
    0b1100_0011,
];

/// Built-in glyph bitmaps, one byte per row, MSB leftmost
pub fn glyph(ch: char) -> Option<&'static [u8; 8]> {
    match ch {
        '\u{1F409}' | '\u{1F432}' => Some(&DRAGON),
        '\u{25CA}' | '\u{2666}' => Some(&LOZENGE),
        '\u{2605}' | '*' => Some(&STAR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_pixels(tex: &DynamicTexture, color: Rgba<u8>) -> usize {
        tex.image().pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn test_parse_css_hex() {
        assert_eq!(parse_css_hex("#550000"), Some([0x55, 0, 0]));
        assert_eq!(parse_css_hex("#ff0000"), Some([255, 0, 0]));
        assert_eq!(parse_css_hex("#0f0"), Some([0, 255, 0]));
        assert_eq!(parse_css_hex("red"), None);
        assert_eq!(parse_css_hex("#12345"), None);
        assert_eq!(parse_css_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut tex = DynamicTexture::new("t", 4, 4);
        let mut ctx = tex.context();
        ctx.set_fill_style("#ffffff");
        ctx.fill_rect(2, 2, 10, 10);
        assert_eq!(count_pixels(&tex, Rgba([255, 255, 255, 255])), 4);

        let mut ctx = tex.context();
        ctx.fill_rect(-5, -5, 2, 2);
        assert_eq!(count_pixels(&tex, Rgba([0, 0, 0, 255])), 0);
    }

    #[test]
    fn test_invalid_fill_style_is_ignored() {
        let mut tex = DynamicTexture::new("t", 2, 2);
        let mut ctx = tex.context();
        ctx.set_fill_style("#00ff00");
        ctx.set_fill_style("not-a-colour");
        assert_eq!(ctx.fill_style(), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_fill_text_centered() {
        let mut tex = DynamicTexture::new("t", 64, 64);
        let mut ctx = tex.context();
        ctx.set_fill_style("#ff0000");
        ctx.set_font_size(16);
        ctx.set_text_align(TextAlign::Center);
        ctx.fill_text("\u{25CA}", 32, 40);

        let red = Rgba([255, 0, 0, 255]);
        assert!(count_pixels(&tex, red) > 0);
        for (x, y, p) in tex.image().enumerate_pixels() {
            if *p == red {
                assert!((24..40).contains(&x), "x = {x}");
                assert!((24..40).contains(&y), "y = {y}");
            }
        }
    }

    #[test]
    fn test_unknown_glyph_draws_nothing() {
        let mut tex = DynamicTexture::new("t", 32, 32);
        let mut ctx = tex.context();
        ctx.set_fill_style("#ffffff");
        ctx.fill_text("abc", 0, 20);
        assert_eq!(count_pixels(&tex, Rgba([255, 255, 255, 255])), 0);
    }

    #[test]
    fn test_update_bumps_revision() {
        let mut tex = DynamicTexture::new("t", 1, 1);
        assert_eq!(tex.revision(), 0);
        tex.update();
        tex.update();
        assert_eq!(tex.revision(), 2);
    }
}
