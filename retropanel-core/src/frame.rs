//! 1-bit frame buffer that pages are drawn into before being sent to the panel.

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};

/// A monochrome frame.
///
/// Implements [`DrawTarget`] so text and primitives from `embedded-graphics`
/// can be drawn into it. Pixels outside the frame are clipped, and overdraw
/// is allowed.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<bool>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Create a blank frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![false; (width * height) as usize],
            width,
            height,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at (`x`, `y`) is lit. Out of range reads as unlit.
    pub fn is_on(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|idx| self.pixels[idx])
    }

    /// Light or clear a single pixel.
    pub fn set(&mut self, x: i32, y: i32, on: bool) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx] = on;
        }
    }

    /// Number of lit pixels.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }

    /// Copy the `width`-wide column range of `src` starting at `src_x` into
    /// this frame with its top-left corner at `dest`.
    ///
    /// Both lit and unlit source pixels are copied, so the destination area
    /// is fully replaced. Columns past the right edge of `src` are copied as
    /// unlit.
    pub fn paste(&mut self, src: &Frame, src_x: u32, width: u32, dest: Point) {
        for sy in 0..src.height {
            for dx in 0..width {
                let sx = src_x + dx;
                let on = sx < src.width && src.pixels[(sy * src.width + sx) as usize];
                self.set(dest.x + dx as i32, dest.y + sy as i32, on);
            }
        }
    }

    /// Horizontal extent `(first, last)` of lit pixels in rows `y0..y1`.
    pub fn lit_columns(&self, y0: u32, y1: u32) -> Option<(u32, u32)> {
        let mut range: Option<(u32, u32)> = None;
        for y in y0..y1.min(self.height) {
            for x in 0..self.width {
                if self.pixels[(y * self.width + x) as usize] {
                    range = Some(match range {
                        Some((lo, hi)) => (lo.min(x), hi.max(x)),
                        None => (x, x),
                    });
                }
            }
        }
        range
    }

    /// Iterate over every pixel, for blitting into a device buffer.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel<BinaryColor>> + '_ {
        self.pixels.iter().enumerate().map(move |(idx, on)| {
            let idx = idx as u32;
            Pixel(
                Point::new((idx % self.width) as i32, (idx / self.width) as i32),
                BinaryColor::from(*on),
            )
        })
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            Some((y as u32 * self.width + x as u32) as usize)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Frame {}x{}", self.width, self.height)?;
        for row in self.pixels.chunks(self.width as usize) {
            let line: String = row.iter().map(|on| if *on { '#' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            self.set(coord.x, coord.y, color.is_on());
        }
        Ok(())
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_draw_clips_out_of_range() {
        let mut frame = Frame::new(8, 4);
        Rectangle::new(Point::new(-2, -2), Size::new(20, 20))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.lit_count(), 32);
    }

    #[test]
    fn test_paste_copies_window_including_unlit() {
        let mut strip = Frame::new(10, 2);
        strip.set(3, 0, true);
        strip.set(6, 1, true);

        let mut frame = Frame::new(4, 4);
        frame.set(1, 2, true);
        frame.paste(&strip, 3, 4, Point::new(0, 2));

        assert!(frame.is_on(0, 2));
        assert!(frame.is_on(3, 3));
        // Unlit strip pixel replaced the lit one.
        assert!(!frame.is_on(1, 2));
        assert_eq!(frame.lit_count(), 2);
    }

    #[test]
    fn test_paste_past_source_end_clears() {
        let mut strip = Frame::new(6, 1);
        strip.set(5, 0, true);

        let mut frame = Frame::new(4, 1);
        for x in 0..4 {
            frame.set(x, 0, true);
        }
        frame.paste(&strip, 4, 4, Point::zero());

        assert!(!frame.is_on(0, 0));
        assert!(frame.is_on(1, 0));
        assert!(!frame.is_on(2, 0));
        assert!(!frame.is_on(3, 0));
    }

    #[test]
    fn test_lit_columns() {
        let mut frame = Frame::new(16, 4);
        assert_eq!(frame.lit_columns(0, 4), None);
        frame.set(5, 1, true);
        frame.set(9, 2, true);
        frame.set(14, 3, true);
        assert_eq!(frame.lit_columns(0, 3), Some((5, 9)));
    }
}
