use bitvec::{BitArr, array::BitArray};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Monochrome 64x32 pixel grid, stored row-major, one bit per pixel.
pub struct Framebuffer {
    pixels: BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT),
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: BitArray::ZERO,
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(y % DISPLAY_HEIGHT) * DISPLAY_WIDTH + (x % DISPLAY_WIDTH)]
    }

    /// Row `y` as 0/1 values. `y` wraps like `pixel`.
    pub fn row(&self, y: usize) -> impl Iterator<Item = u8> + '_ {
        let start = (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH;
        self.pixels[start..start + DISPLAY_WIDTH]
            .iter()
            .map(|bit| u8::from(*bit))
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels.count_ones()
    }

    /// XORs `sprite` (one byte per row, MSB leftmost) onto the grid with its
    /// top-left corner at (`x`, `y`). The origin is reduced modulo the display
    /// size and pixels past an edge wrap to the opposite side. Returns true if
    /// any lit pixel was turned off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let x0 = x % DISPLAY_WIDTH;
        let y0 = y % DISPLAY_HEIGHT;
        let mut collision = false;

        for (row, &byte) in sprite.iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) == 0 {
                    continue;
                }

                let pixel_x = (x0 + bit) % DISPLAY_WIDTH;
                let pixel_y = (y0 + row) % DISPLAY_HEIGHT;
                let index = pixel_y * DISPLAY_WIDTH + pixel_x;

                let current_pixel = self.pixels[index];
                if current_pixel {
                    collision = true;
                }
                self.pixels.set(index, !current_pixel);
            }
        }
        collision
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_bits_map_msb_first() {
        let mut fb = Framebuffer::new();
        assert!(!fb.draw_sprite(0, 0, &[0b1000_0001]));
        assert!(fb.pixel(0, 0));
        assert!(!fb.pixel(1, 0));
        assert!(fb.pixel(7, 0));
        assert_eq!(fb.lit_pixels(), 2);
    }

    #[test]
    fn origin_is_reduced_modulo_display_size() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(64 + 3, 32 + 2, &[0x80]);
        assert!(fb.pixel(3, 2));
        assert_eq!(fb.lit_pixels(), 1);
    }

    #[test]
    fn pixels_wrap_around_edges() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(62, 31, &[0xF0, 0xF0]);
        // right edge wraps to column 0, bottom edge to row 0
        assert!(fb.pixel(62, 31));
        assert!(fb.pixel(63, 31));
        assert!(fb.pixel(0, 31));
        assert!(fb.pixel(1, 31));
        assert!(fb.pixel(62, 0));
        assert!(fb.pixel(1, 0));
        assert_eq!(fb.lit_pixels(), 8);
    }

    #[test]
    fn overlapping_draw_reports_collision_and_erases() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(10, 10, &[0xFF]);
        assert!(fb.draw_sprite(14, 10, &[0xFF]));
        assert_eq!(fb.row(10).filter(|&p| p == 1).count(), 8);
        assert!(!fb.pixel(14, 10));
        assert!(fb.pixel(18, 10));
    }

    #[test]
    fn row_wraps_like_pixel() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(5, 3, &[0x80]);
        let row: Vec<u8> = fb.row(DISPLAY_HEIGHT + 3).collect();
        assert_eq!(row.len(), DISPLAY_WIDTH);
        assert_eq!(row[5], 1);
        assert_eq!(row.iter().map(|&p| usize::from(p)).sum::<usize>(), 1);
        assert!(fb.pixel(5, DISPLAY_HEIGHT + 3));
    }

    #[test]
    fn clear_turns_everything_off() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, &[0xFF; 15]);
        fb.clear();
        assert_eq!(fb.lit_pixels(), 0);
    }
}
