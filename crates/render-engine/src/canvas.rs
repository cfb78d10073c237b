//! RGBA raster the compositor draws into.

use clipmix_platform_core::FrameSize;
use image::{Rgba, RgbaImage};

use crate::layout::Rect;
use crate::shape::ClipShape;

/// Output raster owned by the compositor's tick loop.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    background: Rgba<u8>,
}

impl Canvas {
    pub fn new(size: FrameSize, background: [u8; 4]) -> Self {
        let background = Rgba(background);
        Self {
            image: RgbaImage::from_pixel(size.width, size.height, background),
            background,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    /// Fill the whole canvas with the background colour.
    pub fn clear(&mut self) {
        let bg = self.background;
        for pixel in self.image.pixels_mut() {
            *pixel = bg;
        }
    }

    /// Reallocate at a new size. Returns `false` when the size is unchanged.
    pub fn resize(&mut self, size: FrameSize) -> bool {
        if size == self.size() {
            return false;
        }
        self.image = RgbaImage::from_pixel(size.width, size.height, self.background);
        true
    }

    /// Draw `source` scaled into `dest` with nearest-neighbour sampling.
    ///
    /// Pixels are sampled at their centres. Only pixels inside both the canvas
    /// and `clip` (fitted to `dest`) are written. Returns the number of canvas
    /// pixels written.
    pub fn draw_frame(&mut self, source: &RgbaImage, dest: Rect, clip: Option<ClipShape>) -> u64 {
        let (sw, sh) = source.dimensions();
        if dest.is_empty() || sw == 0 || sh == 0 {
            return 0;
        }

        let (cw, ch) = self.image.dimensions();
        let x0 = dest.x.floor().max(0.0) as u32;
        let y0 = dest.y.floor().max(0.0) as u32;
        let x1 = dest.right().ceil().clamp(0.0, cw as f64) as u32;
        let y1 = dest.bottom().ceil().clamp(0.0, ch as f64) as u32;

        let scale_x = sw as f64 / dest.width;
        let scale_y = sh as f64 / dest.height;
        let mut written = 0;

        for py in y0..y1 {
            let cy = py as f64 + 0.5;
            if cy < dest.y || cy >= dest.bottom() {
                continue;
            }
            let sy = (((cy - dest.y) * scale_y) as u32).min(sh - 1);

            for px in x0..x1 {
                let cx = px as f64 + 0.5;
                if cx < dest.x || cx >= dest.right() {
                    continue;
                }
                if let Some(shape) = clip {
                    if !shape.contains(&dest, cx, cy) {
                        continue;
                    }
                }
                let sx = (((cx - dest.x) * scale_x) as u32).min(sw - 1);
                let src = *source.get_pixel(sx, sy);
                let dst = self.image.get_pixel_mut(px, py);
                *dst = blend_over(src, *dst);
                written += 1;
            }
        }

        written
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Copy of the current raster.
    pub fn snapshot(&self) -> RgbaImage {
        self.image.clone()
    }
}

fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    match src.0[3] {
        255 => src,
        0 => dst,
        alpha => {
            let a = alpha as u32;
            let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
            Rgba([
                mix(src.0[0], dst.0[0]),
                mix(src.0[1], dst.0[1]),
                mix(src.0[2], dst.0[2]),
                dst.0[3].max(alpha),
            ])
        }
    }
}
