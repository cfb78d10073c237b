//! Layout maths: output sizing, contained placement, overlay placement.

use clipmix_media_model::CompositorConfig;
use clipmix_platform_core::FrameSize;

/// Aspect ratio assumed for an overlay feed whose size is not known yet.
pub const FALLBACK_OVERLAY_ASPECT: f64 = 4.0 / 3.0;

/// Canvas size used until the primary feed reports its real size.
pub const PLACEHOLDER_SIZE: FrameSize = FrameSize::new(1920, 1080);

/// Axis-aligned rectangle in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Shrink `native` to fit inside the optional bounds, keeping its aspect
/// ratio and never upscaling. Both dimensions come out even and at least 2.
pub fn fit_output_size(native: FrameSize, max_width: Option<u32>, max_height: Option<u32>) -> FrameSize {
    let w = native.width.max(1) as f64;
    let h = native.height.max(1) as f64;

    let mut scale: f64 = 1.0;
    if let Some(max_w) = max_width {
        scale = scale.min(max_w as f64 / w);
    }
    if let Some(max_h) = max_height {
        scale = scale.min(max_h as f64 / h);
    }

    // Absorb float error so an exact fit does not floor one pixel short.
    let width = ((w * scale) + 1e-6).floor() as u32;
    let height = ((h * scale) + 1e-6).floor() as u32;

    let width = max_width.map_or(width, |m| width.min(m));
    let height = max_height.map_or(height, |m| height.min(m));

    FrameSize::new(even_at_least_two(width), even_at_least_two(height))
}

fn even_at_least_two(value: u32) -> u32 {
    (value - value % 2).max(2)
}

/// Scale `source` uniformly to fit inside `canvas`, centred, with bars on the
/// shorter axis.
pub fn contain_rect(source: FrameSize, canvas: FrameSize) -> Rect {
    let cw = canvas.width as f64;
    let ch = canvas.height as f64;
    if source.width == 0 || source.height == 0 {
        return Rect::new(0.0, 0.0, cw, ch);
    }

    let sw = source.width as f64;
    let sh = source.height as f64;
    let scale = (cw / sw).min(ch / sh);
    let width = sw * scale;
    let height = sh * scale;

    Rect::new((cw - width) / 2.0, (ch - height) / 2.0, width, height)
}

/// Overlay box for the secondary feed.
///
/// Width is `canvas.width * size_fraction`; height follows the overlay's own
/// aspect ratio (4:3 when unknown). The box sits in the configured corner,
/// inset by the padding on both axes.
pub fn overlay_rect(canvas: FrameSize, overlay_aspect: Option<f64>, config: &CompositorConfig) -> Rect {
    let aspect = overlay_aspect
        .filter(|a| a.is_finite() && *a > 0.0)
        .unwrap_or(FALLBACK_OVERLAY_ASPECT);

    let cw = canvas.width as f64;
    let ch = canvas.height as f64;
    let width = cw * config.size_fraction;
    let height = width / aspect;

    let x = if config.corner.is_right() {
        cw - width - config.padding
    } else {
        config.padding
    };
    let y = if config.corner.is_bottom() {
        ch - height - config.padding
    } else {
        config.padding
    };

    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipmix_media_model::OverlayCorner;

    #[test]
    fn fit_shrinks_to_bounds() {
        let size = fit_output_size(FrameSize::new(2560, 1440), Some(1920), Some(1080));
        assert_eq!(size, FrameSize::new(1920, 1080));

        let size = fit_output_size(FrameSize::new(3440, 1440), Some(1920), Some(1080));
        assert_eq!(size, FrameSize::new(1920, 802));
    }

    #[test]
    fn fit_never_upscales() {
        let size = fit_output_size(FrameSize::new(1280, 720), Some(1920), Some(1080));
        assert_eq!(size, FrameSize::new(1280, 720));
    }

    #[test]
    fn fit_forces_even_dimensions() {
        let size = fit_output_size(FrameSize::new(1365, 767), None, None);
        assert_eq!(size, FrameSize::new(1364, 766));

        let size = fit_output_size(FrameSize::new(1, 1), Some(1920), Some(1080));
        assert_eq!(size, FrameSize::new(2, 2));
    }

    #[test]
    fn contain_pillarboxes_narrow_sources() {
        let rect = contain_rect(FrameSize::new(1000, 1000), FrameSize::new(1920, 1080));
        assert!((rect.x - 420.0).abs() < 1e-6);
        assert_eq!(rect.y, 0.0);
        assert!((rect.width - 1080.0).abs() < 1e-6);
        assert!((rect.height - 1080.0).abs() < 1e-6);
    }

    #[test]
    fn contain_letterboxes_wide_sources() {
        let rect = contain_rect(FrameSize::new(3840, 1080), FrameSize::new(1920, 1080));
        assert_eq!(rect, Rect::new(0.0, 270.0, 1920.0, 540.0));
    }

    #[test]
    fn overlay_sits_in_configured_corner() {
        let canvas = FrameSize::new(1920, 1080);
        let mut config = CompositorConfig::default();

        let rect = overlay_rect(canvas, Some(4.0 / 3.0), &config);
        assert!((rect.x - (1920.0 - 384.0 - 20.0)).abs() < 1e-9);
        assert!((rect.y - (1080.0 - 288.0 - 20.0)).abs() < 1e-9);

        config.corner = OverlayCorner::TopLeft;
        let rect = overlay_rect(canvas, Some(16.0 / 9.0), &config);
        assert_eq!((rect.x, rect.y), (20.0, 20.0));
        assert!((rect.height - 216.0).abs() < 1e-9);
    }

    #[test]
    fn overlay_falls_back_to_four_by_three() {
        let rect = overlay_rect(FrameSize::new(1000, 800), None, &CompositorConfig::default());
        assert!((rect.width - 200.0).abs() < 1e-9);
        assert!((rect.height - 150.0).abs() < 1e-9);
    }
}
