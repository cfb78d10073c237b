mod common;

use clipmix_media_model::{CompositorConfig, OverlayCorner, OverlayShape};
use clipmix_platform_core::FrameSize;
use clipmix_render_engine::{contain_rect, fit_output_size, overlay_rect, Canvas, ClipShape, Rect};
use common::{BLACK, RED, WHITE};
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

fn circle_config(size_fraction: f64, padding: f64) -> CompositorConfig {
    CompositorConfig {
        corner: OverlayCorner::BottomRight,
        shape: OverlayShape::Circle,
        size_fraction,
        padding,
        ..CompositorConfig::default()
    }
}

#[test]
fn circle_overlay_box_matches_bottom_right_formula() {
    let (w, h) = (1280.0, 720.0);
    let (s, p, aspect) = (0.25, 16.0, 4.0 / 3.0);
    let rect = overlay_rect(FrameSize::new(1280, 720), Some(aspect), &circle_config(s, p));

    assert!((rect.x - (w - s * w - p)).abs() < 1e-9);
    assert!((rect.y - (h - (s * w / aspect) - p)).abs() < 1e-9);
    assert!((rect.right() - (w - p)).abs() < 1e-9);
    assert!((rect.bottom() - (h - p)).abs() < 1e-9);
}

#[test]
fn circle_overlay_only_touches_inscribed_circle() {
    let size = FrameSize::new(640, 360);
    let config = circle_config(0.25, 10.0);
    let mut canvas = Canvas::new(size, BLACK);

    let screen = RgbaImage::from_pixel(1280, 720, Rgba(WHITE));
    canvas.draw_frame(&screen, contain_rect(FrameSize::new(1280, 720), size), None);
    let before = canvas.snapshot();

    let webcam = RgbaImage::from_pixel(320, 240, Rgba(RED));
    let rect = overlay_rect(size, Some(320.0 / 240.0), &config);
    let written = canvas.draw_frame(&webcam, rect, Some(ClipShape::from_config(&config)));
    assert!(written > 0);

    let (cx, cy) = rect.center();
    let r = rect.width.min(rect.height) / 2.0;
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0, 0);
    for (x, y, pixel) in canvas.image().enumerate_pixels() {
        if *pixel == *before.get_pixel(x, y) {
            continue;
        }
        let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
        assert!(dx * dx + dy * dy <= r * r, "pixel ({x}, {y}) outside circle");
        assert!(rect.contains(x as f64 + 0.5, y as f64 + 0.5));
        min = (min.0.min(x), min.1.min(y));
        max = (max.0.max(x), max.1.max(y));
    }

    // The circle spans the full box height and is centred horizontally.
    assert_eq!(min.1, rect.y.ceil() as u32);
    assert_eq!(max.1 + 1, rect.bottom().floor() as u32);
    assert!((((min.0 + max.0 + 1) as f64 / 2.0) - cx).abs() <= 1.0);

    // Corners of the overlay box still show the screen.
    assert_eq!(canvas.pixel(rect.x.ceil() as u32, rect.y.ceil() as u32), Some(WHITE));
    assert_eq!(
        canvas.pixel(rect.right() as u32 - 1, rect.bottom() as u32 - 1),
        Some(WHITE)
    );
}

#[test]
fn rounded_overlay_keeps_screen_in_corners() {
    let size = FrameSize::new(400, 300);
    let config = CompositorConfig {
        corner: OverlayCorner::TopLeft,
        padding: 0.0,
        size_fraction: 0.5,
        corner_radius: 20.0,
        ..CompositorConfig::default()
    };
    let mut canvas = Canvas::new(size, WHITE);
    let webcam = RgbaImage::from_pixel(4, 3, Rgba(RED));
    let rect = overlay_rect(size, Some(4.0 / 3.0), &config);
    assert_eq!(rect, Rect::new(0.0, 0.0, 200.0, 150.0));

    canvas.draw_frame(&webcam, rect, Some(ClipShape::from_config(&config)));
    assert_eq!(canvas.pixel(0, 0), Some(WHITE));
    assert_eq!(canvas.pixel(199, 149), Some(WHITE));
    assert_eq!(canvas.pixel(100, 0), Some(RED));
    assert_eq!(canvas.pixel(0, 75), Some(RED));
    assert_eq!(canvas.pixel(200, 75), Some(WHITE));
}

proptest! {
    #[test]
    fn output_size_is_even_and_bounded(
        native_w in 1u32..8000,
        native_h in 1u32..8000,
        max_w in 2u32..4000,
        max_h in 2u32..4000,
    ) {
        let size = fit_output_size(FrameSize::new(native_w, native_h), Some(max_w), Some(max_h));
        prop_assert!(size.width >= 2 && size.height >= 2);
        prop_assert!(size.is_even());
        prop_assert!(size.width <= max_w && size.height <= max_h);
    }

    #[test]
    fn output_size_never_upscales(native_w in 2u32..4000, native_h in 2u32..4000) {
        let size = fit_output_size(FrameSize::new(native_w, native_h), Some(8000), Some(8000));
        prop_assert!(size.width <= native_w && size.height <= native_h);
    }

    #[test]
    fn overlay_stays_inside_canvas(
        w in 100u32..4000,
        h in 100u32..4000,
        fraction in 0.05f64..0.3,
        aspect in 0.5f64..2.5,
    ) {
        let config = CompositorConfig { size_fraction: fraction, padding: 0.0, ..CompositorConfig::default() };
        let rect = overlay_rect(FrameSize::new(w, h), Some(aspect), &config);
        prop_assume!(rect.height <= h as f64);
        prop_assert!(rect.x >= -1e-9 && rect.y >= -1e-9);
        prop_assert!(rect.right() <= w as f64 + 1e-9);
        prop_assert!(rect.bottom() <= h as f64 + 1e-9);
    }
}
