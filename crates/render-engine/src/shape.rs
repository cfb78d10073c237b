//! Clip shapes for the overlay region.

use clipmix_media_model::{CompositorConfig, OverlayShape};

use crate::layout::Rect;

/// Pixel mask applied to the overlay box before the secondary frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipShape {
    Rectangle,
    /// Rectangle with quarter-circle corners.
    Rounded { radius: f64 },
    /// Largest circle inscribed in the box.
    Circle,
}

impl ClipShape {
    pub fn from_config(config: &CompositorConfig) -> Self {
        match config.shape {
            OverlayShape::Rectangle => Self::Rectangle,
            OverlayShape::Rounded => Self::Rounded {
                radius: config.corner_radius,
            },
            OverlayShape::Circle => Self::Circle,
        }
    }

    /// Whether the point `(x, y)` lies inside this shape fitted to `rect`.
    pub fn contains(&self, rect: &Rect, x: f64, y: f64) -> bool {
        if !rect.contains(x, y) {
            return false;
        }
        match *self {
            Self::Rectangle => true,
            Self::Circle => {
                let (cx, cy) = rect.center();
                let r = rect.width.min(rect.height) / 2.0;
                let (dx, dy) = (x - cx, y - cy);
                dx * dx + dy * dy <= r * r
            }
            Self::Rounded { radius } => {
                let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
                // Distance to the rectangle shrunk by r on every side.
                let nx = x.clamp(rect.x + r, rect.right() - r);
                let ny = y.clamp(rect.y + r, rect.bottom() - r);
                let (dx, dy) = (x - nx, y - ny);
                dx * dx + dy * dy <= r * r
            }
        }
    }

    /// Whether the pixel at integer coordinates `(px, py)` is inside, sampled
    /// at its centre.
    pub fn covers_pixel(&self, rect: &Rect, px: u32, py: u32) -> bool {
        self.contains(rect, px as f64 + 0.5, py as f64 + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: Rect = Rect::new(0.0, 0.0, 100.0, 60.0);

    #[test]
    fn circle_is_inscribed_in_short_axis() {
        let circle = ClipShape::Circle;
        assert!(circle.contains(&BOX, 50.0, 30.0));
        assert!(circle.contains(&BOX, 50.0, 0.5));
        assert!(!circle.contains(&BOX, 15.0, 30.0));
        assert!(!circle.contains(&BOX, 1.0, 1.0));
    }

    #[test]
    fn rounded_corners_cut_only_corners() {
        let rounded = ClipShape::Rounded { radius: 12.0 };
        assert!(!rounded.contains(&BOX, 0.5, 0.5));
        assert!(!rounded.contains(&BOX, 99.5, 59.5));
        assert!(rounded.contains(&BOX, 0.5, 30.0));
        assert!(rounded.contains(&BOX, 50.0, 0.5));
        assert!(rounded.contains(&BOX, 12.0, 12.0));
    }

    #[test]
    fn oversized_radius_is_clamped() {
        let pill = ClipShape::Rounded { radius: 1000.0 };
        assert!(pill.contains(&BOX, 50.0, 30.0));
        assert!(!pill.contains(&BOX, 2.0, 2.0));
    }

    #[test]
    fn rectangle_covers_whole_box() {
        assert!(ClipShape::Rectangle.covers_pixel(&BOX, 0, 0));
        assert!(ClipShape::Rectangle.covers_pixel(&BOX, 99, 59));
        assert!(!ClipShape::Rectangle.covers_pixel(&BOX, 100, 59));
    }
}
