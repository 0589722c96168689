//! Pixel dimensions of a presentable surface.

use std::fmt;

/// Width and height of a surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    /// Create a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero (e.g. a minimized window).
    ///
    /// Rendering into a zero-area target is undefined, so callers must wait
    /// until this returns `false` before building surface resources.
    pub const fn is_zero_area(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height, or `1.0` for a degenerate extent.
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl From<(u32, u32)> for Extent {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_detection() {
        assert!(Extent::new(0, 600).is_zero_area());
        assert!(Extent::new(800, 0).is_zero_area());
        assert!(Extent::new(0, 0).is_zero_area());
        assert!(!Extent::new(1, 1).is_zero_area());
    }

    #[test]
    fn aspect_ratio_handles_zero_height() {
        assert_eq!(Extent::new(800, 400).aspect_ratio(), 2.0);
        assert_eq!(Extent::new(800, 0).aspect_ratio(), 1.0);
    }

    #[test]
    fn display_format() {
        assert_eq!(Extent::new(1280, 720).to_string(), "1280x720");
    }
}
