//! Continuous pixel-index coordinates.
//!
//! Pixel centers sit at integer coordinates and the top-left pixel is
//! `(0, 0)`, so a centroid of `(3.0, 4.0)` means the light is centered on
//! column 3, row 4.

use std::fmt;
use std::ops::{Add, Sub};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("Cannot pair {recovered} recovered positions with {truth} true positions")]
    LengthMismatch { recovered: usize, truth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelCoordinates {
    pub x: f64,
    pub y: f64,
}

impl PixelCoordinates {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length when used as a displacement
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for PixelCoordinates {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for PixelCoordinates {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for PixelCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

/// Per-axis residuals `recovered - truth`, paired by index
pub fn residuals(
    recovered: &[PixelCoordinates],
    truth: &[PixelCoordinates],
) -> Result<Vec<PixelCoordinates>, CoordinateError> {
    if recovered.len() != truth.len() {
        return Err(CoordinateError::LengthMismatch {
            recovered: recovered.len(),
            truth: truth.len(),
        });
    }
    Ok(recovered.iter().zip(truth).map(|(&r, &t)| r - t).collect())
}

/// Coordinates of the geometric center of a `width × height` frame
pub fn frame_center(width: usize, height: usize) -> PixelCoordinates {
    PixelCoordinates::new(
        (width as f64 - 1.0) / 2.0,
        (height as f64 - 1.0) / 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtraction() {
        let d = PixelCoordinates::new(3.5, 1.0) - PixelCoordinates::new(1.0, 2.5);
        assert_eq!(d, PixelCoordinates::new(2.5, -1.5));
        assert_eq!((PixelCoordinates::new(3.0, 4.0)).norm(), 5.0);
    }

    #[test]
    fn test_residuals() {
        let recovered = [PixelCoordinates::new(1.25, 2.0), PixelCoordinates::new(0.0, 0.5)];
        let truth = [PixelCoordinates::new(1.0, 2.0), PixelCoordinates::new(0.5, 0.5)];
        let r = residuals(&recovered, &truth).unwrap();
        assert_eq!(r, vec![PixelCoordinates::new(0.25, 0.0), PixelCoordinates::new(-0.5, 0.0)]);
    }

    #[test]
    fn test_residuals_length_mismatch() {
        let one = [PixelCoordinates::default()];
        assert_eq!(
            residuals(&one, &[]),
            Err(CoordinateError::LengthMismatch {
                recovered: 1,
                truth: 0
            })
        );
    }

    #[test]
    fn test_frame_center() {
        assert_eq!(frame_center(1024, 1024), PixelCoordinates::new(511.5, 511.5));
        assert_eq!(frame_center(5, 3), PixelCoordinates::new(2.0, 1.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(PixelCoordinates::new(1.0, -0.5).to_string(), "(1.0000, -0.5000)");
    }
}
