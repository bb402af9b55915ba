//! Dense 2D grid with a reserved out-of-bounds cell.
//!
//! A [`Grid`] stores `width × height` addressable cells in row-major order
//! (backed by an `ndarray::Array2` with shape `(height, width)`) plus one
//! extra scalar cell. The extra cell lives at flat index `width * height` and
//! accumulates whatever falls outside the addressable area, e.g. photons
//! landing off the detector. Keeping it physically present means "how much
//! mass left the frame" is a single lookup.
//!
//! Sub-grid extraction always produces odd-sized windows so a unique center
//! cell exists, clamps the window to the parent bounds and reports the
//! top-left offset of the crop. Adding the offset to any local coordinate
//! gives the parent coordinate, which lets callers zoom in recursively
//! without drifting.

use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};
use num_traits::{ToPrimitive, Zero};
use thiserror::Error;

/// Errors raised by grid access and extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Coordinate ({x}, {y}) is out of range for a {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("Flat index {index} is out of range for a grid of {len} cells")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Requested a zero-sized sub-grid ({width}x{height})")]
    EmptyRequest { width: usize, height: usize },
    #[error("Cannot extract a sub-grid from an empty grid")]
    EmptyGrid,
    #[error("Sub-grid center ({x}, {y}) lies outside the {width}x{height} parent")]
    CenterOutside {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// Row-major 2D grid with one extra out-of-bounds cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    cells: Array2<T>,
    outside: T,
}

/// A cropped window of a parent grid, with the offset of its top-left cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SubGrid<T> {
    pub grid: Grid<T>,
    pub offset_x: usize,
    pub offset_y: usize,
}

impl<T: Clone + Zero> Grid<T> {
    /// Create a zero-filled grid. Zero-area grids are valid and still carry
    /// the extra cell.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: Array2::zeros((height, width)),
            outside: T::zero(),
        }
    }

    /// Wrap an existing `(height, width)` array, with an empty extra cell.
    pub fn from_array(cells: Array2<T>) -> Self {
        Self {
            cells,
            outside: T::zero(),
        }
    }

    /// Resize to new dimensions. All cells, including the extra one, become zero.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.cells = Array2::zeros((height, width));
        self.outside = T::zero();
    }

    /// Zero every cell, including the extra one.
    pub fn reset(&mut self) {
        self.cells.fill(T::zero());
        self.outside = T::zero();
    }

    /// Extract an odd-sized window centered at `(center_x, center_y)`.
    ///
    /// Even `width`/`height` are incremented by one. The window is clamped at
    /// the parent edges, so the result may be smaller than requested; the
    /// returned offsets always satisfy `offset + local == parent`. The extra
    /// cell of the returned grid is zero.
    ///
    /// # Errors
    /// * [`GridError::EmptyRequest`] for a zero width or height
    /// * [`GridError::EmptyGrid`] when this grid has no addressable cells
    /// * [`GridError::CenterOutside`] when the center is not a valid cell
    pub fn sub_grid(
        &self,
        center_x: usize,
        center_y: usize,
        width: usize,
        height: usize,
    ) -> Result<SubGrid<T>, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyRequest { width, height });
        }
        if self.is_empty() {
            return Err(GridError::EmptyGrid);
        }
        if center_x >= self.width() || center_y >= self.height() {
            return Err(GridError::CenterOutside {
                x: center_x,
                y: center_y,
                width: self.width(),
                height: self.height(),
            });
        }

        let width = if width % 2 == 0 { width + 1 } else { width };
        let height = if height % 2 == 0 { height + 1 } else { height };

        let half_w = (width - 1) / 2;
        let half_h = (height - 1) / 2;

        let min_x = center_x.saturating_sub(half_w);
        let min_y = center_y.saturating_sub(half_h);
        let max_x = (center_x + half_w).min(self.width() - 1);
        let max_y = (center_y + half_h).min(self.height() - 1);
        if max_x - min_x + 1 < width || max_y - min_y + 1 < height {
            log::debug!(
                "sub-grid {width}x{height} at ({center_x}, {center_y}) clamped to {}x{}",
                max_x - min_x + 1,
                max_y - min_y + 1
            );
        }

        let cells = self
            .cells
            .slice(s![min_y..=max_y, min_x..=max_x])
            .to_owned();

        Ok(SubGrid {
            grid: Grid::from_array(cells),
            offset_x: min_x,
            offset_y: min_y,
        })
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    pub fn height(&self) -> usize {
        self.cells.nrows()
    }

    /// Number of cells including the extra one: always `width * height + 1`.
    pub fn len(&self) -> usize {
        self.cells.len() + 1
    }

    /// True when the grid has no addressable cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flat index of the extra out-of-bounds cell.
    pub fn outside_index(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, x: usize, y: usize) -> Result<&T, GridError> {
        let (width, height) = (self.width(), self.height());
        self.cells.get((y, x)).ok_or(GridError::OutOfBounds {
            x,
            y,
            width,
            height,
        })
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Result<&mut T, GridError> {
        let (width, height) = (self.width(), self.height());
        self.cells.get_mut((y, x)).ok_or(GridError::OutOfBounds {
            x,
            y,
            width,
            height,
        })
    }

    /// Access by flat row-major index; `outside_index()` addresses the extra cell.
    pub fn at(&self, index: usize) -> Result<&T, GridError> {
        let len = self.len();
        let width = self.width();
        if index == self.outside_index() {
            Ok(&self.outside)
        } else if index < self.outside_index() {
            self.get(index % width, index / width)
        } else {
            Err(GridError::IndexOutOfBounds { index, len })
        }
    }

    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, GridError> {
        let len = self.len();
        let width = self.width();
        if index == self.outside_index() {
            Ok(&mut self.outside)
        } else if index < self.outside_index() {
            self.get_mut(index % width, index / width)
        } else {
            Err(GridError::IndexOutOfBounds { index, len })
        }
    }

    pub fn outside(&self) -> &T {
        &self.outside
    }

    pub fn outside_mut(&mut self) -> &mut T {
        &mut self.outside
    }

    /// Addressable cells as a `(height, width)` view.
    pub fn cells(&self) -> ArrayView2<'_, T> {
        self.cells.view()
    }

    pub fn cells_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.cells.view_mut()
    }

    /// Iterate every cell in flat index order, the extra cell last.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter().chain(std::iter::once(&self.outside))
    }
}

impl<T: Copy + PartialOrd> Grid<T> {
    /// Largest addressable value, `None` for a zero-area grid.
    pub fn max(&self) -> Option<T> {
        self.cells
            .iter()
            .copied()
            .fold(None, |acc, v| match acc {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            })
    }

    /// Smallest addressable value, `None` for a zero-area grid.
    pub fn min(&self) -> Option<T> {
        self.cells
            .iter()
            .copied()
            .fold(None, |acc, v| match acc {
                Some(m) if m <= v => Some(m),
                _ => Some(v),
            })
    }
}

impl<T: ToPrimitive> Grid<T> {
    /// Sum of the addressable cells, excluding the extra cell.
    pub fn total(&self) -> f64 {
        self.cells.iter().filter_map(|v| v.to_f64()).sum()
    }

    /// Sum of every cell including the extra one.
    pub fn total_with_outside(&self) -> f64 {
        self.total() + self.outside.to_f64().unwrap_or(0.0)
    }
}
