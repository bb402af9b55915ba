//! Centroid recovery on detector frames.
//!
//! The estimator works coarse to fine: thresholded first moments on
//! successively halved windows locate the source, then a fixed
//! `min_window_size` window is re-centered on the estimate until it stops
//! moving. Thresholds sit a few Poisson sigmas above a background estimate
//! taken either from random pixels across the window or from its border.
//!
//! All functions take a plain `&Grid<u32>` and never look at how the grid
//! was produced. The grid's outside cell is ignored throughout.

use std::ops::Range;

use log::debug;
use rand::Rng;
use shared::grid::{Grid, GridError};
use thiserror::Error;

use crate::coordinates::PixelCoordinates;

/// Fraction of the window sampled by [`BackgroundMethod::RandomGlobal`]
pub const RANDOM_GLOBAL_SAMPLE_FRACTION: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CentroidError {
    #[error("No signal at or above threshold {threshold}")]
    NoSignal { threshold: f64 },
    #[error("Cannot estimate a centroid on an empty grid")]
    EmptyGrid,
    #[error("Range {start}..{end} exceeds axis length {len}")]
    RangeOutside { start: usize, end: usize, len: usize },
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMethod {
    /// Mean of uniformly drawn pixels (with replacement)
    RandomGlobal,
    /// Mean of the outermost ring of pixels
    Border,
}

/// Parameters of the coarse-to-fine search
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidConfig {
    /// Window size the halving stops at and the fine search uses
    pub min_window_size: usize,
    /// Threshold in background sigmas for the coarse stages
    pub sigma_threshold: f64,
    /// Threshold in background sigmas for the final and fine stages
    pub sigma_threshold_final: f64,
    pub max_fine_iterations: usize,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            min_window_size: 30,
            sigma_threshold: 4.0,
            sigma_threshold_final: 2.0,
            max_fine_iterations: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidEstimate {
    pub position: PixelCoordinates,
    /// Fine-search iterations performed
    pub iterations: usize,
    /// False when the fine search hit its iteration limit still moving
    pub converged: bool,
}

fn counted(value: u32, threshold: f64) -> bool {
    threshold <= 0.0 || value as f64 >= threshold
}

fn check_range(range: &Range<usize>, len: usize) -> Result<(), CentroidError> {
    if range.start > range.end || range.end > len {
        return Err(CentroidError::RangeOutside {
            start: range.start,
            end: range.end,
            len,
        });
    }
    Ok(())
}

/// Nearest in-bounds index to a continuous coordinate
fn nearest_index(coordinate: f64, len: usize) -> usize {
    coordinate.round().clamp(0.0, len.saturating_sub(1) as f64) as usize
}

/// Sum of the pixels at or above `threshold`; `threshold <= 0` sums all.
pub fn total(grid: &Grid<u32>, threshold: f64) -> u64 {
    let cells = grid.cells();
    if threshold <= 0.0 {
        return cells.iter().map(|&v| v as u64).sum();
    }
    cells
        .iter()
        .filter(|&&v| counted(v, threshold))
        .map(|&v| v as u64)
        .sum()
}

/// One thresholded sum per row in `rows`, each across all columns
pub fn sum_vertical(
    grid: &Grid<u32>,
    rows: Range<usize>,
    threshold: f64,
) -> Result<Vec<u64>, CentroidError> {
    check_range(&rows, grid.height())?;
    let cells = grid.cells();
    Ok(rows
        .map(|y| {
            cells
                .row(y)
                .iter()
                .filter(|&&v| counted(v, threshold))
                .map(|&v| v as u64)
                .sum()
        })
        .collect())
}

/// One thresholded sum per column in `columns`, each across all rows
pub fn sum_horizontal(
    grid: &Grid<u32>,
    columns: Range<usize>,
    threshold: f64,
) -> Result<Vec<u64>, CentroidError> {
    check_range(&columns, grid.width())?;
    let cells = grid.cells();
    Ok(columns
        .map(|x| {
            cells
                .column(x)
                .iter()
                .filter(|&&v| counted(v, threshold))
                .map(|&v| v as u64)
                .sum()
        })
        .collect())
}

/// Thresholded first moment of the grid in its own pixel coordinates
pub fn momentum(grid: &Grid<u32>, threshold: f64) -> Result<PixelCoordinates, CentroidError> {
    let weight = total(grid, threshold);
    if weight == 0 {
        return Err(CentroidError::NoSignal { threshold });
    }
    let weight = weight as f64;

    let row_sums = sum_vertical(grid, 0..grid.height(), threshold)?;
    let column_sums = sum_horizontal(grid, 0..grid.width(), threshold)?;

    let weighted = |sums: &[u64]| -> f64 {
        sums.iter()
            .enumerate()
            .map(|(i, &s)| s as f64 * i as f64)
            .sum()
    };

    Ok(PixelCoordinates::new(
        weighted(&column_sums) / weight,
        weighted(&row_sums) / weight,
    ))
}

/// Mean background level of the grid
pub fn background_level<R: Rng + ?Sized>(
    grid: &Grid<u32>,
    method: BackgroundMethod,
    rng: &mut R,
) -> Result<f64, CentroidError> {
    let (w, h) = (grid.width(), grid.height());
    if w == 0 || h == 0 {
        return Err(CentroidError::EmptyGrid);
    }

    match method {
        BackgroundMethod::RandomGlobal => {
            let n = w * h;
            let samples = ((n as f64 * RANDOM_GLOBAL_SAMPLE_FRACTION) as usize).max(1);
            let mut sum = 0u64;
            for _ in 0..samples {
                sum += *grid.at(rng.random_range(0..n))? as u64;
            }
            Ok(sum as f64 / samples as f64)
        }
        BackgroundMethod::Border => border_background(grid),
    }
}

fn border_background(grid: &Grid<u32>) -> Result<f64, CentroidError> {
    let (w, h) = (grid.width(), grid.height());
    if w == 0 || h == 0 {
        return Err(CentroidError::EmptyGrid);
    }
    if w <= 2 || h <= 2 {
        // Every pixel is on the border
        return Ok(total(grid, 0.0) as f64 / (w * h) as f64);
    }

    let cells = grid.cells();
    let top_bottom: u64 = (0..w)
        .map(|x| cells[[0, x]] as u64 + cells[[h - 1, x]] as u64)
        .sum();
    let sides: u64 = (1..h - 1)
        .map(|y| cells[[y, 0]] as u64 + cells[[y, w - 1]] as u64)
        .sum();
    let ring = 2 * w + 2 * (h - 2);
    Ok((top_bottom + sides) as f64 / ring as f64)
}

fn thresholded_momentum(
    grid: &Grid<u32>,
    background: f64,
    sigma: f64,
) -> Result<PixelCoordinates, CentroidError> {
    let threshold = background + sigma * background.sqrt();
    momentum(grid, threshold)
}

/// Moment thresholded at `sigma` Poisson deviations above the background
pub fn initial_guess_momentum<R: Rng + ?Sized>(
    grid: &Grid<u32>,
    sigma: f64,
    method: BackgroundMethod,
    rng: &mut R,
) -> Result<PixelCoordinates, CentroidError> {
    let background = background_level(grid, method, rng)?;
    thresholded_momentum(grid, background, sigma)
}

/// Re-center a `window × window` crop on the estimate until it settles.
///
/// Stops once the estimate lies within one pixel of the crop's center
/// pixel on both axes, or after `max_iterations` crops.
pub fn fine_momentum(
    grid: &Grid<u32>,
    guess_x: f64,
    guess_y: f64,
    window: usize,
    sigma: f64,
    max_iterations: usize,
) -> Result<CentroidEstimate, CentroidError> {
    if grid.width() == 0 || grid.height() == 0 {
        return Err(CentroidError::EmptyGrid);
    }

    let mut position = PixelCoordinates::new(guess_x, guess_y);
    for iteration in 1..=max_iterations {
        let cx = nearest_index(position.x, grid.width());
        let cy = nearest_index(position.y, grid.height());
        let crop = grid.sub_grid(cx, cy, window, window)?;

        let background = border_background(&crop.grid)?;
        let local = thresholded_momentum(&crop.grid, background, sigma)?;
        position = PixelCoordinates::new(
            local.x + crop.offset_x as f64,
            local.y + crop.offset_y as f64,
        );

        // Measured from the requested center, which stays put when the crop is clamped at an edge
        let shift = position - PixelCoordinates::new(cx as f64, cy as f64);
        if shift.x.abs() < 1.0 && shift.y.abs() < 1.0 {
            return Ok(CentroidEstimate {
                position,
                iterations: iteration,
                converged: true,
            });
        }
    }

    debug!("Fine centroid did not settle after {max_iterations} iterations, last estimate {position}");
    Ok(CentroidEstimate {
        position,
        iterations: max_iterations,
        converged: false,
    })
}

/// Full coarse-to-fine centroid search in frame coordinates
pub fn multiple_guess_momentum<R: Rng + ?Sized>(
    grid: &Grid<u32>,
    config: &CentroidConfig,
    rng: &mut R,
) -> Result<CentroidEstimate, CentroidError> {
    if grid.width() == 0 || grid.height() == 0 {
        return Err(CentroidError::EmptyGrid);
    }
    let min = config.min_window_size.max(1);

    let mut window: Option<Grid<u32>> = None;
    let (mut offset_x, mut offset_y) = (0usize, 0usize);

    loop {
        let current = window.as_ref().unwrap_or(grid);
        let (w, h) = (current.width(), current.height());
        if w < 2 * min || h < 2 * min {
            break;
        }

        let method = if w <= 6 * min && h <= 6 * min {
            BackgroundMethod::Border
        } else {
            BackgroundMethod::RandomGlobal
        };
        let guess = initial_guess_momentum(current, config.sigma_threshold, method, rng)?;
        debug!("Coarse guess {guess} in {w}x{h} window at ({offset_x}, {offset_y})");

        let next = current.sub_grid(
            nearest_index(guess.x, w),
            nearest_index(guess.y, h),
            w / 2,
            h / 2,
        )?;
        offset_x += next.offset_x;
        offset_y += next.offset_y;
        window = Some(next.grid);
    }

    let current = window.as_ref().unwrap_or(grid);
    let guess = initial_guess_momentum(
        current,
        config.sigma_threshold_final,
        BackgroundMethod::Border,
        rng,
    )?;
    let guess = guess + PixelCoordinates::new(offset_x as f64, offset_y as f64);

    fine_momentum(
        grid,
        guess.x,
        guess.y,
        min,
        config.sigma_threshold_final,
        config.max_fine_iterations,
    )
}
