//! Gaussian point-source model over the simulation-element grid.
//!
//! A source spreads its expected counts over the oversampled grid with a
//! sampled 2D Gaussian. Probabilities are kept in percent so the grid's
//! addressable cells sum to at most 100; whatever the sampling misses
//! (tails outside the frame, or the whole spot when it lies far off-frame)
//! goes to the grid's outside cell. Detection positions are then drawn from
//! a discrete distribution over every cell including the outside one.

use std::f64::consts::PI;

use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use shared::grid::{Grid, GridError};

use crate::image_proc::frame::FrameError;

/// `2·sqrt(2·ln 2)`: ratio between a Gaussian's FWHM and its sigma
pub const FWHM_TO_SIGMA: f64 = 2.3548;

/// Total probability mass of a source, in percent
pub const PROBABILITY_SCALE: f64 = 100.0;

/// Where a source sits and how wide it is, in pixel units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianSpot {
    pub center_x: f64,
    pub center_y: f64,
    pub fwhm_x: f64,
    pub fwhm_y: f64,
}

impl GaussianSpot {
    pub fn new(center_x: f64, center_y: f64, fwhm_x: f64, fwhm_y: f64) -> Self {
        Self {
            center_x,
            center_y,
            fwhm_x,
            fwhm_y,
        }
    }

    fn validate(&self) -> Result<(), FrameError> {
        let valid = |f: f64| f.is_finite() && f > 0.0;
        if valid(self.fwhm_x) && valid(self.fwhm_y) {
            Ok(())
        } else {
            Err(FrameError::InvalidFwhm {
                fwhm_x: self.fwhm_x,
                fwhm_y: self.fwhm_y,
            })
        }
    }

    /// Profile in the coordinate space of a grid with `simels` cells per pixel side
    pub fn profile(&self, simels: usize) -> GaussianProfile {
        let s = simels as f64;
        GaussianProfile {
            center_x: self.center_x * s + s / 2.0 - 0.5,
            center_y: self.center_y * s + s / 2.0 - 0.5,
            sigma_x: self.fwhm_x / FWHM_TO_SIGMA * s,
            sigma_y: self.fwhm_y / FWHM_TO_SIGMA * s,
        }
    }
}

/// A 2D Gaussian normalized to [`PROBABILITY_SCALE`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianProfile {
    pub center_x: f64,
    pub center_y: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
}

impl GaussianProfile {
    pub fn density(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let norm = PROBABILITY_SCALE / (2.0 * PI * self.sigma_x * self.sigma_y);
        norm * (-(dx * dx) / (2.0 * self.sigma_x * self.sigma_x)
            - (dy * dy) / (2.0 * self.sigma_y * self.sigma_y))
            .exp()
    }

    /// Sample the profile at every cell and put the missing mass outside
    pub fn fill(&self, grid: &mut Grid<f64>) {
        let mut sum = 0.0;
        for ((y, x), p) in grid.cells_mut().indexed_iter_mut() {
            *p = self.density(x as f64, y as f64);
            sum += *p;
        }
        *grid.outside_mut() = (PROBABILITY_SCALE - sum).max(0.0);
    }
}

/// A point source ready to be sampled into a frame
#[derive(Debug, Clone)]
pub struct Source {
    spot: GaussianSpot,
    expected_adu: f64,
    probabilities: Grid<f64>,
    positions: WeightedIndex<f64>,
    count: Option<Poisson<f64>>,
    count_rng: StdRng,
    position_rng: StdRng,
}

impl Source {
    /// Build a source over a `simel_width × simel_height` grid.
    ///
    /// The detection count and the detection positions use independent
    /// generators seeded with `count_seed` and `position_seed`.
    pub fn new(
        spot: GaussianSpot,
        expected_adu: f64,
        (simel_width, simel_height): (usize, usize),
        simels: usize,
        (count_seed, position_seed): (u64, u64),
    ) -> Result<Self, FrameError> {
        spot.validate()?;

        let mut probabilities = Grid::new(simel_width, simel_height);
        spot.profile(simels).fill(&mut probabilities);

        let positions = WeightedIndex::new(probabilities.iter().copied())
            .map_err(|e| FrameError::Distribution(e.to_string()))?;

        let count = if expected_adu > 0.0 {
            Some(Poisson::new(expected_adu).map_err(|e| FrameError::Distribution(e.to_string()))?)
        } else {
            None
        };

        Ok(Self {
            spot,
            expected_adu,
            probabilities,
            positions,
            count,
            count_rng: StdRng::seed_from_u64(count_seed),
            position_rng: StdRng::seed_from_u64(position_seed),
        })
    }

    pub fn spot(&self) -> &GaussianSpot {
        &self.spot
    }

    pub fn expected_adu(&self) -> f64 {
        self.expected_adu
    }

    /// Probability grid in percent, outside cell included
    pub fn probabilities(&self) -> &Grid<f64> {
        &self.probabilities
    }

    /// Draw a Poisson detection count and scatter it over `simels`.
    ///
    /// Returns the number of detections drawn.
    pub fn draw_detections(&mut self, simels: &mut Grid<u32>) -> Result<u64, GridError> {
        let detections = match &self.count {
            Some(poisson) => {
                let n: f64 = poisson.sample(&mut self.count_rng);
                n as u64
            }
            None => 0,
        };

        for _ in 0..detections {
            let index = self.positions.sample(&mut self.position_rng);
            let cell = simels.at_mut(index)?;
            *cell = cell.saturating_add(1);
        }

        Ok(detections)
    }

    /// Add the expected (noise-free) counts at pixel scale into `pixels`.
    pub fn add_expected(&self, pixels: &mut Grid<f64>) {
        let profile = self.spot.profile(1);
        let scale = self.expected_adu / PROBABILITY_SCALE;
        for ((y, x), value) in pixels.cells_mut().indexed_iter_mut() {
            *value += scale * profile.density(x as f64, y as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn source_at(cx: f64, cy: f64, fwhm: f64, size: usize, simels: usize) -> Source {
        Source::new(
            GaussianSpot::new(cx, cy, fwhm, fwhm),
            1000.0,
            (size * simels, size * simels),
            simels,
            (1, 2),
        )
        .unwrap()
    }

    #[test]
    fn test_profile_centering() {
        let spot = GaussianSpot::new(3.0, 4.0, 2.3548, 4.7096);
        let single = spot.profile(1);
        assert_relative_eq!(single.center_x, 3.0);
        assert_relative_eq!(single.center_y, 4.0);
        assert_relative_eq!(single.sigma_x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(single.sigma_y, 2.0, epsilon = 1e-12);

        // Pixel 3 spans simels 30..40, with its center between simels 34 and 35
        let fine = spot.profile(10);
        assert_relative_eq!(fine.center_x, 34.5);
        assert_relative_eq!(fine.sigma_x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interior_source_mass() {
        let source = source_at(16.0, 16.0, 4.0, 32, 1);
        let probabilities = source.probabilities();
        assert_relative_eq!(probabilities.total(), 100.0, epsilon = 1e-6);
        assert!(*probabilities.outside() < 1e-6);
        assert_relative_eq!(probabilities.total_with_outside(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_edge_source_spills_outside() {
        let source = source_at(0.0, 16.0, 4.0, 32, 1);
        let probabilities = source.probabilities();
        // The column under the center stays inside, so a bit under half spills
        assert!(*probabilities.outside() > 30.0 && *probabilities.outside() < 50.0);
        assert_relative_eq!(probabilities.total_with_outside(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_far_outside_source_is_all_outside() {
        let source = Source::new(
            GaussianSpot::new(-500.0, 900.0, 3.0, 3.0),
            500.0,
            (32, 32),
            1,
            (5, 6),
        )
        .unwrap();
        assert!(source.probabilities().total() < 1e-12);
        assert_relative_eq!(*source.probabilities().outside(), 100.0, epsilon = 1e-9);

        let mut simels = Grid::new(32, 32);
        let mut source = source;
        let drawn = source.draw_detections(&mut simels).unwrap();
        assert_eq!(simels.total(), 0.0);
        assert_eq!(*simels.outside() as u64, drawn);
    }

    #[test]
    fn test_draw_detections_conserves_count() {
        let mut source = source_at(10.3, 12.8, 3.0, 24, 3);
        let mut simels = Grid::new(72, 72);
        let drawn = source.draw_detections(&mut simels).unwrap();
        assert_relative_eq!(simels.total_with_outside(), drawn as f64);
        // Poisson around 1000
        assert!(drawn > 850 && drawn < 1150, "drew {drawn}");
    }

    #[test]
    fn test_draws_reproducible() {
        let mut a = source_at(8.0, 8.0, 3.0, 16, 1);
        let mut b = source_at(8.0, 8.0, 3.0, 16, 1);
        let mut grid_a = Grid::new(16, 16);
        let mut grid_b = Grid::new(16, 16);
        a.draw_detections(&mut grid_a).unwrap();
        b.draw_detections(&mut grid_b).unwrap();
        assert_eq!(grid_a, grid_b);
    }

    #[test]
    fn test_zero_expected_never_draws() {
        let mut source = Source::new(GaussianSpot::new(4.0, 4.0, 2.0, 2.0), 0.0, (8, 8), 1, (1, 1))
            .unwrap();
        let mut simels = Grid::new(8, 8);
        assert_eq!(source.draw_detections(&mut simels).unwrap(), 0);
    }

    #[test]
    fn test_invalid_fwhm() {
        let result = Source::new(GaussianSpot::new(4.0, 4.0, 0.0, 2.0), 10.0, (8, 8), 1, (1, 1));
        assert!(matches!(result, Err(FrameError::InvalidFwhm { .. })));
    }

    #[test]
    fn test_add_expected_scales_density() {
        let source = source_at(12.0, 12.0, 5.0, 24, 1);
        let mut pixels = Grid::new(24, 24);
        source.add_expected(&mut pixels);
        assert_relative_eq!(pixels.total(), 1000.0, epsilon = 0.01);
        let peak = *pixels.get(12, 12).unwrap();
        assert_eq!(pixels.max(), Some(peak));
    }
}
