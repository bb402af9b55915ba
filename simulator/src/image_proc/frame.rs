//! Synthetic guidance camera frames.
//!
//! A [`Frame`] collects point sources and renders them onto the detector
//! grid, either statistically (Poisson photon arrival, binning with
//! saturation and detector noise) or as the smooth noise-free expectation.
//!
//! ```text
//! Created ──add_source──▶ Sources added ──generate_frame──▶ Generated
//!    ▲                                                          │
//!    └───────────────────────────reset──────────────────────────┘
//! ```

use std::time::Duration;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{rng, RngCore, SeedableRng};
use shared::grid::{Grid, GridError};
use shared::image_proc::noise::NoiseError;
use thiserror::Error;

use crate::hardware::sensor_noise::generate_sensor_noise;
use crate::hardware::telescope::TelescopeConfig;
use crate::image_proc::source::{GaussianSpot, Source};
use crate::photometry::atmosphere::extinction_in_percentage;
use crate::photometry::radiometry::{mean_received_adus, RadiometryError};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("A source needs at least one magnitude")]
    NoMagnitudes,
    #[error("FWHM must be positive and finite, got ({fwhm_x}, {fwhm_y})")]
    InvalidFwhm { fwhm_x: f64, fwhm_y: f64 },
    #[error("Radiometry error: {0}")]
    Radiometry(#[from] RadiometryError),
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Distribution error: {0}")]
    Distribution(String),
    #[error("Noise error: {0}")]
    Noise(#[from] NoiseError),
    #[error("Altitude must lie within [0, 90] degrees, got {0}")]
    InvalidAltitude(f64),
}

/// One exposure of the guidance camera
#[derive(Debug)]
pub struct Frame<'a> {
    telescope: &'a TelescopeConfig,
    exposure: Duration,
    transmission: f64,
    pixels: Grid<u32>,
    simels: Grid<u32>,
    sources: Vec<Source>,
    saturated: bool,
    rng: StdRng,
}

impl<'a> Frame<'a> {
    /// Create an empty frame for `telescope`.
    ///
    /// Every generator in the frame derives from `rng_seed`; `None` draws a
    /// seed from the thread generator.
    pub fn new(telescope: &'a TelescopeConfig, exposure: Duration, rng_seed: Option<u64>) -> Self {
        let simels = telescope.simels;
        Self {
            telescope,
            exposure,
            transmission: 1.0,
            pixels: Grid::new(telescope.width, telescope.height),
            simels: Grid::new(telescope.width * simels, telescope.height * simels),
            sources: Vec::new(),
            saturated: false,
            rng: StdRng::seed_from_u64(rng_seed.unwrap_or(rng().next_u64())),
        }
    }

    /// Observe at `altitude_deg`, attenuating every source added afterwards
    /// by the telescope's atmospheric extinction.
    ///
    /// Fails for altitudes below the horizon or past the zenith, where the
    /// airmass is undefined.
    pub fn with_altitude(mut self, altitude_deg: f64) -> Result<Self, FrameError> {
        if !(0.0..=90.0).contains(&altitude_deg) {
            return Err(FrameError::InvalidAltitude(altitude_deg));
        }
        self.transmission =
            extinction_in_percentage(altitude_deg, self.telescope.extinction_coefficient);
        Ok(self)
    }

    /// Add a source with one magnitude per telescope filter.
    ///
    /// A magnitude count that does not match the filters falls back to the
    /// first magnitude in every band.
    pub fn add_source(
        &mut self,
        center_x: f64,
        center_y: f64,
        fwhm_x: f64,
        fwhm_y: f64,
        magnitudes: &[f64],
    ) -> Result<(), FrameError> {
        let first = *magnitudes.first().ok_or(FrameError::NoMagnitudes)?;
        let filters = &self.telescope.filters;

        let broadcast;
        let magnitudes: &[f64] = if magnitudes.len() == filters.len() {
            magnitudes
        } else {
            warn!(
                "Got {} magnitudes for {} filters, using {first} in every band",
                magnitudes.len(),
                filters.len()
            );
            broadcast = vec![first; filters.len()];
            &broadcast
        };

        let expected_adu =
            mean_received_adus(magnitudes, filters, &self.exposure, self.telescope)?
                * self.transmission;

        let source = Source::new(
            GaussianSpot::new(center_x, center_y, fwhm_x, fwhm_y),
            expected_adu,
            (self.simels.width(), self.simels.height()),
            self.telescope.simels,
            (self.rng.next_u64(), self.rng.next_u64()),
        )?;
        debug!(
            "Added source at ({center_x:.3}, {center_y:.3}) expecting {expected_adu:.1} ADU"
        );
        self.sources.push(source);
        Ok(())
    }

    /// Add a source with the same magnitude in every filter
    pub fn add_source_with_magnitude(
        &mut self,
        center_x: f64,
        center_y: f64,
        fwhm_x: f64,
        fwhm_y: f64,
        magnitude: f64,
    ) -> Result<(), FrameError> {
        let magnitudes = vec![magnitude; self.telescope.filters.len().max(1)];
        self.add_source(center_x, center_y, fwhm_x, fwhm_y, &magnitudes)
    }

    /// Render all sources into the pixel grid.
    ///
    /// `statistical` selects photon sampling with detector noise; otherwise
    /// the grid holds the rounded expected counts.
    pub fn generate_frame(&mut self, statistical: bool) -> Result<(), FrameError> {
        self.pixels.reset();
        self.simels.reset();
        self.saturated = false;

        if statistical {
            self.render_statistical()?;
        } else {
            self.render_expected();
        }

        if self.saturated {
            warn!(
                "Frame saturated: pixels clamped at {} ADU",
                self.telescope.max_adu()
            );
        }
        Ok(())
    }

    fn render_statistical(&mut self) -> Result<(), FrameError> {
        for source in &mut self.sources {
            let drawn = source.draw_detections(&mut self.simels)?;
            debug!("Drew {drawn} detections");
        }

        let max_adu = self.telescope.max_adu() as u64;
        let s = self.telescope.simels;
        let simels = self.simels.cells();

        for ((y, x), pixel) in self.pixels.cells_mut().indexed_iter_mut() {
            let mut sum: u64 = 0;
            'bin: for sy in 0..s {
                for sx in 0..s {
                    sum += simels[[y * s + sy, x * s + sx]] as u64;
                    if sum > max_adu {
                        sum = max_adu;
                        self.saturated = true;
                        break 'bin;
                    }
                }
            }
            *pixel = sum as u32;
        }
        *self.pixels.outside_mut() = *self.simels.outside();

        let noise = generate_sensor_noise(self.telescope, &self.exposure, Some(self.rng.next_u64()))?;
        for (pixel, &counts) in self.pixels.cells_mut().iter_mut().zip(noise.iter()) {
            let sum = *pixel as u64 + counts as u64;
            if sum > max_adu {
                *pixel = max_adu as u32;
                self.saturated = true;
            } else {
                *pixel = sum as u32;
            }
        }
        Ok(())
    }

    fn render_expected(&mut self) {
        let mut expected = Grid::<f64>::new(self.pixels.width(), self.pixels.height());
        for source in &self.sources {
            source.add_expected(&mut expected);
        }

        let max_adu = self.telescope.max_adu() as f64;
        for (pixel, &value) in self.pixels.cells_mut().iter_mut().zip(expected.cells().iter()) {
            let rounded = value.round();
            if rounded > max_adu {
                *pixel = max_adu as u32;
                self.saturated = true;
            } else {
                *pixel = rounded as u32;
            }
        }

        let total_expected: f64 = self.sources.iter().map(Source::expected_adu).sum();
        let remainder = (total_expected.round() - self.pixels.total()).max(0.0);
        *self.pixels.outside_mut() = remainder.min(u32::MAX as f64) as u32;
    }

    /// Remove all sources and clear the grids
    pub fn reset(&mut self) {
        self.sources.clear();
        self.pixels.reset();
        self.simels.reset();
        self.saturated = false;
    }

    pub fn pixels(&self) -> &Grid<u32> {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Result<u32, GridError> {
        self.pixels.get(x, y).copied()
    }

    /// True iff at least one pixel was clamped at the ADU ceiling
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn telescope(&self) -> &TelescopeConfig {
        self.telescope
    }

    pub fn exposure(&self) -> Duration {
        self.exposure
    }

    /// Atmospheric transmission applied to new sources
    pub fn transmission(&self) -> f64 {
        self.transmission
    }
}
