//! Per-pixel detector noise fields.
//!
//! Provides the two independent noise sources added to a synthetic frame:
//! - Dark current: Poisson counts with a fixed per-pixel mean
//! - Read noise: Gaussian around a bias offset, clipped at zero and rounded
//!
//! Both return integer count fields with shape `(height, width)` so they can
//! be added directly onto a detector grid. Every generator takes an optional
//! seed; `None` draws one from the thread generator.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoiseError {
    #[error("Dark count mean must be finite and non-negative, got {0}")]
    InvalidDarkMean(f64),
    #[error("Read noise parameters invalid (mean {mean}, sigma {sigma}): {reason}")]
    InvalidReadNoise { mean: f64, sigma: f64, reason: String },
}

fn seeded(rng_seed: Option<u64>) -> StdRng {
    StdRng::seed_from_u64(rng_seed.unwrap_or(rng().next_u64()))
}

/// Generate Poisson dark counts with mean `dark_mean` for every pixel.
///
/// A zero mean yields an all-zero field.
pub fn dark_count_field(
    width: usize,
    height: usize,
    dark_mean: f64,
    rng_seed: Option<u64>,
) -> Result<Array2<u32>, NoiseError> {
    if !dark_mean.is_finite() || dark_mean < 0.0 {
        return Err(NoiseError::InvalidDarkMean(dark_mean));
    }
    if dark_mean == 0.0 {
        return Ok(Array2::zeros((height, width)));
    }

    let poisson = Poisson::new(dark_mean).map_err(|_| NoiseError::InvalidDarkMean(dark_mean))?;
    let mut rng = seeded(rng_seed);

    Ok(Array2::from_shape_fn((height, width), |_| {
        let counts: f64 = poisson.sample(&mut rng);
        counts as u32
    }))
}

/// Generate read-noise counts drawn from `Normal(mean, sigma)`.
///
/// Negative draws are clipped to zero before rounding to the nearest count.
pub fn read_count_field(
    width: usize,
    height: usize,
    mean: f64,
    sigma: f64,
    rng_seed: Option<u64>,
) -> Result<Array2<u32>, NoiseError> {
    let normal = Normal::new(mean, sigma).map_err(|e| NoiseError::InvalidReadNoise {
        mean,
        sigma,
        reason: e.to_string(),
    })?;
    let mut rng = seeded(rng_seed);

    Ok(Array2::from_shape_fn((height, width), |_| {
        normal.sample(&mut rng).max(0.0).round() as u32
    }))
}
