//! Detector noise generation for guidance camera frames.
//!
//! Combines the two independent detector noise sources, both converted to
//! ADU through the camera gain:
//! - **Dark current**: Poisson counts, mean scaled to the operating temperature
//! - **Read noise**: Gaussian around the bias offset, clipped at zero

use std::time::Duration;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{rng, RngCore, SeedableRng};
use shared::image_proc::noise::{dark_count_field, read_count_field, NoiseError};

use crate::hardware::telescope::TelescopeConfig;

/// Mean dark count per pixel in ADU accumulated over `exposure`
pub fn dark_adu_mean(telescope: &TelescopeConfig, exposure: &Duration) -> f64 {
    telescope.dark_current_at_operating_temperature() * exposure.as_secs_f64() / telescope.gain
}

/// Generate a combined dark + read noise field in ADU for the whole frame.
///
/// # Arguments
/// * `telescope` - Instrument configuration with detector noise characteristics
/// * `exposure` - Integration time for dark current accumulation
/// * `rng_seed` - Optional seed for reproducible results
///
/// # Returns
/// Noise counts with shape `(height, width)`, never negative
pub fn generate_sensor_noise(
    telescope: &TelescopeConfig,
    exposure: &Duration,
    rng_seed: Option<u64>,
) -> Result<Array2<u32>, NoiseError> {
    let mut seeds = StdRng::seed_from_u64(rng_seed.unwrap_or(rng().next_u64()));

    let dark = dark_count_field(
        telescope.width,
        telescope.height,
        dark_adu_mean(telescope, exposure),
        Some(seeds.next_u64()),
    )?;
    let read = read_count_field(
        telescope.width,
        telescope.height,
        telescope.bias_offset / telescope.gain,
        telescope.read_noise / telescope.gain,
        Some(seeds.next_u64()),
    )?;

    Ok(dark + read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::telescope::models::{TWENTY_CM, TWINKLE};
    use crate::hardware::DarkCurrentEstimator;
    use approx::assert_relative_eq;
    use shared::stats::{mean, sample_std_dev};

    fn values(field: &Array2<u32>) -> Vec<u32> {
        field.iter().copied().collect()
    }

    #[test]
    fn test_generate_sensor_noise_dimensions() {
        let telescope = TWINKLE.clone().with_frame_size(100, 80);
        let noise = generate_sensor_noise(&telescope, &Duration::from_millis(100), Some(42)).unwrap();
        assert_eq!(noise.shape(), &[80, 100]);
    }

    #[test]
    fn test_generate_sensor_noise_reproducible_with_seed() {
        let telescope = TWINKLE.clone().with_frame_size(64, 64);
        let exposure = Duration::from_millis(50);

        let noise1 = generate_sensor_noise(&telescope, &exposure, Some(12345)).unwrap();
        let noise2 = generate_sensor_noise(&telescope, &exposure, Some(12345)).unwrap();
        let noise3 = generate_sensor_noise(&telescope, &exposure, Some(54321)).unwrap();

        assert_eq!(noise1, noise2);
        assert_ne!(noise1, noise3);
    }

    #[test]
    fn test_dark_mean_scales_with_gain_and_exposure() {
        let one_second = dark_adu_mean(&TWENTY_CM, &Duration::from_secs(1));
        let ten_seconds = dark_adu_mean(&TWENTY_CM, &Duration::from_secs(10));
        assert_relative_eq!(ten_seconds, 10.0 * one_second, epsilon = 1e-12);
        assert_relative_eq!(
            one_second,
            TWENTY_CM.dark_current_at_operating_temperature() / 0.267,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_bias_offset_sets_noise_floor() {
        let telescope = TWINKLE
            .clone()
            .with_frame_size(128, 128)
            .with_noise(DarkCurrentEstimator::at_freezing(0.0), 4.0)
            .with_bias_offset(100.0);
        let noise = generate_sensor_noise(&telescope, &Duration::from_secs(1), Some(9)).unwrap();
        let v = values(&noise);

        assert_relative_eq!(mean(&v).unwrap(), 100.0, epsilon = 0.1);
        assert_relative_eq!(sample_std_dev(&v).unwrap(), 4.0, epsilon = 0.1);
    }

    #[test]
    fn test_longer_exposure_adds_dark_counts() {
        // Warm detector so dark current dominates read noise
        let telescope = TWENTY_CM.clone().with_frame_size(128, 128);
        let short = generate_sensor_noise(&telescope, &Duration::from_millis(10), Some(42)).unwrap();
        let long = generate_sensor_noise(&telescope, &Duration::from_secs(100), Some(42)).unwrap();

        assert!(mean(&values(&long)).unwrap() > mean(&values(&short)).unwrap() + 10.0);
    }
}
