//! Band radiometry: from stellar magnitudes to detected counts.
//!
//! Flux of a source of magnitude `m` in a band is
//! `2.512^(−m) × 1.51e7 × F0 × Δλ/λ` photons s⁻¹ m⁻², with `F0` the band's
//! zero-point flux in Jansky. The received count then folds in the clear
//! aperture, mirror reflections, detector quantum efficiency and exposure.

use std::time::Duration;

use thiserror::Error;

use crate::hardware::filter::Filter;
use crate::hardware::telescope::TelescopeConfig;
use crate::units::{Length, LengthExt};

/// Photons s⁻¹ m⁻² per Jansky per unit fractional bandwidth
pub const PHOTONS_PER_JANSKY: f64 = 1.51e7;

/// Pogson ratio between successive magnitudes
pub const POGSON_RATIO: f64 = 2.512;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RadiometryError {
    #[error("No magnitudes or filters given")]
    Empty,
    #[error("Got {magnitudes} magnitudes for {filters} filters")]
    LengthMismatch { magnitudes: usize, filters: usize },
}

/// Photon flux at the top of the telescope in photons s⁻¹ m⁻²
pub fn photons_in_band(magnitude: f64, filter: &Filter) -> f64 {
    POGSON_RATIO.powf(-magnitude)
        * PHOTONS_PER_JANSKY
        * filter.zero_point_jy
        * filter.fractional_bandwidth()
}

/// Sum of [`photons_in_band`] over paired magnitudes and filters
pub fn photons_in_bands(magnitudes: &[f64], filters: &[Filter]) -> Result<f64, RadiometryError> {
    if magnitudes.is_empty() || filters.is_empty() {
        return Err(RadiometryError::Empty);
    }
    if magnitudes.len() != filters.len() {
        return Err(RadiometryError::LengthMismatch {
            magnitudes: magnitudes.len(),
            filters: filters.len(),
        });
    }

    Ok(magnitudes
        .iter()
        .zip(filters)
        .map(|(&m, f)| photons_in_band(m, f))
        .sum())
}

/// Fraction of the primary area blocked by the secondary
pub fn obstruction_fraction(primary: Length, secondary: Length) -> f64 {
    let ratio = secondary.as_meters() / primary.as_meters();
    ratio * ratio
}

/// Throughput of `mirrors` reflections at `reflectivity` each
pub fn reflection_efficiency(reflectivity: f64, mirrors: u32) -> f64 {
    reflectivity.powi(mirrors as i32)
}

/// Mean photons detected over `exposure` (already scaled by QE)
pub fn mean_received_photons(
    magnitudes: &[f64],
    filters: &[Filter],
    exposure: &Duration,
    telescope: &TelescopeConfig,
) -> Result<f64, RadiometryError> {
    let flux = photons_in_bands(magnitudes, filters)?;
    Ok(flux * telescope.clear_aperture_area() * telescope.throughput() * exposure.as_secs_f64())
}

/// Mean detected counts in ADU over `exposure`
pub fn mean_received_adus(
    magnitudes: &[f64],
    filters: &[Filter],
    exposure: &Duration,
    telescope: &TelescopeConfig,
) -> Result<f64, RadiometryError> {
    Ok(mean_received_photons(magnitudes, filters, exposure, telescope)? / telescope.gain)
}
