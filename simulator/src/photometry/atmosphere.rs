//! Atmospheric extinction for ground-based observing.
//!
//! Airmass uses Pickering's (2002) formula, which stays finite down to the
//! horizon. Extinction is linear in airmass with a site coefficient in
//! magnitudes per airmass.

/// Relative airmass at `altitude_deg` above the horizon
pub fn airmass(altitude_deg: f64) -> f64 {
    let apparent = altitude_deg + 244.0 / (165.0 + 47.0 * altitude_deg.powf(1.1));
    1.0 / apparent.to_radians().sin()
}

/// Extinction in magnitudes along the line of sight
pub fn extinction_in_mags(altitude_deg: f64, coefficient: f64) -> f64 {
    coefficient * airmass(altitude_deg)
}

/// Fraction of the flux that survives the atmosphere (1 means no extinction)
pub fn extinction_in_percentage(altitude_deg: f64, coefficient: f64) -> f64 {
    10f64.powf(-0.4 * extinction_in_mags(altitude_deg, coefficient))
}
