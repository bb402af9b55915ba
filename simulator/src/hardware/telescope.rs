//! Telescope and guidance camera configuration
//!
//! A [`TelescopeConfig`] bundles everything the frame synthesizer needs
//! about the optical train and detector: collecting area, throughput,
//! detector geometry and noise characteristics, and the bands the guidance
//! camera integrates over. Configurations are immutable once built; the
//! `with_*` methods return modified copies.

use std::f64::consts::PI;

use crate::hardware::dark_current::DarkCurrentEstimator;
use crate::hardware::filter::Filter;
use crate::photometry::radiometry::{obstruction_fraction, reflection_efficiency};
use crate::units::{Length, LengthExt, Temperature};

#[derive(Debug, Clone, PartialEq)]
pub struct TelescopeConfig {
    pub name: String,
    /// Simulation elements per pixel side (`simels × simels` per pixel)
    pub simels: usize,
    pub aperture: Length,
    pub secondary: Length,
    /// Atmospheric extinction in magnitudes per airmass (0 in space)
    pub extinction_coefficient: f64,
    /// Number of reflections between the sky and the detector
    pub mirrors: u32,
    pub reflectivity: f64,
    /// Detector quantum efficiency averaged over the bands
    pub quantum_efficiency: f64,
    /// Electrons per ADU
    pub gain: f64,
    pub width: usize,
    pub height: usize,
    pub bit_depth: u32,
    pub dark_current: DarkCurrentEstimator,
    /// Read noise in electrons RMS
    pub read_noise: f64,
    /// Bias offset in electrons
    pub bias_offset: f64,
    pub operating_temperature: Temperature,
    pub emissivity: f64,
    pub filters: Vec<Filter>,
}

impl TelescopeConfig {
    /// Largest value a pixel can hold
    pub fn max_adu(&self) -> u32 {
        let levels = 1u64 << self.bit_depth.min(32);
        (levels - 1).min(u32::MAX as u64) as u32
    }

    /// Unobstructed collecting area in square meters
    pub fn clear_aperture_area(&self) -> f64 {
        let radius = self.aperture.as_meters() / 2.0;
        PI * radius * radius * (1.0 - obstruction_fraction(self.aperture, self.secondary))
    }

    /// Combined throughput of mirrors and detector
    pub fn throughput(&self) -> f64 {
        reflection_efficiency(self.reflectivity, self.mirrors) * self.quantum_efficiency
    }

    /// Dark current in e-/px/s at the configured operating temperature
    pub fn dark_current_at_operating_temperature(&self) -> f64 {
        self.dark_current
            .estimate_at_temperature(self.operating_temperature)
    }

    pub fn with_frame_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_simels(mut self, simels: usize) -> Self {
        self.simels = simels;
        self
    }

    pub fn with_operating_temperature(mut self, temperature: Temperature) -> Self {
        self.operating_temperature = temperature;
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    /// Detector noise parameters in electrons
    pub fn with_noise(mut self, dark_current: DarkCurrentEstimator, read_noise: f64) -> Self {
        self.dark_current = dark_current;
        self.read_noise = read_noise;
        self
    }

    pub fn with_bias_offset(mut self, bias_offset: f64) -> Self {
        self.bias_offset = bias_offset;
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: u32) -> Self {
        self.bit_depth = bit_depth;
        self
    }
}

/// Built-in instrument presets
pub mod models {
    use super::*;
    use crate::hardware::filter::{B, R, V};
    use crate::units::TemperatureExt;
    use once_cell::sync::Lazy;

    /// Twinkle space telescope fine guidance sensor (E2V CCD230-42)
    pub static TWINKLE: Lazy<TelescopeConfig> = Lazy::new(|| TelescopeConfig {
        name: "Twinkle".to_string(),
        simels: 1,
        aperture: Length::from_millimeters(450.0),
        secondary: Length::from_millimeters(85.0),
        extinction_coefficient: 0.0,
        mirrors: 5,
        reflectivity: 0.94,
        quantum_efficiency: 0.65,
        gain: 1.0,
        width: 1024,
        height: 1024,
        bit_depth: 16,
        dark_current: DarkCurrentEstimator::at_freezing(2.8761),
        read_noise: 4.0,
        bias_offset: 0.0,
        operating_temperature: Temperature::from_kelvin(250.0),
        emissivity: 0.02,
        filters: vec![B, V, R],
    });

    /// 20 cm ground-based test telescope
    pub static TWENTY_CM: Lazy<TelescopeConfig> = Lazy::new(|| TelescopeConfig {
        name: "Twenty Cm".to_string(),
        simels: 1,
        aperture: Length::from_millimeters(200.0),
        secondary: Length::from_millimeters(63.0),
        extinction_coefficient: 0.35,
        mirrors: 2,
        reflectivity: 0.94,
        quantum_efficiency: 0.5,
        gain: 0.267,
        width: 1280,
        height: 1024,
        bit_depth: 16,
        dark_current: DarkCurrentEstimator::at_freezing(0.1),
        read_noise: 4.0,
        bias_offset: 0.0,
        operating_temperature: Temperature::from_kelvin(273.0),
        emissivity: 0.02,
        filters: vec![B, V, R],
    });
}

#[cfg(test)]
mod tests {
    use super::models::{TWENTY_CM, TWINKLE};
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_max_adu() {
        assert_eq!(TWINKLE.max_adu(), 65535);
        assert_eq!(TWINKLE.clone().with_bit_depth(8).max_adu(), 255);
        assert_eq!(TWINKLE.clone().with_bit_depth(32).max_adu(), u32::MAX);
        assert_eq!(TWINKLE.clone().with_bit_depth(0).max_adu(), 0);
    }

    #[test]
    fn test_clear_aperture_area() {
        let expected = PI * 0.225 * 0.225 * (1.0 - (85.0_f64 / 450.0).powi(2));
        assert_relative_eq!(TWINKLE.clear_aperture_area(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_throughput() {
        assert_relative_eq!(
            TWINKLE.throughput(),
            0.94_f64.powi(5) * 0.65,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            TWENTY_CM.throughput(),
            0.94_f64.powi(2) * 0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_cooled_twinkle_dark_current() {
        let dark = TWINKLE.dark_current_at_operating_temperature();
        assert!(dark < 2.8761 && dark > 0.2, "got {dark}");
    }

    #[test]
    fn test_builders_leave_preset_untouched() {
        let small = TWINKLE.clone().with_frame_size(64, 48).with_simels(3);
        assert_eq!((small.width, small.height, small.simels), (64, 48, 3));
        assert_eq!((TWINKLE.width, TWINKLE.height, TWINKLE.simels), (1024, 1024, 1));
    }
}
