//! Dark current estimation for different sensor temperatures
//!
//! Thermal generation in silicon follows `I(T) ∝ T³ · exp(−E/T)`, with the
//! activation constant `E` expressed in kelvin. The estimator stores one
//! reference point and scales it by the ratio of that law at the target
//! temperature.

use crate::units::{Temperature, TemperatureExt};

/// Activation constant of the thermal generation law, in kelvin
pub const ACTIVATION_KELVIN: f64 = 6400.0;

/// Reference temperature at which estimators are usually specified (0 °C)
pub const REFERENCE_KELVIN: f64 = 273.15;

fn thermal_law(kelvin: f64) -> f64 {
    kelvin.powi(3) * (-ACTIVATION_KELVIN / kelvin).exp()
}

/// Dark current estimator that uses a reference temperature and dark current
/// to predict values at other temperatures.
#[derive(Debug, Clone, PartialEq)]
pub struct DarkCurrentEstimator {
    /// Reference dark current in electrons/pixel/second
    reference_dark_current: f64,
    /// Reference temperature in kelvin
    reference_temp_k: f64,
}

impl DarkCurrentEstimator {
    /// Creates a new dark current estimator with reference values
    ///
    /// # Arguments
    /// * `reference_dark_current` - Dark current in electrons/pixel/second at reference temperature
    /// * `reference_temp` - Reference temperature
    ///
    /// # Example
    /// ```
    /// use simulator::hardware::dark_current::DarkCurrentEstimator;
    /// use simulator::units::{Temperature, TemperatureExt};
    ///
    /// let estimator = DarkCurrentEstimator::new(2.8761, Temperature::from_celsius(0.0));
    /// ```
    pub fn new(reference_dark_current: f64, reference_temp: Temperature) -> Self {
        Self {
            reference_dark_current,
            reference_temp_k: reference_temp.as_kelvin(),
        }
    }

    /// Estimator specified at 0 °C
    pub fn at_freezing(reference_dark_current: f64) -> Self {
        Self {
            reference_dark_current,
            reference_temp_k: REFERENCE_KELVIN,
        }
    }

    pub fn reference_dark_current(&self) -> f64 {
        self.reference_dark_current
    }

    /// Estimates dark current in electrons/pixel/second at a target temperature
    ///
    /// Non-positive absolute temperatures produce no dark current.
    pub fn estimate_at_temperature(&self, target: Temperature) -> f64 {
        let target_k = target.as_kelvin();
        if target_k <= 0.0 || self.reference_temp_k <= 0.0 {
            return 0.0;
        }
        self.reference_dark_current * thermal_law(target_k) / thermal_law(self.reference_temp_k)
    }
}
