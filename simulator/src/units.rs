//! Physical quantities used in instrument configuration
//!
//! Re-exports the `uom` SI types the simulator works with and adds small
//! extension traits so configs read in the units astronomers quote them in.

pub use uom::si::f64::Length;
pub use uom::si::f64::ThermodynamicTemperature as Temperature;

use uom::si::length::{meter, millimeter};
use uom::si::thermodynamic_temperature::{degree_celsius, kelvin};

/// Convenience constructors and accessors for [`Length`]
pub trait LengthExt {
    fn from_meters(meters: f64) -> Self;
    fn from_millimeters(millimeters: f64) -> Self;
    fn as_meters(&self) -> f64;
    fn as_millimeters(&self) -> f64;
}

impl LengthExt for Length {
    fn from_meters(meters: f64) -> Self {
        Length::new::<meter>(meters)
    }

    fn from_millimeters(millimeters: f64) -> Self {
        Length::new::<millimeter>(millimeters)
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }

    fn as_millimeters(&self) -> f64 {
        self.get::<millimeter>()
    }
}

/// Convenience constructors and accessors for [`Temperature`]
pub trait TemperatureExt {
    fn from_kelvin(kelvin: f64) -> Self;
    fn from_celsius(celsius: f64) -> Self;
    fn as_kelvin(&self) -> f64;
    fn as_celsius(&self) -> f64;
}

impl TemperatureExt for Temperature {
    fn from_kelvin(value: f64) -> Self {
        Temperature::new::<kelvin>(value)
    }

    fn from_celsius(celsius: f64) -> Self {
        Temperature::new::<degree_celsius>(celsius)
    }

    fn as_kelvin(&self) -> f64 {
        self.get::<kelvin>()
    }

    fn as_celsius(&self) -> f64 {
        self.get::<degree_celsius>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_conversions() {
        let aperture = Length::from_millimeters(450.0);
        assert_relative_eq!(aperture.as_meters(), 0.45, epsilon = 1e-12);
        assert_relative_eq!(Length::from_meters(0.2).as_millimeters(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_temperature_conversions() {
        assert_relative_eq!(Temperature::from_celsius(0.0).as_kelvin(), 273.15, epsilon = 1e-9);
        assert_relative_eq!(Temperature::from_kelvin(250.0).as_celsius(), -23.15, epsilon = 1e-9);
    }
}
