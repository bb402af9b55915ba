//! Photometric band definitions for the guidance camera

/// A photometric passband described by its center, width and zero point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Filter {
    pub name: &'static str,
    /// Center wavelength in nanometers
    pub center_nm: f64,
    /// Full bandwidth in nanometers
    pub bandwidth_nm: f64,
    /// Flux of a magnitude-zero source in Jansky
    pub zero_point_jy: f64,
}

impl Filter {
    pub const fn new(
        name: &'static str,
        center_nm: f64,
        bandwidth_nm: f64,
        zero_point_jy: f64,
    ) -> Self {
        Self {
            name,
            center_nm,
            bandwidth_nm,
            zero_point_jy,
        }
    }

    /// Fractional bandwidth `Δλ / λ`
    pub fn fractional_bandwidth(&self) -> f64 {
        self.bandwidth_nm / self.center_nm
    }
}

/// Johnson B
pub const B: Filter = Filter::new("B", 440.0, 96.8, 4260.0);
/// Johnson V
pub const V: Filter = Filter::new("V", 550.0, 88.0, 3640.0);
/// Johnson R
pub const R: Filter = Filter::new("R", 640.0, 147.2, 3080.0);
