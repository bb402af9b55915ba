//! Hardware module for telescope and detector configurations

pub mod dark_current;
pub mod filter;
pub mod sensor_noise;
pub mod telescope;

pub use dark_current::DarkCurrentEstimator;
pub use filter::Filter;
pub use telescope::TelescopeConfig;
