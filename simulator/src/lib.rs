//! Fine guidance sensor (FGS) frame simulator
//!
//! Synthesizes guidance camera frames of point sources imaged through a
//! telescope and detector model, then recovers the source positions with a
//! coarse-to-fine centroid search. The crate is organized as:
//!
//! - [`hardware`]: telescope presets, filters and detector noise
//! - [`photometry`]: band radiometry and atmospheric extinction
//! - [`image_proc`]: source model, frame synthesizer and centroid analyzer
//! - [`monte_carlo`]: parallel sweeps of synthesis and recovery trials
//! - [`shared_args`]: command line argument types shared by the binaries

pub mod coordinates;
pub mod hardware;
pub mod image_proc;
pub mod monte_carlo;
pub mod photometry;
pub mod shared_args;
pub mod units;

pub use coordinates::{frame_center, residuals, PixelCoordinates};
pub use hardware::TelescopeConfig;
pub use image_proc::{CentroidConfig, Frame};
