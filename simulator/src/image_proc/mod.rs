//! Frame synthesis and centroid recovery

pub mod centroid;
pub mod frame;
pub mod source;

pub use centroid::{
    multiple_guess_momentum, BackgroundMethod, CentroidConfig, CentroidError, CentroidEstimate,
};
pub use frame::{Frame, FrameError};
pub use source::{GaussianSpot, Source};
