//! Shared components for the FGS simulator
//!
//! Frame-agnostic building blocks: the [`grid::Grid`] container used for
//! detector frames and probability maps, detector noise fields, summary
//! statistics and (behind the `frame-writer` feature) frame output.

pub mod grid;
pub mod image_proc;
pub mod stats;

#[cfg(feature = "frame-writer")]
pub mod frame_writer;

pub use grid::{Grid, GridError, SubGrid};
