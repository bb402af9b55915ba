//! Image processing utilities shared across simulator components

pub mod noise;

pub use noise::{dark_count_field, read_count_field, NoiseError};
