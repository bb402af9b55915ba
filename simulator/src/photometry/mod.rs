//! Photometry models: band radiometry and atmospheric extinction

pub mod atmosphere;
pub mod radiometry;

pub use atmosphere::{airmass, extinction_in_mags, extinction_in_percentage};
pub use radiometry::{
    mean_received_adus, mean_received_photons, photons_in_band, photons_in_bands,
    RadiometryError,
};
