//! Frame output to CSV and grayscale bitmap.
//!
//! CSV layout: a `width;height` header line followed by one comma-separated
//! line per pixel row, top row first. Bitmaps are 8-bit grayscale; values
//! above 255 are clamped so deep sensors still produce a viewable image.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use thiserror::Error;

use crate::grid::Grid;

#[derive(Error, Debug)]
pub enum FrameWriteError {
    #[error("I/O error writing frame: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Write the addressable cells of `grid` as CSV.
pub fn write_csv<P: AsRef<Path>>(grid: &Grid<u32>, path: P) -> Result<(), FrameWriteError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{};{}", grid.width(), grid.height())?;

    for row in grid.cells().rows() {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{line}")?;
    }

    out.flush()?;
    Ok(())
}

/// Convert a frame grid to an 8-bit grayscale image, clamping at 255.
///
/// Grid cell `(x, y)` maps to image pixel `(x, y)`.
pub fn to_gray_image(grid: &Grid<u32>) -> GrayImage {
    let cells = grid.cells();
    GrayImage::from_fn(grid.width() as u32, grid.height() as u32, |x, y| {
        Luma([cells[[y as usize, x as usize]].min(u8::MAX as u32) as u8])
    })
}

/// Write the frame as an uncompressed grayscale BMP.
pub fn write_bmp<P: AsRef<Path>>(grid: &Grid<u32>, path: P) -> Result<(), FrameWriteError> {
    to_gray_image(grid).save_with_format(path, ImageFormat::Bmp)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn sample_grid() -> Grid<u32> {
        Grid::from_array(Array2::from_shape_vec((2, 3), vec![0, 1, 2, 300, 4, 70000]).unwrap())
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.csv");
        write_csv(&sample_grid(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "3;2\n0,1,2\n300,4,70000\n");
    }

    #[test]
    fn test_gray_image_clamps() {
        let img = to_gray_image(&sample_grid());
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 0)[0], 2);
        assert_eq!(img.get_pixel(0, 1)[0], 255);
        assert_eq!(img.get_pixel(2, 1)[0], 255);
    }

    #[test]
    fn test_bmp_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.bmp");
        write_bmp(&sample_grid(), &path).unwrap();

        let decoded = image::open(&path).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(1, 1)[0], 4);
    }
}
