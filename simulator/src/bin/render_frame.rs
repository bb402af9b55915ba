//! Render a single synthetic guidance frame and recover its centroid
//!
//! Prints the true and recovered positions and optionally saves the frame
//! as CSV and/or an 8-bit BMP preview.

use std::path::PathBuf;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{rng, RngCore, SeedableRng};
use shared::frame_writer::{write_bmp, write_csv};
use simulator::coordinates::{frame_center, PixelCoordinates};
use simulator::image_proc::{multiple_guess_momentum, Frame, Source};
use simulator::shared_args::SharedSimulationArgs;

#[derive(Parser, Debug)]
#[command(
    name = "Render Frame",
    about = "Renders one guidance camera frame and recovers the source centroid",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    simulation: SharedSimulationArgs,

    /// Source magnitude, applied in every filter
    #[arg(long, default_value_t = 10.0)]
    magnitude: f64,

    /// PSF FWHM along x in pixels
    #[arg(long, default_value_t = 4.0)]
    fwhm_x: f64,

    /// PSF FWHM along y in pixels (defaults to the x value)
    #[arg(long)]
    fwhm_y: Option<f64>,

    /// Source x position (defaults to the frame center)
    #[arg(long)]
    x: Option<f64>,

    /// Source y position (defaults to the frame center)
    #[arg(long)]
    y: Option<f64>,

    /// Render the noise-free expectation instead of a statistical frame
    #[arg(long)]
    noise_free: bool,

    /// Write the frame as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the frame as an 8-bit BMP
    #[arg(long)]
    bmp: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let sim = &args.simulation;

    let telescope = sim.telescope_config();
    let center = frame_center(telescope.width, telescope.height);
    let truth = PixelCoordinates::new(args.x.unwrap_or(center.x), args.y.unwrap_or(center.y));
    let seed = sim.seed.unwrap_or_else(|| rng().next_u64());

    let mut frame = Frame::new(&telescope, sim.exposure.0, Some(seed));
    if let Some(altitude) = sim.altitude {
        frame = frame.with_altitude(altitude)?;
    }
    frame.add_source_with_magnitude(
        truth.x,
        truth.y,
        args.fwhm_x,
        args.fwhm_y.unwrap_or(args.fwhm_x),
        args.magnitude,
    )?;
    frame.generate_frame(!args.noise_free)?;

    println!(
        "{} {}x{} frame, exposure {}, seed {}",
        telescope.name, telescope.width, telescope.height, sim.exposure, seed
    );
    println!(
        "Expected {:.1} ADU, transmission {:.3}, saturated: {}",
        frame.sources().iter().map(Source::expected_adu).sum::<f64>(),
        frame.transmission(),
        frame.is_saturated()
    );

    let mut analysis_rng = StdRng::seed_from_u64(seed);
    let estimate =
        multiple_guess_momentum(frame.pixels(), &sim.centroid_config(), &mut analysis_rng)?;
    let residual = estimate.position - truth;

    println!("True position:      {truth}");
    println!(
        "Recovered position: {} ({} fine iterations{})",
        estimate.position,
        estimate.iterations,
        if estimate.converged { "" } else { ", not converged" }
    );
    println!("Residual:           {residual}");

    if let Some(path) = &args.csv {
        write_csv(frame.pixels(), path)?;
        println!("Frame written to {}", path.display());
    }
    if let Some(path) = &args.bmp {
        write_bmp(frame.pixels(), path)?;
        println!("Preview written to {}", path.display());
    }

    Ok(())
}
