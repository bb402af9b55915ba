//! Centroid accuracy sweep over source magnitude and PSF width
//!
//! Runs repeated synthesize-and-recover trials for every combination of
//! magnitude and FWHM in the requested ranges and writes the residual
//! scatter (or every recovered position) to a `;`-separated file.

use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use rand::{rng, RngCore};
use simulator::coordinates::{frame_center, PixelCoordinates};
use simulator::monte_carlo::{sweep_bands, write_summary_csv, MonteCarlo};
use simulator::shared_args::{RangeArg, SharedSimulationArgs};

#[derive(Parser, Debug)]
#[command(
    name = "Centroid Sweep",
    about = "Monte-Carlo centroid recovery accuracy versus magnitude and FWHM",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SharedSimulationArgs,

    /// Source magnitudes to sweep (start:stop:step)
    #[arg(long, default_value = "8:12:1")]
    magnitudes: RangeArg,

    /// PSF FWHM values in pixels (start:stop:step), round unless --fwhms-y is given
    #[arg(long, default_value = "3:6:1")]
    fwhms: RangeArg,

    /// Vertical FWHM values paired index-wise with --fwhms
    #[arg(long)]
    fwhms_y: Option<RangeArg>,

    /// Per-filter magnitude offsets added to every swept magnitude (e.g. "0.5,0,-0.3")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    band_offsets: Vec<f64>,

    /// True source x position (defaults to the frame center)
    #[arg(long)]
    x: Option<f64>,

    /// True source y position (defaults to the frame center)
    #[arg(long)]
    y: Option<f64>,

    /// Frames per trial (recovered positions used for the scatter)
    #[arg(long, default_value_t = 20)]
    frames: usize,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Write every recovered position instead of per-trial scatter
    #[arg(long)]
    per_position: bool,

    /// Output file
    #[arg(long, default_value = "centroid_sweep.csv")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    let telescope = args.shared.telescope_config();
    let exposure = args.shared.exposure.0;
    let center = frame_center(telescope.width, telescope.height);
    let truth = PixelCoordinates::new(args.x.unwrap_or(center.x), args.y.unwrap_or(center.y));

    if args.frames < 2 && !args.per_position {
        warn!("Fewer than two frames per trial, residual scatter will be empty");
    }

    let fwhm_x = args.fwhms.values();
    let fwhm_y = match &args.fwhms_y {
        Some(range) => range.values(),
        None => fwhm_x.clone(),
    };
    if fwhm_x.len() != fwhm_y.len() {
        return Err(format!(
            "--fwhms yields {} values but --fwhms-y yields {}",
            fwhm_x.len(),
            fwhm_y.len()
        )
        .into());
    }
    let fwhms: Vec<(f64, f64)> = fwhm_x.into_iter().zip(fwhm_y).collect();

    let filter_count = telescope.filters.len();
    let offsets = if args.band_offsets.is_empty() {
        vec![0.0; filter_count]
    } else if args.band_offsets.len() == filter_count {
        args.band_offsets.clone()
    } else {
        return Err(format!(
            "{} band offsets given for {} filters",
            args.band_offsets.len(),
            filter_count
        )
        .into());
    };
    let bands: Vec<Vec<f64>> = args
        .magnitudes
        .values()
        .into_iter()
        .map(|m| offsets.iter().map(|offset| m + offset).collect())
        .collect();

    let trials = sweep_bands(&bands, &fwhms, &vec![truth; args.frames]);

    let seed = args.shared.seed.unwrap_or_else(|| rng().next_u64());
    println!(
        "{}: {} trials x {} frames, exposure {}, {} threads, seed {}",
        telescope.name,
        trials.len(),
        args.frames,
        args.shared.exposure,
        threads,
        seed
    );

    let driver = MonteCarlo::new(&telescope, exposure, seed)
        .with_centroid(args.shared.centroid_config())
        .with_altitude(args.shared.altitude)
        .with_progress(true);
    let outcomes = driver.run(&trials)?;

    for outcome in &outcomes {
        if outcome.saturated > 0 {
            warn!(
                "Magnitude {:?} FWHM {}: {} saturated frames",
                outcome.parameters.magnitudes.first(),
                outcome.parameters.fwhm_x,
                outcome.saturated
            );
        }
        if outcome.undetected > 0 {
            warn!(
                "Magnitude {:?} FWHM {}: {} of {} frames had no detectable signal",
                outcome.parameters.magnitudes.first(),
                outcome.parameters.fwhm_x,
                outcome.undetected,
                outcome.recovered.len()
            );
        }
        if outcome.unconverged > 0 {
            info!(
                "Magnitude {:?} FWHM {}: {} frames did not converge",
                outcome.parameters.magnitudes.first(),
                outcome.parameters.fwhm_x,
                outcome.unconverged
            );
        }
    }

    write_summary_csv(&args.output, &telescope, exposure, &outcomes, args.per_position)?;
    println!("Results written to {}", args.output.display());

    Ok(())
}
