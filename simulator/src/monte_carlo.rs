//! Monte-Carlo sweeps of frame synthesis and centroid recovery.
//!
//! Each trial renders one source per true position on its own statistical
//! frame, recovers it, and summarizes the residual scatter. Trials run on
//! the rayon pool and own all of their state; per-trial seeds derive from a
//! base seed and the trial index so a sweep is reproducible regardless of
//! scheduling.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use shared::stats::sample_std_dev;
use thiserror::Error;

use crate::coordinates::{residuals, CoordinateError, PixelCoordinates};
use crate::hardware::telescope::TelescopeConfig;
use crate::image_proc::centroid::{multiple_guess_momentum, CentroidConfig, CentroidError};
use crate::image_proc::frame::{Frame, FrameError};

#[derive(Error, Debug)]
pub enum MonteCarloError {
    #[error("Frame synthesis failed: {0}")]
    Frame(#[from] FrameError),
    #[error("Centroid recovery failed: {0}")]
    Centroid(#[from] CentroidError),
    #[error("Residual computation failed: {0}")]
    Coordinates(#[from] CoordinateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs of one trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialParameters {
    /// One magnitude per telescope filter
    pub magnitudes: Vec<f64>,
    pub fwhm_x: f64,
    pub fwhm_y: f64,
    /// True source positions, one frame each
    pub positions: Vec<PixelCoordinates>,
}

/// Results of one trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub parameters: TrialParameters,
    /// Recovered positions, paired with `parameters.positions`; `None` where
    /// no pixel rose above the detection threshold
    pub recovered: Vec<Option<PixelCoordinates>>,
    /// Mean ADU the source delivers after atmospheric extinction
    pub expected_adu: f64,
    /// Sample standard deviation of the x residuals over detected frames
    /// (needs two detections)
    pub std_x: Option<f64>,
    pub std_y: Option<f64>,
    pub unconverged: usize,
    pub saturated: usize,
    pub undetected: usize,
}

/// Cartesian product of magnitudes and (round) FWHMs.
///
/// Each magnitude is broadcast to all `filter_count` bands. Magnitudes vary
/// slowest.
pub fn sweep(
    magnitudes: &[f64],
    fwhms: &[f64],
    positions: &[PixelCoordinates],
    filter_count: usize,
) -> Vec<TrialParameters> {
    let bands: Vec<Vec<f64>> = magnitudes
        .iter()
        .map(|&m| vec![m; filter_count.max(1)])
        .collect();
    let fwhms: Vec<(f64, f64)> = fwhms.iter().map(|&f| (f, f)).collect();
    sweep_bands(&bands, &fwhms, positions)
}

/// Cartesian product of per-band magnitude sets and `(fwhm_x, fwhm_y)` pairs.
///
/// Every entry of `band_magnitudes` holds one magnitude per filter.
/// Magnitude sets vary slowest.
pub fn sweep_bands(
    band_magnitudes: &[Vec<f64>],
    fwhms: &[(f64, f64)],
    positions: &[PixelCoordinates],
) -> Vec<TrialParameters> {
    band_magnitudes
        .iter()
        .flat_map(|magnitudes| {
            fwhms.iter().map(move |&(fwhm_x, fwhm_y)| TrialParameters {
                magnitudes: magnitudes.clone(),
                fwhm_x,
                fwhm_y,
                positions: positions.to_vec(),
            })
        })
        .collect()
}

/// Driver for a batch of trials on one instrument
#[derive(Debug, Clone)]
pub struct MonteCarlo<'a> {
    pub telescope: &'a TelescopeConfig,
    pub exposure: Duration,
    pub centroid: CentroidConfig,
    /// Observing altitude in degrees, `None` observes without an atmosphere
    pub altitude: Option<f64>,
    pub base_seed: u64,
    pub show_progress: bool,
}

impl<'a> MonteCarlo<'a> {
    pub fn new(telescope: &'a TelescopeConfig, exposure: Duration, base_seed: u64) -> Self {
        Self {
            telescope,
            exposure,
            centroid: CentroidConfig::default(),
            altitude: None,
            base_seed,
            show_progress: false,
        }
    }

    pub fn with_centroid(mut self, centroid: CentroidConfig) -> Self {
        self.centroid = centroid;
        self
    }

    pub fn with_altitude(mut self, altitude: Option<f64>) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn trial_seed(&self, index: usize) -> u64 {
        self.base_seed.wrapping_add(index as u64)
    }

    fn frame(&self, rng_seed: u64) -> Result<Frame<'a>, FrameError> {
        let frame = Frame::new(self.telescope, self.exposure, Some(rng_seed));
        match self.altitude {
            Some(altitude) => frame.with_altitude(altitude),
            None => Ok(frame),
        }
    }

    /// Run a single trial; `index` selects its seed.
    ///
    /// Frames without any signal above threshold are counted as undetected
    /// and left out of the residual scatter.
    pub fn run_trial(
        &self,
        index: usize,
        parameters: &TrialParameters,
    ) -> Result<TrialOutcome, MonteCarloError> {
        let mut rng = StdRng::seed_from_u64(self.trial_seed(index));
        let mut frame = self.frame(rng.next_u64())?;

        let mut recovered = Vec::with_capacity(parameters.positions.len());
        let mut expected_adu = 0.0;
        let mut unconverged = 0;
        let mut saturated = 0;
        let mut undetected = 0;

        for position in &parameters.positions {
            frame.reset();
            frame.add_source(
                position.x,
                position.y,
                parameters.fwhm_x,
                parameters.fwhm_y,
                &parameters.magnitudes,
            )?;
            expected_adu = frame.sources().iter().map(|s| s.expected_adu()).sum();
            frame.generate_frame(true)?;
            if frame.is_saturated() {
                saturated += 1;
            }

            match multiple_guess_momentum(frame.pixels(), &self.centroid, &mut rng) {
                Ok(estimate) => {
                    if !estimate.converged {
                        unconverged += 1;
                    }
                    recovered.push(Some(estimate.position));
                }
                Err(CentroidError::NoSignal { threshold }) => {
                    debug!("Trial {index}: no signal above {threshold:.1} at {position}");
                    undetected += 1;
                    recovered.push(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (found, truth): (Vec<PixelCoordinates>, Vec<PixelCoordinates>) = recovered
            .iter()
            .zip(&parameters.positions)
            .filter_map(|(&found, &truth)| found.map(|found| (found, truth)))
            .unzip();
        let residuals = residuals(&found, &truth)?;
        let xs: Vec<f64> = residuals.iter().map(|r| r.x).collect();
        let ys: Vec<f64> = residuals.iter().map(|r| r.y).collect();
        let (std_x, std_y) = (sample_std_dev(&xs), sample_std_dev(&ys));
        debug!(
            "Trial {index}: mags {:?}, fwhm ({}, {}), std ({std_x:?}, {std_y:?}), {undetected} undetected",
            parameters.magnitudes, parameters.fwhm_x, parameters.fwhm_y
        );

        Ok(TrialOutcome {
            parameters: parameters.clone(),
            recovered,
            expected_adu,
            std_x,
            std_y,
            unconverged,
            saturated,
            undetected,
        })
    }

    /// Run all trials in parallel, returning outcomes in input order.
    ///
    /// Undetected frames are reported per trial; only synthesis, recovery and
    /// I/O failures abort the run.
    pub fn run(&self, trials: &[TrialParameters]) -> Result<Vec<TrialOutcome>, MonteCarloError> {
        let pb = if self.show_progress {
            ProgressBar::new(trials.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
        }
        pb.set_message("Running trials");

        let outcomes = trials
            .par_iter()
            .enumerate()
            .map(|(index, parameters)| {
                let outcome = self.run_trial(index, parameters);
                pb.inc(1);
                outcome
            })
            .collect::<Result<Vec<_>, _>>()?;

        pb.finish_with_message("Trials complete");
        info!("Completed {} trials", outcomes.len());
        Ok(outcomes)
    }
}

fn format_row(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:+7.4}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write trial outcomes as `;`-separated text.
///
/// With `per_position` every recovered position gets its own row; otherwise
/// each trial is summarized by its residual standard deviations.
pub fn write_summary_csv<P: AsRef<Path>>(
    path: P,
    telescope: &TelescopeConfig,
    exposure: Duration,
    outcomes: &[TrialOutcome],
    per_position: bool,
) -> Result<(), MonteCarloError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(
        out,
        "Telescope setup name: {} Exposure Time: {:.4} s",
        telescope.name,
        exposure.as_secs_f64()
    )?;

    let mut header: Vec<String> = telescope
        .filters
        .iter()
        .map(|f| format!("mag{}", f.name))
        .collect();
    header.extend(["fwhm_x", "fwhm_y"].map(String::from));
    if per_position {
        header.extend(["in_x", "in_y", "centroid_x", "centroid_y"].map(String::from));
    } else {
        header.extend(["stdev_x", "stdev_y"].map(String::from));
    }
    writeln!(out, "{}", header.join("; "))?;

    for outcome in outcomes {
        let p = &outcome.parameters;
        let mut prefix = p.magnitudes.clone();
        prefix.extend([p.fwhm_x, p.fwhm_y]);

        if per_position {
            for (truth, found) in p.positions.iter().zip(&outcome.recovered) {
                let found = found.unwrap_or(PixelCoordinates::new(f64::NAN, f64::NAN));
                let mut row = prefix.clone();
                row.extend([truth.x, truth.y, found.x, found.y]);
                writeln!(out, "{}", format_row(&row))?;
            }
        } else {
            let mut row = prefix;
            row.extend([
                outcome.std_x.unwrap_or(f64::NAN),
                outcome.std_y.unwrap_or(f64::NAN),
            ]);
            writeln!(out, "{}", format_row(&row))?;
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::dark_current::DarkCurrentEstimator;
    use crate::hardware::telescope::models::{TWENTY_CM, TWINKLE};
    use crate::photometry::atmosphere::extinction_in_percentage;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn positions() -> Vec<PixelCoordinates> {
        vec![
            PixelCoordinates::new(40.3, 50.6),
            PixelCoordinates::new(55.8, 41.2),
            PixelCoordinates::new(47.5, 47.5),
        ]
    }

    #[test]
    fn test_sweep_product_order() {
        let trials = sweep(&[9.0, 10.0], &[3.0, 4.0, 5.0], &positions(), 3);
        assert_eq!(trials.len(), 6);
        assert_eq!(trials[0].magnitudes, vec![9.0; 3]);
        assert_eq!(trials[2].fwhm_x, 5.0);
        assert_eq!(trials[3].magnitudes, vec![10.0; 3]);
        assert_eq!(trials[3].fwhm_y, 3.0);
        assert!(trials.iter().all(|t| t.positions.len() == 3));
    }

    #[test]
    fn test_run_recovers_bright_sources() {
        let telescope = TWINKLE.clone().with_frame_size(96, 96);
        let driver = MonteCarlo::new(&telescope, Duration::from_secs(1), 7);
        let trials = sweep(&[10.0], &[4.0, 5.0], &positions(), 3);

        let outcomes = driver.run(&trials).unwrap();
        assert_eq!(outcomes.len(), 2);
        for (outcome, trial) in outcomes.iter().zip(&trials) {
            assert_eq!(&outcome.parameters, trial);
            assert_eq!(outcome.unconverged, 0);
            assert_eq!(outcome.saturated, 0);
            assert_eq!(outcome.undetected, 0);
            for (found, truth) in outcome.recovered.iter().zip(&trial.positions) {
                let found = found.unwrap();
                assert!((found - *truth).norm() < 0.1, "{found} vs {truth}");
            }
            assert!(outcome.std_x.unwrap() < 0.05);
            assert!(outcome.std_y.unwrap() < 0.05);
        }
    }

    #[test]
    fn test_sweep_bands_keeps_colors_and_elliptical_psfs() {
        let bands = vec![vec![10.5, 10.0, 9.7], vec![12.5, 12.0, 11.7]];
        let trials = sweep_bands(&bands, &[(3.0, 4.5), (5.0, 2.5)], &positions());
        assert_eq!(trials.len(), 4);
        assert_eq!(trials[0].magnitudes, bands[0]);
        assert_eq!((trials[1].fwhm_x, trials[1].fwhm_y), (5.0, 2.5));
        assert_eq!(trials[2].magnitudes, bands[1]);
        assert_eq!((trials[2].fwhm_x, trials[2].fwhm_y), (3.0, 4.5));
    }

    #[test]
    fn test_undetectable_trial_does_not_abort_sweep() {
        let telescope = TWINKLE
            .clone()
            .with_frame_size(96, 96)
            .with_noise(DarkCurrentEstimator::at_freezing(0.0), 0.0);
        let driver = MonteCarlo::new(&telescope, Duration::from_millis(1), 5);
        let trials = sweep(&[10.0, 26.0], &[4.0], &positions(), 3);

        let outcomes = driver.run(&trials).unwrap();
        assert_eq!(outcomes.len(), 2);

        let bright = &outcomes[0];
        assert_eq!(bright.undetected, 0);
        assert!(bright.recovered.iter().all(Option::is_some));
        assert!(bright.std_x.is_some());

        let faint = &outcomes[1];
        assert_eq!(faint.undetected, 3);
        assert!(faint.recovered.iter().all(Option::is_none));
        assert_eq!(faint.std_x, None);
        assert_eq!(faint.std_y, None);
    }

    #[test]
    fn test_altitude_reduces_expected_signal() {
        let telescope = TWENTY_CM.clone().with_frame_size(64, 64);
        let trials = sweep(
            &[9.0],
            &[4.0],
            &[PixelCoordinates::new(31.4, 32.6)],
            telescope.filters.len(),
        );

        let zenith = MonteCarlo::new(&telescope, Duration::from_secs(1), 2)
            .with_altitude(Some(90.0))
            .run(&trials)
            .unwrap();
        let low = MonteCarlo::new(&telescope, Duration::from_secs(1), 2)
            .with_altitude(Some(30.0))
            .run(&trials)
            .unwrap();
        let airless = MonteCarlo::new(&telescope, Duration::from_secs(1), 2)
            .run(&trials)
            .unwrap();

        let k = telescope.extinction_coefficient;
        assert_relative_eq!(
            low[0].expected_adu / airless[0].expected_adu,
            extinction_in_percentage(30.0, k),
            epsilon = 1e-9
        );
        assert!(low[0].expected_adu < zenith[0].expected_adu);
        assert!(zenith[0].expected_adu < airless[0].expected_adu);
    }

    #[test]
    fn test_invalid_altitude_aborts_run() {
        let telescope = TWENTY_CM.clone().with_frame_size(32, 32);
        let driver =
            MonteCarlo::new(&telescope, Duration::from_secs(1), 1).with_altitude(Some(-10.0));
        let trials = sweep(&[9.0], &[4.0], &[PixelCoordinates::new(16.0, 16.0)], 1);
        assert!(matches!(
            driver.run(&trials),
            Err(MonteCarloError::Frame(FrameError::InvalidAltitude(_)))
        ));
    }

    #[test]
    fn test_run_is_reproducible() {
        let telescope = TWINKLE.clone().with_frame_size(64, 64);
        let driver = MonteCarlo::new(&telescope, Duration::from_millis(500), 3);
        let trials = sweep(&[11.0, 12.0], &[4.0], &[PixelCoordinates::new(30.2, 33.9)], 3);

        let first = driver.run(&trials).unwrap();
        let second = driver.run(&trials).unwrap();
        assert_eq!(first, second);
        // A single position has no residual scatter to report
        assert_eq!(first[0].std_x, None);
    }

    #[test]
    fn test_run_propagates_frame_errors() {
        let telescope = TWINKLE.clone().with_frame_size(32, 32);
        let driver = MonteCarlo::new(&telescope, Duration::from_secs(1), 1);
        let trial = TrialParameters {
            magnitudes: vec![],
            fwhm_x: 3.0,
            fwhm_y: 3.0,
            positions: vec![PixelCoordinates::new(16.0, 16.0)],
        };
        assert!(matches!(
            driver.run(&[trial]),
            Err(MonteCarloError::Frame(FrameError::NoMagnitudes))
        ));
    }

    #[test]
    fn test_write_summary_csv() {
        let telescope = TWINKLE.clone();
        let parameters = TrialParameters {
            magnitudes: vec![10.0; 3],
            fwhm_x: 4.0,
            fwhm_y: 4.0,
            positions: vec![PixelCoordinates::new(1.0, 2.0), PixelCoordinates::new(3.0, 4.0)],
        };
        let outcome = TrialOutcome {
            parameters,
            recovered: vec![
                Some(PixelCoordinates::new(1.01, 1.99)),
                Some(PixelCoordinates::new(3.0, 4.02)),
            ],
            expected_adu: 2.5e5,
            std_x: Some(0.0071),
            std_y: Some(0.0212),
            unconverged: 0,
            saturated: 0,
            undetected: 0,
        };

        let dir = tempdir().unwrap();
        let summary = dir.path().join("summary.csv");
        write_summary_csv(&summary, &telescope, Duration::from_secs(1), &[outcome.clone()], false)
            .unwrap();
        let text = std::fs::read_to_string(&summary).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Telescope setup name: Twinkle Exposure Time: 1.0000 s");
        assert_eq!(lines[1], "magB; magV; magR; fwhm_x; fwhm_y; stdev_x; stdev_y");
        assert_eq!(
            lines[2],
            "+10.0000; +10.0000; +10.0000; +4.0000; +4.0000; +0.0071; +0.0212"
        );

        let detail = dir.path().join("detail.csv");
        write_summary_csv(&detail, &telescope, Duration::from_secs(1), &[outcome], true).unwrap();
        let text = std::fs::read_to_string(&detail).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(3).unwrap().ends_with("+3.0000; +4.0000; +3.0000; +4.0200"));
    }
}
