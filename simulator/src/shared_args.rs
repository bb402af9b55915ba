//! Command line argument types shared by the simulator binaries

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::hardware::telescope::models::{TWENTY_CM, TWINKLE};
use crate::hardware::TelescopeConfig;
use crate::image_proc::centroid::CentroidConfig;

/// Parse duration string with units (e.g., "1.5s", "150ms", "2000us", "1h", "30m")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    // Extract numeric part and unit
    let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, "ms")
    } else if let Some(n) = s.strip_suffix("us") {
        (n, "us")
    } else if let Some(n) = s.strip_suffix('s') {
        (n, "s")
    } else if let Some(n) = s.strip_suffix('h') {
        (n, "h")
    } else if let Some(n) = s.strip_suffix('m') {
        (n, "m")
    } else {
        // Default to seconds if no unit specified
        (s, "s")
    };

    let value: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid numeric value: {num_str}"))?;

    if !value.is_finite() || value < 0.0 {
        return Err("Duration must be a non-negative number".to_string());
    }

    let nanos_per_unit = match unit {
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return Err(format!("Unknown time unit: {unit}")),
    };

    let nanos = (value * nanos_per_unit).round();
    if nanos > u64::MAX as f64 {
        return Err(format!("Duration too long: {s}"));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

/// Wrapper for Duration that implements Clone and has a nice Display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationArg(pub Duration);

impl FromStr for DurationArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(DurationArg)
    }
}

impl fmt::Display for DurationArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.0;
        let total_ms = duration.as_millis();

        if total_ms >= 1000 && total_ms % 1000 == 0 && duration.subsec_nanos() == 0 {
            write!(f, "{}s", total_ms / 1000)
        } else if total_ms >= 1000 {
            write!(f, "{:.3}s", duration.as_secs_f64())
        } else {
            write!(f, "{total_ms}ms")
        }
    }
}

impl Default for DurationArg {
    fn default() -> Self {
        DurationArg(Duration::from_secs(1))
    }
}

/// Inclusive parameter sweep in `start:stop:step` form.
///
/// `start == stop` yields a single value; the step sign must point from
/// start to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeArg {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl FromStr for RangeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err("Range must be in format 'start:stop:step'".to_string());
        }

        let parse = |name: &str, v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid {name} value: {v}"))
        };
        let start = parse("start", parts[0])?;
        let stop = parse("stop", parts[1])?;
        let step = parse("step", parts[2])?;

        if step == 0.0 || !step.is_finite() {
            return Err("Step must be non-zero".to_string());
        }
        if (stop - start) * step < 0.0 {
            return Err(format!(
                "Step {step} does not lead from {start} to {stop}"
            ));
        }

        Ok(RangeArg { start, stop, step })
    }
}

impl fmt::Display for RangeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.stop, self.step)
    }
}

impl RangeArg {
    /// Every value from start to stop inclusive.
    ///
    /// Values are computed as `start + i·step` so long sweeps do not drift;
    /// a stop within a millionth of a step of the grid is included.
    pub fn values(&self) -> Vec<f64> {
        let steps = ((self.stop - self.start) / self.step + 1e-6).floor().max(0.0) as usize;
        (0..=steps)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

/// Available telescope presets for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TelescopeModel {
    /// Twinkle space telescope, 45 cm aperture - Default
    Twinkle,
    /// 20 cm ground-based test telescope
    TwentyCm,
}

impl fmt::Display for TelescopeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelescopeModel::Twinkle => write!(f, "twinkle"),
            TelescopeModel::TwentyCm => write!(f, "twenty-cm"),
        }
    }
}

impl TelescopeModel {
    /// Get the corresponding TelescopeConfig for the selected model
    pub fn to_config(&self) -> &'static TelescopeConfig {
        match self {
            TelescopeModel::Twinkle => &TWINKLE,
            TelescopeModel::TwentyCm => &TWENTY_CM,
        }
    }
}

/// Common arguments shared across the simulator binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedSimulationArgs {
    /// Telescope preset
    #[arg(long, value_enum, default_value_t = TelescopeModel::Twinkle)]
    pub telescope: TelescopeModel,

    /// Exposure time (e.g., "1s", "500ms", "0.1s")
    #[arg(long, default_value = "1s")]
    pub exposure: DurationArg,

    /// Override the frame width in pixels
    #[arg(long)]
    pub width: Option<usize>,

    /// Override the frame height in pixels
    #[arg(long)]
    pub height: Option<usize>,

    /// Observing altitude in degrees, applies atmospheric extinction
    #[arg(long)]
    pub altitude: Option<f64>,

    /// Minimum centroid window size in pixels
    #[arg(long, default_value_t = 30)]
    pub min_window: usize,

    /// Coarse-stage threshold in background sigmas
    #[arg(long, default_value_t = 4.0)]
    pub sigma: f64,

    /// Final-stage threshold in background sigmas
    #[arg(long, default_value_t = 2.0)]
    pub sigma_final: f64,

    /// Random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SharedSimulationArgs {
    /// Selected preset with the frame size overrides applied
    pub fn telescope_config(&self) -> TelescopeConfig {
        let preset = self.telescope.to_config();
        let width = self.width.unwrap_or(preset.width);
        let height = self.height.unwrap_or(preset.height);
        preset.clone().with_frame_size(width, height)
    }

    pub fn centroid_config(&self) -> CentroidConfig {
        CentroidConfig {
            min_window_size: self.min_window,
            sigma_threshold: self.sigma,
            sigma_threshold_final: self.sigma_final,
            ..CentroidConfig::default()
        }
    }
}
