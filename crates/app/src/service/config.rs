//! Configuration parsing for the plane service.
//!
//! CLI arguments are translated once into a `ServiceConfig`; request handlers
//! only ever see the resolved, read-only engine settings.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Args;
use engine_bridge::{DetectionParameters, EngineConfig};

/// Engine location when neither `--engine` nor `PLANE_ENGINE` is given.
pub const DEFAULT_ENGINE_PATH: &str = "build/stdin_planes";
pub const DEFAULT_PORT: u16 = 8555;

const BYTES_PER_MIB: usize = 1024 * 1024;

#[derive(Clone, Debug)]
/// Settings shared by the HTTP server and its workers.
pub struct ServiceConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Resolved engine path and wait bound.
    pub engine: EngineConfig,
    /// Actix worker count; `None` uses one per physical core.
    pub workers: Option<usize>,
    /// Largest accepted request body.
    pub max_payload_bytes: usize,
    /// Telemetry and instrumentation options.
    pub telemetry: TelemetryOptions,
}

#[derive(Clone, Debug, Default)]
/// Optional telemetry knobs for tracing.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing request spans.
    pub chrome_trace_path: Option<PathBuf>,
}

/// Engine selection shared by every subcommand.
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Path to the plane-detection engine executable.
    #[arg(
        long = "engine",
        env = "PLANE_ENGINE",
        value_name = "PATH",
        default_value = DEFAULT_ENGINE_PATH
    )]
    pub engine: PathBuf,
    /// Seconds to wait for the engine before killing it.
    #[arg(long = "engine-timeout-secs", value_name = "SECS", default_value_t = 120)]
    pub engine_timeout_secs: u64,
}

impl TryFrom<EngineArgs> for EngineConfig {
    type Error = anyhow::Error;

    fn try_from(args: EngineArgs) -> Result<Self> {
        if args.engine_timeout_secs == 0 {
            bail!("--engine-timeout-secs must be at least 1");
        }
        let path = if args.engine.is_absolute() {
            args.engine
        } else {
            std::env::current_dir()
                .context("Failed to read current directory while resolving engine path")?
                .join(args.engine)
        };
        Ok(EngineConfig::new(path).with_timeout(Duration::from_secs(args.engine_timeout_secs)))
    }
}

/// Optional engine tuning flags for one-shot runs.
#[derive(Debug, Default, Args)]
pub struct TuningArgs {
    /// Minimum normal-angle difference in degrees.
    #[arg(long = "min-normal-diff", value_name = "DEG")]
    pub min_normal_diff: Option<f64>,
    /// Maximum distance.
    #[arg(long = "max-dist", value_name = "V")]
    pub max_dist: Option<f64>,
    /// Maximum outlier ratio (0-1).
    #[arg(long = "outlier-ratio", value_name = "RATIO")]
    pub outlier_ratio: Option<f64>,
    /// Minimum inlier points per plane.
    #[arg(long = "min-num-points", value_name = "N", allow_negative_numbers = true)]
    pub min_num_points: Option<i64>,
    /// Neighbour count for local consistency checks.
    #[arg(long = "nr-neighbors", value_name = "N", allow_negative_numbers = true)]
    pub nr_neighbors: Option<i64>,
    /// Cap on returned planes.
    #[arg(long = "max-planes", value_name = "N", allow_negative_numbers = true)]
    pub max_planes: Option<i64>,
}

impl From<TuningArgs> for DetectionParameters {
    fn from(args: TuningArgs) -> Self {
        DetectionParameters {
            min_normal_diff: args.min_normal_diff,
            max_dist: args.max_dist,
            outlier_ratio: args.outlier_ratio,
            min_num_points: args.min_num_points,
            nr_neighbors: args.nr_neighbors,
            max_planes: args.max_planes,
        }
    }
}

/// CLI arguments accepted by the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Interface to bind.
    #[arg(long = "host", value_name = "ADDR", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind.
    #[arg(long = "port", value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    #[command(flatten)]
    pub engine: EngineArgs,
    /// Number of HTTP workers.
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
    /// Request body limit in MiB.
    #[arg(long = "max-payload-mb", value_name = "MIB", default_value_t = 256)]
    pub max_payload_mb: usize,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
}

impl TryFrom<ServeArgs> for ServiceConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self> {
        if args.workers == Some(0) {
            bail!("--workers must be at least 1");
        }
        if args.max_payload_mb == 0 {
            bail!("--max-payload-mb must be at least 1");
        }
        let max_payload_bytes = args
            .max_payload_mb
            .checked_mul(BYTES_PER_MIB)
            .context("--max-payload-mb is too large")?;

        Ok(Self {
            host: args.host,
            port: args.port,
            engine: args.engine.try_into()?,
            workers: args.workers,
            max_payload_bytes,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
            },
        })
    }
}

/// CLI arguments accepted by the `detect` subcommand.
#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Grid width in points.
    #[arg(long = "width", value_name = "N")]
    pub width: u32,
    /// Grid height in points.
    #[arg(long = "height", value_name = "N")]
    pub height: u32,
    /// Raw little-endian f32 xyz file; `-` reads stdin.
    #[arg(long = "input", value_name = "PATH")]
    pub input: PathBuf,
    #[command(flatten)]
    pub engine: EngineArgs,
    #[command(flatten)]
    pub tuning: TuningArgs,
}
