//! Single detection run against a point file, bypassing HTTP.

use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use engine_bridge::{DetectionParameters, Engine, EngineConfig, GridDims, PointCloudGrid};
use tracing::info;

use crate::service::{
    config::{DetectArgs, TelemetryOptions},
    telemetry,
};

/// Run the engine once and print its planes as JSON on stdout.
pub fn run(args: DetectArgs) -> Result<()> {
    let _telemetry_guard = telemetry::init(&TelemetryOptions::default());

    let engine = Engine::new(EngineConfig::try_from(args.engine)?);
    let params = DetectionParameters::from(args.tuning);
    let dims = GridDims::new(args.width, args.height)?;
    let bytes = read_input(&args.input)?;
    let grid = PointCloudGrid::from_bytes(dims, bytes)?;

    info!(command = ?engine.command_line(dims, &params), "Running plane engine");
    let planes = actix_web::rt::System::new()
        .block_on(engine.detect(&grid, &params))
        .context("Plane detection failed")?;
    info!("Engine reported {} planes", planes.len());

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &planes)?;
    writeln!(stdout)?;
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut bytes = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Failed to read points from stdin")?;
        return Ok(bytes);
    }
    fs::read(path).with_context(|| format!("Failed to read points from {}", path.display()))
}
