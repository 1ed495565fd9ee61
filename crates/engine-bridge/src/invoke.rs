//! Supervision of the external plane-detection engine.
//!
//! Each request spawns exactly one engine process:
//!
//! ```text
//! <engine> <width> <height> [--min-normal-diff V] ... [--max-planes V]
//! ```
//!
//! The validated payload is piped to stdin, which is then closed. Stdout must
//! carry a single JSON array of planes; stderr is free-form and is always
//! logged. The child is killed if the owning future is dropped or the wait
//! exceeds the configured timeout.

use std::{
    io,
    path::PathBuf,
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, Command},
    time,
};
use tracing::{debug, warn};

use crate::{
    decode::{Plane, decode_planes},
    error::DetectError,
    grid::{GridDims, PointCloudGrid},
    params::DetectionParameters,
};

pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(120);

/// Process-wide engine settings, resolved once at startup.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub timeout: Duration,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Everything the engine produced on a successful (zero) exit.
#[derive(Debug)]
pub struct EngineOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Cheap, cloneable handle to the configured engine.
#[derive(Clone, Debug)]
pub struct Engine {
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Full argument vector, program path first.
    pub fn command_line(&self, dims: GridDims, params: &DetectionParameters) -> Vec<String> {
        let mut argv = vec![self.config.path.display().to_string()];
        argv.extend(engine_args(dims, params));
        argv
    }

    /// Run the engine and decode its planes.
    pub async fn detect(
        &self,
        grid: &PointCloudGrid,
        params: &DetectionParameters,
    ) -> Result<Vec<Plane>, DetectError> {
        let output = self.run(grid, params).await?;
        decode_planes(&output.stdout)
    }

    /// Run the engine once over `grid`, returning its raw output.
    pub async fn run(
        &self,
        grid: &PointCloudGrid,
        params: &DetectionParameters,
    ) -> Result<EngineOutput, DetectError> {
        let path = &self.config.path;
        if !path.exists() {
            return Err(DetectError::EngineNotFound { path: path.clone() });
        }

        let mut cmd = Command::new(path);
        cmd.args(engine_args(grid.dims(), params))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| DetectError::EngineSpawn {
            path: path.clone(),
            source,
        })?;
        debug!(pid = child.id(), "Spawned plane engine");

        let outcome = time::timeout(
            self.config.timeout,
            communicate(&mut child, grid.as_bytes()),
        )
        .await;
        let (status, stdout, stderr) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Plane engine exceeded {:?}; terminating pid {:?}",
                    self.config.timeout,
                    child.id()
                );
                if let Err(err) = child.start_kill() {
                    warn!("Failed to kill plane engine: {err}");
                }
                let _ = child.wait().await;
                return Err(DetectError::EngineTimeout {
                    after: self.config.timeout,
                });
            }
        };
        let elapsed = started.elapsed();

        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        if !stderr.trim().is_empty() {
            warn!(status = %status, "Plane engine stderr: {}", stderr.trim_end());
        }

        if !status.success() {
            return Err(DetectError::EngineExecutionFailed {
                code: status.code(),
                stderr,
            });
        }

        debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = stdout.len(),
            "Plane engine finished"
        );
        Ok(EngineOutput {
            stdout,
            stderr,
            elapsed,
        })
    }
}

fn engine_args(dims: GridDims, params: &DetectionParameters) -> Vec<String> {
    let mut args = vec![dims.width.to_string(), dims.height.to_string()];
    args.extend(params.to_args());
    args
}

/// Feed stdin and drain both output pipes concurrently, then reap the child.
async fn communicate(
    child: &mut Child,
    payload: &[u8],
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), DetectError> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (written, stdout, stderr) = tokio::join!(
        feed_stdin(stdin, payload),
        drain(stdout),
        drain(stderr)
    );
    let status = child.wait().await.map_err(DetectError::EngineIo)?;

    let stdout = stdout.map_err(DetectError::EngineIo)?;
    let stderr = stderr.map_err(DetectError::EngineIo)?;
    if let Err(err) = written {
        if err.kind() != io::ErrorKind::BrokenPipe {
            return Err(DetectError::EngineIo(err));
        }
        // The engine exited before consuming all input; its status and output decide.
        debug!("Plane engine stopped reading input: {err}");
    }
    Ok((status, stdout, stderr))
}

async fn feed_stdin(stdin: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Err(io::Error::other("engine stdin was not captured"));
    };
    stdin.write_all(payload).await?;
    stdin.shutdown().await?;
    drop(stdin);
    Ok(())
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_without_tunables_is_path_and_dims() {
        let engine = Engine::new(EngineConfig::new("/opt/engine/stdin_planes"));
        let dims = GridDims::new(2, 2).unwrap();
        assert_eq!(
            engine.command_line(dims, &DetectionParameters::default()),
            vec!["/opt/engine/stdin_planes", "2", "2"]
        );
    }

    #[test]
    fn command_line_appends_tunables_after_dims() {
        let engine = Engine::new(EngineConfig::new("engine"));
        let dims = GridDims::new(640, 480).unwrap();
        let params = DetectionParameters {
            outlier_ratio: Some(0.5),
            max_planes: Some(3),
            ..Default::default()
        };
        assert_eq!(
            engine.command_line(dims, &params),
            vec!["engine", "640", "480", "--outlier-ratio", "0.5", "--max-planes", "3"]
        );
    }

    #[tokio::test]
    async fn missing_engine_fails_before_spawning() {
        let engine = Engine::new(EngineConfig::new("/definitely/not/here/stdin_planes"));
        let dims = GridDims::new(1, 1).unwrap();
        let grid = PointCloudGrid::from_bytes(dims, vec![0u8; 12]).unwrap();
        let err = engine
            .run(&grid, &DetectionParameters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::EngineNotFound { .. }));
    }
}
