use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures surfaced by any stage of a detection request.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid grid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: &'static str,
    },
    #[error("binary data size mismatch: got {observed} bytes, expected {expected} bytes")]
    PayloadSizeMismatch { observed: usize, expected: usize },
    #[error("plane engine not found at {}", path.display())]
    EngineNotFound { path: PathBuf },
    #[error("failed to start plane engine {}", path.display())]
    EngineSpawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("i/o error while talking to plane engine")]
    EngineIo(#[source] io::Error),
    #[error("plane engine failed with code {}: {stderr}", display_code(*code))]
    EngineExecutionFailed { code: Option<i32>, stderr: String },
    #[error("failed to parse engine output: {source}. Output was: {excerpt}...")]
    ResultDecodeFailed {
        #[source]
        source: serde_json::Error,
        excerpt: String,
    },
    #[error("plane engine did not finish within {}s and was terminated", after.as_secs_f32())]
    EngineTimeout { after: Duration },
}

impl DetectError {
    /// Stable label used in logs, metrics, and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::InvalidDimensions { .. } => "invalid_dimensions",
            DetectError::PayloadSizeMismatch { .. } => "payload_size_mismatch",
            DetectError::EngineNotFound { .. } => "engine_not_found",
            DetectError::EngineSpawn { .. } => "engine_spawn",
            DetectError::EngineIo(_) => "engine_io",
            DetectError::EngineExecutionFailed { .. } => "engine_execution_failed",
            DetectError::ResultDecodeFailed { .. } => "result_decode_failed",
            DetectError::EngineTimeout { .. } => "engine_timeout",
        }
    }

    /// Whether the caller sent something malformed, as opposed to a server-side fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DetectError::InvalidDimensions { .. } | DetectError::PayloadSizeMismatch { .. }
        )
    }
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}
