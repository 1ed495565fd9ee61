//! HTTP boundary around the external plane-detection engine.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `server`: Actix Web endpoints and error mapping.
//! - `oneshot`: One detection run from a file, without HTTP.
//! - `telemetry`: Tracing subscriber and Prometheus recorder.
//! - `data`: Request and response shapes.

pub use config::{DetectArgs, ServeArgs, ServiceConfig};
pub use oneshot::run as run_oneshot;
pub use server::run;

mod config;
mod data;
mod oneshot;
mod server;
mod telemetry;
