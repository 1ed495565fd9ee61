//! Process boundary between the HTTP service and the external plane-detection
//! engine.
//!
//! A detection request flows through four small stages:
//! - `grid`: checks the raw point payload against the declared grid size.
//! - `params`: turns the optional tuning knobs into engine flags.
//! - `invoke`: runs the engine as a child process over stdio.
//! - `decode`: parses the engine's JSON into [`Plane`] records.

pub mod decode;
pub mod error;
pub mod grid;
pub mod invoke;
pub mod params;

pub use decode::{Plane, RAW_EXCERPT_LIMIT, decode_planes};
pub use error::DetectError;
pub use grid::{BYTES_PER_POINT, GridDims, PointCloudGrid};
pub use invoke::{Engine, EngineConfig, EngineOutput};
pub use params::DetectionParameters;
