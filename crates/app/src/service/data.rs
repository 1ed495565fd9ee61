use serde::{Deserialize, Serialize};

pub(crate) const STATUS_MESSAGE: &str = "Plane Detection API is running";

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) message: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub(crate) error: &'a str,
    pub(crate) detail: &'a str,
}

/// Grid dimensions from the `POST /planes` query string.
///
/// Tunables are extracted separately as `DetectionParameters` from the same query.
#[derive(Debug, Deserialize)]
pub(crate) struct GridQuery {
    pub(crate) width: u32,
    pub(crate) height: u32,
}
