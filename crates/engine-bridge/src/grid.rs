//! Framing check for raw point-cloud payloads.
//!
//! The payload is a row-major `width × height` grid of little-endian `f32`
//! triples. Dimensions travel out-of-band, so the only thing we can verify is
//! that the byte count matches exactly.

use crate::error::DetectError;

/// Three little-endian `f32` coordinates.
pub const BYTES_PER_POINT: usize = 4 * 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

impl GridDims {
    pub fn new(width: u32, height: u32) -> Result<Self, DetectError> {
        let dims = Self { width, height };
        if width == 0 || height == 0 {
            return Err(dims.invalid("width and height must be positive"));
        }
        dims.expected_bytes()?;
        Ok(dims)
    }

    /// Exact payload length for this grid.
    pub fn expected_bytes(&self) -> Result<usize, DetectError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|points| points.checked_mul(BYTES_PER_POINT))
            .ok_or_else(|| self.invalid("grid is too large"))
    }

    fn invalid(&self, reason: &'static str) -> DetectError {
        DetectError::InvalidDimensions {
            width: self.width,
            height: self.height,
            reason,
        }
    }
}

/// A payload whose length has been checked against its grid dimensions.
#[derive(Clone, Debug)]
pub struct PointCloudGrid {
    dims: GridDims,
    bytes: Vec<u8>,
}

impl PointCloudGrid {
    /// Checks the length before taking ownership, so a rejected body is never copied.
    pub fn from_bytes<B>(dims: GridDims, bytes: B) -> Result<Self, DetectError>
    where
        B: AsRef<[u8]> + Into<Vec<u8>>,
    {
        check_payload_len(dims, bytes.as_ref().len())?;
        Ok(Self {
            dims,
            bytes: bytes.into(),
        })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Exact-equality length check; no partial acceptance.
pub fn check_payload_len(dims: GridDims, observed: usize) -> Result<(), DetectError> {
    let expected = dims.expected_bytes()?;
    if observed != expected {
        return Err(DetectError::PayloadSizeMismatch { observed, expected });
    }
    Ok(())
}
