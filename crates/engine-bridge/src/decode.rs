//! Parsing of the engine's primary output into typed plane records.

use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Characters of raw engine output quoted back in a decode error.
pub const RAW_EXCERPT_LIMIT: usize = 200;

/// One detected planar surface, exactly as the engine reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plane {
    pub normal: [f64; 3],
    pub center: [f64; 3],
    pub basis_u: [f64; 3],
    pub basis_v: [f64; 3],
    pub distance_from_origin: f64,
    pub inlier_count: u64,
}

/// Decode the engine's JSON array of planes, keeping engine order.
///
/// Only the structure is checked. Geometric properties such as unit-length
/// normals are the engine's responsibility.
pub fn decode_planes(stdout: &[u8]) -> Result<Vec<Plane>, DetectError> {
    serde_json::from_slice(stdout).map_err(|source| DetectError::ResultDecodeFailed {
        source,
        excerpt: excerpt(stdout),
    })
}

fn excerpt(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .take(RAW_EXCERPT_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE_OUTPUT: &str = r#"[
  {
    "normal": [0, 0, 1],
    "center": [0.5, 0.25, 2],
    "basisU": [1, 0, 0],
    "basisV": [0, 1, 0],
    "distanceFromOrigin": -2,
    "inlierCount": 412
  },
  {
    "normal": [1, 0, 0],
    "center": [3, 0, 0],
    "basisU": [0, 1, 0],
    "basisV": [0, 0, 1],
    "distanceFromOrigin": 3,
    "inlierCount": 977
  }
]
"#;

    #[test]
    fn keeps_engine_order() {
        let planes = decode_planes(ENGINE_OUTPUT.as_bytes()).unwrap();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].inlier_count, 412);
        assert_eq!(planes[1].inlier_count, 977);
        assert_eq!(planes[0].center, [0.5, 0.25, 2.0]);
        assert_eq!(planes[1].basis_v, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn empty_array_is_no_planes() {
        assert!(decode_planes(b"[]\n").unwrap().is_empty());
    }

    #[test]
    fn serializes_with_wire_names() {
        let planes = decode_planes(ENGINE_OUTPUT.as_bytes()).unwrap();
        let value = serde_json::to_value(&planes[0]).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "basisU",
                "basisV",
                "center",
                "distanceFromOrigin",
                "inlierCount",
                "normal"
            ]
        );
    }

    #[test]
    fn non_json_output_is_quoted_back() {
        match decode_planes(b"not json") {
            Err(DetectError::ResultDecodeFailed { excerpt, .. }) => assert_eq!(excerpt, "not json"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_rejected() {
        let raw = br#"[{"normal":[0,0,1],"center":[0,0,0],"basisU":[1,0,0],"basisV":[0,1,0],"inlierCount":3}]"#;
        assert!(matches!(
            decode_planes(raw),
            Err(DetectError::ResultDecodeFailed { .. })
        ));
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let raw = br#"[{"normal":[0,0,"up"],"center":[0,0,0],"basisU":[1,0,0],"basisV":[0,1,0],"distanceFromOrigin":0,"inlierCount":3}]"#;
        assert!(decode_planes(raw).is_err());
    }

    #[test]
    fn excerpt_is_bounded() {
        let raw = "x".repeat(5 * RAW_EXCERPT_LIMIT);
        match decode_planes(raw.as_bytes()) {
            Err(DetectError::ResultDecodeFailed { excerpt, .. }) => {
                assert_eq!(excerpt.chars().count(), RAW_EXCERPT_LIMIT)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
