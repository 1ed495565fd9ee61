//! Translation of optional tuning knobs into engine command-line flags.
//!
//! Every field is `None` unless the caller supplied it. Absent fields emit no
//! flag at all so the engine's own defaults apply; an explicitly supplied value
//! is always forwarded, even when it equals the engine default.

use serde::Deserialize;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DetectionParameters {
    /// Minimum normal-angle difference, in degrees.
    pub min_normal_diff: Option<f64>,
    /// Maximum distance, in engine units.
    pub max_dist: Option<f64>,
    /// Maximum outlier ratio, as a 0–1 fraction.
    pub outlier_ratio: Option<f64>,
    /// Minimum inlier count for a plane to be reported.
    pub min_num_points: Option<i64>,
    /// Neighbourhood size for local consistency checks.
    pub nr_neighbors: Option<i64>,
    /// Upper bound on returned planes.
    pub max_planes: Option<i64>,
}

/// A single supplied tunable, rendered for the command line.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Tunable {
    Float(f64),
    Int(i64),
}

impl Tunable {
    fn render(self) -> String {
        match self {
            Tunable::Float(value) => value.to_string(),
            Tunable::Int(value) => value.to_string(),
        }
    }
}

impl DetectionParameters {
    /// Supplied tunables in canonical flag order.
    fn supplied(&self) -> impl Iterator<Item = (&'static str, Tunable)> {
        [
            ("--min-normal-diff", self.min_normal_diff.map(Tunable::Float)),
            ("--max-dist", self.max_dist.map(Tunable::Float)),
            ("--outlier-ratio", self.outlier_ratio.map(Tunable::Float)),
            ("--min-num-points", self.min_num_points.map(Tunable::Int)),
            ("--nr-neighbors", self.nr_neighbors.map(Tunable::Int)),
            ("--max-planes", self.max_planes.map(Tunable::Int)),
        ]
        .into_iter()
        .filter_map(|(flag, value)| value.map(|value| (flag, value)))
    }

    /// Flag/value pairs for every supplied tunable, in canonical order.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(12);
        for (flag, value) in self.supplied() {
            args.push(flag.to_string());
            args.push(value.render());
        }
        args
    }

    /// Names of the flags the caller set.
    pub fn supplied_flags(&self) -> Vec<&'static str> {
        self.supplied().map(|(flag, _)| flag).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: [&str; 6] = [
        "--min-normal-diff",
        "--max-dist",
        "--outlier-ratio",
        "--min-num-points",
        "--nr-neighbors",
        "--max-planes",
    ];

    fn params_from_mask(mask: u8) -> DetectionParameters {
        let bit = |i: u8| mask & (1 << i) != 0;
        DetectionParameters {
            min_normal_diff: bit(0).then_some(60.0),
            max_dist: bit(1).then_some(75.0),
            outlier_ratio: bit(2).then_some(0.75),
            min_num_points: bit(3).then_some(30),
            nr_neighbors: bit(4).then_some(75),
            max_planes: bit(5).then_some(8),
        }
    }

    #[test]
    fn absent_parameters_emit_nothing() {
        let params = DetectionParameters::default();
        assert!(params.to_args().is_empty());
        assert!(params.supplied_flags().is_empty());
    }

    #[test]
    fn only_outlier_ratio() {
        let params = DetectionParameters {
            outlier_ratio: Some(0.5),
            ..Default::default()
        };
        assert_eq!(params.to_args(), vec!["--outlier-ratio", "0.5"]);
    }

    #[test]
    fn every_subset_yields_exactly_its_flags_in_canonical_order() {
        for mask in 0u8..64 {
            let args = params_from_mask(mask).to_args();
            let flags: Vec<&str> = args.iter().step_by(2).map(String::as_str).collect();
            let expected: Vec<&str> = CANONICAL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, flag)| *flag)
                .collect();
            assert_eq!(flags, expected, "mask {mask:#08b}");
            assert_eq!(args.len(), expected.len() * 2);
        }
    }

    #[test]
    fn explicit_default_values_are_still_forwarded() {
        let params = DetectionParameters {
            nr_neighbors: Some(75),
            ..Default::default()
        };
        assert_eq!(params.to_args(), vec!["--nr-neighbors", "75"]);
    }

    #[test]
    fn values_render_as_plain_decimals() {
        let params = DetectionParameters {
            min_normal_diff: Some(60.0),
            max_dist: Some(0.125),
            min_num_points: Some(-3),
            ..Default::default()
        };
        assert_eq!(
            params.to_args(),
            vec!["--min-normal-diff", "60", "--max-dist", "0.125", "--min-num-points", "-3"]
        );
    }

    #[test]
    fn missing_fields_deserialize_as_absent() {
        let params: DetectionParameters =
            serde_json::from_str(r#"{"outlier_ratio": 0.5, "max_planes": 4}"#).unwrap();
        assert_eq!(params.supplied_flags(), vec!["--outlier-ratio", "--max-planes"]);
    }
}
