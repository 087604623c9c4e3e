//! Trigger policy: which samples fire a camera trigger.

use crate::source::Sample;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Condition on a sample that causes a trigger attempt.
///
/// The deployed radar firmware fires on any measured distance, while its
/// notes suggest a score cut-off of 1.1 (1100 after scaling) instead. Both
/// are available; the distance rule is the default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Fire when `distance > meters`
    DistanceAbove { meters: f64 },
    /// Fire when `score > score`
    ScoreAbove { score: f64 },
    /// Fire when the detector's own classification says present
    Detected,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::DistanceAbove { meters: 0.0 }
    }
}

impl TriggerPolicy {
    pub fn matches(&self, sample: &Sample) -> bool {
        match *self {
            TriggerPolicy::DistanceAbove { meters } => sample.distance > meters,
            TriggerPolicy::ScoreAbove { score } => sample.score > score,
            TriggerPolicy::Detected => sample.detected,
        }
    }
}

impl std::fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerPolicy::DistanceAbove { meters } => write!(f, "distance > {meters}"),
            TriggerPolicy::ScoreAbove { score } => write!(f, "score > {score}"),
            TriggerPolicy::Detected => write!(f, "detector reports presence"),
        }
    }
}

impl FromStr for TriggerPolicy {
    type Err = String;

    /// Parse `distance[:meters]`, `score[:value]` or `detected`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (kind, value) = match s.split_once(':') {
            Some((kind, value)) => (kind, Some(value)),
            None => (s.as_str(), None),
        };

        let threshold = |default: f64| -> Result<f64, String> {
            match value {
                Some(v) => v
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("invalid threshold {v:?}: {e}")),
                None => Ok(default),
            }
        };

        match kind {
            "distance" => Ok(TriggerPolicy::DistanceAbove {
                meters: threshold(0.0)?,
            }),
            "score" => Ok(TriggerPolicy::ScoreAbove {
                score: threshold(1.1)?,
            }),
            "detected" if value.is_none() => Ok(TriggerPolicy::Detected),
            other => Err(format!(
                "unknown trigger policy {other:?} (expected distance, score or detected)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SensorReading;

    fn sample(score: f64, distance: f64, detected: bool) -> Sample {
        Sample::at(SensorReading::new(score, distance, detected), 0)
    }

    #[test]
    fn test_default_fires_on_positive_distance() {
        let policy = TriggerPolicy::default();
        assert!(policy.matches(&sample(0.0, 0.05, false)));
        assert!(!policy.matches(&sample(5.0, 0.0, true)));
        assert!(!policy.matches(&sample(5.0, -0.1, true)));
    }

    #[test]
    fn test_score_and_detected_policies() {
        let score = TriggerPolicy::ScoreAbove { score: 1.1 };
        assert!(score.matches(&sample(1.2, 0.0, false)));
        assert!(!score.matches(&sample(1.1, 0.5, true)));

        assert!(TriggerPolicy::Detected.matches(&sample(0.0, 0.0, true)));
        assert!(!TriggerPolicy::Detected.matches(&sample(9.0, 1.0, false)));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "distance".parse::<TriggerPolicy>().unwrap(),
            TriggerPolicy::DistanceAbove { meters: 0.0 }
        );
        assert_eq!(
            "distance:0.3".parse::<TriggerPolicy>().unwrap(),
            TriggerPolicy::DistanceAbove { meters: 0.3 }
        );
        assert_eq!(
            "Score".parse::<TriggerPolicy>().unwrap(),
            TriggerPolicy::ScoreAbove { score: 1.1 }
        );
        assert_eq!(
            "detected".parse::<TriggerPolicy>().unwrap(),
            TriggerPolicy::Detected
        );
        assert!("distance:abc".parse::<TriggerPolicy>().is_err());
        assert!("always".parse::<TriggerPolicy>().is_err());
    }
}
