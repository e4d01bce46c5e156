use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub const DEFAULT_PASS_PERCENTAGE: f64 = 40.0;
pub const DEFAULT_WEAK_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingPolicy {
    pub pass_percentage: f64,
    pub weak_threshold: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            pass_percentage: DEFAULT_PASS_PERCENTAGE,
            weak_threshold: DEFAULT_WEAK_THRESHOLD,
        }
    }
}

impl GradingPolicy {
    pub fn new(pass_percentage: f64, weak_threshold: f64) -> Result<Self, AnalysisError> {
        check_range("pass_percentage", pass_percentage)?;
        check_range("weak_threshold", weak_threshold)?;
        Ok(Self {
            pass_percentage,
            weak_threshold,
        })
    }
}

fn check_range(field: &'static str, value: f64) -> Result<(), AnalysisError> {
    // NaN fails the range check as well.
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidPolicy { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds_and_either_ordering() {
        assert!(GradingPolicy::new(0.0, 100.0).is_ok());
        assert!(GradingPolicy::new(100.0, 0.0).is_ok());
        assert!(GradingPolicy::new(60.0, 40.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(
            GradingPolicy::new(101.0, 50.0),
            Err(AnalysisError::InvalidPolicy {
                field: "pass_percentage",
                value: 101.0
            })
        );
        assert!(matches!(
            GradingPolicy::new(40.0, -0.5),
            Err(AnalysisError::InvalidPolicy {
                field: "weak_threshold",
                ..
            })
        ));
        assert!(GradingPolicy::new(f64::NAN, 50.0).is_err());
    }

    #[test]
    fn default_matches_stored_defaults() {
        let policy = GradingPolicy::default();
        assert_eq!(policy.pass_percentage, 40.0);
        assert_eq!(policy.weak_threshold, 50.0);
    }
}
