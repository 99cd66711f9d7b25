use thiserror::Error;

/// Errors raised while configuring applicators or transforming tables
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Horizons must be added as a list")]
    HorizonsNotAList,

    #[error("Invalid horizon: {0} (must be a finite, non-negative number of hours)")]
    InvalidHorizon(f64),

    #[error("Expected one horizon, got {0}")]
    HorizonCount(usize),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} values but the table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Feature computation failed: {0}")]
    Computation(String),
}

impl FeatureError {
    /// Whether the error stems from applicator configuration rather than data
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FeatureError::HorizonsNotAList
                | FeatureError::InvalidHorizon(_)
                | FeatureError::HorizonCount(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FeatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_count_message_reports_count() {
        assert_eq!(
            FeatureError::HorizonCount(2).to_string(),
            "Expected one horizon, got 2"
        );
        assert_eq!(
            FeatureError::HorizonCount(0).to_string(),
            "Expected one horizon, got 0"
        );
    }

    #[test]
    fn test_configuration_classification() {
        assert!(FeatureError::HorizonsNotAList.is_configuration());
        assert!(FeatureError::HorizonCount(3).is_configuration());
        assert!(!FeatureError::UnknownColumn("APX".to_string()).is_configuration());
    }

    #[test]
    fn test_length_mismatch_display() {
        let error = FeatureError::LengthMismatch {
            column: "load".to_string(),
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            error.to_string(),
            "Column 'load' has 3 values but the table has 4 rows"
        );
    }
}
