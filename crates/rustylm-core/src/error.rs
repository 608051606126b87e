// =============================================================================
// Error Types
// =============================================================================
//
// One error enum for the whole library. Every fallible function returns
// `Result<T>`, which is `std::result::Result<T, RustyLmError>`.
//
// The variants carry a human-readable message rather than structured fields:
// almost every error ends up printed by the CLI, and the message is where the
// useful detail lives ("X has 10 rows but y has 9 elements").
//
// =============================================================================

use thiserror::Error;

/// Errors that can occur while building or fitting a model.
#[derive(Error, Debug)]
pub enum RustyLmError {
    /// Arrays or columns whose lengths must agree do not.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Something that must contain data is empty.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A parameter or data value is outside its valid range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A decomposition or solve failed.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// The design matrix does not have full column rank.
    #[error("Design matrix is rank deficient; aliased columns: {}", .0.join(", "))]
    RankDeficient(Vec<String>),

    /// The formula could not be parsed.
    #[error("Formula error: {0}")]
    Formula(String),

    /// A formula or option refers to a column the data frame does not have.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// New data contains a factor level the model was not trained on.
    #[error("Factor '{factor}' has level '{level}' not seen when fitting")]
    UnknownLevel { factor: String, level: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RustyLmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_deficient_message_lists_columns() {
        let err = RustyLmError::RankDeficient(vec!["x2".to_string(), "x3".to_string()]);
        assert_eq!(
            err.to_string(),
            "Design matrix is rank deficient; aliased columns: x2, x3"
        );
    }

    #[test]
    fn test_unknown_level_message() {
        let err = RustyLmError::UnknownLevel {
            factor: "group".to_string(),
            level: "z".to_string(),
        };
        assert!(err.to_string().contains("'group'"));
        assert!(err.to_string().contains("'z'"));
    }
}
