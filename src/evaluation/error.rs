use thiserror::Error;

/// Configuration class failures found while evaluating a flag.
///
/// Missing traits and non-matching rules are not errors; they fold into the
/// fallthrough path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("unsupported operator '{operator}'")]
    UnsupportedOperator { operator: String },

    #[error("invalid value '{value}' for operator '{operator}': {message}")]
    InvalidRuleValue {
        operator: &'static str,
        value: String,
        message: String,
    },

    #[error("flag '{flag_key}' has an empty {scope} variation set")]
    EmptyVariationSet { flag_key: String, scope: String },
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;
