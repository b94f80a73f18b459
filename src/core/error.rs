use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("endAge ({end_age}) must not be less than initialAge ({initial_age})")]
    InvalidAgeRange { initial_age: u32, end_age: u32 },

    #[error("{field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("duplicate product id `{0}`")]
    DuplicateProductId(String),

    #[error(
        "tax-advantaged principal {principal} already exceeds the lifetime contribution cap {cap}"
    )]
    TaxAdvantagedCapExceeded { principal: f64, cap: f64 },

    #[error("monte-carlo run count must be at least 1")]
    NoRuns,
}

impl SimulationError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SimulationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
