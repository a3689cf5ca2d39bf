use thiserror::Error;

/// Errors raised by the numerical core.
///
/// Every check happens before any computation, so a failed call never
/// produces a partial result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// An input is outside the domain of the model (non-positive time or
    /// diffusion coefficient, out-of-support shape parameter, NaN, ...).
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// A finite, valid input drove an intermediate value out of the f64 range.
    #[error("numeric overflow while computing {context}")]
    NumericOverflow { context: &'static str },
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidArgument { name, reason: reason.into() }
    }

    pub fn overflow(context: &'static str) -> Self {
        ModelError::NumericOverflow { context }
    }
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> ModelResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::invalid(name, format!("must be finite, got {}", value)))
    }
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> ModelResult<f64> {
    require_finite(name, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ModelError::invalid(name, format!("must be > 0, got {}", value)))
    }
}

pub(crate) fn require_non_negative(name: &'static str, value: f64) -> ModelResult<f64> {
    require_finite(name, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(ModelError::invalid(name, format!("must be >= 0, got {}", value)))
    }
}
