//! Error types for turtle_slam

use std::fmt;

/// Main error type for the estimator and its kinematics.
#[derive(Debug)]
pub enum SlamError {
    /// Bad construction arguments (dimensions, covariance not SPSD)
    InvalidConfig(String),
    /// Diff drive asked to realize a twist with lateral velocity
    NonHolonomic(String),
    /// Numerical computation failed (Cholesky, singular innovation
    /// covariance, non-finite state)
    Numerical(String),
    /// Observation geometry is degenerate (landmark coincident with the
    /// robot); the observation is dropped
    DegenerateGeometry(String),
    /// Input dimensions disagree with the configured state
    ShapeMismatch(String),
}

impl fmt::Display for SlamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlamError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            SlamError::NonHolonomic(msg) => write!(f, "Non-holonomic constraint: {}", msg),
            SlamError::Numerical(msg) => write!(f, "Numerical error: {}", msg),
            SlamError::DegenerateGeometry(msg) => write!(f, "Degenerate geometry: {}", msg),
            SlamError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
        }
    }
}

impl std::error::Error for SlamError {}

/// Result type alias for estimator operations.
pub type SlamResult<T> = Result<T, SlamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlamError::NonHolonomic("vy = 0.5".to_string());
        assert_eq!(format!("{}", err), "Non-holonomic constraint: vy = 0.5");
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&SlamError::Numerical("nan".to_string()));
    }
}
