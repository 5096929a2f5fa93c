//! Common traits defining interfaces for state estimation

use crate::common::error::SlamResult;

/// Trait for recursive state estimators (EKF and friends).
///
/// Estimators integrate one control per call and fold in one measurement
/// batch per call; callers drive them in the physical order of events.
pub trait StateEstimator {
    /// State type used by this estimator
    type State;
    /// Measurement type used by this estimator
    type Measurement;
    /// Control input type
    type Control;

    /// Prediction step: integrate a control for one time unit.
    fn predict(&mut self, control: &Self::Control) -> SlamResult<()>;

    /// Update step: fold a measurement into the posterior.
    fn update(&mut self, measurement: &Self::Measurement) -> SlamResult<()>;

    /// Current state estimate.
    fn state(&self) -> &Self::State;

    /// Current covariance estimate (if applicable).
    fn covariance(&self) -> Option<&nalgebra::DMatrix<f64>> {
        None
    }
}
