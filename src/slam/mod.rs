// SLAM estimator module

pub mod ekf_slam;
pub mod noise;

pub use ekf_slam::*;
