//! EKF SLAM core for a differential drive robot observing cylindrical
//! landmarks.
//!
//! The crate maintains a joint Gaussian posterior over the robot pose
//! (theta, x, y) and the 2D positions of a fixed set of landmarks, fed
//! by commanded body twists and batches of body-frame landmark
//! observations. It also carries the planar rigid body algebra and
//! differential drive kinematics the filter depends on.

pub mod common;
pub mod rigid2d;
pub mod slam;
