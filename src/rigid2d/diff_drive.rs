//! Differential drive kinematics
//!
//! Tracks the pose of a two-wheeled robot and converts between body
//! twists and wheel velocities. Twists are integrated over one time
//! unit, so commanded velocities are per-step displacements.

use crate::common::{SlamError, SlamResult};
use crate::rigid2d::transform::{normalize_angle, Pose2D, Twist2D};

/// Lateral velocities below this magnitude are treated as zero.
const LATERAL_TOLERANCE: f64 = 1e-6;

/// Velocities of the left and right wheels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelVelocities {
    pub ul: f64,
    pub ur: f64,
}

/// Integrate a body twist for one time unit at the given heading.
///
/// Returns the resulting pose increment (dtheta, dx, dy). For a rotating
/// twist the translation follows the constant-curvature arc.
pub fn integrate_twist(theta: f64, tw: &Twist2D) -> Pose2D {
    if tw.wz == 0.0 {
        Pose2D {
            theta: 0.0,
            x: tw.vx * theta.cos(),
            y: tw.vx * theta.sin(),
        }
    } else {
        let vel_ratio = tw.vx / tw.wz;
        Pose2D {
            theta: tw.wz,
            x: -vel_ratio * theta.sin() + vel_ratio * (theta + tw.wz).sin(),
            y: vel_ratio * theta.cos() - vel_ratio * (theta + tw.wz).cos(),
        }
    }
}

/// State of a differential drive robot.
#[derive(Debug, Clone)]
pub struct DiffDrive {
    pose: Pose2D,
    wheel_base: f64,
    wheel_radius: f64,
    wheel_vels: WheelVelocities,
}

impl Default for DiffDrive {
    /// A robot at the origin with TurtleBot3 burger geometry.
    fn default() -> Self {
        Self {
            pose: Pose2D::default(),
            wheel_base: 0.16,
            wheel_radius: 0.033,
            wheel_vels: WheelVelocities::default(),
        }
    }
}

impl DiffDrive {
    /// Create a robot at `pose` with the given geometry.
    pub fn new(pose: Pose2D, wheel_base: f64, wheel_radius: f64) -> SlamResult<Self> {
        if wheel_base <= 0.0 || wheel_radius <= 0.0 {
            return Err(SlamError::InvalidConfig(format!(
                "wheel base and radius must be positive, got base {} radius {}",
                wheel_base, wheel_radius
            )));
        }
        Ok(Self {
            pose,
            wheel_base,
            wheel_radius,
            wheel_vels: WheelVelocities::default(),
        })
    }

    /// Wheel velocities that realize the desired body twist.
    ///
    /// A diff drive cannot produce lateral velocity, so a twist with
    /// nonzero vy is rejected.
    pub fn twist_to_wheels(&self, twist: &Twist2D) -> SlamResult<WheelVelocities> {
        if twist.vy.abs() > LATERAL_TOLERANCE {
            return Err(SlamError::NonHolonomic(format!(
                "diff drive cannot realize lateral velocity {}",
                twist.vy
            )));
        }
        let half_base = self.wheel_base / 2.0;
        Ok(WheelVelocities {
            ul: (twist.vx - half_base * twist.wz) / self.wheel_radius,
            ur: (twist.vx + half_base * twist.wz) / self.wheel_radius,
        })
    }

    /// Body twist produced by the given wheel velocities, held constant
    /// for one time unit.
    pub fn wheels_to_twist(&self, vel: WheelVelocities) -> Twist2D {
        Twist2D {
            wz: self.wheel_radius * (vel.ur - vel.ul) / self.wheel_base,
            vx: self.wheel_radius * (vel.ul + vel.ur) / 2.0,
            vy: 0.0,
        }
    }

    /// Advance the odometry as if the robot followed `cmd` for one time
    /// unit. Records the implied wheel velocities.
    pub fn feedforward(&mut self, cmd: &Twist2D) -> SlamResult<()> {
        self.wheel_vels = self.twist_to_wheels(cmd)?;
        let inc = integrate_twist(self.pose.theta, cmd);
        self.pose.theta = normalize_angle(self.pose.theta + inc.theta);
        self.pose.x += inc.x;
        self.pose.y += inc.y;
        Ok(())
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    pub fn wheel_velocities(&self) -> WheelVelocities {
        self.wheel_vels
    }

    /// Place the robot at the given pose, clearing the wheel state.
    pub fn reset(&mut self, pose: Pose2D) {
        self.pose = pose;
        self.wheel_vels = WheelVelocities::default();
    }
}
