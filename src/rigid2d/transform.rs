//! Two-dimensional rigid body transformations
//!
//! Angles, 2D vectors, body twists, and SE(2) transforms with the
//! operations the SLAM core needs: composition, inversion, and
//! application to vectors and twists.

use std::f64::consts::PI;
use std::fmt;
use std::ops::{Mul, MulAssign};
use std::str::FromStr;

/// Approximately compare two floating-point numbers using an absolute
/// threshold.
pub fn almost_equal(d1: f64, d2: f64, epsilon: f64) -> bool {
    (d1 - d2).abs() < epsilon
}

/// Convert degrees to radians.
pub fn deg2rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Convert radians to degrees.
pub fn rad2deg(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// Normalize an angle into (-pi, pi].
///
/// Idempotent; the -pi boundary maps to pi.
pub fn normalize_angle(rad: f64) -> f64 {
    let mut a = rad;
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// A 2-dimensional vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction. The zero vector is returned
    /// unchanged.
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag < 1e-12 {
            return *self;
        }
        Self::new(self.x / mag, self.y / mag)
    }
}

impl fmt::Display for Vector2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.x, self.y)
    }
}

impl FromStr for Vector2D {
    type Err = String;

    /// Accepts "[x y]" or two whitespace-separated numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let nums = parse_numbers(s, 2)?;
        Ok(Self::new(nums[0], nums[1]))
    }
}

/// A 2-dimensional body twist (angular z, linear x and y).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2D {
    pub wz: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Twist2D {
    pub fn new(wz: f64, vx: f64, vy: f64) -> Self {
        Self { wz, vx, vy }
    }
}

impl fmt::Display for Twist2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {}]", self.wz, self.vx, self.vy)
    }
}

impl FromStr for Twist2D {
    type Err = String;

    /// Accepts "[wz vx vy]" or three whitespace-separated numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let nums = parse_numbers(s, 3)?;
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

/// A planar pose (heading, position). The heading is kept in (-pi, pi].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    pub theta: f64,
    pub x: f64,
    pub y: f64,
}

impl Pose2D {
    pub fn new(theta: f64, x: f64, y: f64) -> Self {
        Self {
            theta: normalize_angle(theta),
            x,
            y,
        }
    }
}

/// A rigid body transformation in 2 dimensions.
///
/// Stored as (theta, cos theta, sin theta, x, y); inversion and
/// composition keep cos and sin consistent with theta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    theta: f64,
    ctheta: f64,
    stheta: f64,
    x: f64,
    y: f64,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    /// The identity transformation.
    pub fn identity() -> Self {
        Self {
            theta: 0.0,
            ctheta: 1.0,
            stheta: 0.0,
            x: 0.0,
            y: 0.0,
        }
    }

    /// A pure translation.
    pub fn from_translation(trans: Vector2D) -> Self {
        Self {
            theta: 0.0,
            ctheta: 1.0,
            stheta: 0.0,
            x: trans.x,
            y: trans.y,
        }
    }

    /// A pure rotation.
    pub fn from_rotation(radians: f64) -> Self {
        let theta = normalize_angle(radians);
        Self {
            theta,
            ctheta: theta.cos(),
            stheta: theta.sin(),
            x: 0.0,
            y: 0.0,
        }
    }

    /// A transformation with both a translational and a rotational
    /// component.
    pub fn new(trans: Vector2D, radians: f64) -> Self {
        let theta = normalize_angle(radians);
        Self {
            theta,
            ctheta: theta.cos(),
            stheta: theta.sin(),
            x: trans.x,
            y: trans.y,
        }
    }

    pub fn rotation(&self) -> f64 {
        self.theta
    }

    pub fn translation(&self) -> Vector2D {
        Vector2D::new(self.x, self.y)
    }

    /// Apply the transformation to a vector.
    pub fn apply(&self, v: Vector2D) -> Vector2D {
        Vector2D::new(
            self.ctheta * v.x - self.stheta * v.y + self.x,
            self.stheta * v.x + self.ctheta * v.y + self.y,
        )
    }

    /// Map a twist between frames using the adjoint of the transform.
    pub fn apply_twist(&self, tw: Twist2D) -> Twist2D {
        Twist2D::new(
            tw.wz,
            tw.wz * self.y + tw.vx * self.ctheta - tw.vy * self.stheta,
            -tw.wz * self.x + tw.vx * self.stheta + tw.vy * self.ctheta,
        )
    }

    /// The inverse transformation.
    pub fn inv(&self) -> Self {
        Self {
            theta: normalize_angle(-self.theta),
            ctheta: self.ctheta,
            stheta: -self.stheta,
            x: -(self.ctheta * self.x + self.stheta * self.y),
            y: self.stheta * self.x - self.ctheta * self.y,
        }
    }
}

impl MulAssign for Transform2D {
    /// Compose with another transform: self = self * rhs.
    fn mul_assign(&mut self, rhs: Self) {
        let x = self.ctheta * rhs.x - self.stheta * rhs.y + self.x;
        let y = self.stheta * rhs.x + self.ctheta * rhs.y + self.y;
        let ctheta = self.ctheta * rhs.ctheta - self.stheta * rhs.stheta;
        let stheta = self.stheta * rhs.ctheta + self.ctheta * rhs.stheta;
        self.theta = normalize_angle(self.theta + rhs.theta);
        self.ctheta = ctheta;
        self.stheta = stheta;
        self.x = x;
        self.y = y;
    }
}

impl Mul for Transform2D {
    type Output = Transform2D;

    fn mul(mut self, rhs: Self) -> Self::Output {
        self *= rhs;
        self
    }
}

impl fmt::Display for Transform2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dtheta (degrees): {} dx: {} dy: {}",
            rad2deg(self.theta),
            self.x,
            self.y
        )
    }
}

impl FromStr for Transform2D {
    type Err = String;

    /// Accepts the Display form ("dtheta (degrees): D dx: X dy: Y") or
    /// three whitespace-separated numbers (degrees, dx, dy).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let nums = parse_numbers(s, 3)?;
        Ok(Self::new(Vector2D::new(nums[1], nums[2]), deg2rad(nums[0])))
    }
}

/// Pull `expected` numbers out of a token stream, ignoring brackets and
/// textual labels.
fn parse_numbers(s: &str, expected: usize) -> Result<Vec<f64>, String> {
    let nums: Vec<f64> = s
        .split_whitespace()
        .filter_map(|tok| tok.trim_matches(|c| c == '[' || c == ']').parse().ok())
        .collect();
    if nums.len() != expected {
        return Err(format!(
            "expected {} numbers, found {} in {:?}",
            expected,
            nums.len(),
            s
        ));
    }
    Ok(nums)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_normalize_angle_boundaries() {
        assert!(almost_equal(normalize_angle(PI), PI, TOL));
        assert!(almost_equal(normalize_angle(-PI), PI, TOL));
        assert!(almost_equal(normalize_angle(3.0 * PI), PI, TOL));
        assert!(almost_equal(normalize_angle(-3.0 * PI / 2.0), PI / 2.0, TOL));
        assert!(almost_equal(normalize_angle(0.0), 0.0, TOL));
    }

    #[test]
    fn test_normalize_angle_idempotent() {
        for a in [-7.5, -PI, -0.3, 0.0, 1.0, PI, 9.42] {
            let once = normalize_angle(a);
            assert!(almost_equal(normalize_angle(once), once, TOL));
        }
    }

    #[test]
    fn test_deg2rad_roundtrip() {
        for x in [-3.0, -0.5, 0.0, 2.1, 100.0] {
            assert!(almost_equal(deg2rad(rad2deg(x)), x, TOL));
        }
        assert!(almost_equal(deg2rad(180.0), PI, TOL));
        assert!(almost_equal(rad2deg(PI), 180.0, TOL));
    }

    #[test]
    fn test_vector_normalize() {
        let v = Vector2D::new(3.0, 4.0).normalize();
        assert!(almost_equal(v.magnitude(), 1.0, TOL));
        assert!(almost_equal(v.x, 0.6, TOL));
        assert!(almost_equal(v.y, 0.8, TOL));

        let zero = Vector2D::default().normalize();
        assert!(almost_equal(zero.magnitude(), 0.0, TOL));
    }

    #[test]
    fn test_identity_application() {
        let t = Transform2D::identity();
        let v = Vector2D::new(1.5, -2.0);
        assert_eq!(t.apply(v), v);
    }

    #[test]
    fn test_translation_and_rotation() {
        let t = Transform2D::from_translation(Vector2D::new(1.0, 2.0));
        let v = t.apply(Vector2D::new(0.5, 0.5));
        assert!(almost_equal(v.x, 1.5, TOL));
        assert!(almost_equal(v.y, 2.5, TOL));

        let r = Transform2D::from_rotation(PI / 2.0);
        let v = r.apply(Vector2D::new(1.0, 0.0));
        assert!(almost_equal(v.x, 0.0, TOL));
        assert!(almost_equal(v.y, 1.0, TOL));
    }

    #[test]
    fn test_apply_twist_adjoint() {
        let t = Transform2D::new(Vector2D::new(1.0, 2.0), PI / 2.0);
        let tw = t.apply_twist(Twist2D::new(1.0, 1.0, 0.0));
        assert!(almost_equal(tw.wz, 1.0, TOL));
        assert!(almost_equal(tw.vx, 2.0, TOL));
        assert!(almost_equal(tw.vy, 0.0, TOL));
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        let t = Transform2D::new(Vector2D::new(3.0, -1.0), 0.7);
        let id = t * t.inv();
        let v = Vector2D::new(-2.0, 5.0);
        let w = id.apply(v);
        assert!(almost_equal(w.x, v.x, TOL));
        assert!(almost_equal(w.y, v.y, TOL));
        assert!(almost_equal(id.rotation(), 0.0, TOL));
    }

    #[test]
    fn test_composition_matches_sequential_application() {
        let t = Transform2D::new(Vector2D::new(1.0, 0.0), 0.3);
        let u = Transform2D::new(Vector2D::new(0.0, -2.0), -1.1);
        let v = Vector2D::new(0.4, 0.9);

        let composed = (t * u).apply(v);
        let sequential = t.apply(u.apply(v));
        assert!(almost_equal(composed.x, sequential.x, TOL));
        assert!(almost_equal(composed.y, sequential.y, TOL));
    }

    #[test]
    fn test_composition_associative() {
        let t1 = Transform2D::new(Vector2D::new(1.0, 2.0), 0.5);
        let t2 = Transform2D::new(Vector2D::new(-0.5, 0.0), 1.3);
        let t3 = Transform2D::new(Vector2D::new(0.0, 4.0), -2.0);
        let v = Vector2D::new(1.0, 1.0);

        let a = ((t1 * t2) * t3).apply(v);
        let b = (t1 * (t2 * t3)).apply(v);
        assert!(almost_equal(a.x, b.x, TOL));
        assert!(almost_equal(a.y, b.y, TOL));
    }

    #[test]
    fn test_vector_stream_forms() {
        let v = Vector2D::new(1.5, -2.0);
        assert_eq!(v.to_string(), "[1.5 -2]");
        assert_eq!("[1.5 -2]".parse::<Vector2D>().unwrap(), v);
        assert_eq!("1.5 -2".parse::<Vector2D>().unwrap(), v);
        assert!("1.5".parse::<Vector2D>().is_err());
    }

    #[test]
    fn test_twist_stream_forms() {
        let tw = Twist2D::new(0.5, 1.0, 0.0);
        assert_eq!(tw.to_string(), "[0.5 1 0]");
        assert_eq!("[0.5 1 0]".parse::<Twist2D>().unwrap(), tw);
        assert_eq!("0.5 1 0".parse::<Twist2D>().unwrap(), tw);
    }

    #[test]
    fn test_transform_stream_forms() {
        let t = "dtheta (degrees): 90 dx: 3 dy: 5".parse::<Transform2D>().unwrap();
        assert!(almost_equal(t.rotation(), PI / 2.0, TOL));
        assert!(almost_equal(t.translation().x, 3.0, TOL));
        assert!(almost_equal(t.translation().y, 5.0, TOL));

        let u = "90 3 5".parse::<Transform2D>().unwrap();
        assert_eq!(t, u);

        let shown = t.to_string().parse::<Transform2D>().unwrap();
        assert!(almost_equal(shown.rotation(), t.rotation(), TOL));
    }
}
