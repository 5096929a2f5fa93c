// EKF SLAM for a differential drive robot observing cylindrical
// landmarks.
//
// Reference:
// - Probabilistic Robotics (Thrun, Burgard, Fox)

use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Vector2};

use crate::common::{SlamError, SlamResult, StateEstimator};
use crate::rigid2d::diff_drive::integrate_twist;
use crate::rigid2d::transform::{normalize_angle, Pose2D, Twist2D, Vector2D};
use crate::slam::noise::{cholesky_semidefinite, sample_from_factor};

/// Robot state entries [theta, x, y] at the head of the mean vector.
const POSE_SIZE: usize = 3;
/// Landmark state entries [mx, my].
const LM_SIZE: usize = 2;

/// Prior variance for a landmark that has never been observed.
const LANDMARK_PRIOR_VAR: f64 = 1.0e4;

/// Squared distances below this are treated as a landmark coincident
/// with the robot.
const DEGENERATE_DIST2: f64 = 1e-12;

/// A batch of cylindrical landmark observations in the robot body frame.
///
/// Position i in the batch is interpreted as landmark index i. Radii are
/// carried for the extractor's benefit; the estimator ignores them.
#[derive(Debug, Clone, Default)]
pub struct TurtleMap {
    pub centers_x: Vec<f64>,
    pub centers_y: Vec<f64>,
    pub radii: Vec<f64>,
}

impl TurtleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observed landmark center (body frame) and radius.
    pub fn push(&mut self, x: f64, y: f64, radius: f64) {
        self.centers_x.push(x);
        self.centers_y.push(y);
        self.radii.push(radius);
    }

    pub fn len(&self) -> usize {
        self.centers_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers_x.is_empty()
    }

    fn validate(&self) -> SlamResult<()> {
        if self.centers_y.len() != self.centers_x.len() || self.radii.len() != self.centers_x.len()
        {
            return Err(SlamError::ShapeMismatch(format!(
                "observation batch sequences disagree: {} centers_x, {} centers_y, {} radii",
                self.centers_x.len(),
                self.centers_y.len(),
                self.radii.len()
            )));
        }
        Ok(())
    }
}

/// Configuration for the SLAM estimator.
#[derive(Debug, Clone)]
pub struct SlamConfig {
    /// Process noise covariance on (theta, x, y)
    pub process_noise: Matrix3<f64>,
    /// Measurement noise covariance; only the top-left 2x2 block
    /// (range, bearing) is used
    pub measurement_noise: Matrix3<f64>,
    /// Leave the expected measurement unperturbed instead of drawing a
    /// noise sample for it
    pub deterministic_expected_measurement: bool,
}

impl Default for SlamConfig {
    fn default() -> Self {
        let mut q = Matrix3::zeros();
        q[(0, 0)] = (2.0_f64.to_radians()).powi(2);
        q[(1, 1)] = 0.01_f64.powi(2);
        q[(2, 2)] = 0.01_f64.powi(2);

        let mut r = Matrix3::zeros();
        r[(0, 0)] = 0.05_f64.powi(2);
        r[(1, 1)] = (1.0_f64.to_radians()).powi(2);

        Self {
            process_noise: q,
            measurement_noise: r,
            deterministic_expected_measurement: false,
        }
    }
}

/// EKF SLAM estimator over a robot pose and a fixed set of landmarks.
///
/// The joint mean is laid out [theta, x, y, m1x, m1y, ...]; the heading
/// lives in (-pi, pi] after every operation. Landmark count is fixed at
/// construction and position i in an observation batch is landmark i.
#[derive(Debug)]
pub struct Slam {
    state: DVector<f64>,
    covariance: DMatrix<f64>,
    q: Matrix3<f64>,
    r: Matrix2<f64>,
    q_factor: DMatrix<f64>,
    r_factor: DMatrix<f64>,
    initialized: Vec<bool>,
    deterministic_expected: bool,
}

impl Slam {
    /// Create an estimator for `num_landmarks` landmarks with process
    /// noise `q` on (theta, x, y) and measurement noise `r` (top-left
    /// 2x2 block on range and bearing).
    ///
    /// The pose starts perfectly known at the origin; landmarks start at
    /// zero with an effectively infinite diagonal prior.
    pub fn new(num_landmarks: usize, q: Matrix3<f64>, r: Matrix3<f64>) -> SlamResult<Self> {
        Self::with_config(
            num_landmarks,
            SlamConfig {
                process_noise: q,
                measurement_noise: r,
                ..SlamConfig::default()
            },
        )
    }

    pub fn with_config(num_landmarks: usize, config: SlamConfig) -> SlamResult<Self> {
        let q = config.process_noise;
        let r = config.measurement_noise.fixed_view::<2, 2>(0, 0).into_owned();

        let q_factor = cholesky_semidefinite(&DMatrix::from_fn(3, 3, |i, j| q[(i, j)]))
            .map_err(|e| SlamError::InvalidConfig(format!("process noise Q: {}", e)))?;
        let r_factor = cholesky_semidefinite(&DMatrix::from_fn(2, 2, |i, j| r[(i, j)]))
            .map_err(|e| {
                SlamError::InvalidConfig(format!("measurement noise R (top-left 2x2): {}", e))
            })?;

        let n = POSE_SIZE + LM_SIZE * num_landmarks;
        let mut covariance = DMatrix::zeros(n, n);
        for i in POSE_SIZE..n {
            covariance[(i, i)] = LANDMARK_PRIOR_VAR;
        }

        Ok(Self {
            state: DVector::zeros(n),
            covariance,
            q,
            r,
            q_factor,
            r_factor,
            initialized: vec![false; num_landmarks],
            deterministic_expected: config.deterministic_expected_measurement,
        })
    }

    /// Number of landmarks tracked in the joint state.
    pub fn num_landmarks(&self) -> usize {
        self.initialized.len()
    }

    /// Current robot pose estimate (theta, x, y) in the world frame.
    pub fn robot_pose(&self) -> Pose2D {
        Pose2D {
            theta: self.state[0],
            x: self.state[1],
            y: self.state[2],
        }
    }

    /// Current estimate of landmark `idx` in the world frame.
    pub fn landmark(&self, idx: usize) -> Option<Vector2D> {
        if idx >= self.num_landmarks() {
            return None;
        }
        let i = POSE_SIZE + LM_SIZE * idx;
        Some(Vector2D::new(self.state[i], self.state[i + 1]))
    }

    /// Whether landmark `idx` has been observed at least once.
    pub fn landmark_initialized(&self, idx: usize) -> bool {
        self.initialized.get(idx).copied().unwrap_or(false)
    }

    /// Read-only view of the joint covariance.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Install a nonzero initial pose uncertainty. The constructor
    /// zeroes the pose block; callers that do not know the start pose
    /// exactly set it here before the first predict.
    pub fn set_pose_covariance(&mut self, pose_cov: Matrix3<f64>) {
        self.covariance
            .view_mut((0, 0), (POSE_SIZE, POSE_SIZE))
            .copy_from(&pose_cov);
    }

    /// Prediction step: integrate the commanded body twist for one time
    /// unit, perturb the pose mean with sampled process noise, and
    /// propagate the covariance through the motion Jacobian.
    ///
    /// Landmarks are stationary, so only the pose block of the mean
    /// moves; the Jacobian embeds the pose derivative in an identity of
    /// full state dimension to evolve the cross covariances.
    pub fn predict(&mut self, tw: &Twist2D) -> SlamResult<()> {
        let n = self.state.len();
        let theta = self.state[0];

        let inc = integrate_twist(theta, tw);
        let (ddx, ddy) = motion_derivative(theta, tw);
        let noise = sample_from_factor(&self.q_factor);

        let mut state = self.state.clone();
        state[0] = normalize_angle(state[0] + inc.theta + noise[0]);
        state[1] += inc.x + noise[1];
        state[2] += inc.y + noise[2];

        let mut g = DMatrix::identity(n, n);
        g[(1, 0)] += ddx;
        g[(2, 0)] += ddy;

        let mut q_bar = DMatrix::zeros(n, n);
        q_bar
            .view_mut((0, 0), (POSE_SIZE, POSE_SIZE))
            .copy_from(&self.q);

        let covariance = &g * &self.covariance * g.transpose() + q_bar;

        ensure_finite(&state, &covariance)?;
        self.state = state;
        self.covariance = covariance;
        Ok(())
    }

    /// Measurement update: fold a batch of body-frame landmark
    /// observations into the posterior.
    ///
    /// Observations are applied sequentially; the state after
    /// observation i is the prior for observation i+1. The first
    /// observation of a landmark initializes its mean entries from the
    /// measurement. A landmark estimate coincident with the robot is
    /// skipped. Numerical failures abort the whole batch without
    /// touching the stored state.
    pub fn update(&mut self, map: &TurtleMap) -> SlamResult<()> {
        map.validate()?;
        if map.len() > self.num_landmarks() {
            return Err(SlamError::ShapeMismatch(format!(
                "observation batch has {} entries for {} landmarks",
                map.len(),
                self.num_landmarks()
            )));
        }

        let n = self.state.len();
        let mut state = self.state.clone();
        let mut covariance = self.covariance.clone();
        let mut initialized = self.initialized.clone();

        for i in 0..map.len() {
            let idx = POSE_SIZE + LM_SIZE * i;

            // actual measurement: range and bearing of the body-frame center
            let (range, bearing) = to_range_bearing(map.centers_x[i], map.centers_y[i]);

            if !initialized[i] {
                state[idx] = state[1] + range * (state[0] + bearing).cos();
                state[idx + 1] = state[2] + range * (state[0] + bearing).sin();
                initialized[i] = true;
            }

            let del_x = state[idx] - state[1];
            let del_y = state[idx + 1] - state[2];
            let dist = del_x * del_x + del_y * del_y;
            if dist < DEGENERATE_DIST2 {
                log::warn!(
                    "dropping observation {}: landmark estimate coincides with the robot",
                    i
                );
                continue;
            }

            // expected measurement from the current map estimate,
            // perturbed unless configured deterministic
            let mut z_expected = Vector2::new(
                dist.sqrt(),
                normalize_angle(del_y.atan2(del_x) - state[0]),
            );
            if !self.deterministic_expected {
                let v = sample_from_factor(&self.r_factor);
                z_expected[0] += v[0];
                z_expected[1] = normalize_angle(z_expected[1] + v[1]);
            }

            let h = observation_jacobian(n, idx, del_x, del_y, dist);

            let innovation = Vector2::new(
                range - z_expected[0],
                normalize_angle(bearing - z_expected[1]),
            );

            let s_full = &h * &covariance * h.transpose();
            let s = Matrix2::new(
                s_full[(0, 0)] + self.r[(0, 0)],
                s_full[(0, 1)] + self.r[(0, 1)],
                s_full[(1, 0)] + self.r[(1, 0)],
                s_full[(1, 1)] + self.r[(1, 1)],
            );
            let s_inv = s.try_inverse().ok_or_else(|| {
                SlamError::Numerical(format!(
                    "innovation covariance is singular for observation {}",
                    i
                ))
            })?;
            let s_inv = DMatrix::from_fn(2, 2, |r, c| s_inv[(r, c)]);

            let k = &covariance * h.transpose() * s_inv;

            state += &k * DVector::from_vec(vec![innovation[0], innovation[1]]);
            state[0] = normalize_angle(state[0]);

            covariance = (DMatrix::identity(n, n) - &k * &h) * &covariance;
            // symmetrize against floating point drift
            covariance = (&covariance + covariance.transpose()) * 0.5;
        }

        ensure_finite(&state, &covariance)?;
        self.state = state;
        self.covariance = covariance;
        self.initialized = initialized;
        Ok(())
    }
}

impl StateEstimator for Slam {
    type State = DVector<f64>;
    type Measurement = TurtleMap;
    type Control = Twist2D;

    fn predict(&mut self, control: &Self::Control) -> SlamResult<()> {
        Slam::predict(self, control)
    }

    fn update(&mut self, measurement: &Self::Measurement) -> SlamResult<()> {
        Slam::update(self, measurement)
    }

    fn state(&self) -> &Self::State {
        &self.state
    }

    fn covariance(&self) -> Option<&DMatrix<f64>> {
        Some(&self.covariance)
    }
}

/// Range and bearing of a point given in the robot body frame.
fn to_range_bearing(x: f64, y: f64) -> (f64, f64) {
    (x.hypot(y), normalize_angle(y.atan2(x)))
}

/// Derivative of the unit-time pose increment with respect to heading.
fn motion_derivative(theta: f64, tw: &Twist2D) -> (f64, f64) {
    if tw.wz == 0.0 {
        (-tw.vx * theta.sin(), tw.vx * theta.cos())
    } else {
        let vel_ratio = tw.vx / tw.wz;
        (
            -vel_ratio * theta.cos() + vel_ratio * (theta + tw.wz).cos(),
            -vel_ratio * theta.sin() + vel_ratio * (theta + tw.wz).sin(),
        )
    }
}

/// Observation Jacobian row-pair for the landmark whose mean entries
/// start at `idx`. Nonzero only in the pose block and the landmark's own
/// columns.
fn observation_jacobian(n: usize, idx: usize, del_x: f64, del_y: f64, dist: f64) -> DMatrix<f64> {
    let sq = dist.sqrt();
    let mut h = DMatrix::zeros(2, n);

    h[(0, 1)] = -del_x / sq;
    h[(0, 2)] = -del_y / sq;
    h[(1, 0)] = -1.0;
    h[(1, 1)] = del_y / dist;
    h[(1, 2)] = -del_x / dist;

    h[(0, idx)] = del_x / sq;
    h[(0, idx + 1)] = del_y / sq;
    h[(1, idx)] = -del_y / dist;
    h[(1, idx + 1)] = del_x / dist;

    h
}

fn ensure_finite(state: &DVector<f64>, covariance: &DMatrix<f64>) -> SlamResult<()> {
    if state.iter().any(|v| !v.is_finite()) || covariance.iter().any(|v| !v.is_finite()) {
        return Err(SlamError::Numerical(
            "state or covariance contains a non-finite value".to_string(),
        ));
    }
    Ok(())
}
