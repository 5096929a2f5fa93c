//! Zero-mean multivariate Gaussian sampling
//!
//! Noise draws go through a Cholesky factor of the requested covariance:
//! x = L z with z standard normal. The generator is process-scoped,
//! seeded from entropy at first use, and reseedable for tests.

use std::sync::{Mutex, OnceLock};

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::common::{SlamError, SlamResult};

/// Negative pivots above this magnitude mean the matrix is not PSD.
const PIVOT_TOLERANCE: f64 = 1e-9;

static GENERATOR: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn generator() -> &'static Mutex<StdRng> {
    GENERATOR.get_or_init(|| Mutex::new(StdRng::from_entropy()))
}

/// Reseed the process-scoped generator. Intended for tests that need
/// reproducible draws.
pub fn reseed(seed: u64) {
    let mut rng = generator().lock().unwrap();
    *rng = StdRng::seed_from_u64(seed);
}

/// Lower-triangular L with L * L^T = C for a symmetric positive
/// semi-definite C.
///
/// Unlike a strict Cholesky this tolerates zero pivots, so singular
/// covariances (including the zero matrix) factor cleanly. A negative
/// pivot, or a nonzero column under a zero pivot, means C is not PSD.
pub fn cholesky_semidefinite(c: &DMatrix<f64>) -> SlamResult<DMatrix<f64>> {
    if c.nrows() != c.ncols() {
        return Err(SlamError::ShapeMismatch(format!(
            "covariance must be square, got {}x{}",
            c.nrows(),
            c.ncols()
        )));
    }
    let n = c.nrows();
    let mut l = DMatrix::zeros(n, n);
    for j in 0..n {
        let mut pivot = c[(j, j)];
        for k in 0..j {
            pivot -= l[(j, k)] * l[(j, k)];
        }
        if pivot < -PIVOT_TOLERANCE {
            return Err(SlamError::Numerical(format!(
                "covariance is not positive semi-definite (pivot {} at column {})",
                pivot, j
            )));
        }
        if pivot <= 0.0 {
            // zero pivot: for a PSD matrix the rest of the column is zero
            for i in (j + 1)..n {
                let mut below = c[(i, j)];
                for k in 0..j {
                    below -= l[(i, k)] * l[(j, k)];
                }
                if below.abs() > PIVOT_TOLERANCE {
                    return Err(SlamError::Numerical(format!(
                        "covariance is not positive semi-definite (column {} under zero pivot)",
                        j
                    )));
                }
            }
            continue;
        }
        let diag = pivot.sqrt();
        l[(j, j)] = diag;
        for i in (j + 1)..n {
            let mut sum = c[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = sum / diag;
        }
    }
    Ok(l)
}

/// Draw x ~ N(0, C) using the process-scoped generator.
pub fn sample_gaussian(c: &DMatrix<f64>) -> SlamResult<DVector<f64>> {
    let l = cholesky_semidefinite(c)?;
    Ok(sample_from_factor(&l))
}

/// Draw x ~ N(0, C) from a caller-owned generator.
pub fn sample_gaussian_with<R: Rng + ?Sized>(
    c: &DMatrix<f64>,
    rng: &mut R,
) -> SlamResult<DVector<f64>> {
    let l = cholesky_semidefinite(c)?;
    let z = standard_normal_vector_with(l.nrows(), rng);
    Ok(l * z)
}

/// Draw x = L z with z standard normal, for a precomputed Cholesky
/// factor L. Uses the process-scoped generator.
pub fn sample_from_factor(l: &DMatrix<f64>) -> DVector<f64> {
    let mut rng = generator().lock().unwrap();
    let z = standard_normal_vector_with(l.nrows(), &mut *rng);
    l * z
}

fn standard_normal_vector_with<R: Rng + ?Sized>(n: usize, rng: &mut R) -> DVector<f64> {
    DVector::from_fn(n, |_, _| StandardNormal.sample(rng))
}
