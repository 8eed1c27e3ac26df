//! Bracketed scalar solvers.
//!
//! Both solvers are deterministic and never leave the caller's bracket. A
//! bracket that does not contain a solution, or an iteration budget that runs
//! out, is reported as a [`SolverError`] instead of a best guess.

use thiserror::Error;
use tracing::trace;

/// Default iteration budget.
pub const MAX_ITERATIONS: usize = 200;

/// Golden ratio conjugate, `(sqrt(5) - 1) / 2`.
const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Errors from the scalar solvers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// Bracket ends are not finite or are out of order.
    #[error("invalid bracket [{lo}, {hi}]")]
    InvalidBracket {
        /// Lower end.
        lo: f64,
        /// Upper end.
        hi: f64,
    },

    /// The function does not change sign over the bracket.
    #[error("no sign change over [{lo}, {hi}] (f = {f_lo}, {f_hi})")]
    NoBracket {
        /// Lower end.
        lo: f64,
        /// Upper end.
        hi: f64,
        /// Function value at the lower end.
        f_lo: f64,
        /// Function value at the upper end.
        f_hi: f64,
    },

    /// Iteration budget exhausted, or the best point misses the target.
    #[error("solver did not converge after {iterations} iterations (residual {residual})")]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
        /// Residual at the best point found.
        residual: f64,
    },
}

/// A closed search interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// Lower end.
    pub lo: f64,
    /// Upper end.
    pub hi: f64,
}

impl Bracket {
    /// Create a bracket, rejecting non-finite or reversed ends.
    pub fn new(lo: f64, hi: f64) -> Result<Self, SolverError> {
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(SolverError::InvalidBracket { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    /// Width of the interval.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// Whether `x` lies inside the interval.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lo && x <= self.hi
    }

    fn scale(&self) -> f64 {
        self.lo.abs().max(self.hi.abs()).max(f64::MIN_POSITIVE)
    }
}

/// Solver tolerances and iteration budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Interval tolerance, relative to the larger bracket end.
    pub x_tolerance: f64,
    /// Accepted residual, relative to the target the caller solves for.
    pub f_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            x_tolerance: 1e-12,
            f_tolerance: 1e-6,
        }
    }
}

/// Result of a converged solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    /// Abscissa found.
    pub x: f64,
    /// Function value at `x`.
    pub value: f64,
    /// Iterations used.
    pub iterations: usize,
}

/// Find a root of `f` inside `bracket` with Brent's method.
///
/// `f(lo)` and `f(hi)` must differ in sign (or one of them be zero).
pub fn brent_root<F>(mut f: F, bracket: Bracket, settings: &SolverSettings) -> Result<Solution, SolverError>
where
    F: FnMut(f64) -> f64,
{
    let x_tol = settings.x_tolerance * bracket.scale();
    let (mut a, mut b) = (bracket.lo, bracket.hi);
    let (mut fa, mut fb) = (f(a), f(b));

    if fa == 0.0 {
        return Ok(Solution { x: a, value: fa, iterations: 0 });
    }
    if fb == 0.0 {
        return Ok(Solution { x: b, value: fb, iterations: 0 });
    }
    if fa.signum() == fb.signum() || fa.is_nan() || fb.is_nan() {
        return Err(SolverError::NoBracket {
            lo: a,
            hi: b,
            f_lo: fa,
            f_hi: fb,
        });
    }

    let (mut c, mut fc) = (b, fb);
    let mut d = b - a;
    let mut e = d;

    for iteration in 1..=settings.max_iterations {
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * x_tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol || fb == 0.0 {
            trace!(iteration, x = b, value = fb, "brent converged");
            return Ok(Solution { x: b, value: fb, iterations: iteration });
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            // Inverse quadratic interpolation, or secant when only two points differ.
            let s = fb / fa;
            let (p, q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let qa = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0)),
                    (qa - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            let q = if p > 0.0 { -q } else { q };
            let p = p.abs();
            let limit = (3.0 * xm * q - (tol * q).abs()).min((e * q).abs());
            if 2.0 * p < limit {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(xm) };
        fb = f(b);
    }

    Err(SolverError::NotConverged {
        iterations: settings.max_iterations,
        residual: fb.abs(),
    })
}

/// Minimize a unimodal `f` over `bracket` by golden-section search.
///
/// Plateaus are walked towards the upper end, which suits objectives that
/// are flat below some threshold and unimodal above it.
pub fn golden_section_min<F>(
    mut f: F,
    bracket: Bracket,
    settings: &SolverSettings,
) -> Result<Solution, SolverError>
where
    F: FnMut(f64) -> f64,
{
    let x_tol = settings.x_tolerance * bracket.scale();
    let (mut a, mut b) = (bracket.lo, bracket.hi);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    for iteration in 1..=settings.max_iterations {
        if (b - a).abs() <= x_tol {
            let x = 0.5 * (a + b);
            let value = f(x);
            trace!(iteration, x, value, "golden section converged");
            return Ok(Solution { x, value, iterations: iteration });
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d);
        }
    }

    Err(SolverError::NotConverged {
        iterations: settings.max_iterations,
        residual: fc.min(fd),
    })
}
