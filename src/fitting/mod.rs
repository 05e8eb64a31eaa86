//! Reference trajectory fitter
//!
//! Clamped cubic spline through the waypoints, one independent spline per
//! axis. The end velocities come from the boundary conditions; end
//! accelerations and the corridor/objective options are not representable
//! with a cubic and are ignored.

use std::sync::Arc;

use nalgebra::{DMatrix, Vector3};
use tracing::debug;

use crate::common::types::{Point, Waypoint};
use crate::config::TrajectoryOptions;
use crate::error::FitError;
use crate::target::generator::{BoundaryCondition, Curve, TrajectoryFitter};

/// Fits [`CubicSpline`] curves
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicSplineFitter;

impl CubicSplineFitter {
    pub fn new() -> Self {
        CubicSplineFitter
    }
}

impl TrajectoryFitter for CubicSplineFitter {
    fn fit(
        &self,
        knots: &[f64],
        waypoints: &[Waypoint],
        start: &BoundaryCondition,
        end: &BoundaryCondition,
        options: &TrajectoryOptions,
    ) -> Result<Arc<dyn Curve>, FitError> {
        debug!(
            "cubic spline fit over {} knots (poly order {} requested)",
            knots.len(),
            options.polynomial_order
        );
        let points: Vec<Point> = waypoints.iter().map(|w| w.position()).collect();
        let spline = CubicSpline::clamped(knots, &points, start.velocity, end.velocity)?;
        Ok(Arc::new(spline))
    }
}

/// Piecewise cubic through `points` at `knots`.
///
/// Holds the end positions outside the knot range.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    points: Vec<Point>,
    /// Second derivative at each knot, one row per knot
    second: Vec<Vector3<f64>>,
}

impl CubicSpline {
    pub fn clamped(
        knots: &[f64],
        points: &[Point],
        start_velocity: Vector3<f64>,
        end_velocity: Vector3<f64>,
    ) -> Result<Self, FitError> {
        if knots.len() != points.len() || knots.is_empty() {
            return Err(FitError::KnotMismatch {
                knots: knots.len(),
                waypoints: points.len(),
            });
        }
        if knots.iter().any(|t| !t.is_finite()) || knots.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FitError::NonIncreasingKnots);
        }

        let n = knots.len();
        if n == 1 {
            return Ok(CubicSpline {
                knots: knots.to_vec(),
                points: points.to_vec(),
                second: vec![Vector3::zeros()],
            });
        }

        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        let slope = |i: usize| (points[i + 1] - points[i]) / h[i];

        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DMatrix::<f64>::zeros(n, 3);

        a[(0, 0)] = 2.0 * h[0];
        a[(0, 1)] = h[0];
        rhs.row_mut(0).copy_from(&(6.0 * (slope(0) - start_velocity)).transpose());

        for i in 1..n - 1 {
            a[(i, i - 1)] = h[i - 1];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i];
            rhs.row_mut(i).copy_from(&(6.0 * (slope(i) - slope(i - 1))).transpose());
        }

        a[(n - 1, n - 2)] = h[n - 2];
        a[(n - 1, n - 1)] = 2.0 * h[n - 2];
        rhs.row_mut(n - 1).copy_from(&(6.0 * (end_velocity - slope(n - 2))).transpose());

        let m = a.lu().solve(&rhs).ok_or(FitError::Singular)?;
        let second = (0..n)
            .map(|i| Vector3::new(m[(i, 0)], m[(i, 1)], m[(i, 2)]))
            .collect();

        Ok(CubicSpline {
            knots: knots.to_vec(),
            points: points.to_vec(),
            second,
        })
    }

    /// Segment containing `t`, `t` already clamped to the knot range
    fn segment(&self, t: f64) -> usize {
        let last = self.knots.len() - 2;
        match self.knots.binary_search_by(|k| k.total_cmp(&t)) {
            Ok(i) => i.min(last),
            Err(i) => i.saturating_sub(1).min(last),
        }
    }
}

impl Curve for CubicSpline {
    fn position(&self, t: f64) -> Point {
        let n = self.knots.len();
        if n == 1 {
            return self.points[0];
        }

        let t = t.clamp(self.knots[0], self.knots[n - 1]);
        let i = self.segment(t);
        let h = self.knots[i + 1] - self.knots[i];
        let a = self.knots[i + 1] - t;
        let b = t - self.knots[i];
        let (m0, m1) = (self.second[i], self.second[i + 1]);
        let (p0, p1) = (self.points[i].coords, self.points[i + 1].coords);

        let coords = m0 * (a.powi(3) / (6.0 * h))
            + m1 * (b.powi(3) / (6.0 * h))
            + (p0 / h - m0 * (h / 6.0)) * a
            + (p1 / h - m1 * (h / 6.0)) * b;
        Point::from(coords)
    }

    fn domain(&self) -> (f64, f64) {
        match self.knots.len() {
            1 => (0.0, self.knots[0]),
            n => (self.knots[0], self.knots[n - 1]),
        }
    }

    fn is_valid(&self) -> bool {
        self.second.iter().all(|m| m.iter().all(|v| v.is_finite()))
            && self.points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
    }
}
