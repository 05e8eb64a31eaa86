//! Reference forecaster for prediction mode

use std::collections::VecDeque;

use nalgebra::Vector3;

use crate::common::types::Point;
use crate::msg::Time;
use crate::target::evaluator::Forecaster;

const DEFAULT_WINDOW: usize = 10;

/// Extrapolates the target with the average velocity over the last few
/// observations.
#[derive(Debug, Clone)]
pub struct ConstantVelocityForecaster {
    window: usize,
    history: VecDeque<(f64, Point)>,
}

impl ConstantVelocityForecaster {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Keep at most `window` observations (at least two)
    pub fn with_window(window: usize) -> Self {
        let window = window.max(2);
        ConstantVelocityForecaster {
            window,
            history: VecDeque::with_capacity(window),
        }
    }

    pub fn observation_count(&self) -> usize {
        self.history.len()
    }

    fn velocity(&self) -> Vector3<f64> {
        match (self.history.front(), self.history.back()) {
            (Some(&(t0, p0)), Some(&(t1, p1))) if t1 > t0 => (p1 - p0) / (t1 - t0),
            _ => Vector3::zeros(),
        }
    }
}

impl Default for ConstantVelocityForecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for ConstantVelocityForecaster {
    fn observe(&mut self, stamp: Time, position: Point) {
        let t = stamp.as_seconds();
        // out-of-order observations would corrupt the velocity estimate
        if let Some((last, _)) = self.history.back() {
            if t <= *last {
                tracing::debug!("dropping out-of-order observation at {:.3}", t);
                return;
            }
        }
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back((t, position));
    }

    fn eval_prediction(&self, stamp: Time) -> Point {
        match self.history.back() {
            Some(&(t_last, p_last)) => p_last + self.velocity() * (stamp.as_seconds() - t_last),
            None => Point::origin(),
        }
    }
}
