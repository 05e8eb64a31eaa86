//! Time evaluation of the target position
//!
//! Path mode samples the fitted [`GlobalPath`]; prediction mode asks a
//! [`Forecaster`] instead.

use std::any::Any;

use tracing::info;

use crate::common::types::Point;
use crate::error::{Result, TargetError};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::msg::Time;
use crate::target::generator::GlobalPath;

/// Samples a fitted path at arbitrary time offsets
#[derive(Debug, Clone, Copy)]
pub struct TimeEvaluator<'a> {
    path: &'a GlobalPath,
}

impl<'a> TimeEvaluator<'a> {
    pub fn new(path: &'a GlobalPath) -> Self {
        TimeEvaluator { path }
    }

    /// Position at `t` seconds from the start of the path
    pub fn sample(&self, t: f64) -> Point {
        self.path.curve().position(t)
    }

    pub fn sample_many(&self, ts: &[f64]) -> Vec<Point> {
        self.samples(ts.iter().copied()).collect()
    }

    /// Lazy pointwise sampling in input order
    pub fn samples<I>(&self, ts: I) -> Samples<'a, I::IntoIter>
    where
        I: IntoIterator<Item = f64>,
    {
        Samples {
            path: self.path,
            ts: ts.into_iter(),
        }
    }
}

/// Iterator returned by [`TimeEvaluator::samples`]
#[derive(Debug, Clone)]
pub struct Samples<'a, I> {
    path: &'a GlobalPath,
    ts: I,
}

impl<I: Iterator<Item = f64>> Iterator for Samples<'_, I> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        let t = self.ts.next()?;
        Some(self.path.curve().position(t))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ts.size_hint()
    }
}

/// Forecasting backend for prediction mode
pub trait Forecaster: Send {
    /// Feed an observed target position
    fn observe(&mut self, stamp: Time, position: Point);

    /// Predicted position at absolute time `stamp`
    fn eval_prediction(&self, stamp: Time) -> Point;
}

type ForecasterFactory = Box<dyn Fn() -> Box<dyn Forecaster> + Send>;

/// Target predictor used in prediction mode.
///
/// Owns exactly one forecaster, created on configure and dropped on cleanup.
pub struct TargetPredictor {
    base: LifecycleNodeBase,
    factory: ForecasterFactory,
    forecaster: Option<Box<dyn Forecaster>>,
}

impl TargetPredictor {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Forecaster> + Send + 'static,
    {
        TargetPredictor {
            base: LifecycleNodeBase::new("target_predictor"),
            factory: Box::new(factory),
            forecaster: None,
        }
    }

    /// Create the forecaster. Re-initializing replaces the previous one.
    pub fn init(&mut self) {
        if self.forecaster.is_some() {
            info!("[Target predictor] replacing existing forecaster");
        }
        self.forecaster = Some((self.factory)());
    }

    pub fn shutdown(&mut self) {
        self.forecaster = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.forecaster.is_some()
    }

    pub fn forecaster_mut(&mut self) -> Option<&mut (dyn Forecaster + 'static)> {
        self.forecaster.as_deref_mut()
    }

    pub fn observe(&mut self, stamp: Time, position: Point) -> Result<()> {
        let forecaster = self
            .forecaster
            .as_deref_mut()
            .ok_or(TargetError::ForecasterNotInitialized)?;
        forecaster.observe(stamp, position);
        Ok(())
    }

    /// Predicted positions for absolute timestamps, in input order
    pub fn predict_many(&self, stamps: &[Time]) -> Result<Vec<Point>> {
        let forecaster = self
            .forecaster
            .as_deref()
            .ok_or(TargetError::ForecasterNotInitialized)?;
        Ok(stamps.iter().map(|s| forecaster.eval_prediction(*s)).collect())
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }
}

impl LifecycleNode for TargetPredictor {
    fn on_configure(&mut self) -> Result<()> {
        info!("Configuring target predictor");
        self.init();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        if !self.is_initialized() {
            return Err(TargetError::ForecasterNotInitialized);
        }
        info!("Activating target predictor");
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        info!("Deactivating target predictor");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        info!("Cleaning up target predictor");
        self.shutdown();
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
