//! Trajectory generation adapter
//!
//! Turns the waypoint queue into a time-parameterized [`GlobalPath`] through an
//! injected [`TrajectoryFitter`]. The adapter owns the current path and its
//! validity; a failed regeneration never tears down a path that is already
//! being served.

use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::common::types::{Point, Waypoint};
use crate::config::TrajectoryOptions;
use crate::error::{FitError, GenerationError};
use crate::msg::{Header, Path, PoseStamped};

/// Continuous-time curve produced by a fitter
pub trait Curve: Debug + Send + Sync {
    /// Position at time `t`. Times outside [`Curve::domain`] follow the
    /// curve's own extrapolation policy.
    fn position(&self, t: f64) -> Point;

    /// Time interval the curve was fitted over
    fn domain(&self) -> (f64, f64);

    /// Fitter-specific sanity check on the solved curve
    fn is_valid(&self) -> bool;
}

/// Derivative constraints at one end of the trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCondition {
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
}

impl BoundaryCondition {
    /// Zero velocity and acceleration
    pub fn at_rest() -> Self {
        BoundaryCondition {
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }
    }
}

/// Curve-fitting backend
pub trait TrajectoryFitter: Send + Sync {
    fn fit(
        &self,
        knots: &[f64],
        waypoints: &[Waypoint],
        start: &BoundaryCondition,
        end: &BoundaryCondition,
        options: &TrajectoryOptions,
    ) -> Result<Arc<dyn Curve>, FitError>;
}

/// Upper bound on the number of poses in a discretized path
pub const MAX_PATH_POSES: usize = 10_000;

/// Result of a successful generation call
#[derive(Debug, Clone)]
pub struct GlobalPath {
    curve: Arc<dyn Curve>,
    knots: Vec<f64>,
    path: Path,
}

impl GlobalPath {
    fn new(curve: Arc<dyn Curve>, knots: Vec<f64>, frame_id: &str, resolution: f64) -> Self {
        let (t0, tf) = curve.domain();
        let span = tf - t0;
        // long horizons widen the step instead of growing the path
        let step = resolution.max(span / MAX_PATH_POSES as f64);
        let steps = ((span / step).ceil().max(1.0) as usize).min(MAX_PATH_POSES);
        let poses = (0..=steps)
            .map(|i| {
                let t = if i == steps { tf } else { (t0 + i as f64 * step).min(tf) };
                PoseStamped::new(frame_id, curve.position(t))
            })
            .collect();

        GlobalPath {
            curve,
            knots,
            path: Path {
                header: Header::new(frame_id),
                poses,
            },
        }
    }

    pub fn curve(&self) -> &dyn Curve {
        self.curve.as_ref()
    }

    /// Knot times, one per waypoint, in queue order
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn horizon(&self) -> f64 {
        self.curve.domain().1
    }

    pub fn frame_id(&self) -> &str {
        &self.path.header.frame_id
    }

    /// Discretized form handed to the path sink
    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

/// Monotonic id of a generation request
pub type RequestId = u64;

/// Everything a fitter needs, detached from the adapter so the fit can run
/// off the session thread.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: RequestId,
    pub knots: Vec<f64>,
    pub waypoints: Vec<Waypoint>,
    pub options: TrajectoryOptions,
}

impl GenerationRequest {
    pub fn run(&self, fitter: &dyn TrajectoryFitter) -> Result<Arc<dyn Curve>, FitError> {
        let boundary = BoundaryCondition::at_rest();
        fitter.fit(&self.knots, &self.waypoints, &boundary, &boundary, &self.options)
    }
}

/// `n` evenly spaced knots over `[0, horizon]`. A single knot sits at
/// `horizon`.
pub fn linspaced_knots(n: usize, horizon: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![horizon],
        _ => {
            let step = horizon / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { horizon } else { i as f64 * step })
                .collect()
        }
    }
}

pub struct TrajectoryGenerator {
    fitter: Arc<dyn TrajectoryFitter>,
    options: TrajectoryOptions,
    frame_id: String,
    resolution: f64,
    global_path: Option<GlobalPath>,
    waypoints_seq: Vec<Waypoint>,
    latest_request: RequestId,
}

impl TrajectoryGenerator {
    pub fn new(
        fitter: Arc<dyn TrajectoryFitter>,
        options: TrajectoryOptions,
        frame_id: &str,
        resolution: f64,
    ) -> Self {
        TrajectoryGenerator {
            fitter,
            options,
            frame_id: frame_id.to_string(),
            resolution,
            global_path: None,
            waypoints_seq: Vec::new(),
            latest_request: 0,
        }
    }

    /// Fit a path through `waypoints` over `[0, horizon]` and make it current.
    pub fn generate(
        &mut self,
        waypoints: &[Waypoint],
        horizon: f64,
    ) -> Result<GlobalPath, GenerationError> {
        let request = self.begin_request(waypoints, horizon)?;
        let result = request.run(self.fitter.as_ref());
        self.complete(request, result)
    }

    /// Issue a new request id and validate inputs. Any request issued earlier
    /// is superseded from this point on, even when validation fails.
    pub fn begin_request(
        &mut self,
        waypoints: &[Waypoint],
        horizon: f64,
    ) -> Result<GenerationRequest, GenerationError> {
        self.latest_request += 1;

        if waypoints.is_empty() {
            info!("[Target manager] target waypoints empty");
            return Err(GenerationError::EmptyQueue);
        }

        self.waypoints_seq = waypoints.to_vec();

        if !horizon.is_finite() || horizon <= 0.0 {
            info!("[Target manager] path generation failed: horizon {}", horizon);
            return Err(GenerationError::FitFailed(format!(
                "horizon must be positive and finite, got {}",
                horizon
            )));
        }

        debug!(
            "[Target manager] generation request {} over {} waypoints, tf = {}",
            self.latest_request,
            waypoints.len(),
            horizon
        );

        Ok(GenerationRequest {
            id: self.latest_request,
            knots: linspaced_knots(waypoints.len(), horizon),
            waypoints: waypoints.to_vec(),
            options: self.options.clone(),
        })
    }

    /// Apply the fitter's answer to `request`. Answers to anything but the
    /// latest request are dropped.
    pub fn complete(
        &mut self,
        request: GenerationRequest,
        result: Result<Arc<dyn Curve>, FitError>,
    ) -> Result<GlobalPath, GenerationError> {
        if request.id != self.latest_request {
            warn!(
                "[Target manager] discarding stale fit {} (latest is {})",
                request.id, self.latest_request
            );
            return Err(GenerationError::Superseded(request.id));
        }

        let curve = match result {
            Ok(curve) => curve,
            Err(e) => {
                info!("[Target manager] path generation failed: {}", e);
                return Err(e.into());
            }
        };

        let (t0, tf) = curve.domain();
        if !curve.is_valid() || !t0.is_finite() || !tf.is_finite() || tf < t0 {
            info!("[Target manager] path generation failed: invalid spline");
            return Err(GenerationError::FitFailed(
                "fitted curve failed validity check".to_string(),
            ));
        }

        let path = GlobalPath::new(curve, request.knots, &self.frame_id, self.resolution);
        self.global_path = Some(path.clone());
        info!("[Target manager] global path obtained.");
        Ok(path)
    }

    pub fn is_ready(&self) -> bool {
        self.global_path.is_some()
    }

    pub fn current_path(&self) -> Option<&GlobalPath> {
        self.global_path.as_ref()
    }

    /// Explicitly drop the current path; the adapter is not ready afterwards.
    pub fn discard_path(&mut self) {
        if self.global_path.take().is_some() {
            info!("[Target manager] global path discarded");
        }
    }

    /// Waypoints of the latest non-empty generation attempt
    pub fn waypoints_seq(&self) -> &[Waypoint] {
        &self.waypoints_seq
    }

    pub fn fitter(&self) -> Arc<dyn TrajectoryFitter> {
        Arc::clone(&self.fitter)
    }
}
