//! Target manager
//!
//! Manages the moving target of the simulation: waypoints come in through a
//! gated queue, get fitted into a global path on request, and every session
//! tick publishes the queue and (once a path exists) the target pose at the
//! tick's evaluation time.
pub mod evaluator;
pub mod generator;
pub mod queue;
pub mod session;

use std::any::Any;
use std::path::Path as FsPath;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use self::evaluator::TimeEvaluator;
use self::generator::{GlobalPath, TrajectoryFitter, TrajectoryGenerator};
use self::queue::WaypointQueue;
use self::session::{
    LogSink, MarkerSink, PathSink, RecordingSink, SessionBroadcaster, TransformSink,
};
use crate::common::types::{Point, Waypoint};
use crate::config::TargetManagerConfig;
use crate::error::{ConfigError, GenerationError, QueueError, Result, TargetError};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::msg::{Header, Path, PoseStamped, Time, TransformStamped};

/// Offset added to `min_height` for exported waypoints
const HEIGHT_MARGIN: f64 = 0.001;

/// Output sinks of one manager
pub struct TargetSinks {
    pub markers: Box<dyn MarkerSink>,
    pub path: Box<dyn PathSink>,
    pub transforms: Box<dyn TransformSink>,
}

impl TargetSinks {
    /// Sinks that only log what they receive
    pub fn logging() -> Self {
        TargetSinks {
            markers: Box::new(LogSink),
            path: Box::new(LogSink),
            transforms: Box::new(LogSink),
        }
    }

    /// All three outputs recorded into `sink`
    pub fn recording(sink: &RecordingSink) -> Self {
        TargetSinks {
            markers: Box::new(sink.clone()),
            path: Box::new(sink.clone()),
            transforms: Box::new(sink.clone()),
        }
    }
}

/// Target manager used when the target path is precomputed from waypoints
pub struct TargetManager {
    base: LifecycleNodeBase,
    config: TargetManagerConfig,
    queue: WaypointQueue,
    generator: TrajectoryGenerator,
    broadcaster: SessionBroadcaster,
}

impl TargetManager {
    pub fn new(
        config: TargetManagerConfig,
        fitter: Arc<dyn TrajectoryFitter>,
        sinks: TargetSinks,
    ) -> Result<Self> {
        config.validate()?;

        info!(
            "[Target manager] world frame {}, target frame {}, min height {}",
            config.world_frame_id, config.target_frame_id, config.min_height
        );

        Ok(TargetManager {
            base: LifecycleNodeBase::new("target_manager"),
            queue: WaypointQueue::new(&config.world_frame_id),
            generator: TrajectoryGenerator::new(
                fitter,
                config.trajectory.clone(),
                &config.world_frame_id,
                config.path_resolution,
            ),
            broadcaster: SessionBroadcaster::new(
                &config.world_frame_id,
                &config.target_frame_id,
                sinks.markers,
                sinks.path,
                sinks.transforms,
            ),
            config,
        })
    }

    pub fn config(&self) -> &TargetManagerConfig {
        &self.config
    }

    pub fn queue(&self) -> &WaypointQueue {
        &self.queue
    }

    pub fn set_insert_permit(&mut self, permit: bool) {
        self.queue.set_gate(permit);
    }

    pub fn is_insert_permit(&self) -> bool {
        self.queue.is_gate_open()
    }

    /// Inbound waypoint message
    pub fn callback_waypoint(&mut self, msg: &PoseStamped) -> std::result::Result<(), QueueError> {
        self.queue.append(Waypoint::from(msg))
    }

    pub fn insert_waypoint(&mut self, waypoint: Waypoint) -> std::result::Result<(), QueueError> {
        self.queue.append(waypoint)
    }

    pub fn pop_waypoint(&mut self) -> Option<Waypoint> {
        self.queue.pop_last()
    }

    pub fn clear_waypoint(&mut self) {
        self.queue.clear();
    }

    pub fn replace_waypoints(&mut self, waypoints: Vec<Waypoint>) {
        self.queue.replace(waypoints);
    }

    pub fn load_waypoints_file<P: AsRef<FsPath>>(
        &mut self,
        path: P,
    ) -> std::result::Result<usize, ConfigError> {
        self.queue.load_waypoints_file(path)
    }

    /// Fit the global path through the queued waypoints over `[0, tf]`.
    pub fn global_path_generate(
        &mut self,
        tf: f64,
    ) -> std::result::Result<GlobalPath, GenerationError> {
        self.generator.generate(self.queue.waypoints(), tf)
    }

    pub fn is_path(&self) -> bool {
        self.generator.is_ready()
    }

    pub fn current_path(&self) -> Option<&GlobalPath> {
        self.generator.current_path()
    }

    pub fn discard_path(&mut self) {
        self.generator.discard_path();
    }

    /// One session tick at evaluation time `t_eval`
    pub fn session(&mut self, t_eval: f64) -> Option<TransformStamped> {
        self.broadcaster
            .session(t_eval, &self.queue, &self.generator, Time::now())
    }

    /// Sample the global path at each of `ts` (seconds from path start)
    pub fn eval_time_seq(&self, ts: &[f64]) -> Result<Vec<Point>> {
        let path = self.generator.current_path().ok_or(TargetError::PathNotReady)?;
        Ok(TimeEvaluator::new(path).sample_many(ts))
    }

    /// Waypoints of the latest generation attempt, lifted to the height floor
    pub fn global_waypoints(&self) -> Path {
        let frame_id = &self.config.world_frame_id;
        let z = self.config.min_height + HEIGHT_MARGIN;
        let poses = self
            .generator
            .waypoints_seq()
            .iter()
            .map(|wp| {
                let mut pose = PoseStamped::from_waypoint(frame_id, wp);
                pose.pose.position.z = z;
                pose
            })
            .collect();

        Path {
            header: Header::new(frame_id),
            poses,
        }
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }
}

/// Regenerate the global path without holding the manager lock during the
/// fit. If another request is issued while this one is fitting, this result
/// is discarded.
pub async fn regenerate_async(
    manager: &Arc<Mutex<TargetManager>>,
    tf: f64,
) -> std::result::Result<GlobalPath, GenerationError> {
    let (request, fitter) = {
        let mut guard = manager.lock().await;
        let waypoints = guard.queue.snapshot();
        let request = guard.generator.begin_request(&waypoints, tf)?;
        (request, guard.generator.fitter())
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let result = request.run(fitter.as_ref());
        (request, result)
    })
    .await;

    let (request, result) = match outcome {
        Ok(pair) => pair,
        Err(e) => {
            warn!("[Target manager] fitting task failed: {}", e);
            return Err(GenerationError::FitFailed(e.to_string()));
        }
    };

    manager.lock().await.generator.complete(request, result)
}

impl LifecycleNode for TargetManager {
    fn on_configure(&mut self) -> Result<()> {
        info!("Configuring target manager");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        info!("Activating target manager");
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        info!("Deactivating target manager");
        self.queue.close_gate();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        info!("Cleaning up target manager");
        self.queue.clear();
        self.generator.discard_path();
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
