//! Session broadcaster
//!
//! Run once per simulation tick: publishes the waypoint markers, and once a
//! global path exists, the path itself plus the target pose sampled at the
//! tick's evaluation time.

use std::sync::{Arc, Mutex};

use nalgebra::UnitQuaternion;
use tracing::{debug, error};

use crate::msg::{Header, MarkerArray, Path, Time, TransformStamped};
use crate::target::evaluator::TimeEvaluator;
use crate::target::generator::TrajectoryGenerator;
use crate::target::queue::WaypointQueue;

/// Outbound waypoint visualization
pub trait MarkerSink: Send {
    fn publish_markers(&mut self, markers: &MarkerArray) -> anyhow::Result<()>;
}

/// Outbound global path
pub trait PathSink: Send {
    fn publish_path(&mut self, path: &Path) -> anyhow::Result<()>;
}

/// Outbound frame broadcast
pub trait TransformSink: Send {
    fn send_transform(&mut self, transform: &TransformStamped) -> anyhow::Result<()>;
}

/// Timers driving the evaluation clock.
///
/// Elapsed time only advances while publishing; toggling the publish button
/// pauses and resumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionContext {
    /// Evaluation time accumulated before the latest button press
    pub previous_elapsed: f64,
    /// Time of the latest button press that started publishing
    pub button_pressed_at: f64,
    pub publishing: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the publish button at time `now`
    pub fn toggle(&mut self, now: f64) {
        if self.publishing {
            self.previous_elapsed += (now - self.button_pressed_at).max(0.0);
            self.publishing = false;
        } else {
            self.button_pressed_at = now;
            self.publishing = true;
        }
    }

    /// Evaluation time at `now`
    pub fn eval_time(&self, now: f64) -> f64 {
        if self.publishing {
            self.previous_elapsed + (now - self.button_pressed_at).max(0.0)
        } else {
            self.previous_elapsed
        }
    }

    /// True when publishing has started and no regeneration was triggered
    /// since the button press.
    pub fn should_regenerate(&self, now: f64, last_trigger: Option<f64>) -> bool {
        self.publishing
            && now >= self.button_pressed_at
            && last_trigger.map_or(true, |t| t < self.button_pressed_at)
    }

    /// Rewind the evaluation clock to zero and stop publishing
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct SessionBroadcaster {
    world_frame_id: String,
    target_frame_id: String,
    marker_sink: Box<dyn MarkerSink>,
    path_sink: Box<dyn PathSink>,
    transform_sink: Box<dyn TransformSink>,
}

impl SessionBroadcaster {
    pub fn new(
        world_frame_id: &str,
        target_frame_id: &str,
        marker_sink: Box<dyn MarkerSink>,
        path_sink: Box<dyn PathSink>,
        transform_sink: Box<dyn TransformSink>,
    ) -> Self {
        SessionBroadcaster {
            world_frame_id: world_frame_id.to_string(),
            target_frame_id: target_frame_id.to_string(),
            marker_sink,
            path_sink,
            transform_sink,
        }
    }

    /// Publish one tick. Returns the broadcast transform when a path is ready.
    ///
    /// Sink failures are logged and never abort the tick.
    pub fn session(
        &mut self,
        t_eval: f64,
        queue: &WaypointQueue,
        generator: &TrajectoryGenerator,
        stamp: Time,
    ) -> Option<TransformStamped> {
        if let Err(e) = self.marker_sink.publish_markers(queue.markers()) {
            error!("Failed to publish waypoint markers: {}", e);
        }

        let path = generator.current_path()?;

        if let Err(e) = self.path_sink.publish_path(path.as_path()) {
            error!("Failed to publish global path: {}", e);
        }

        let point = TimeEvaluator::new(path).sample(t_eval);
        let transform = TransformStamped {
            header: Header {
                stamp,
                frame_id: self.world_frame_id.clone(),
            },
            child_frame_id: self.target_frame_id.clone(),
            translation: point.coords,
            rotation: UnitQuaternion::identity(),
        };

        if let Err(e) = self.transform_sink.send_transform(&transform) {
            error!("Failed to broadcast target transform: {}", e);
        }
        debug!(
            "target at t = {:.3}: ({:.3}, {:.3}, {:.3})",
            t_eval, point.x, point.y, point.z
        );

        Some(transform)
    }
}

/// Everything a [`RecordingSink`] has received
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub markers: Vec<MarkerArray>,
    pub paths: Vec<Path>,
    pub transforms: Vec<TransformStamped>,
}

/// In-memory sink. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    record: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Recorded {
        self.record
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn with_record<F: FnOnce(&mut Recorded)>(&self, f: F) -> anyhow::Result<()> {
        let mut record = self
            .record
            .lock()
            .map_err(|_| anyhow::anyhow!("recording sink poisoned"))?;
        f(&mut record);
        Ok(())
    }
}

impl MarkerSink for RecordingSink {
    fn publish_markers(&mut self, markers: &MarkerArray) -> anyhow::Result<()> {
        self.with_record(|r| r.markers.push(markers.clone()))
    }
}

impl PathSink for RecordingSink {
    fn publish_path(&mut self, path: &Path) -> anyhow::Result<()> {
        self.with_record(|r| r.paths.push(path.clone()))
    }
}

impl TransformSink for RecordingSink {
    fn send_transform(&mut self, transform: &TransformStamped) -> anyhow::Result<()> {
        self.with_record(|r| r.transforms.push(transform.clone()))
    }
}

/// Sink that only writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MarkerSink for LogSink {
    fn publish_markers(&mut self, markers: &MarkerArray) -> anyhow::Result<()> {
        debug!("markers: {} waypoints", markers.markers.len());
        Ok(())
    }
}

impl PathSink for LogSink {
    fn publish_path(&mut self, path: &Path) -> anyhow::Result<()> {
        debug!("path: {} poses in {}", path.poses.len(), path.header.frame_id);
        Ok(())
    }
}

impl TransformSink for LogSink {
    fn send_transform(&mut self, transform: &TransformStamped) -> anyhow::Result<()> {
        let p = transform.translation;
        tracing::info!(
            "{} -> {}: ({:.3}, {:.3}, {:.3})",
            transform.header.frame_id,
            transform.child_frame_id,
            p.x,
            p.y,
            p.z
        );
        Ok(())
    }
}
