//! Waypoint queue with insertion gate and index-aligned marker set

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::common::types::Waypoint;
use crate::error::{ConfigError, QueueError};
use crate::msg::{ColorRGBA, Header, Marker, MarkerAction, MarkerArray, MarkerShape};

const MARKER_SCALE: f64 = 0.1;

/// Ordered waypoints for the global trajectory.
///
/// Entry `i` becomes knot `i` of the fitted path, and marker `i` always
/// visualizes waypoint `i`.
#[derive(Debug)]
pub struct WaypointQueue {
    frame_id: String,
    waypoints: Vec<Waypoint>,
    markers: MarkerArray,
    insert_permit: bool,
}

impl WaypointQueue {
    /// Create an empty queue whose markers are expressed in `frame_id`.
    /// The gate starts closed.
    pub fn new(frame_id: &str) -> Self {
        WaypointQueue {
            frame_id: frame_id.to_string(),
            waypoints: Vec::new(),
            markers: MarkerArray::default(),
            insert_permit: false,
        }
    }

    pub fn open_gate(&mut self) {
        self.set_gate(true);
    }

    pub fn close_gate(&mut self) {
        self.set_gate(false);
    }

    pub fn set_gate(&mut self, permit: bool) {
        if self.insert_permit != permit {
            debug!("[Target manager] insertion permit: {}", permit);
        }
        self.insert_permit = permit;
    }

    pub fn is_gate_open(&self) -> bool {
        self.insert_permit
    }

    /// Append a waypoint if the gate is open.
    pub fn append(&mut self, waypoint: Waypoint) -> Result<(), QueueError> {
        if !self.insert_permit {
            warn!("[Target manager] insertion not allowed");
            return Err(QueueError::InsertionDenied);
        }

        self.waypoints.push(waypoint);
        let id = self.waypoints.len() as i32;
        let marker = self.make_marker(&waypoint, id, ColorRGBA::RED);
        self.markers.markers.push(marker);

        let p = waypoint.position();
        info!("[Target manager] received point: {:.3} , {:.3}", p.x, p.y);
        Ok(())
    }

    /// Remove the last waypoint and its marker. Popping an empty queue is a
    /// no-op.
    pub fn pop_last(&mut self) -> Option<Waypoint> {
        match self.waypoints.pop() {
            Some(waypoint) => {
                self.markers.markers.pop();
                info!("[Target manager] queue pop");
                Some(waypoint)
            }
            None => {
                info!("[Target manager] queue already empty, nothing to pop");
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.markers.markers.clear();
        info!("[Target manager] queue cleared");
    }

    /// Substitute the whole queue. Markers are rebuilt from scratch with ids
    /// starting at zero.
    pub fn replace(&mut self, waypoints: Vec<Waypoint>) {
        let markers = waypoints
            .iter()
            .enumerate()
            .map(|(i, wp)| {
                let p = wp.position();
                debug!("[Target manager] loaded point: {:.3} , {:.3} , {:.3}", p.x, p.y, p.z);
                self.make_marker(wp, i as i32, ColorRGBA::MAGENTA)
            })
            .collect();

        self.waypoints = waypoints;
        self.markers = MarkerArray { markers };
        info!("[Target manager] queue replaced with {} waypoints", self.waypoints.len());
    }

    /// Replace the queue with the waypoints listed in a TOML file.
    ///
    /// ```toml
    /// [[waypoint]]
    /// x = 0.0
    /// y = 0.0
    /// z = 1.0
    /// yaw = 0.0   # optional
    /// ```
    pub fn load_waypoints_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, ConfigError> {
        let content = fs::read_to_string(path)?;
        let file: WaypointFile = toml::from_str(&content)?;

        if let Some(bad) = file.waypoint.iter().position(|e| !e.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "waypoint {} has a non-finite coordinate",
                bad
            )));
        }

        let waypoints: Vec<Waypoint> = file
            .waypoint
            .iter()
            .map(|e| Waypoint::with_yaw(e.x, e.y, e.z, e.yaw))
            .collect();
        let count = waypoints.len();
        self.replace(waypoints);
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Waypoint> {
        self.waypoints.clone()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn markers(&self) -> &MarkerArray {
        &self.markers
    }

    fn make_marker(&self, waypoint: &Waypoint, id: i32, color: ColorRGBA) -> Marker {
        Marker {
            header: Header::new(&self.frame_id),
            id,
            shape: MarkerShape::Cube,
            action: MarkerAction::Add,
            pose: waypoint.pose,
            scale: Vector3::repeat(MARKER_SCALE),
            color,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaypointFile {
    #[serde(default)]
    waypoint: Vec<WaypointEntry>,
}

#[derive(Debug, Deserialize)]
struct WaypointEntry {
    x: f64,
    y: f64,
    z: f64,
    #[serde(default)]
    yaw: f64,
}

impl WaypointEntry {
    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.yaw.is_finite()
    }
}
