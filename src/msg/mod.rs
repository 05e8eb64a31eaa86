//! Outbound message values
//!
//! Plain-Rust mirrors of the middleware messages the target manager emits
//! (`builtin_interfaces/Time`, `std_msgs/Header`, `geometry_msgs/PoseStamped`,
//! `nav_msgs/Path`, `visualization_msgs/Marker[Array]` and a stamped
//! transform). Serialization and transport belong to whoever implements the
//! sinks in [`crate::target::session`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nalgebra::{UnitQuaternion, Vector3};

use crate::common::types::{Point, Pose, Waypoint};

/// Absolute time stamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    /// Current wall-clock time
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Time::from_duration)
            .unwrap_or_default()
    }

    /// Time since the epoch. Seconds saturate at `i32::MAX`.
    pub fn from_duration(d: Duration) -> Self {
        Time {
            sec: i32::try_from(d.as_secs()).unwrap_or(i32::MAX),
            nanosec: d.subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        let sec = seconds.floor();
        Time {
            sec: sec as i32,
            nanosec: ((seconds - sec) * 1e9).round().min(999_999_999.0) as u32,
        }
    }

    pub fn as_seconds(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(frame_id: &str) -> Self {
        Header {
            stamp: Time::default(),
            frame_id: frame_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

impl PoseStamped {
    pub fn new(frame_id: &str, position: Point) -> Self {
        PoseStamped {
            header: Header::new(frame_id),
            pose: Pose::from_position(position),
        }
    }

    pub fn from_waypoint(frame_id: &str, waypoint: &Waypoint) -> Self {
        let mut header = Header::new(frame_id);
        if let Some(stamp) = waypoint.stamp {
            header.stamp = stamp;
        }
        PoseStamped {
            header,
            pose: waypoint.pose,
        }
    }
}

/// Sequence of stamped poses, e.g. the discretized global path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub header: Header,
    pub poses: Vec<PoseStamped>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorRGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRGBA {
    pub const RED: ColorRGBA = ColorRGBA {
        r: 1.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub const MAGENTA: ColorRGBA = ColorRGBA {
        r: 1.0,
        g: 0.0,
        b: 1.0,
        a: 1.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    Add,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub header: Header,
    pub id: i32,
    pub shape: MarkerShape,
    pub action: MarkerAction,
    pub pose: Pose,
    pub scale: Vector3<f64>,
    pub color: ColorRGBA,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerArray {
    pub markers: Vec<Marker>,
}

/// Pose of `child_frame_id` expressed in `header.frame_id`
#[derive(Debug, Clone, PartialEq)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}
