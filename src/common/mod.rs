//! Common utilities and types for the target core

/// Geometry types used across the codebase
pub mod types {
    use nalgebra::{Point3, UnitQuaternion};

    use crate::msg::{PoseStamped, Time};

    /// A 3D point in the world frame
    pub type Point = Point3<f64>;

    /// A 3D pose (position, orientation)
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Pose {
        pub position: Point,
        pub orientation: UnitQuaternion<f64>,
    }

    impl Pose {
        /// Pose at `position` with identity rotation
        pub fn from_position(position: Point) -> Self {
            Pose {
                position,
                orientation: UnitQuaternion::identity(),
            }
        }
    }

    /// A control point for trajectory fitting
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Waypoint {
        pub pose: Pose,
        pub stamp: Option<Time>,
    }

    impl Waypoint {
        /// Create an unstamped waypoint with identity orientation
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Waypoint {
                pose: Pose::from_position(Point::new(x, y, z)),
                stamp: None,
            }
        }

        /// Create an unstamped waypoint facing `yaw` radians about +z
        pub fn with_yaw(x: f64, y: f64, z: f64, yaw: f64) -> Self {
            Waypoint {
                pose: Pose {
                    position: Point::new(x, y, z),
                    orientation: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
                },
                stamp: None,
            }
        }

        pub fn position(&self) -> Point {
            self.pose.position
        }
    }

    impl From<&PoseStamped> for Waypoint {
        fn from(msg: &PoseStamped) -> Self {
            Waypoint {
                pose: msg.pose,
                stamp: Some(msg.header.stamp),
            }
        }
    }
}
