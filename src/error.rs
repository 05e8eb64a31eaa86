//! Error types for the target core
//!
//! None of these are fatal: every operation that fails leaves the manager in
//! its last good state.

use thiserror::Error;

/// Waypoint queue failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("waypoint insertion not allowed while the gate is closed")]
    InsertionDenied,
}

/// Failures reported by a trajectory fitter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("knot count ({knots}) does not match waypoint count ({waypoints})")]
    KnotMismatch { knots: usize, waypoints: usize },
    #[error("knot times must be finite and strictly increasing")]
    NonIncreasingKnots,
    #[error("linear system for the spline is singular")]
    Singular,
    #[error("{0}")]
    Other(String),
}

/// Outcome of a regeneration request that produced no new path
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("target waypoints empty")]
    EmptyQueue,
    #[error("path generation failed: {0}")]
    FitFailed(String),
    #[error("generation request {0} superseded by a newer request")]
    Superseded(u64),
}

impl From<FitError> for GenerationError {
    fn from(err: FitError) -> Self {
        GenerationError::FitFailed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for the manager façade
#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no valid global path available")]
    PathNotReady,
    #[error("forecaster not initialized")]
    ForecasterNotInitialized,
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}

pub type Result<T> = std::result::Result<T, TargetError>;
