use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use target_core::common::types::{Point, Waypoint};
use target_core::config::{TargetManagerConfig, TrajectoryOptions};
use target_core::error::{FitError, GenerationError, QueueError, TargetError};
use target_core::fitting::CubicSplineFitter;
use target_core::msg::{PoseStamped, Time};
use target_core::target::generator::{
    BoundaryCondition, Curve, TrajectoryFitter, MAX_PATH_POSES,
};
use target_core::target::session::RecordingSink;
use target_core::target::{regenerate_async, TargetManager, TargetSinks};
use tokio::sync::Mutex;

/// Spline fitter that can be told to fail
struct SwitchableFitter {
    fail: AtomicBool,
}

impl SwitchableFitter {
    fn new() -> Self {
        SwitchableFitter {
            fail: AtomicBool::new(false),
        }
    }
}

impl TrajectoryFitter for SwitchableFitter {
    fn fit(
        &self,
        knots: &[f64],
        waypoints: &[Waypoint],
        start: &BoundaryCondition,
        end: &BoundaryCondition,
        options: &TrajectoryOptions,
    ) -> Result<Arc<dyn Curve>, FitError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FitError::Other("solver did not converge".to_string()));
        }
        CubicSplineFitter::new().fit(knots, waypoints, start, end, options)
    }
}

/// Remembers the options of every fit it is asked for
struct RecordingFitter {
    seen: std::sync::Mutex<Vec<TrajectoryOptions>>,
}

impl TrajectoryFitter for RecordingFitter {
    fn fit(
        &self,
        knots: &[f64],
        waypoints: &[Waypoint],
        start: &BoundaryCondition,
        end: &BoundaryCondition,
        options: &TrajectoryOptions,
    ) -> Result<Arc<dyn Curve>, FitError> {
        self.seen.lock().unwrap().push(options.clone());
        CubicSplineFitter::new().fit(knots, waypoints, start, end, options)
    }
}

fn near(a: Point, b: Point) -> bool {
    (a - b).norm() < 1e-6
}

fn manager_with(fitter: Arc<dyn TrajectoryFitter>, sink: &RecordingSink) -> TargetManager {
    TargetManager::new(
        TargetManagerConfig::default(),
        fitter,
        TargetSinks::recording(sink),
    )
    .unwrap()
}

fn manager(sink: &RecordingSink) -> TargetManager {
    manager_with(Arc::new(CubicSplineFitter::new()), sink)
}

fn insert_scenario_waypoints(manager: &mut TargetManager) {
    manager.set_insert_permit(true);
    for (x, y, z) in [(0.0, 0.0, 1.0), (1.0, 0.0, 1.0), (1.0, 1.0, 1.0)] {
        manager.insert_waypoint(Waypoint::new(x, y, z)).unwrap();
    }
}

#[test]
fn test_configured_options_reach_fitter() {
    let mut config = TargetManagerConfig::default();
    config.trajectory = TrajectoryOptions {
        safe_corridor_radius: 0.5,
        safe_point_count: 4,
        objective_derivative_order: 2,
        polynomial_order: 8,
        deviation_weight: 0.02,
        waypoints_are_soft_constraints: true,
    };
    let fitter = Arc::new(RecordingFitter {
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let sink = RecordingSink::new();
    let mut manager = TargetManager::new(
        config.clone(),
        Arc::clone(&fitter) as Arc<dyn TrajectoryFitter>,
        TargetSinks::recording(&sink),
    )
    .unwrap();
    insert_scenario_waypoints(&mut manager);

    manager.global_path_generate(3.0).unwrap();
    manager.pop_waypoint();
    manager.global_path_generate(5.0).unwrap();

    let seen = fitter.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|o| *o == config.trajectory));
}

#[test]
fn test_long_horizons_do_not_exhaust_memory() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    manager.replace_waypoints(vec![Waypoint::new(0.0, 0.0, 1.0), Waypoint::new(1.0, 0.0, 1.0)]);

    if let Ok(path) = manager.global_path_generate(1e300) {
        assert!(path.as_path().poses.len() <= MAX_PATH_POSES + 1);
    }

    let path = manager.global_path_generate(1e6).unwrap();
    let poses = &path.as_path().poses;
    assert!(poses.len() <= MAX_PATH_POSES + 1);
    assert!(near(poses.last().unwrap().pose.position, Point::new(1.0, 0.0, 1.0)));
}

#[test]
fn test_end_to_end_three_waypoints() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    insert_scenario_waypoints(&mut manager);

    manager.global_path_generate(3.0).unwrap();
    assert!(manager.is_path());

    let samples = manager.eval_time_seq(&[0.0, 3.0]).unwrap();
    assert!(near(samples[0], Point::new(0.0, 0.0, 1.0)));
    assert!(near(samples[1], Point::new(1.0, 1.0, 1.0)));
}

#[test]
fn test_end_to_end_gate_closed() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);

    let before = manager.queue().len();
    let result = manager.insert_waypoint(Waypoint::new(5.0, 5.0, 5.0));
    assert_eq!(result, Err(QueueError::InsertionDenied));
    assert_eq!(manager.queue().len(), before);
    assert!(manager.queue().markers().markers.is_empty());
}

#[test]
fn test_callback_waypoint_uses_message_pose() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    manager.set_insert_permit(true);

    let mut msg = PoseStamped::new("/world", Point::new(2.0, 3.0, 4.0));
    msg.header.stamp = Time::from_seconds(7.0);
    manager.callback_waypoint(&msg).unwrap();

    let waypoint = manager.queue().waypoints()[0];
    assert_eq!(waypoint.position(), Point::new(2.0, 3.0, 4.0));
    assert_eq!(waypoint.stamp, Some(Time::from_seconds(7.0)));
}

#[test]
fn test_boundary_interpolation_for_various_queues() {
    let queues: Vec<Vec<(f64, f64, f64)>> = vec![
        vec![(0.0, 0.0, 0.0), (2.0, 0.0, 0.0)],
        vec![(1.0, -1.0, 0.5), (0.0, 3.0, 2.0), (4.0, 4.0, 1.0), (-2.0, 0.0, 0.0)],
        vec![(0.0, 0.0, 1.0); 5],
    ];

    for points in queues {
        for tf in [0.5, 3.0, 20.0] {
            let sink = RecordingSink::new();
            let mut manager = manager(&sink);
            manager.replace_waypoints(points.iter().map(|&(x, y, z)| Waypoint::new(x, y, z)).collect());
            manager.global_path_generate(tf).unwrap();

            let ends = manager.eval_time_seq(&[0.0, tf]).unwrap();
            let (x0, y0, z0) = points[0];
            let (xl, yl, zl) = points[points.len() - 1];
            assert!(near(ends[0], Point::new(x0, y0, z0)));
            assert!(near(ends[1], Point::new(xl, yl, zl)));
        }
    }
}

#[test]
fn test_single_waypoint_path() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    manager.replace_waypoints(vec![Waypoint::new(1.0, 2.0, 3.0)]);

    let path = manager.global_path_generate(2.0).unwrap();
    assert_eq!(path.knots(), &[2.0]);
    let samples = manager.eval_time_seq(&[0.0, 1.0, 2.0]).unwrap();
    assert!(samples.iter().all(|p| near(*p, Point::new(1.0, 2.0, 3.0))));
}

#[test]
fn test_sample_many_is_deterministic_and_ordered() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    insert_scenario_waypoints(&mut manager);
    manager.global_path_generate(3.0).unwrap();

    let ts = [2.5, 0.0, 1.0, 3.0, 0.25];
    let first = manager.eval_time_seq(&ts).unwrap();
    let second = manager.eval_time_seq(&ts).unwrap();
    assert_eq!(first, second);

    for (t, p) in ts.iter().zip(&first) {
        let single = manager.eval_time_seq(&[*t]).unwrap();
        assert_eq!(single[0], *p);
    }
}

#[test]
fn test_eval_without_path_is_not_ready() {
    let sink = RecordingSink::new();
    let manager = manager(&sink);
    assert!(matches!(
        manager.eval_time_seq(&[0.0]),
        Err(TargetError::PathNotReady)
    ));
}

#[test]
fn test_empty_queue_generation() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    assert_eq!(
        manager.global_path_generate(3.0).unwrap_err(),
        GenerationError::EmptyQueue
    );
    assert!(!manager.is_path());

    // still operating: session publishes markers only
    assert!(manager.session(0.0).is_none());
    let recorded = sink.recorded();
    assert_eq!(recorded.markers.len(), 1);
    assert!(recorded.paths.is_empty());
    assert!(recorded.transforms.is_empty());
}

#[test]
fn test_failed_regeneration_retains_stale_path() {
    let sink = RecordingSink::new();
    let fitter = Arc::new(SwitchableFitter::new());
    let mut manager = manager_with(fitter.clone(), &sink);
    insert_scenario_waypoints(&mut manager);
    manager.global_path_generate(3.0).unwrap();

    let before = manager.eval_time_seq(&[0.0, 1.0, 2.0, 3.0]).unwrap();
    let knots_before = manager.current_path().unwrap().knots().to_vec();

    manager.insert_waypoint(Waypoint::new(5.0, 5.0, 1.0)).unwrap();
    fitter.fail.store(true, Ordering::SeqCst);
    assert!(matches!(
        manager.global_path_generate(6.0),
        Err(GenerationError::FitFailed(_))
    ));

    assert!(manager.is_path());
    assert_eq!(manager.current_path().unwrap().knots(), knots_before.as_slice());
    assert_eq!(manager.eval_time_seq(&[0.0, 1.0, 2.0, 3.0]).unwrap(), before);
}

#[test]
fn test_session_broadcasts_once_ready() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    insert_scenario_waypoints(&mut manager);

    assert!(manager.session(0.0).is_none());
    manager.global_path_generate(3.0).unwrap();
    let transform = manager.session(3.0).unwrap();

    assert_eq!(transform.header.frame_id, "/world");
    assert_eq!(transform.child_frame_id, "/target");
    assert!(near(Point::from(transform.translation), Point::new(1.0, 1.0, 1.0)));
    assert_eq!(transform.rotation, nalgebra::UnitQuaternion::identity());

    let recorded = sink.recorded();
    assert_eq!(recorded.markers.len(), 2);
    assert_eq!(recorded.markers[1].markers.len(), 3);
    assert_eq!(recorded.paths.len(), 1);
    assert_eq!(recorded.paths[0].header.frame_id, "/world");
    assert_eq!(recorded.transforms.len(), 1);
}

#[test]
fn test_clear_always_empties() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    manager.clear_waypoint();
    assert_eq!(manager.queue().len(), 0);

    insert_scenario_waypoints(&mut manager);
    manager.pop_waypoint();
    manager.clear_waypoint();
    assert_eq!(manager.queue().len(), 0);
    assert_eq!(manager.queue().markers().markers.len(), 0);

    // a path that already exists keeps serving
    manager.replace_waypoints(vec![Waypoint::new(0.0, 0.0, 1.0), Waypoint::new(1.0, 0.0, 1.0)]);
    manager.global_path_generate(1.0).unwrap();
    manager.clear_waypoint();
    assert!(manager.is_path());
}

#[test]
fn test_exported_waypoints_respect_height_floor() {
    let sink = RecordingSink::new();
    let mut manager = manager(&sink);
    manager.replace_waypoints(vec![
        Waypoint::new(0.0, 0.0, -3.0),
        Waypoint::new(1.0, 0.0, 0.0),
        Waypoint::new(2.0, 0.0, 0.2),
        Waypoint::new(3.0, 0.0, 5.0),
    ]);
    manager.global_path_generate(4.0).unwrap();

    let min_height = manager.config().min_height;
    let exported = manager.global_waypoints();
    assert_eq!(exported.poses.len(), 4);
    assert_eq!(exported.header.frame_id, "/world");
    for (i, pose) in exported.poses.iter().enumerate() {
        assert!(pose.pose.position.z >= min_height);
        assert_eq!(pose.pose.position.x, i as f64);
    }
    // the queue itself is untouched
    assert_eq!(manager.queue().waypoints()[0].position().z, -3.0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = TargetManagerConfig::default();
    config.world_frame_id = String::new();
    let result = TargetManager::new(
        config,
        Arc::new(CubicSplineFitter::new()),
        TargetSinks::logging(),
    );
    assert!(matches!(result, Err(TargetError::Config(_))));
}

#[tokio::test]
async fn test_regenerate_async_applies_result() {
    let sink = RecordingSink::new();
    let mut inner = manager(&sink);
    insert_scenario_waypoints(&mut inner);
    let shared = Arc::new(Mutex::new(inner));

    let path = regenerate_async(&shared, 3.0).await.unwrap();
    assert_eq!(path.knots(), &[0.0, 1.5, 3.0]);

    let guard = shared.lock().await;
    assert!(guard.is_path());
}

#[tokio::test]
async fn test_regenerate_async_empty_queue() {
    let sink = RecordingSink::new();
    let shared = Arc::new(Mutex::new(manager(&sink)));
    assert_eq!(
        regenerate_async(&shared, 3.0).await.unwrap_err(),
        GenerationError::EmptyQueue
    );
}

/// Blocks inside `fit` until released, so a newer request can overtake it
struct GatedFitter {
    entered: std::sync::Mutex<Option<std::sync::mpsc::Sender<()>>>,
    release: std::sync::Mutex<Option<std::sync::mpsc::Receiver<()>>>,
}

impl TrajectoryFitter for GatedFitter {
    fn fit(
        &self,
        knots: &[f64],
        waypoints: &[Waypoint],
        start: &BoundaryCondition,
        end: &BoundaryCondition,
        options: &TrajectoryOptions,
    ) -> Result<Arc<dyn Curve>, FitError> {
        let entered = self.entered.lock().unwrap().take();
        let release = self.release.lock().unwrap().take();
        if let (Some(entered), Some(release)) = (entered, release) {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        CubicSplineFitter::new().fit(knots, waypoints, start, end, options)
    }
}

impl GatedFitter {
    fn new() -> (Self, std::sync::mpsc::Receiver<()>, std::sync::mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let fitter = GatedFitter {
            entered: std::sync::Mutex::new(Some(entered_tx)),
            release: std::sync::Mutex::new(Some(release_rx)),
        };
        (fitter, entered_rx, release_tx)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_superseded_async_result_is_discarded() {
    let (fitter, entered_rx, release_tx) = GatedFitter::new();

    let sink = RecordingSink::new();
    let mut inner = manager_with(Arc::new(fitter), &sink);
    insert_scenario_waypoints(&mut inner);
    let shared = Arc::new(Mutex::new(inner));

    let slow = {
        let shared = Arc::clone(&shared);
        tokio::spawn(async move { regenerate_async(&shared, 3.0).await })
    };

    // wait until the slow fit is running, then edit and regenerate
    tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
        .await
        .unwrap();
    {
        let mut guard = shared.lock().await;
        guard.pop_waypoint();
        guard.global_path_generate(2.0).unwrap();
    }
    release_tx.send(()).unwrap();

    let slow_result = slow.await.unwrap();
    assert!(matches!(slow_result, Err(GenerationError::Superseded(_))));

    let guard = shared.lock().await;
    assert_eq!(guard.current_path().unwrap().knots(), &[0.0, 2.0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_then_empty_regeneration_discards_in_flight_fit() {
    let (fitter, entered_rx, release_tx) = GatedFitter::new();

    let sink = RecordingSink::new();
    let mut inner = manager_with(Arc::new(fitter), &sink);
    insert_scenario_waypoints(&mut inner);
    let shared = Arc::new(Mutex::new(inner));

    let slow = {
        let shared = Arc::clone(&shared);
        tokio::spawn(async move { regenerate_async(&shared, 3.0).await })
    };

    tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
        .await
        .unwrap();
    {
        let mut guard = shared.lock().await;
        guard.clear_waypoint();
        assert_eq!(
            guard.global_path_generate(3.0).unwrap_err(),
            GenerationError::EmptyQueue
        );
    }
    release_tx.send(()).unwrap();

    let slow_result = slow.await.unwrap();
    assert!(matches!(slow_result, Err(GenerationError::Superseded(_))));

    let guard = shared.lock().await;
    assert!(!guard.is_path());
    assert_eq!(guard.queue().len(), 0);
}
