use std::sync::Arc;

use target_core::common::types::Waypoint;
use target_core::config::TargetManagerConfig;
use target_core::fitting::CubicSplineFitter;
use target_core::forecast::ConstantVelocityForecaster;
use target_core::logging::init_tracing;
use target_core::msg::Time;
use target_core::target::evaluator::TargetPredictor;
use target_core::target::{TargetManager, TargetSinks};
use target_core::TargetCore;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Initializing target core...");

    let mut core = TargetCore::new();

    let manager = TargetManager::new(
        TargetManagerConfig::default(),
        Arc::new(CubicSplineFitter::new()),
        TargetSinks::logging(),
    )?;
    core.register(manager);
    core.register(TargetPredictor::new(|| {
        Box::new(ConstantVelocityForecaster::new())
    }));

    core.init()?;
    info!("Core initialized successfully!");

    let manager = core.require_target_manager()?;

    // Gate closed: this one must be refused
    if let Err(e) = manager.insert_waypoint(Waypoint::new(5.0, 5.0, 5.0)) {
        info!("Expected refusal: {}", e);
    }

    manager.set_insert_permit(true);
    for (x, y, z) in [(0.0, 0.0, 1.0), (1.0, 0.0, 1.0), (1.0, 1.0, 1.0)] {
        manager.insert_waypoint(Waypoint::new(x, y, z))?;
    }
    manager.set_insert_permit(false);

    let path = manager.global_path_generate(3.0)?;
    info!(
        "Global path over {:?} with {} poses",
        path.knots(),
        path.as_path().poses.len()
    );

    let samples = manager.eval_time_seq(&[0.0, 1.5, 3.0])?;
    for p in &samples {
        info!("sample: ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
    }

    for tick in 0..4 {
        manager.session(tick as f64);
    }

    let exported = manager.global_waypoints();
    info!("Exported {} waypoints", exported.poses.len());

    if let Some(predictor) = core.target_predictor_mut() {
        for (i, p) in samples.iter().enumerate() {
            predictor.observe(Time::from_seconds(i as f64 * 1.5), *p)?;
        }
        let predicted = predictor.predict_many(&[Time::from_seconds(4.5)])?;
        info!("Predicted position at 4.5 s: {:?}", predicted[0]);
    }

    match core.shutdown() {
        Ok(_) => info!("Core shutdown successfully!"),
        Err(e) => error!("Failed to shutdown core: {}", e),
    }
    Ok(())
}
