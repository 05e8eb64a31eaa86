//! Fixed-rate session driver for the target manager.
//!
//! Usage: `target_manager_node [config.toml] [waypoints.toml] [horizon_s]`
//!
//! Waypoints are loaded from the file, the publish button is pressed once at
//! start-up, and the session runs at 10 Hz until Ctrl-C.

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use target_core::config::TargetManagerConfig;
use target_core::fitting::CubicSplineFitter;
use target_core::logging::init_tracing;
use target_core::target::session::SessionContext;
use target_core::target::{regenerate_async, TargetManager, TargetSinks};
use tokio::sync::Mutex;
use tracing::{info, warn};

const TICK: Duration = Duration::from_millis(100);
const DEFAULT_HORIZON: f64 = 10.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            TargetManagerConfig::load_from_file(path)
                .with_context(|| format!("failed to load config from '{}'", path))?
        }
        None => TargetManagerConfig::default(),
    };
    let horizon = match args.get(3) {
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("invalid horizon '{}'", raw))?,
        None => DEFAULT_HORIZON,
    };

    let mut manager = TargetManager::new(
        config,
        Arc::new(CubicSplineFitter::new()),
        TargetSinks::logging(),
    )?;

    if let Some(path) = args.get(2) {
        let count = manager
            .load_waypoints_file(path)
            .with_context(|| format!("failed to load waypoints from '{}'", path))?;
        info!("Loaded {} waypoints from {}", count, path);
    }

    let manager = Arc::new(Mutex::new(manager));
    let start = Instant::now();
    let mut context = SessionContext::new();
    let mut last_trigger: Option<f64> = None;

    context.toggle(0.0);

    let mut ticker = tokio::time::interval(TICK);
    info!("Target manager node running. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = start.elapsed().as_secs_f64();

                if context.should_regenerate(now, last_trigger) {
                    last_trigger = Some(now);
                    if let Err(e) = regenerate_async(&manager, horizon).await {
                        warn!("Regeneration failed: {}", e);
                    }
                }

                let t_eval = context.eval_time(now);
                manager.lock().await.session(t_eval);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down target manager node");
                break;
            }
        }
    }

    Ok(())
}
