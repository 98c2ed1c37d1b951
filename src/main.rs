use anyhow::Result;
use evse_load_balancer::balancer::{Balancer, OvercurrentMode};
use evse_load_balancer::chargers::MockCharger;
use evse_load_balancer::clock::{Clock, SystemClock};
use evse_load_balancer::config::Config;
use evse_load_balancer::coordinator::{Coordinator, CoordinatorEvent};
use evse_load_balancer::logging;
use evse_load_balancer::meters::MockMeter;
use evse_load_balancer::phase::{self, Phase};
use evse_load_balancer::Allocator;
use std::sync::Arc;
use tracing::info;

/// A small demo wiring of the load-balancer core against in-memory
/// charger/meter fixtures, driven for a handful of ticks. Real deployments
/// supply their own `ChargerAdapter`/`MeterAdapter` implementations and
/// drive `Coordinator::tick` from their own scheduler.
#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    logging::init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    info!("evse-load-balancer demo starting up");

    let mode = OvercurrentMode::from_str(&config.overcurrent_mode)
        .map_err(|e| anyhow::anyhow!("invalid overcurrent mode: {}", e))?;
    let fuse_size = config.effective_fuse_size();
    let max_limits = phase::uniform(config.phase_count, fuse_size as i32);
    let balancer = Balancer::new(max_limits, mode, config.balancer.window_seconds);

    let mut allocator = Allocator::new();
    let charger = Arc::new(
        MockCharger::new("demo-charger", false)
            .with_current_limit(phase::uniform(config.phase_count, 16))
            .with_max_limit(phase::uniform(config.phase_count, 32))
            .with_charging(true, true, true),
    );
    allocator.add_charger(charger.clone());

    let meter = Arc::new(MockMeter::new());
    for phase in Phase::live(config.phase_count) {
        meter.set_reading(phase, Some(27));
    }

    let mut coordinator = Coordinator::new(
        balancer,
        allocator,
        meter,
        config.phase_count,
        fuse_size,
        config.charge_limit_hysteresis_minutes,
    );
    let mut events = coordinator.subscribe();

    let clock = SystemClock;
    for _ in 0..3 {
        let now = clock.now();
        coordinator.tick(now).await;
        while let Ok(event) = events.try_recv() {
            match event {
                CoordinatorEvent::NewChargerLimits { device_id, new_limits } => {
                    info!(device_id = %device_id, ?new_limits, "new charger limits dispatched");
                }
            }
        }
    }

    info!("evse-load-balancer demo shutting down");
    Ok(())
}
