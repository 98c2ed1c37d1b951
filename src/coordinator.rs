//! The periodic tick driver: sample meter, call Balancer then Allocator,
//! apply timing/gating policy, dispatch to chargers, emit events.

use crate::allocator::Allocator;
use crate::balancer::Balancer;
use crate::charger::ChargerId;
use crate::logging::{LogContext, StructuredLogger};
use crate::meter::MeterAdapter;
use crate::phase::{Phase, PerPhaseAmps};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Minimum spacing between successive dispatches to the same charger,
/// absent a safety decrease.
pub const MIN_CHARGER_UPDATE_DELAY: u64 = 20;

/// Whether the Coordinator currently has anything to monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorRunState {
    /// No active charger; the tick loop is idling.
    AwaitingCharger,
    /// At least one active charger is being monitored.
    MonitoringLoads,
}

/// Published on every successful dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    NewChargerLimits {
        device_id: String,
        new_limits: PerPhaseAmps,
    },
}

/// A failed fire-and-forget dispatch, reported out-of-band so it doesn't
/// back-pressure the tick.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub charger_id: ChargerId,
    pub message: String,
}

/// Unconditional per-tick sensor refresh hook, called whether or not the
/// meter read succeeded, so host-exposed sensors stay fresh.
pub trait SensorSink: Send + Sync {
    fn refresh(&self, last_check_timestamp: u64, state: CoordinatorRunState);
}

/// A sensor sink that does nothing.
pub struct NullSensorSink;

impl SensorSink for NullSensorSink {
    fn refresh(&self, _last_check_timestamp: u64, _state: CoordinatorRunState) {}
}

fn any_phase_lower(proposal: &PerPhaseAmps, current: &PerPhaseAmps) -> bool {
    proposal
        .iter()
        .any(|(p, v)| current.get(p).is_some_and(|c| v < c))
}

fn any_phase_higher(proposal: &PerPhaseAmps, current: &PerPhaseAmps) -> bool {
    proposal
        .iter()
        .any(|(p, v)| current.get(p).is_some_and(|c| v > c))
}

#[allow(clippy::too_many_arguments)]
fn may_apply_now(
    proposal: &PerPhaseAmps,
    current: &PerPhaseAmps,
    last_charger_update_time: Option<u64>,
    last_decrease_time: Option<u64>,
    now: u64,
    min_charger_update_delay: u64,
    hysteresis_minutes: u32,
) -> bool {
    if any_phase_lower(proposal, current) {
        return true;
    }

    let Some(last_update) = last_charger_update_time else {
        return true;
    };

    if now.saturating_sub(last_update) <= min_charger_update_delay {
        return false;
    }

    if !any_phase_higher(proposal, current) {
        return false;
    }

    let base = last_decrease_time.unwrap_or(last_update);
    now.saturating_sub(base) > u64::from(hysteresis_minutes) * 60
}

/// The periodic driver tying the Balancer and Allocator together.
pub struct Coordinator {
    balancer: Balancer,
    allocator: Allocator,
    meter: Arc<dyn MeterAdapter>,
    phase_count: u8,
    fuse_size: u32,
    hysteresis_minutes: u32,
    min_charger_update_delay: u64,
    last_check_timestamp: Option<u64>,
    last_charger_update_time: HashMap<ChargerId, u64>,
    last_decrease_time: HashMap<ChargerId, u64>,
    events_tx: broadcast::Sender<CoordinatorEvent>,
    dispatch_failures_tx: mpsc::UnboundedSender<DispatchFailure>,
    dispatch_failures_rx: Option<mpsc::UnboundedReceiver<DispatchFailure>>,
    sensors: Arc<dyn SensorSink>,
    logger: StructuredLogger,
}

impl Coordinator {
    pub fn new(
        balancer: Balancer,
        allocator: Allocator,
        meter: Arc<dyn MeterAdapter>,
        phase_count: u8,
        fuse_size: u32,
        hysteresis_minutes: u32,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        let (dispatch_failures_tx, dispatch_failures_rx) = mpsc::unbounded_channel();

        Self {
            balancer,
            allocator,
            meter,
            phase_count,
            fuse_size,
            hysteresis_minutes,
            min_charger_update_delay: MIN_CHARGER_UPDATE_DELAY,
            last_check_timestamp: None,
            last_charger_update_time: HashMap::new(),
            last_decrease_time: HashMap::new(),
            events_tx,
            dispatch_failures_tx,
            dispatch_failures_rx: Some(dispatch_failures_rx),
            sensors: Arc::new(NullSensorSink),
            logger: StructuredLogger::new(LogContext::new("coordinator")),
        }
    }

    /// Install a sensor-refresh hook, called unconditionally every tick.
    pub fn with_sensor_sink(mut self, sensors: Arc<dyn SensorSink>) -> Self {
        self.sensors = sensors;
        self
    }

    /// Mutable access to the Allocator, e.g. to register chargers.
    pub fn allocator_mut(&mut self) -> &mut Allocator {
        &mut self.allocator
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Subscribe to dispatched `CoordinatorEvent`s.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events_tx.subscribe()
    }

    /// Take the dispatch-failure receiver. Can only be taken once.
    pub fn take_dispatch_failures(&mut self) -> Option<mpsc::UnboundedReceiver<DispatchFailure>> {
        self.dispatch_failures_rx.take()
    }

    pub fn last_check_timestamp(&self) -> Option<u64> {
        self.last_check_timestamp
    }

    /// Whether the Coordinator currently has an active charger to monitor.
    pub async fn state(&self) -> CoordinatorRunState {
        if self.allocator.should_monitor().await {
            CoordinatorRunState::MonitoringLoads
        } else {
            CoordinatorRunState::AwaitingCharger
        }
    }

    /// Run one control-loop tick.
    pub async fn tick(&mut self, now: u64) {
        self.last_check_timestamp = Some(now);

        let mut available = PerPhaseAmps::new();
        let mut meter_failed = false;
        for phase in Phase::live(self.phase_count) {
            match self.meter.get_active_phase_current(phase).await {
                Some(reading) => {
                    let fuse = self.fuse_size as i32;
                    available.insert(phase, (fuse - reading).min(fuse));
                }
                None => {
                    meter_failed = true;
                    break;
                }
            }
        }

        let state = self.state().await;
        self.sensors.refresh(now, state);

        if meter_failed {
            self.logger.warn("meter reading unavailable on a live phase; skipping tick");
            return;
        }

        if !self.allocator.should_monitor().await {
            return;
        }

        let deltas = self.balancer.compute_availability(&available, now);
        let proposals = self.allocator.update_allocation(&deltas, now).await;

        for (id, proposal) in proposals {
            self.apply_proposal(id, proposal, now).await;
        }
    }

    async fn apply_proposal(&mut self, id: ChargerId, proposal: PerPhaseAmps, now: u64) {
        let Some(adapter) = self.allocator.adapter(&id) else {
            return;
        };
        let Some(current) = adapter.get_current_limit().await else {
            self.logger.warn(&format!("{id}: current limit unknown, skipping"));
            return;
        };

        let last_update = self.last_charger_update_time.get(&id).copied();
        let last_decrease = self.last_decrease_time.get(&id).copied();

        if !may_apply_now(
            &proposal,
            &current,
            last_update,
            last_decrease,
            now,
            self.min_charger_update_delay,
            self.hysteresis_minutes,
        ) {
            return;
        }

        if any_phase_lower(&proposal, &current) {
            self.last_decrease_time.insert(id.clone(), now);
        }
        self.last_charger_update_time.insert(id.clone(), now);

        self.allocator.update_applied_current(&id, proposal.clone(), now);

        let event = CoordinatorEvent::NewChargerLimits {
            device_id: id.to_string(),
            new_limits: proposal.clone(),
        };
        self.logger.info(&format!("dispatching new limits to {id}"));
        let _ = self.events_tx.send(event);

        let failures_tx = self.dispatch_failures_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = adapter.set_current_limit(proposal).await {
                let _ = failures_tx.send(DispatchFailure {
                    charger_id: id,
                    message: err.to_string(),
                });
            }
        });
    }
}
