//! End-to-end scenarios driving the full Meter -> Balancer -> Allocator ->
//! Charger adapter pipeline through a `Coordinator`.

use evse_load_balancer::balancer::{Balancer, OvercurrentMode};
use evse_load_balancer::charger::{ChargerAdapter, ChargerId};
use evse_load_balancer::chargers::MockCharger;
use evse_load_balancer::coordinator::{Coordinator, CoordinatorEvent};
use evse_load_balancer::meters::MockMeter;
use evse_load_balancer::phase::{self, Phase, PerPhaseAmps};
use evse_load_balancer::Allocator;
use std::sync::Arc;

fn fuse(phase_count: u8, amps: i32) -> PerPhaseAmps {
    phase::uniform(phase_count, amps)
}

#[tokio::test]
async fn scenario_1_single_phase_overcurrent_dispatched_immediately() {
    let balancer = Balancer::new(fuse(1, 25), OvercurrentMode::Conservative, 60);
    let mut allocator = Allocator::new();
    let charger = Arc::new(
        MockCharger::new("c1", false)
            .with_current_limit([(Phase::L1, 16)].into_iter().collect())
            .with_max_limit([(Phase::L1, 32)].into_iter().collect())
            .with_charging(true, true, true),
    );
    allocator.add_charger(charger);

    let meter = Arc::new(MockMeter::new());
    meter.set_reading(Phase::L1, Some(27));

    let mut coordinator = Coordinator::new(balancer, allocator, meter, 1, 25, 15);
    let mut events = coordinator.subscribe();
    coordinator.tick(1_000).await;

    let event = events.try_recv().expect("expected a dispatch");
    let CoordinatorEvent::NewChargerLimits { new_limits, .. } = event;
    assert_eq!(new_limits[&Phase::L1], 14);
}

#[tokio::test]
async fn scenario_2_three_phase_recovery_applies_on_first_write() {
    let balancer = Balancer::new(fuse(3, 25), OvercurrentMode::Conservative, 60);
    let mut allocator = Allocator::new();
    let current: PerPhaseAmps = [(Phase::L1, 10), (Phase::L2, 10), (Phase::L3, 10)]
        .into_iter()
        .collect();
    let requested: PerPhaseAmps = [(Phase::L1, 16), (Phase::L2, 16), (Phase::L3, 16)]
        .into_iter()
        .collect();
    let charger = Arc::new(
        MockCharger::new("c1", false)
            .with_current_limit(current)
            .with_max_limit(requested.clone())
            .with_charging(true, true, true),
    );
    let id = charger.id();
    allocator.add_charger(charger);

    let meter = Arc::new(MockMeter::new());
    // First tick holds steady (available = 0) purely to initialize the
    // charger's bookkeeping from its current 10A setting.
    for p in [Phase::L1, Phase::L2, Phase::L3] {
        meter.set_reading(p, Some(25));
    }

    let mut coordinator = Coordinator::new(balancer, allocator, meter.clone(), 3, 25, 15);
    coordinator.tick(999).await;

    // A prior session already set the user's desired current to 16A on
    // every phase (otherwise it would still be defaulted to the charger's
    // current 10A setting, and there would be no headroom to claim).
    coordinator.allocator_mut().set_requested_current(&id, requested);

    for p in [Phase::L1, Phase::L2, Phase::L3] {
        meter.set_reading(p, Some(20));
    }

    let mut events = coordinator.subscribe();

    // With no prior dispatch on record, the increase is allowed through
    // immediately (the inherited open question: the hysteresis fallback to
    // `last_charger_update_time` only ever blocks a *subsequent* increase).
    coordinator.tick(1_000).await;

    let event = events.try_recv().expect("expected a dispatch on the first tick");
    let CoordinatorEvent::NewChargerLimits { new_limits, .. } = event;
    assert_eq!(new_limits[&Phase::L1], 15);
    assert_eq!(new_limits[&Phase::L2], 15);
    assert_eq!(new_limits[&Phase::L3], 15);
}

#[tokio::test]
async fn scenario_3_two_chargers_proportional_cut() {
    let balancer = Balancer::new(fuse(1, 32), OvercurrentMode::Conservative, 60);
    let mut allocator = Allocator::new();
    let c1 = Arc::new(
        MockCharger::new("c1", false)
            .with_current_limit([(Phase::L1, 10)].into_iter().collect())
            .with_max_limit([(Phase::L1, 32)].into_iter().collect())
            .with_charging(true, true, true),
    );
    let c2 = Arc::new(
        MockCharger::new("c2", false)
            .with_current_limit([(Phase::L1, 16)].into_iter().collect())
            .with_max_limit([(Phase::L1, 32)].into_iter().collect())
            .with_charging(true, true, true),
    );
    allocator.add_charger(c1);
    allocator.add_charger(c2);

    let meter = Arc::new(MockMeter::new());
    meter.set_reading(Phase::L1, Some(36));

    let mut coordinator = Coordinator::new(balancer, allocator, meter, 1, 32, 15);
    let mut events = coordinator.subscribe();
    coordinator.tick(1_000).await;

    let mut seen = std::collections::HashMap::new();
    while let Ok(CoordinatorEvent::NewChargerLimits { device_id, new_limits }) = events.try_recv() {
        seen.insert(device_id, new_limits[&Phase::L1]);
    }

    assert_eq!(seen.get("c1"), Some(&8), "c1 should be cut from 10A to 8A");
    assert_eq!(seen.get("c2"), Some(&13), "c2 should be cut from 16A to 13A");
}

#[tokio::test]
async fn scenario_4_synced_phase_flattening() {
    let balancer = Balancer::new(fuse(3, 25), OvercurrentMode::Conservative, 60);
    let mut allocator = Allocator::new();
    let charger = Arc::new(
        MockCharger::new("c1", true)
            .with_current_limit([(Phase::L1, 16), (Phase::L2, 16), (Phase::L3, 16)].into_iter().collect())
            .with_max_limit([(Phase::L1, 32), (Phase::L2, 32), (Phase::L3, 32)].into_iter().collect())
            .with_charging(true, true, true),
    );
    allocator.add_charger(charger);

    let meter = Arc::new(MockMeter::new());
    // fuse=25; chosen readings produce deltas {L1:-1, L2:+2, L3:0}
    meter.set_reading(Phase::L1, Some(26));
    meter.set_reading(Phase::L2, Some(23));
    meter.set_reading(Phase::L3, Some(25));

    let mut coordinator = Coordinator::new(balancer, allocator, meter, 3, 25, 15);
    let mut events = coordinator.subscribe();
    coordinator.tick(1_000).await;

    let event = events.try_recv().expect("expected a dispatch");
    let CoordinatorEvent::NewChargerLimits { new_limits, .. } = event;
    assert_eq!(new_limits[&Phase::L1], 15);
    assert_eq!(new_limits[&Phase::L2], 15);
    assert_eq!(new_limits[&Phase::L3], 15);
}

#[tokio::test]
async fn scenario_5_spike_tolerance_then_sustained_overload() {
    let mut balancer = Balancer::new(fuse(1, 25), OvercurrentMode::Optimised, 60);

    let available: PerPhaseAmps = [(Phase::L1, -2)].into_iter().collect();
    let first = balancer.compute_availability(&available, 0);
    let second = balancer.compute_availability(&available, 2);
    assert_eq!(first[&Phase::L1], 0, "a brief 2s spike is tolerated");
    assert_eq!(second[&Phase::L1], 0);

    let mut last = second;
    for t in 3..32 {
        last = balancer.compute_availability(&available, t);
    }
    assert_eq!(last[&Phase::L1], -2, "a sustained overload eventually surfaces");
}

#[tokio::test]
async fn scenario_6_manual_override_without_corruption() {
    let mut allocator = Allocator::new();
    let charger = Arc::new(
        MockCharger::new("c1", false)
            .with_current_limit([(Phase::L1, 32)].into_iter().collect())
            .with_max_limit([(Phase::L1, 32)].into_iter().collect())
            .with_charging(true, true, true),
    );
    allocator.add_charger(charger.clone());

    let no_delta: PerPhaseAmps = [(Phase::L1, 0)].into_iter().collect();

    // Initial tick: just initializes state (requested = applied = 32).
    allocator.update_allocation(&no_delta, 1_000).await;

    // The load balancer itself applied 27A and settle expired, but the
    // hardware still reports 32A (a slow charger echoing its pre-write
    // value, which happens to equal the user's original intent).
    allocator.update_applied_current(&ChargerId::new("c1"), [(Phase::L1, 27)].into_iter().collect(), 1_000);
    charger.set_current_limit_directly(Some([(Phase::L1, 32)].into_iter().collect()));

    allocator.update_allocation(&no_delta, 2_000).await;
    let state = allocator.charger_state(&ChargerId::new("c1")).unwrap();
    assert!(!state.manual_override_detected);
    assert_eq!(state.requested_current.as_ref().unwrap()[&Phase::L1], 32);

    // Hardware now reports 27A, matching last_applied_current: still no override.
    charger.set_current_limit_directly(Some([(Phase::L1, 27)].into_iter().collect()));
    allocator.update_allocation(&no_delta, 3_000).await;
    let state = allocator.charger_state(&ChargerId::new("c1")).unwrap();
    assert!(!state.manual_override_detected);
    assert_eq!(state.requested_current.as_ref().unwrap()[&Phase::L1], 32);
}
