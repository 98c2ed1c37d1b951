//! Multi-charger proportional apportionment of the Balancer's per-phase
//! deltas, with manual-override detection, new-session resets, and
//! synced-phase flattening.

use crate::charger::{ChargerAdapter, ChargerId};
use crate::phase::PerPhaseAmps;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-charger bookkeeping owned by the [`Allocator`].
#[derive(Debug, Clone, Default)]
pub struct ChargerState {
    /// The desired setpoint reflecting user intent: either the hardware max
    /// at session start, or the last manually-entered value.
    pub requested_current: Option<PerPhaseAmps>,
    pub last_calculated_current: Option<PerPhaseAmps>,
    /// What we last dispatched.
    pub last_applied_current: Option<PerPhaseAmps>,
    pub last_update_time: u64,
    pub manual_override_detected: bool,
    pub initialized: bool,
    pub active_session: bool,
}

impl ChargerState {
    /// Read the adapter's current limit; if unavailable, leave
    /// uninitialized for a retry next tick. On success, seed
    /// `requested_current` and `last_applied_current` from it.
    pub async fn initialize(&mut self, adapter: &dyn ChargerAdapter) -> bool {
        if self.initialized {
            return true;
        }

        match adapter.get_current_limit().await {
            Some(limit) => {
                self.requested_current = Some(limit.clone());
                self.last_applied_current = Some(limit);
                self.active_session = adapter.can_charge().await;
                self.initialized = true;
                true
            }
            None => false,
        }
    }

    /// Shielded read of the charger's current limit: within the adapter's
    /// settle time after our own last write, trust our own record instead
    /// of the (possibly stale) hardware report.
    pub async fn get_current_limit(
        &self,
        adapter: &dyn ChargerAdapter,
        now: u64,
    ) -> Option<PerPhaseAmps> {
        if now.saturating_sub(self.last_update_time) < adapter.current_change_settle_time() {
            self.last_applied_current.clone()
        } else {
            adapter.get_current_limit().await
        }
    }

    /// Detect a new charging session or a manual change made outside this
    /// controller. Idempotent: calling twice in a row without a hardware
    /// change does not alter state on the second call.
    pub async fn detect_manual_override(&mut self, adapter: &dyn ChargerAdapter, now: u64) {
        let Some(current_setting) = self.get_current_limit(adapter, now).await else {
            return;
        };

        let is_charging = adapter.can_charge().await;

        if is_charging && !self.active_session {
            if let Some(max) = adapter.get_max_current_limit().await {
                self.requested_current = Some(max);
            }
            self.active_session = true;
        } else if let (Some(applied), Some(requested)) =
            (&self.last_applied_current, &self.requested_current)
        {
            if &current_setting != applied && &current_setting != requested {
                self.requested_current = Some(current_setting);
                self.manual_override_detected = true;
            }
        }

        self.active_session = adapter.can_charge().await;
    }
}

fn floor_div(numerator: i32, denominator: i32) -> i32 {
    (f64::from(numerator) / f64::from(denominator)).floor() as i32
}

/// Multi-charger apportioner. Owns all [`ChargerState`]s and iterates them
/// in insertion order for deterministic tie-breaking.
pub struct Allocator {
    order: Vec<ChargerId>,
    chargers: HashMap<ChargerId, (Arc<dyn ChargerAdapter>, ChargerState)>,
}

impl Allocator {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            chargers: HashMap::new(),
        }
    }

    /// Register a charger. Its `ChargerState` starts uninitialized and is
    /// lazily initialized the first time it becomes active.
    pub fn add_charger(&mut self, adapter: Arc<dyn ChargerAdapter>) {
        let id = adapter.id();
        if !self.chargers.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.chargers.insert(id, (adapter, ChargerState::default()));
    }

    /// Remove a charger and its state.
    pub fn remove_charger(&mut self, id: &ChargerId) {
        self.chargers.remove(id);
        self.order.retain(|existing| existing != id);
    }

    /// Look up a charger's current bookkeeping, if registered.
    pub fn charger_state(&self, id: &ChargerId) -> Option<&ChargerState> {
        self.chargers.get(id).map(|(_, state)| state)
    }

    /// The adapter registered for a charger, if any.
    pub fn adapter(&self, id: &ChargerId) -> Option<Arc<dyn ChargerAdapter>> {
        self.chargers.get(id).map(|(adapter, _)| Arc::clone(adapter))
    }

    /// All registered charger ids, in insertion order.
    pub fn charger_ids(&self) -> &[ChargerId] {
        &self.order
    }

    /// Set a charger's desired current directly, as when a user manually
    /// enters a target current through a host's own UI. Has no effect on
    /// a charger that has not yet been registered.
    pub fn set_requested_current(&mut self, id: &ChargerId, requested: PerPhaseAmps) {
        if let Some((_, state)) = self.chargers.get_mut(id) {
            state.requested_current = Some(requested);
        }
    }

    async fn active_charger_ids(&self) -> Vec<ChargerId> {
        let mut active = Vec::new();
        for id in &self.order {
            if let Some((adapter, _)) = self.chargers.get(id)
                && adapter.can_charge().await
            {
                active.push(id.clone());
            }
        }
        active
    }

    /// Whether any charger currently needs monitoring.
    pub async fn should_monitor(&self) -> bool {
        !self.active_charger_ids().await.is_empty()
    }

    /// Apply the Balancer's per-phase deltas across all active chargers,
    /// producing the setpoints that actually changed.
    pub async fn update_allocation(
        &mut self,
        deltas: &PerPhaseAmps,
        now: u64,
    ) -> HashMap<ChargerId, PerPhaseAmps> {
        let active_ids = self.active_charger_ids().await;
        if active_ids.is_empty() {
            return HashMap::new();
        }

        for id in &active_ids {
            if let Some((adapter, state)) = self.chargers.get_mut(id) {
                let adapter = Arc::clone(adapter);
                state.initialize(adapter.as_ref()).await;
                state.detect_manual_override(adapter.as_ref(), now).await;
            }
        }

        let mut current_settings: HashMap<ChargerId, PerPhaseAmps> = HashMap::new();
        let mut requested: HashMap<ChargerId, PerPhaseAmps> = HashMap::new();
        let mut synced: HashMap<ChargerId, bool> = HashMap::new();
        for id in &active_ids {
            if let Some((adapter, state)) = self.chargers.get(id) {
                if let Some(limit) = state.get_current_limit(adapter.as_ref(), now).await {
                    current_settings.insert(id.clone(), limit);
                }
                if let Some(req) = &state.requested_current {
                    requested.insert(id.clone(), req.clone());
                }
                synced.insert(id.clone(), adapter.has_synced_phase_limits());
            }
        }

        let mut result: HashMap<ChargerId, PerPhaseAmps> = HashMap::new();
        let mut processed: HashMap<ChargerId, Vec<crate::phase::Phase>> = HashMap::new();

        for (phase, delta) in deltas {
            if *delta < 0 {
                distribute_cuts(
                    *phase,
                    *delta,
                    &active_ids,
                    &current_settings,
                    &mut result,
                    &mut processed,
                );
            } else if *delta > 0 {
                distribute_increases(
                    *phase,
                    *delta,
                    &active_ids,
                    &current_settings,
                    &requested,
                    &mut result,
                    &mut processed,
                );
            }
        }

        // Synced-phase flattening: collapse every touched charger's result
        // to the minimum over the phases actually processed this tick (a
        // charger's untouched phases, still carried in the entry at their
        // prior value, must not pull the flattened setpoint down).
        for (id, entry) in result.iter_mut() {
            if synced.get(id).copied().unwrap_or(false)
                && let Some(phases) = processed.get(id)
            {
                let min = phases.iter().filter_map(|p| entry.get(p).copied()).min();
                if let Some(min) = min {
                    for value in entry.values_mut() {
                        *value = min;
                    }
                }
            }
        }

        // Filter no-ops.
        result.retain(|id, entry| match current_settings.get(id) {
            Some(current) => {
                if synced.get(id).copied().unwrap_or(false) {
                    let new_min = entry.values().copied().min();
                    let cur_min = current.values().copied().min();
                    new_min != cur_min
                } else {
                    entry != current
                }
            }
            None => true,
        });

        for (id, entry) in &result {
            if let Some((_, state)) = self.chargers.get_mut(id) {
                state.last_calculated_current = Some(entry.clone());
                state.manual_override_detected = false;
            }
        }

        result
    }

    /// Record that `applied` was dispatched to `id` at `now`, after a
    /// successful write.
    pub fn update_applied_current(&mut self, id: &ChargerId, applied: PerPhaseAmps, now: u64) {
        if let Some((_, state)) = self.chargers.get_mut(id) {
            state.last_applied_current = Some(applied);
            state.last_update_time = now;
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

fn distribute_cuts(
    phase: crate::phase::Phase,
    deficit: i32,
    active_ids: &[ChargerId],
    current_settings: &HashMap<ChargerId, PerPhaseAmps>,
    result: &mut HashMap<ChargerId, PerPhaseAmps>,
    processed: &mut HashMap<ChargerId, Vec<crate::phase::Phase>>,
) {
    let mut total = 0i32;
    let mut currents: Vec<(ChargerId, i32)> = Vec::new();
    for id in active_ids {
        if let Some(cur) = current_settings.get(id).and_then(|m| m.get(&phase)) {
            currents.push((id.clone(), *cur));
            total += *cur;
        }
    }
    if total == 0 {
        return;
    }

    for (id, current) in currents {
        let cut = floor_div(deficit * current, total);
        let entry = result
            .entry(id.clone())
            .or_insert_with(|| current_settings[&id].clone());
        let new_value = (current + cut).max(0);
        entry.insert(phase, new_value);
        processed.entry(id).or_default().push(phase);
    }
}

fn distribute_increases(
    phase: crate::phase::Phase,
    surplus: i32,
    active_ids: &[ChargerId],
    current_settings: &HashMap<ChargerId, PerPhaseAmps>,
    requested: &HashMap<ChargerId, PerPhaseAmps>,
    result: &mut HashMap<ChargerId, PerPhaseAmps>,
    processed: &mut HashMap<ChargerId, Vec<crate::phase::Phase>>,
) {
    let mut total_potential = 0i32;
    let mut potentials: Vec<(ChargerId, i32)> = Vec::new();
    for id in active_ids {
        let current = current_settings.get(id).and_then(|m| m.get(&phase));
        let req = requested.get(id).and_then(|m| m.get(&phase));
        if let (Some(current), Some(req)) = (current, req) {
            let potential = (req - current).max(0);
            if potential > 0 {
                potentials.push((id.clone(), potential));
                total_potential += potential;
            }
        }
    }
    if total_potential == 0 {
        return;
    }

    for (id, potential) in potentials {
        let proportion = f64::from(surplus) * f64::from(potential) / f64::from(total_potential);
        let increase = proportion.min(f64::from(potential));
        let current = current_settings[&id][&phase];
        let entry = result
            .entry(id.clone())
            .or_insert_with(|| current_settings[&id].clone());
        let new_value = current + increase.floor() as i32;
        entry.insert(phase, new_value);
        processed.entry(id).or_default().push(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::ChargerAdapter;
    use crate::error::Result;
    use crate::phase::Phase;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct TestCharger {
        id: ChargerId,
        synced: bool,
        settle: u64,
        current: Mutex<Option<PerPhaseAmps>>,
        max: Option<PerPhaseAmps>,
        charging: bool,
    }

    #[async_trait]
    impl ChargerAdapter for TestCharger {
        fn id(&self) -> ChargerId {
            self.id.clone()
        }

        fn has_synced_phase_limits(&self) -> bool {
            self.synced
        }

        fn current_change_settle_time(&self) -> u64 {
            self.settle
        }

        async fn get_current_limit(&self) -> Option<PerPhaseAmps> {
            self.current.lock().unwrap().clone()
        }

        async fn get_max_current_limit(&self) -> Option<PerPhaseAmps> {
            self.max.clone()
        }

        async fn car_connected(&self) -> bool {
            self.charging
        }

        async fn can_charge(&self) -> bool {
            self.charging
        }

        async fn is_charging(&self) -> bool {
            self.charging
        }

        async fn set_current_limit(&self, limit: PerPhaseAmps) -> Result<()> {
            *self.current.lock().unwrap() = Some(limit);
            Ok(())
        }
    }

    fn amps(pairs: &[(Phase, i32)]) -> PerPhaseAmps {
        pairs.iter().copied().collect()
    }

    fn charger(id: &str, current: &[(Phase, i32)], synced: bool) -> Arc<TestCharger> {
        Arc::new(TestCharger {
            id: ChargerId::new(id),
            synced,
            settle: 0,
            current: Mutex::new(Some(amps(current))),
            max: Some(amps(&[(Phase::L1, 32), (Phase::L2, 32), (Phase::L3, 32)])),
            charging: true,
        })
    }

    #[tokio::test]
    async fn test_scenario_3_two_chargers_proportional_cut() {
        let mut allocator = Allocator::new();
        let c1 = charger("c1", &[(Phase::L1, 10)], false);
        let c2 = charger("c2", &[(Phase::L1, 16)], false);
        allocator.add_charger(c1.clone());
        allocator.add_charger(c2.clone());

        let deltas = amps(&[(Phase::L1, -4)]);
        let result = allocator.update_allocation(&deltas, 1000).await;

        assert_eq!(result[&ChargerId::new("c1")][&Phase::L1], 8);
        assert_eq!(result[&ChargerId::new("c2")][&Phase::L1], 13);
    }

    #[tokio::test]
    async fn test_scenario_4_synced_phase_flattening() {
        let mut allocator = Allocator::new();
        let c1 = charger(
            "c1",
            &[(Phase::L1, 16), (Phase::L2, 16), (Phase::L3, 16)],
            true,
        );
        allocator.add_charger(c1.clone());

        let deltas = amps(&[(Phase::L1, -1), (Phase::L2, 2), (Phase::L3, 0)]);
        let result = allocator.update_allocation(&deltas, 1000).await;

        let applied = &result[&ChargerId::new("c1")];
        assert_eq!(applied[&Phase::L1], 15);
        assert_eq!(applied[&Phase::L2], 15);
        assert_eq!(applied[&Phase::L3], 15);
    }

    #[tokio::test]
    async fn test_synced_phase_flattening_ignores_untouched_phase() {
        // L3 sits lower than L1/L2 but has no delta this tick; it must not
        // pull the flattened setpoint below the phases actually processed.
        let mut allocator = Allocator::new();
        let c1 = charger(
            "c1",
            &[(Phase::L1, 16), (Phase::L2, 16), (Phase::L3, 10)],
            true,
        );
        allocator.add_charger(c1.clone());

        let deltas = amps(&[(Phase::L1, -1), (Phase::L2, 2), (Phase::L3, 0)]);
        let result = allocator.update_allocation(&deltas, 1000).await;

        let applied = &result[&ChargerId::new("c1")];
        assert_eq!(applied[&Phase::L1], 15, "min over processed phases L1/L2, not the untouched L3");
        assert_eq!(applied[&Phase::L2], 15);
        assert_eq!(applied[&Phase::L3], 15);
    }

    #[tokio::test]
    async fn test_no_proposal_when_already_at_target() {
        let mut allocator = Allocator::new();
        let c1 = charger("c1", &[(Phase::L1, 16)], false);
        allocator.add_charger(c1.clone());

        let deltas = amps(&[(Phase::L1, 0)]);
        let result = allocator.update_allocation(&deltas, 1000).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_should_monitor_false_without_active_chargers() {
        let mut allocator = Allocator::new();
        let c1 = Arc::new(TestCharger {
            id: ChargerId::new("c1"),
            synced: false,
            settle: 0,
            current: Mutex::new(Some(amps(&[(Phase::L1, 16)]))),
            max: None,
            charging: false,
        });
        allocator.add_charger(c1);
        assert!(!allocator.should_monitor().await);
    }

    #[tokio::test]
    async fn test_manual_override_detection_is_idempotent() {
        let mut allocator = Allocator::new();
        let c1 = charger("c1", &[(Phase::L1, 32)], false);
        allocator.add_charger(c1.clone());

        // Initialize first (requested=32, applied=32)
        allocator.update_allocation(&amps(&[(Phase::L1, 0)]), 1000).await;

        // Apply a lower setpoint ourselves.
        allocator.update_applied_current(&ChargerId::new("c1"), amps(&[(Phase::L1, 27)]), 1000);
        *c1.current.lock().unwrap() = Some(amps(&[(Phase::L1, 32)]));

        allocator.update_allocation(&amps(&[(Phase::L1, 0)]), 2000).await;
        let state_after_first = allocator.charger_state(&ChargerId::new("c1")).unwrap().clone();

        allocator.update_allocation(&amps(&[(Phase::L1, 0)]), 2001).await;
        let state_after_second = allocator.charger_state(&ChargerId::new("c1")).unwrap().clone();

        assert_eq!(
            state_after_first.manual_override_detected,
            state_after_second.manual_override_detected
        );
        assert_eq!(
            state_after_first.requested_current,
            state_after_second.requested_current
        );
    }
}
