//! A per-phase charger adapter modelled on an Easee wallbox's shape: phases
//! are not synced, so each can be set to an independent limit.

use crate::charger::{ChargerAdapter, ChargerId};
use crate::error::Result;
use crate::phase::{self, PerPhaseAmps};
use async_trait::async_trait;
use std::sync::Mutex;

/// Charge-point status, illustrative of the kind of state machine a
/// per-phase wallbox integration exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    AwaitingStart,
    Charging,
    Completed,
    Error,
}

struct Inner {
    status: Status,
    current_limit: PerPhaseAmps,
    max_limit: PerPhaseAmps,
}

/// A charger that accepts independent per-phase limits.
pub struct EaseeLikeCharger {
    id: ChargerId,
    inner: Mutex<Inner>,
}

impl EaseeLikeCharger {
    pub fn new(id: impl Into<ChargerId>, max_current: i32) -> Self {
        let max_limit = phase::uniform(3, max_current);
        Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                status: Status::Disconnected,
                current_limit: max_limit.clone(),
                max_limit,
            }),
        }
    }

    pub fn set_status(&self, status: Status) {
        self.inner.lock().unwrap().status = status;
    }
}

#[async_trait]
impl ChargerAdapter for EaseeLikeCharger {
    fn id(&self) -> ChargerId {
        self.id.clone()
    }

    fn has_synced_phase_limits(&self) -> bool {
        false
    }

    fn current_change_settle_time(&self) -> u64 {
        10
    }

    async fn get_current_limit(&self) -> Option<PerPhaseAmps> {
        Some(self.inner.lock().unwrap().current_limit.clone())
    }

    async fn get_max_current_limit(&self) -> Option<PerPhaseAmps> {
        Some(self.inner.lock().unwrap().max_limit.clone())
    }

    async fn car_connected(&self) -> bool {
        !matches!(self.inner.lock().unwrap().status, Status::Disconnected)
    }

    async fn can_charge(&self) -> bool {
        matches!(
            self.inner.lock().unwrap().status,
            Status::AwaitingStart | Status::Charging
        )
    }

    async fn is_charging(&self) -> bool {
        matches!(self.inner.lock().unwrap().status, Status::Charging)
    }

    async fn set_current_limit(&self, limit: PerPhaseAmps) -> Result<()> {
        self.inner.lock().unwrap().current_limit = limit;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    #[tokio::test]
    async fn test_phases_set_independently() {
        let charger = EaseeLikeCharger::new("c1", 32);
        charger.set_status(Status::Charging);
        let limit: PerPhaseAmps = [(Phase::L1, 10), (Phase::L2, 16), (Phase::L3, 12)]
            .into_iter()
            .collect();
        charger.set_current_limit(limit.clone()).await.unwrap();

        let reported = charger.get_current_limit().await.unwrap();
        assert_eq!(reported, limit);
    }

    #[tokio::test]
    async fn test_disconnected_cannot_charge() {
        let charger = EaseeLikeCharger::new("c1", 32);
        assert!(!charger.can_charge().await);
        assert!(!charger.car_connected().await);
    }
}
