//! A synced-phase charger adapter modelled on the OCPP-derived status codes
//! and single-scalar limit reporting of a Webasto Unite wallbox.

use crate::charger::{ChargerAdapter, ChargerId};
use crate::error::Result;
use crate::phase::{self, PerPhaseAmps};
use async_trait::async_trait;
use std::sync::Mutex;

/// OCPP-derived charge-point status, the shape a Webasto Unite wallbox's
/// status map reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Available,
    Preparing,
    Charging,
    SuspendedEvse,
    SuspendedEv,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

struct Inner {
    status: Status,
    current_limit: i32,
    max_limit: i32,
}

/// A charger that only accepts one scalar limit, mirrored across all
/// phases by hardware.
pub struct WebastoUniteLikeCharger {
    id: ChargerId,
    inner: Mutex<Inner>,
}

impl WebastoUniteLikeCharger {
    pub fn new(id: impl Into<ChargerId>, max_limit: i32) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                status: Status::Available,
                current_limit: max_limit,
                max_limit,
            }),
        }
    }

    /// Simulate the wallbox's connectivity/charging status changing, as a
    /// test or demo fixture would.
    pub fn set_status(&self, status: Status) {
        self.inner.lock().unwrap().status = status;
    }
}

#[async_trait]
impl ChargerAdapter for WebastoUniteLikeCharger {
    fn id(&self) -> ChargerId {
        self.id.clone()
    }

    fn has_synced_phase_limits(&self) -> bool {
        true
    }

    fn current_change_settle_time(&self) -> u64 {
        5
    }

    async fn get_current_limit(&self) -> Option<PerPhaseAmps> {
        let inner = self.inner.lock().unwrap();
        Some(phase::uniform(3, inner.current_limit))
    }

    async fn get_max_current_limit(&self) -> Option<PerPhaseAmps> {
        let inner = self.inner.lock().unwrap();
        Some(phase::uniform(3, inner.max_limit))
    }

    async fn car_connected(&self) -> bool {
        matches!(
            self.inner.lock().unwrap().status,
            Status::Preparing
                | Status::Charging
                | Status::SuspendedEvse
                | Status::SuspendedEv
                | Status::Finishing
        )
    }

    async fn can_charge(&self) -> bool {
        matches!(
            self.inner.lock().unwrap().status,
            Status::Preparing | Status::Charging | Status::SuspendedEv
        )
    }

    async fn is_charging(&self) -> bool {
        matches!(self.inner.lock().unwrap().status, Status::Charging)
    }

    async fn set_current_limit(&self, limit: PerPhaseAmps) -> Result<()> {
        let scalar = limit.values().copied().min().unwrap_or(0);
        self.inner.lock().unwrap().current_limit = scalar;
        Ok(())
    }
}
