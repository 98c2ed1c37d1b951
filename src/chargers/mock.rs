//! A minimal, fully-inspectable charger fixture for Coordinator-level tests
//! and the demo binary, where the vendor-specific status mapping would
//! only get in the way.

use crate::charger::{ChargerAdapter, ChargerId};
use crate::error::Result;
use crate::phase::PerPhaseAmps;
use async_trait::async_trait;
use std::sync::Mutex;

struct Inner {
    current_limit: Option<PerPhaseAmps>,
    max_limit: Option<PerPhaseAmps>,
    synced: bool,
    can_charge: bool,
    is_charging: bool,
    car_connected: bool,
}

/// A charger whose every observable is set directly by the test or demo
/// driving it.
pub struct MockCharger {
    id: ChargerId,
    inner: Mutex<Inner>,
}

impl MockCharger {
    pub fn new(id: impl Into<ChargerId>, synced: bool) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                current_limit: None,
                max_limit: None,
                synced,
                can_charge: false,
                is_charging: false,
                car_connected: false,
            }),
        }
    }

    pub fn with_current_limit(self, limit: PerPhaseAmps) -> Self {
        self.inner.lock().unwrap().current_limit = Some(limit);
        self
    }

    pub fn with_max_limit(self, limit: PerPhaseAmps) -> Self {
        self.inner.lock().unwrap().max_limit = Some(limit);
        self
    }

    pub fn with_charging(self, can_charge: bool, is_charging: bool, car_connected: bool) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.can_charge = can_charge;
            inner.is_charging = is_charging;
            inner.car_connected = car_connected;
        }
        self
    }

    pub fn set_current_limit_directly(&self, limit: Option<PerPhaseAmps>) {
        self.inner.lock().unwrap().current_limit = limit;
    }

    pub fn set_can_charge(&self, can_charge: bool) {
        self.inner.lock().unwrap().can_charge = can_charge;
    }
}

#[async_trait]
impl ChargerAdapter for MockCharger {
    fn id(&self) -> ChargerId {
        self.id.clone()
    }

    fn has_synced_phase_limits(&self) -> bool {
        self.inner.lock().unwrap().synced
    }

    fn current_change_settle_time(&self) -> u64 {
        0
    }

    async fn get_current_limit(&self) -> Option<PerPhaseAmps> {
        self.inner.lock().unwrap().current_limit.clone()
    }

    async fn get_max_current_limit(&self) -> Option<PerPhaseAmps> {
        self.inner.lock().unwrap().max_limit.clone()
    }

    async fn car_connected(&self) -> bool {
        self.inner.lock().unwrap().car_connected
    }

    async fn can_charge(&self) -> bool {
        self.inner.lock().unwrap().can_charge
    }

    async fn is_charging(&self) -> bool {
        self.inner.lock().unwrap().is_charging
    }

    async fn set_current_limit(&self, limit: PerPhaseAmps) -> Result<()> {
        self.inner.lock().unwrap().current_limit = Some(limit);
        Ok(())
    }
}
