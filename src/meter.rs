//! The meter adapter contract

use crate::phase::Phase;
use async_trait::async_trait;

/// A source of per-phase current readings at the point of supply.
///
/// Implementations own their own protocol (DSMR, HomeWizard, MQTT, ...);
/// the core only ever reads a single active current per phase per tick.
#[async_trait]
pub trait MeterAdapter: Send + Sync {
    /// The active current on a given phase, in amperes, or `None` if the
    /// reading could not be obtained this tick.
    async fn get_active_phase_current(&self, phase: Phase) -> Option<i32>;
}
