//! The charger adapter contract
//!
//! A host implements [`ChargerAdapter`] once per vendor integration; the
//! core only ever talks to chargers through this capability-surface trait,
//! never through vendor-specific hardware transports directly.

use crate::error::Result;
use crate::phase::PerPhaseAmps;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a charger, as assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChargerId(pub String);

impl ChargerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ChargerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChargerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single charger's adapter surface.
///
/// Implementations own their vendor-specific status-code mapping
/// internally and expose only the three boolean predicates plus the
/// capability fields below; the core never inspects vendor status codes.
#[async_trait]
pub trait ChargerAdapter: Send + Sync {
    /// This charger's stable identifier.
    fn id(&self) -> ChargerId;

    /// Whether this charger only accepts a single scalar limit mirrored
    /// across all phases, rather than independent per-phase limits.
    fn has_synced_phase_limits(&self) -> bool;

    /// Seconds to wait after applying a new limit before trusting the
    /// charger's own reported current limit again.
    fn current_change_settle_time(&self) -> u64;

    /// The charger's currently configured current limit, or `None` if it
    /// cannot be determined right now (communication failure, unknown
    /// state).
    async fn get_current_limit(&self) -> Option<PerPhaseAmps>;

    /// The maximum current limit the charger (or its fuse/cable) supports.
    async fn get_max_current_limit(&self) -> Option<PerPhaseAmps>;

    /// Whether a vehicle is physically connected.
    async fn car_connected(&self) -> bool;

    /// Whether the charger is in a state where it could be charging
    /// (connected and not faulted/finished), used to detect session
    /// start/end transitions.
    async fn can_charge(&self) -> bool;

    /// Whether the charger is actively drawing current right now.
    async fn is_charging(&self) -> bool;

    /// Apply a new current limit. Dispatched fire-and-forget by the
    /// Coordinator; failures are reported, not awaited inline.
    async fn set_current_limit(&self, limit: PerPhaseAmps) -> Result<()>;
}
