//! Enumerates the illustrative adapter kinds and selects one by device
//! identity, without pulling in any vendor transport.

use super::{EaseeLikeCharger, WebastoUniteLikeCharger};
use crate::charger::{ChargerAdapter, ChargerId};
use std::sync::Arc;

/// The charger vendor shapes this crate ships illustrative adapters for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerVendor {
    /// Single scalar limit mirrored across all phases.
    WebastoUnite,
    /// Independent per-phase limits.
    Easee,
}

/// Build the adapter for a given vendor and device identity.
pub fn build_charger(
    vendor: ChargerVendor,
    id: impl Into<ChargerId>,
    max_current: i32,
) -> Arc<dyn ChargerAdapter> {
    match vendor {
        ChargerVendor::WebastoUnite => Arc::new(WebastoUniteLikeCharger::new(id, max_current)),
        ChargerVendor::Easee => Arc::new(EaseeLikeCharger::new(id, max_current)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_selects_matching_shape() {
        let synced = build_charger(ChargerVendor::WebastoUnite, "c1", 32);
        assert!(synced.has_synced_phase_limits());

        let per_phase = build_charger(ChargerVendor::Easee, "c2", 32);
        assert!(!per_phase.has_synced_phase_limits());
    }
}
