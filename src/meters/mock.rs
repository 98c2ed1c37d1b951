//! A meter fixture whose per-phase readings are set directly, for tests
//! and the demo binary.

use crate::phase::Phase;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::meter::MeterAdapter;

/// A meter whose readings are injected by the caller rather than sampled
/// from hardware.
pub struct MockMeter {
    readings: Mutex<HashMap<Phase, Option<i32>>>,
}

impl MockMeter {
    pub fn new() -> Self {
        Self {
            readings: Mutex::new(HashMap::new()),
        }
    }

    /// Set the reading reported for a phase. `None` simulates a sensor
    /// that is temporarily unavailable.
    pub fn set_reading(&self, phase: Phase, reading: Option<i32>) {
        self.readings.lock().unwrap().insert(phase, reading);
    }
}

impl Default for MockMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeterAdapter for MockMeter {
    async fn get_active_phase_current(&self, phase: Phase) -> Option<i32> {
        self.readings.lock().unwrap().get(&phase).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_phase_reads_as_unavailable() {
        let meter = MockMeter::new();
        assert_eq!(meter.get_active_phase_current(Phase::L1).await, None);
        meter.set_reading(Phase::L1, Some(12));
        assert_eq!(meter.get_active_phase_current(Phase::L1).await, Some(12));
    }
}
