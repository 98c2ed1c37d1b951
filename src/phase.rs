//! Phase identifiers and per-phase current maps

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One phase of a (single- or three-phase) premises electrical feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    /// All three phases, in canonical order.
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    /// The live phases for a given phase count (1 or 3).
    ///
    /// A single-phase installation only ever exposes `L1`.
    pub fn live(phase_count: u8) -> Vec<Phase> {
        if phase_count == 1 {
            vec![Phase::L1]
        } else {
            Self::ALL.to_vec()
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::L1 => "l1",
            Phase::L2 => "l2",
            Phase::L3 => "l3",
        };
        write!(f, "{s}")
    }
}

/// A per-phase current value in amperes. `BTreeMap` keeps iteration in a
/// stable, deterministic `L1 < L2 < L3` order without an extra dependency.
pub type PerPhaseAmps = BTreeMap<Phase, i32>;

/// Build a [`PerPhaseAmps`] map with the same value on every live phase, the
/// shape synced-phase chargers report (a single scalar limit mirrored across
/// all phases).
pub fn uniform(phase_count: u8, value: i32) -> PerPhaseAmps {
    Phase::live(phase_count).into_iter().map(|p| (p, value)).collect()
}
