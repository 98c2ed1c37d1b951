//! Per-phase availability computation with a sliding-window overcurrent
//! tolerance.

use crate::error::{LoadBalancerError, Result};
use crate::phase::{Phase, PerPhaseAmps};
use std::collections::{BTreeMap, VecDeque};

/// How the Balancer treats transient overcurrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvercurrentMode {
    /// Any negative availability is surfaced immediately.
    Conservative,
    /// Brief overcurrent within the sliding window is tolerated.
    Optimised,
}

impl OvercurrentMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "conservative" => Ok(Self::Conservative),
            "optimised" => Ok(Self::Optimised),
            other => Err(LoadBalancerError::validation(
                "overcurrent_mode",
                format!("unknown overcurrent mode: {other}"),
            )),
        }
    }
}

/// One (timestamp, excess) sample in the sliding window, per phase.
#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: u64,
    excess: u32,
}

/// Per-phase availability computer.
///
/// The threshold is calibrated so that the integrated excess-ampere-seconds
/// of a sustained overload at `max_limits[p] + 1` A held for the entire
/// window would just reach it: `threshold[p] = 1 * window_seconds`
/// ampere-seconds. A brief spike that doesn't accumulate that much energy
/// is tolerated; a sustained one is not.
pub struct Balancer {
    max_limits: PerPhaseAmps,
    mode: OvercurrentMode,
    window_seconds: u64,
    windows: BTreeMap<Phase, VecDeque<Sample>>,
}

impl Balancer {
    pub fn new(max_limits: PerPhaseAmps, mode: OvercurrentMode, window_seconds: u64) -> Self {
        let windows = max_limits.keys().map(|p| (*p, VecDeque::new())).collect();
        Self {
            max_limits,
            mode,
            window_seconds,
            windows,
        }
    }

    fn threshold(&self) -> u32 {
        self.window_seconds as u32
    }

    /// Compute the signed per-phase delta the Allocator may act on.
    ///
    /// `available[p] = fuse_size[p] - active_current[p]`, already clamped
    /// to the phase's fuse rating by the caller. Negative values are a
    /// deficit (cut), positive values are headroom (grant), zero holds.
    pub fn compute_availability(&mut self, available: &PerPhaseAmps, now: u64) -> PerPhaseAmps {
        let mut deltas = PerPhaseAmps::new();

        for (phase, value) in available {
            let window = self.windows.entry(*phase).or_default();

            match self.mode {
                OvercurrentMode::Conservative => {
                    deltas.insert(*phase, *value);
                }
                OvercurrentMode::Optimised => {
                    if *value >= 0 {
                        window.push_back(Sample {
                            timestamp: now,
                            excess: 0,
                        });
                        evict_stale(window, now, self.window_seconds);
                        deltas.insert(*phase, *value);
                    } else {
                        let excess = (-*value) as u32;
                        window.push_back(Sample {
                            timestamp: now,
                            excess,
                        });
                        evict_stale(window, now, self.window_seconds);

                        let integral: u32 = window.iter().map(|s| s.excess).sum();
                        if integral > self.threshold() {
                            deltas.insert(*phase, *value);
                        } else {
                            deltas.insert(*phase, 0);
                        }
                    }
                }
            }
        }

        deltas
    }

    /// The configured fuse rating per live phase.
    pub fn max_limits(&self) -> &PerPhaseAmps {
        &self.max_limits
    }
}

fn evict_stale(window: &mut VecDeque<Sample>, now: u64, window_seconds: u64) {
    while let Some(front) = window.front() {
        if now.saturating_sub(front.timestamp) > window_seconds {
            window.pop_front();
        } else {
            break;
        }
    }
}
