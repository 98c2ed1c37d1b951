//! # evse-load-balancer
//!
//! Core control loop for balancing the current drawn by one or more EV
//! chargers (EVSEs) across the phases of a premises electrical feed, so
//! that the sum of all loads on any phase never exceeds the main fuse
//! rating, while opportunistically restoring charging current when
//! headroom reappears.
//!
//! ## Architecture
//!
//! Three tightly coupled subsystems, driven once per tick:
//!
//! - [`balancer`]: per-phase availability computation with a sliding-window
//!   overcurrent tolerance.
//! - [`allocator`]: multi-charger proportional apportionment of the
//!   Balancer's per-phase deltas.
//! - [`coordinator`]: the periodic driver that samples the meter, calls the
//!   Balancer then the Allocator, applies timing/gating policy, and
//!   dispatches setpoints to chargers.
//!
//! Hardware access is expressed at the edges as the [`charger::ChargerAdapter`]
//! and [`meter::MeterAdapter`] traits; this crate never talks to hardware
//! itself. `chargers` and `meters` hold illustrative, network-free
//! implementations used by the demo binary and the test suite.
//!
//! - `config`: configuration loading and validation
//! - `logging`: structured logging and tracing
//! - `error`: crate-wide error type
//! - `clock`: injectable wall-clock so ticks can be driven deterministically
//! - `phase`: the `Phase` enum and `PerPhaseAmps` map
//! - `charger` / `meter`: the adapter trait contracts
//! - `balancer`: per-phase availability computer
//! - `allocator`: multi-charger apportioner
//! - `coordinator`: tick driver and event emission
//! - `chargers` / `meters`: illustrative, network-free adapter implementations

pub mod allocator;
pub mod balancer;
pub mod charger;
pub mod chargers;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod meter;
pub mod meters;
pub mod phase;

// Re-export commonly used types
pub use allocator::{Allocator, ChargerState};
pub use balancer::{Balancer, OvercurrentMode};
pub use charger::{ChargerAdapter, ChargerId};
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorEvent, CoordinatorRunState};
pub use error::{LoadBalancerError, Result};
pub use meter::MeterAdapter;
pub use phase::{Phase, PerPhaseAmps};
