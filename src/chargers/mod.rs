//! Illustrative, network-free `ChargerAdapter` implementations.
//!
//! Hardware I/O is out of scope for the core; these adapters exist so the
//! demo binary and test suite have something concrete to drive. Each is
//! modelled on a real vendor integration's shape (an in-memory register
//! instead of a network transport) and owns its own status-code mapping
//! internally, exposing only the three boolean predicates the core relies
//! on.

pub mod easee;
pub mod mock;
pub mod registry;
pub mod webasto;

pub use easee::EaseeLikeCharger;
pub use mock::MockCharger;
pub use registry::{ChargerVendor, build_charger};
pub use webasto::WebastoUniteLikeCharger;
