//! Illustrative, network-free `MeterAdapter` implementations.

pub mod mock;

pub use mock::MockMeter;
