//! Testing utilities and mock implementations
//!
//! Lets the client be exercised without a physical device on the network.

pub mod mocks;

pub use mocks::*;
