//! Common test utilities for the Blustream integration
//!
//! Provides a scripted fake matrix, a factory that records the handles it
//! hands out, and a host wired with a recording platform forwarder.

#![allow(dead_code)]

mod fake_matrix;
mod fixtures;
mod test_hass;

pub use fake_matrix::*;
pub use fixtures::*;
pub use test_hass::*;
