//! hcisim-test-harness: test utilities for the hcisim controller emulator.
//!
//! This crate provides [`MockHost`] for driving an HCI socket the way a host
//! stack would, and [`RecordingChannel`] for testing the controller without
//! any socket at all.

pub mod mock_host;
pub mod recording;

pub use mock_host::MockHost;
pub use recording::{RecordedEvent, RecordingChannel};
