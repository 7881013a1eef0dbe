//! flexlib-test-harness: a scripted SmartSDR server for client tests.
//!
//! [`MockSmartSdr`] listens on localhost, performs the version/handle
//! handshake, answers `C<seq>|command` lines with scripted replies and lets
//! a test push arbitrary status lines at the client.

pub mod mock_smartsdr;

pub use mock_smartsdr::MockSmartSdr;
