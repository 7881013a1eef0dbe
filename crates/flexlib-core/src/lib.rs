//! flexlib-core: error type and shared-state primitives for flexlib.
//!
//! The protocol core in the `flexlib` crate is fed from several concurrent
//! flows (the TCP line reader, the UDP datagram reader and caller threads
//! changing properties). This crate holds the pieces those flows share:
//!
//! - [`Error`] / [`Result`] -- error handling
//! - [`Barrier`] / [`ClampedBarrier`] -- multiple-reader, single-writer
//!   containers for object state
//! - [`helpers`] -- small value conversions used by the wire protocol

pub mod error;
pub mod helpers;
pub mod sync;

pub use error::{Error, Result};
pub use helpers::{bool_flag, hz_to_mhz, mhz_to_hz, parse_bool, parse_hex_u32};
pub use sync::{Barrier, ClampedBarrier, clamp, try_set_field};
