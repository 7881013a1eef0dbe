//! FlexRadio SmartSDR protocol core.
//!
//! This crate implements the client side of the SmartSDR TCP/IP protocol
//! used by FLEX-6000/8000 series radios:
//!
//! - **Key/value parsing** ([`keyvalue`]) -- the `key=value` token lists
//!   every status line and reply is made of.
//! - **Line codec** ([`codec`]) -- `C<seq>|cmd` framing out, and
//!   classification of inbound `H`/`M`/`R`/`S`/`V` lines.
//! - **Reply correlation** ([`reply`]) -- pending commands keyed by
//!   sequence number.
//! - **Command builders** ([`commands`]) -- command text and the session's
//!   sequence counter.
//! - **Protocol state machine** ([`radio`]) -- [`Radio`] routes status
//!   lines into the object models ([`models`]) and publishes
//!   [`RadioEvent`]s.
//! - **VITA-49 codec** ([`vita`]) -- decode and encode UDP stream packets,
//!   plus payload helpers for meters, audio, IQ and displays.
//! - **Stream demultiplexer** ([`demux`]) -- hands decoded packets to the
//!   object owning their stream id.
//! - **Discovery** ([`discovery`]) -- LAN discovery broadcasts.
//! - **Client** ([`client`]) -- tokio TCP/UDP transport tying it together.
//!
//! # Architecture
//!
//! The state machine does no I/O. It consumes one TCP line at a time via
//! [`Radio::received_message`] and emits commands through a
//! [`CommandSink`](commands::CommandSink). [`FlexClient`] supplies the
//! sink, the reader tasks and the UDP socket. Tests drive [`Radio`]
//! directly with recorded lines.
//!
//! # Example
//!
//! ```no_run
//! use flexlib::{ClientOptions, FlexClient, RadioEvent};
//! use std::time::Duration;
//!
//! # async fn example() -> flexlib::Result<()> {
//! let options = ClientOptions {
//!     program: "logger".to_string(),
//!     ..ClientOptions::default()
//! };
//! let client = FlexClient::connect_with_options("192.168.1.100", 4992, options).await?;
//! client.wait_client_connected(Duration::from_secs(5)).await?;
//!
//! let mut events = client.subscribe();
//! let seq = client.radio().create_slice(14_074_000, "ANT1", "DIGU");
//! while let Ok(event) = events.recv().await {
//!     if let RadioEvent::Added(object) = event {
//!         println!("added {} (command {seq})", object.kind().as_str());
//!         break;
//!     }
//! }
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod models;

pub mod client;
pub mod codec;
pub mod commands;
pub mod demux;
pub mod discovery;
pub mod events;
pub mod keyvalue;
pub mod radio;
pub mod reply;
pub mod vita;

pub use client::{ClientOptions, DEFAULT_TCP_PORT, FlexClient};
pub use commands::{CommandSink, Commands};
pub use demux::{RouteOutcome, StreamDemux};
pub use discovery::{DiscoveryAnnouncement, GuiClient};
pub use events::{ObjectKind, ObjectRef, RadioEvent};
pub use flexlib_core::{Error, Result};
pub use radio::{ConnectionState, Radio, RadioProperties};
pub use reply::{Reply, ReplyTable};
pub use vita::VitaPacket;
