//! # NetUMP over Tokio
//!
//! An async endpoint for the Network UMP session protocol: MIDI 2.0
//! Universal MIDI Packets over UDP, with session handshake, keepalive, and
//! forward error correction.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use netump_tokio::NetUmpConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Invite a listener at 192.168.0.20:5004 from local port 5005.
//!     let endpoint = NetUmpConfig::new()
//!         .endpoint_name("Studio Console")
//!         .initiate(
//!             "192.168.0.20:5004".parse()?,
//!             5005,
//!             Box::new(|message: &[u32]| {
//!                 println!("UMP in: {message:08X?}");
//!             }),
//!         )
//!         .await?;
//!
//!     // Note On, channel 0, note 64, velocity 64 (MIDI 1.0 protocol in UMP).
//!     endpoint.send_ump(&[0x2090_4040]);
//!
//!     endpoint.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  NetUmpEndpoint      │  user API, UmpSender, status/latches
//! ├──────────────────────┤
//! │  driver task         │  1 ms tick, recv loop, command channel
//! ├──────────────────────┤
//! │  netump-core engine  │  session state machine, FEC, packing
//! ├──────────────────────┤
//! │  Transport           │  UDP socket (or any datagram transport)
//! └──────────────────────┘
//! ```
//!
//! The protocol core lives in the `netump-core` crate and is fully
//! synchronous; this crate supplies the socket, the clock, and the task
//! plumbing around it.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod transport;

pub use config::NetUmpConfig;
pub use endpoint::NetUmpEndpoint;
pub use error::{NetUmpError, Result};
pub use transport::{Transport, UdpTransport};

// Core re-exports so applications rarely need netump-core directly.
pub use netump_core::{
    transcoder, ByeReason, EndpointConfig, ErrorCorrectionMode, NetUmpStats, SessionRole,
    SessionState, UmpHandler, UmpSender,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
