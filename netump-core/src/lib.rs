//! Pure synchronous NetUMP protocol engine.
//!
//! This crate implements the Network UMP (MIDI 2.0 over UDP) session
//! protocol with zero runtime dependencies — no tokio, no async, no I/O. It
//! only depends on `bytes` and `tracing`.
//!
//! ```text
//! ┌────────────────────────────────┐
//! │  netump-core                   │
//! │                                │
//! │  protocol   ← wire types       │
//! │  fifo       ← outbound SPSC    │
//! │  fec        ← redundancy rings │
//! │  engine     ← session machine  │
//! │  transcoder ← UMP ↔ MIDI 1.0   │
//! │  config     ← identity/tuning  │
//! └────────────────────────────────┘
//! ```
//!
//! The engine is driven from the outside: call [`NetUmpEngine::tick`] once
//! per millisecond, feed received datagrams to [`NetUmpEngine::input`], and
//! transmit whatever [`NetUmpEngine::drain_output`] yields. The
//! `netump-tokio` crate wraps this in an async endpoint with a real UDP
//! socket.

pub mod config;
pub mod engine;
pub mod fec;
pub mod fifo;
pub mod protocol;
pub mod transcoder;

pub use config::{EndpointConfig, ErrorCorrectionMode};
pub use engine::{
    NetUmpEngine, NetUmpStats, SessionRole, SessionState, SessionWatch, UmpHandler, UmpSender,
    TIMEOUT_RESET_TICKS,
};
pub use fifo::UmpFifo;
pub use protocol::{ByeReason, Command};
pub use transcoder::{Sysex7Decoder, UmpMessage};
