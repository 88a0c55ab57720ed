//! Error types for the Tokio NetUMP endpoint.

use thiserror::Error;

/// Result type for endpoint operations.
pub type Result<T> = std::result::Result<T, NetUmpError>;

/// Errors surfaced by [`NetUmpEndpoint`](crate::endpoint::NetUmpEndpoint).
///
/// Protocol-level faults never appear here: malformed traffic is dropped by
/// the core engine and session loss is reported through the edge-triggered
/// latches, mirroring the wire protocol's own error model.
#[derive(Error, Debug)]
pub enum NetUmpError {
    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The local socket could not be opened.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[source] std::io::Error),

    /// The endpoint driver has already shut down.
    #[error("endpoint closed")]
    Closed,
}
