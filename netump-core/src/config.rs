//! Endpoint configuration.

use crate::protocol::{MAX_ENDPOINT_NAME_BYTES, MAX_PRODUCT_INSTANCE_ID_BYTES};

/// Transmit redundancy scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCorrectionMode {
    /// Each datagram carries only the newest packet.
    None,
    /// Each datagram carries the last five packets (see [`crate::fec`]).
    #[default]
    Fec,
}

/// Identity and behaviour of one NetUMP endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// UTF-8 endpoint name advertised during the handshake.
    pub endpoint_name: String,
    /// Product instance identifier advertised during the handshake.
    pub product_instance_id: String,
    /// Transmit redundancy scheme.
    pub error_correction: ErrorCorrectionMode,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint_name: "NetUMP".into(),
            product_instance_id: "default".into(),
            error_correction: ErrorCorrectionMode::Fec,
        }
    }
}

impl EndpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint name. Empty names and names that do not fit the wire
    /// limit (97 bytes + NUL) are ignored, keeping the previous value.
    pub fn endpoint_name(mut self, name: &str) -> Self {
        if !name.is_empty() && name.len() < MAX_ENDPOINT_NAME_BYTES {
            self.endpoint_name = name.into();
        }
        self
    }

    /// Set the product instance id. Empty or oversize (41 bytes + NUL) values
    /// are ignored, keeping the previous value.
    pub fn product_instance_id(mut self, piid: &str) -> Self {
        if !piid.is_empty() && piid.len() < MAX_PRODUCT_INSTANCE_ID_BYTES {
            self.product_instance_id = piid.into();
        }
        self
    }

    /// Select the transmit redundancy scheme.
    pub fn error_correction(mut self, mode: ErrorCorrectionMode) -> Self {
        self.error_correction = mode;
        self
    }
}
