//! Configuration for the Tokio NetUMP endpoint.

use std::net::SocketAddr;

use netump_core::{EndpointConfig, ErrorCorrectionMode, UmpHandler};

use crate::endpoint::NetUmpEndpoint;
use crate::error::Result;

/// Endpoint configuration builder.
///
/// Wraps the core [`EndpointConfig`]; the socket parameters travel with
/// [`initiate`](Self::initiate) / [`listen`](Self::listen) instead, since an
/// endpoint binds once per session.
#[derive(Debug, Clone, Default)]
pub struct NetUmpConfig {
    /// Identity and protocol tuning handed to the core engine.
    pub endpoint: EndpointConfig,
}

impl NetUmpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint name advertised during the handshake. Empty or
    /// oversize names are ignored.
    pub fn endpoint_name(mut self, name: &str) -> Self {
        self.endpoint = self.endpoint.endpoint_name(name);
        self
    }

    /// Set the product instance id advertised during the handshake. Empty or
    /// oversize values are ignored.
    pub fn product_instance_id(mut self, piid: &str) -> Self {
        self.endpoint = self.endpoint.product_instance_id(piid);
        self
    }

    /// Select the transmit redundancy scheme (FEC is the default).
    pub fn error_correction(mut self, mode: ErrorCorrectionMode) -> Self {
        self.endpoint = self.endpoint.error_correction(mode);
        self
    }

    /// Start a session initiator towards `remote`, bound to `local_port`
    /// (0 picks an ephemeral port).
    pub async fn initiate(
        self,
        remote: SocketAddr,
        local_port: u16,
        handler: Box<dyn UmpHandler>,
    ) -> Result<NetUmpEndpoint> {
        NetUmpEndpoint::initiate(self, remote, local_port, handler).await
    }

    /// Start a session listener bound to `local_port` (0 picks an ephemeral
    /// port).
    pub async fn listen(self, local_port: u16, handler: Box<dyn UmpHandler>) -> Result<NetUmpEndpoint> {
        NetUmpEndpoint::listen(self, local_port, handler).await
    }
}
