//! NetUMP session engine.
//!
//! Sans-I/O core: the engine never touches a socket. The owner drives it at a
//! nominal 1 kHz through [`NetUmpEngine::tick`], feeds every received
//! datagram through [`NetUmpEngine::input`], and transmits whatever
//! [`NetUmpEngine::drain_output`] yields. All protocol timing (invitation
//! retry, keepalive ping, peer timeout) is counted in ticks.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::config::{EndpointConfig, ErrorCorrectionMode};
use crate::fec::{FecMemory, ReplayWindow};
use crate::fifo::UmpFifo;
use crate::protocol::{
    self, ump_message_words, ByeReason, Command, MAX_DATAGRAM_BYTES, MAX_DATA_WORDS, SIGNATURE,
};

/// Ticks without inbound traffic before an open session is declared lost.
pub const TIMEOUT_RESET_TICKS: u32 = 30_000;

/// Idle ticks in an open session before a keepalive ping is emitted.
const PING_IDLE_TICKS: u32 = 10_000;

/// Delay between invitation attempts.
const INVITE_RETRY_TICKS: u32 = 1_000;

/// Role of this endpoint in the session, fixed per start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Drives the handshake by inviting the configured remote node.
    Initiator,
    /// Waits to be invited.
    Listener,
}

/// Session lifecycle state. The discriminants are the status codes reported
/// to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Closed = 0,
    Invite = 1,
    WaitInvite = 2,
    Opened = 3,
}

impl SessionState {
    /// Decode a status code; unknown codes map to `Closed`.
    pub fn from_status(code: u8) -> Self {
        match code {
            1 => SessionState::Invite,
            2 => SessionState::WaitInvite,
            3 => SessionState::Opened,
            _ => SessionState::Closed,
        }
    }
}

/// Receiver of incoming UMP messages.
///
/// Called synchronously from [`NetUmpEngine::input`], once per complete UMP
/// message (1–4 words, length implied by the MT field). Implementations must
/// return quickly; the caller is typically a realtime tick loop.
pub trait UmpHandler: Send {
    fn on_ump(&mut self, message: &[u32]);
}

impl<F> UmpHandler for F
where
    F: FnMut(&[u32]) + Send,
{
    fn on_ump(&mut self, message: &[u32]) {
        self(message)
    }
}

/// One-shot millisecond timer driven by the tick loop.
#[derive(Debug, Default)]
struct EventTimer {
    running: bool,
    remaining: u32,
    fired: bool,
}

impl EventTimer {
    fn arm(&mut self, ticks: u32) {
        self.remaining = ticks;
        self.fired = false;
        self.running = true;
    }

    fn tick(&mut self) {
        if self.running {
            if self.remaining > 0 {
                self.remaining -= 1;
            }
            if self.remaining == 0 {
                self.running = false;
                self.fired = true;
            }
        }
    }

    fn take_fired(&mut self) -> bool {
        std::mem::take(&mut self.fired)
    }
}

/// Engine counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetUmpStats {
    /// Datagrams queued for transmission (session commands and UMP data).
    pub datagrams_sent: u64,
    /// Datagrams accepted by the parser (signature present).
    pub datagrams_received: u64,
    /// UMP-data command packets transmitted.
    pub ump_packets_sent: u64,
    /// Complete UMP messages delivered to the handler.
    pub ump_messages_delivered: u64,
    /// UMP-data packets dropped as forward-error-correction replays.
    pub replays_dropped: u64,
    /// Datagrams or command packets dropped as malformed.
    pub malformed_datagrams: u64,
    /// Invitation commands transmitted.
    pub invitations_sent: u64,
    /// Keepalive pings transmitted.
    pub pings_sent: u64,
}

/// Cloneable producer handle for queueing outbound UMP messages from any
/// thread.
///
/// The queue is single-producer: hand one `UmpSender` to one producing
/// thread. Messages are accepted only while the session is open.
#[derive(Clone)]
pub struct UmpSender {
    fifo: Arc<UmpFifo>,
    state: Arc<AtomicU8>,
}

impl UmpSender {
    /// Queue one complete UMP message. Returns `false` when the session is
    /// not open, the message length does not match its MT, or the queue is
    /// full.
    pub fn send(&self, message: &[u32]) -> bool {
        if self.state.load(Ordering::Acquire) != SessionState::Opened as u8 {
            return false;
        }
        self.fifo.push(message)
    }

    /// True while the session is open and messages will be accepted.
    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == SessionState::Opened as u8
    }
}

/// Cloneable, lock-free view of the session state for other threads.
#[derive(Clone)]
pub struct SessionWatch {
    state: Arc<AtomicU8>,
}

impl SessionWatch {
    pub fn state(&self) -> SessionState {
        SessionState::from_status(self.state.load(Ordering::Acquire))
    }
}

/// The NetUMP session endpoint core.
pub struct NetUmpEngine {
    config: EndpointConfig,
    role: SessionRole,
    state: SessionState,
    /// Mirror of `state` shared with [`UmpSender`] handles.
    shared_state: Arc<AtomicU8>,

    /// Configured invitation target (initiator only).
    remote: Option<SocketAddr>,
    /// Current session partner; the only address UMP data is accepted from.
    partner: Option<SocketAddr>,
    partner_name: Option<String>,
    partner_instance_id: Option<String>,

    fifo: Arc<UmpFifo>,
    staging: Vec<u32>,
    fec: FecMemory,
    replay: ReplayWindow,
    sequence: u16,

    timeout: u32,
    ping_delay: u32,
    ping_id: u32,
    invite_count: u32,
    timer: EventTimer,

    connection_lost: bool,
    peer_closed: bool,

    handler: Option<Box<dyn UmpHandler>>,
    output: VecDeque<(SocketAddr, Bytes)>,
    stats: NetUmpStats,
}

impl NetUmpEngine {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            role: SessionRole::Listener,
            state: SessionState::Closed,
            shared_state: Arc::new(AtomicU8::new(SessionState::Closed as u8)),
            remote: None,
            partner: None,
            partner_name: None,
            partner_instance_id: None,
            fifo: Arc::new(UmpFifo::new()),
            staging: Vec::with_capacity(MAX_DATA_WORDS),
            fec: FecMemory::new(),
            replay: ReplayWindow::new(),
            sequence: 0,
            timeout: TIMEOUT_RESET_TICKS,
            ping_delay: 0,
            ping_id: 0,
            invite_count: 0,
            timer: EventTimer::default(),
            connection_lost: false,
            peer_closed: false,
            handler: None,
            output: VecDeque::new(),
            stats: NetUmpStats::default(),
        }
    }

    /// Install the receiver for incoming UMP messages.
    pub fn set_handler(&mut self, handler: Box<dyn UmpHandler>) {
        self.handler = Some(handler);
    }

    /// Producer handle for [`send_ump`](Self::send_ump) from another thread.
    pub fn sender(&self) -> UmpSender {
        UmpSender {
            fifo: Arc::clone(&self.fifo),
            state: Arc::clone(&self.shared_state),
        }
    }

    /// Lock-free state reader for other threads.
    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            state: Arc::clone(&self.shared_state),
        }
    }

    /// Begin a session as initiator: invite `remote` on the next tick, then
    /// retry every second until accepted.
    pub fn start_initiator(&mut self, remote: SocketAddr) {
        self.begin(SessionRole::Initiator);
        self.remote = Some(remote);
        self.partner = Some(remote);
        self.set_state(SessionState::Invite);
        self.timer.arm(1);
        info!(%remote, "inviting remote endpoint");
    }

    /// Begin a session as listener: wait for an invitation from any node.
    pub fn start_listener(&mut self) {
        self.begin(SessionRole::Listener);
        self.set_state(SessionState::WaitInvite);
        info!("waiting for invitation");
    }

    fn begin(&mut self, role: SessionRole) {
        self.role = role;
        self.remote = None;
        self.partner = None;
        self.partner_name = None;
        self.partner_instance_id = None;
        self.connection_lost = false;
        self.peer_closed = false;
        self.invite_count = 0;
        self.timeout = TIMEOUT_RESET_TICKS;
        self.ping_delay = 0;
        self.timer = EventTimer::default();
        self.output.clear();
        self.reset_data_path();
    }

    /// Re-enter the invitation phase after the peer left or timed out,
    /// keeping the previously configured target.
    pub fn restart_initiator(&mut self) {
        if self.role != SessionRole::Initiator {
            return;
        }
        self.sequence = 0;
        self.timeout = TIMEOUT_RESET_TICKS;
        self.set_state(SessionState::Invite);
        self.timer.arm(INVITE_RETRY_TICKS);
        debug!(remote = ?self.remote, "restarting initiator");
    }

    /// Terminate the session. Queues a BYE for the partner when the session
    /// is open; the caller should flush the output before dropping the
    /// transport.
    pub fn close(&mut self) {
        if self.state == SessionState::Opened {
            if let Some(partner) = self.partner {
                self.push_command(
                    partner,
                    &Command::Bye {
                        reason: ByeReason::UserTerminated,
                    },
                );
                info!(peer = %partner, "closing session");
            }
        }
        self.set_state(SessionState::Closed);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Session partner address, once known.
    pub fn partner(&self) -> Option<SocketAddr> {
        self.partner
    }

    /// Endpoint name advertised by the partner during the handshake.
    pub fn partner_endpoint_name(&self) -> Option<&str> {
        self.partner_name.as_deref()
    }

    /// Product instance id advertised by the partner during the handshake.
    pub fn partner_product_instance_id(&self) -> Option<&str> {
        self.partner_instance_id.as_deref()
    }

    pub fn stats(&self) -> &NetUmpStats {
        &self.stats
    }

    /// Select the transmit redundancy scheme.
    pub fn set_error_correction(&mut self, mode: ErrorCorrectionMode) {
        self.config.error_correction = mode;
    }

    /// True once after the session has been lost (peer timeout or bye).
    pub fn read_and_clear_connection_lost(&mut self) -> bool {
        std::mem::take(&mut self.connection_lost)
    }

    /// True once after the partner has sent a BYE on an active session.
    pub fn read_and_clear_peer_closed(&mut self) -> bool {
        std::mem::take(&mut self.peer_closed)
    }

    /// Queue one complete UMP message for transmission. Returns `false` when
    /// the session is not open, the message length does not match its MT, or
    /// the queue is full.
    pub fn send_ump(&self, message: &[u32]) -> bool {
        if self.state != SessionState::Opened {
            return false;
        }
        self.fifo.push(message)
    }

    /// Datagrams awaiting transmission, in send order.
    pub fn drain_output(&mut self) -> impl Iterator<Item = (SocketAddr, Bytes)> + '_ {
        self.output.drain(..)
    }

    /// Process one received datagram. Malformed input is dropped silently;
    /// session commands may queue replies.
    pub fn input(&mut self, datagram: &[u8], sender: SocketAddr) {
        let Some(body) = protocol::strip_signature(datagram) else {
            self.stats.malformed_datagrams += 1;
            trace!(%sender, "dropping datagram without signature");
            return;
        };
        self.stats.datagrams_received += 1;

        let mut buf = Bytes::copy_from_slice(body);
        while !buf.is_empty() {
            let Some(command) = Command::decode(&mut buf) else {
                self.stats.malformed_datagrams += 1;
                trace!(%sender, "dropping truncated command packet");
                return;
            };
            if let Command::Unsupported { opcode } = command {
                trace!(opcode, "ignoring unsupported command");
                continue;
            }
            trace!(%sender, command = command.name(), "command received");
            self.handle_command(command, sender);
        }
    }

    /// Advance the engine by one millisecond: timers, peer timeout, outbound
    /// assembly, keepalive, invitation retry.
    pub fn tick(&mut self) {
        self.timer.tick();

        if self.state == SessionState::Opened {
            if self.timeout > 0 {
                self.timeout -= 1;
            }
            if self.timeout == 0 {
                warn!(peer = ?self.partner, "no traffic from peer, session timed out");
                self.connection_lost = true;
                if let Some(partner) = self.partner {
                    self.push_command(
                        partner,
                        &Command::Bye {
                            reason: ByeReason::Timeout,
                        },
                    );
                }
                match self.role {
                    SessionRole::Initiator => {
                        self.set_state(SessionState::Closed);
                        self.restart_initiator();
                    }
                    SessionRole::Listener => self.set_state(SessionState::WaitInvite),
                }
            }
        }

        if self.state == SessionState::Closed {
            return;
        }

        // The FIFO is drained in every non-closed state so that no stale
        // burst goes out the moment the session opens; outside `Opened` the
        // assembled packet is discarded.
        let datagram = self.assemble_data_datagram();

        match self.state {
            SessionState::Opened => {
                if let (Some(datagram), Some(partner)) = (datagram, self.partner) {
                    self.output.push_back((partner, datagram));
                    self.stats.datagrams_sent += 1;
                    self.stats.ump_packets_sent += 1;
                }
                self.ping_delay += 1;
                if self.ping_delay > PING_IDLE_TICKS {
                    self.ping_delay = 0;
                    self.ping_id = self.ping_id.wrapping_add(1);
                    if let Some(partner) = self.partner {
                        let id = self.ping_id;
                        self.push_command(partner, &Command::Ping { id });
                        self.stats.pings_sent += 1;
                        debug!(id, "keepalive ping sent");
                    }
                }
            }
            SessionState::Invite => {
                if self.timer.take_fired() {
                    if let Some(remote) = self.remote {
                        let invitation = self.invitation();
                        self.push_command(remote, &invitation);
                        self.invite_count += 1;
                        self.stats.invitations_sent += 1;
                        debug!(%remote, attempt = self.invite_count, "invitation sent");
                    }
                    self.timer.arm(INVITE_RETRY_TICKS);
                }
            }
            SessionState::WaitInvite | SessionState::Closed => {}
        }
    }

    fn handle_command(&mut self, command: Command, sender: SocketAddr) {
        match command {
            Command::UmpData { sequence, words } => {
                if self.state != SessionState::Opened || self.partner != Some(sender) {
                    return;
                }
                self.timeout = TIMEOUT_RESET_TICKS;
                if !self.replay.check_and_record(sequence) {
                    self.stats.replays_dropped += 1;
                    trace!(sequence, "dropped forward error correction replay");
                    return;
                }
                self.deliver_words(&words);
            }
            Command::Invitation {
                endpoint_name,
                product_instance_id,
                ..
            } => match self.role {
                SessionRole::Listener => {
                    if self.state == SessionState::WaitInvite {
                        self.partner = Some(sender);
                        self.partner_name = Some(endpoint_name);
                        self.partner_instance_id = Some(product_instance_id);
                        self.timeout = TIMEOUT_RESET_TICKS;
                        self.reset_data_path();
                        let acceptance = self.acceptance();
                        self.push_command(sender, &acceptance);
                        self.set_state(SessionState::Opened);
                        info!(peer = %sender, name = ?self.partner_name, "session opened");
                    }
                }
                // One session per endpoint: an inviting node gets turned away.
                SessionRole::Initiator => {
                    self.push_command(
                        sender,
                        &Command::Bye {
                            reason: ByeReason::TooManySessions,
                        },
                    );
                    debug!(%sender, "refused invitation, endpoint is an initiator");
                }
            },
            Command::InvitationAccepted {
                endpoint_name,
                product_instance_id,
            } => {
                if self.role != SessionRole::Initiator || self.state != SessionState::Invite {
                    return;
                }
                if self.remote != Some(sender) {
                    warn!(%sender, "ignoring invitation acceptance from unexpected node");
                    return;
                }
                self.partner = Some(sender);
                self.partner_name = Some(endpoint_name);
                self.partner_instance_id = Some(product_instance_id);
                self.timeout = TIMEOUT_RESET_TICKS;
                self.reset_data_path();
                self.set_state(SessionState::Opened);
                info!(peer = %sender, name = ?self.partner_name, "session opened");
            }
            Command::Ping { id } => {
                self.push_command(sender, &Command::PingReply { id });
            }
            Command::PingReply { id } => {
                if self.state == SessionState::Opened
                    && self.partner == Some(sender)
                    && id == self.ping_id
                {
                    self.timeout = TIMEOUT_RESET_TICKS;
                } else {
                    trace!(%sender, id, "ignoring unmatched ping reply");
                }
            }
            Command::Bye { reason } => {
                self.push_command(sender, &Command::ByeReply);
                if self.partner == Some(sender) {
                    info!(peer = %sender, ?reason, "peer closed the session");
                    self.connection_lost = true;
                    self.peer_closed = true;
                    match self.role {
                        SessionRole::Listener => {
                            self.partner = None;
                            self.set_state(SessionState::WaitInvite);
                        }
                        SessionRole::Initiator => {
                            self.set_state(SessionState::Closed);
                            self.restart_initiator();
                        }
                    }
                } else {
                    trace!(%sender, ?reason, "bye from non-partner node");
                }
            }
            Command::ByeReply => {}
            // Not implemented in this protocol revision; dropped until the
            // version that defines their semantics is adopted.
            Command::SessionReset | Command::SessionResetReply => {
                trace!(%sender, "ignoring session reset");
            }
            Command::Unsupported { .. } => {}
        }
    }

    /// Split a UMP-data payload into MT-delimited messages and deliver each
    /// to the handler.
    fn deliver_words(&mut self, words: &[u32]) {
        let mut index = 0;
        while index < words.len() {
            let len = ump_message_words(words[index]);
            if index + len > words.len() {
                warn!("truncated UMP message inside data packet");
                self.stats.malformed_datagrams += 1;
                return;
            }
            if let Some(handler) = self.handler.as_mut() {
                handler.on_ump(&words[index..index + len]);
            }
            self.stats.ump_messages_delivered += 1;
            index += len;
        }
    }

    /// Build one UMP-data datagram from the queued words, or `None` when the
    /// queue is empty. With FEC enabled the datagram carries the last five
    /// packets, oldest first.
    fn assemble_data_datagram(&mut self) -> Option<Bytes> {
        self.staging.clear();
        self.fifo.drain_into(&mut self.staging, MAX_DATA_WORDS);
        if self.staging.is_empty() {
            return None;
        }

        let header = 0xFF00_0000 | (self.staging.len() as u32) << 16 | self.sequence as u32;
        self.sequence = self.sequence.wrapping_add(1);

        let mut buf = BytesMut::with_capacity(MAX_DATAGRAM_BYTES);
        buf.put_u32(SIGNATURE);
        match self.config.error_correction {
            ErrorCorrectionMode::Fec => {
                self.fec.record(header, &self.staging);
                self.fec.append_tail(&mut buf);
            }
            ErrorCorrectionMode::None => {
                buf.put_u32(header);
                for &word in &self.staging {
                    buf.put_u32(word);
                }
            }
        }
        Some(buf.freeze())
    }

    fn invitation(&self) -> Command {
        Command::Invitation {
            capabilities: 0, // no authentication support advertised
            endpoint_name: self.config.endpoint_name.clone(),
            product_instance_id: self.config.product_instance_id.clone(),
        }
    }

    fn acceptance(&self) -> Command {
        Command::InvitationAccepted {
            endpoint_name: self.config.endpoint_name.clone(),
            product_instance_id: self.config.product_instance_id.clone(),
        }
    }

    fn push_command(&mut self, to: SocketAddr, command: &Command) {
        self.output.push_back((to, protocol::command_datagram(command)));
        self.stats.datagrams_sent += 1;
    }

    /// Clear the redundancy state on both directions and restart packet
    /// numbering. Called whenever a session opens.
    fn reset_data_path(&mut self) {
        self.sequence = 0;
        self.fec.reset();
        self.replay.reset();
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "session state change");
        }
        self.state = state;
        self.shared_state.store(state as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for NetUmpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetUmpEngine")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("partner", &self.partner)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().expect("addr")
    }

    #[test]
    fn event_timer_fires_once_after_delay() {
        let mut timer = EventTimer::default();
        timer.arm(3);
        timer.tick();
        timer.tick();
        assert!(!timer.take_fired());
        timer.tick();
        assert!(timer.take_fired());
        assert!(!timer.take_fired(), "fired flag is consumed");
        timer.tick();
        assert!(!timer.take_fired(), "a stopped timer stays quiet");
    }

    #[test]
    fn initiator_sends_invitation_on_first_tick() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        engine.start_initiator(addr(5004));
        assert_eq!(engine.state(), SessionState::Invite);

        engine.tick();
        let sent: Vec<_> = engine.drain_output().collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, addr(5004));
        let body = protocol::strip_signature(&sent[0].1).expect("signature");
        assert_eq!(body[0], protocol::opcodes::INVITATION);
    }

    #[test]
    fn invitation_retries_once_per_second() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        engine.start_initiator(addr(5004));

        let mut sent = 0;
        for _ in 0..3_001 {
            engine.tick();
            sent += engine.drain_output().count();
        }
        assert_eq!(sent, 4, "first tick plus one retry per second");
    }

    #[test]
    fn send_ump_requires_open_session() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        assert!(!engine.send_ump(&[0x2091_4040]));
        let sender = engine.sender();
        assert!(!sender.send(&[0x2091_4040]));

        engine.start_listener();
        engine.input(
            &protocol::command_datagram(&Command::Invitation {
                capabilities: 0,
                endpoint_name: "remote".into(),
                product_instance_id: "r1".into(),
            }),
            addr(9000),
        );
        assert_eq!(engine.state(), SessionState::Opened);
        assert!(engine.send_ump(&[0x2091_4040]));
        assert!(sender.send(&[0x2091_4040]));
        assert!(sender.is_open());
    }

    #[test]
    fn listener_learns_partner_identity() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        engine.start_listener();
        engine.input(
            &protocol::command_datagram(&Command::Invitation {
                capabilities: 0,
                endpoint_name: "Stage Rig".into(),
                product_instance_id: "rig-1".into(),
            }),
            addr(9000),
        );
        assert_eq!(engine.partner(), Some(addr(9000)));
        assert_eq!(engine.partner_endpoint_name(), Some("Stage Rig"));
        assert_eq!(engine.partner_product_instance_id(), Some("rig-1"));
    }

    #[test]
    fn acceptance_from_unexpected_node_is_ignored() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        engine.start_initiator(addr(5004));
        engine.tick();
        let _ = engine.drain_output().count();

        engine.input(
            &protocol::command_datagram(&Command::InvitationAccepted {
                endpoint_name: "impostor".into(),
                product_instance_id: "x".into(),
            }),
            addr(6000),
        );
        assert_eq!(engine.state(), SessionState::Invite);

        engine.input(
            &protocol::command_datagram(&Command::InvitationAccepted {
                endpoint_name: "real".into(),
                product_instance_id: "r".into(),
            }),
            addr(5004),
        );
        assert_eq!(engine.state(), SessionState::Opened);
    }

    #[test]
    fn initiator_refuses_incoming_invitations() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        engine.start_initiator(addr(5004));
        engine.input(
            &protocol::command_datagram(&Command::Invitation {
                capabilities: 0,
                endpoint_name: "other".into(),
                product_instance_id: "o".into(),
            }),
            addr(7000),
        );
        let sent: Vec<_> = engine.drain_output().collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, addr(7000));
        let body = protocol::strip_signature(&sent[0].1).expect("signature");
        assert_eq!(body[0], protocol::opcodes::BYE);
        assert_eq!(body[2], ByeReason::TooManySessions.code());
        assert_eq!(engine.state(), SessionState::Invite);
    }

    #[test]
    fn ping_is_answered_with_matching_id() {
        let mut engine = NetUmpEngine::new(EndpointConfig::default());
        engine.start_listener();
        engine.input(
            &protocol::command_datagram(&Command::Ping { id: 0xABCD_1234 }),
            addr(9000),
        );
        let sent: Vec<_> = engine.drain_output().collect();
        assert_eq!(sent.len(), 1);
        let mut body = Bytes::copy_from_slice(protocol::strip_signature(&sent[0].1).expect("sig"));
        assert_eq!(
            Command::decode(&mut body),
            Some(Command::PingReply { id: 0xABCD_1234 })
        );
    }
}
