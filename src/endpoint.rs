//! Actor-based endpoint driver — owns the core engine in a dedicated task,
//! communicates via channels. Zero locks on the hot path.
//!
//! The driver loop plays the role of the realtime thread in the protocol
//! model: a 1 ms interval drives [`NetUmpEngine::tick`], received datagrams
//! are fed straight into [`NetUmpEngine::input`], and every queued outbound
//! datagram is flushed to the transport. The UMP handler runs inside this
//! task, so it must stay short.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netump_core::engine::{NetUmpEngine, SessionState, SessionWatch, UmpHandler, UmpSender};
use netump_core::protocol::MAX_DATAGRAM_BYTES;
use netump_core::NetUmpStats;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::config::NetUmpConfig;
use crate::error::{NetUmpError, Result};
use crate::transport::{Transport, UdpTransport};

/// Time granted to the departing BYE before the socket drops.
const CLOSE_LINGER: Duration = Duration::from_millis(50);

/// Commands sent to the endpoint driver.
enum DriverCmd {
    SetHandler(Box<dyn UmpHandler>),
    RestartInitiator,
    Stats { reply: oneshot::Sender<NetUmpStats> },
    Close,
}

/// Edge-triggered session event latches, mirrored out of the driver task.
#[derive(Default)]
struct SessionFlags {
    connection_lost: AtomicBool,
    peer_closed: AtomicBool,
}

/// An async NetUMP session endpoint bound to one UDP socket.
///
/// Create one with [`NetUmpConfig::initiate`] or [`NetUmpConfig::listen`].
/// Exactly one session partner is handled per endpoint; after a peer bye or
/// timeout an initiator re-invites the same node automatically.
pub struct NetUmpEndpoint {
    cmd_tx: mpsc::Sender<DriverCmd>,
    ump: UmpSender,
    watch: SessionWatch,
    flags: Arc<SessionFlags>,
    local_addr: SocketAddr,
    driver: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for NetUmpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetUmpEndpoint")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl NetUmpEndpoint {
    /// Start a session initiator towards `remote`.
    ///
    /// Fails with [`NetUmpError::TransportUnavailable`] when `local_port`
    /// cannot be bound.
    pub async fn initiate(
        config: NetUmpConfig,
        remote: SocketAddr,
        local_port: u16,
        handler: Box<dyn UmpHandler>,
    ) -> Result<Self> {
        let transport = UdpTransport::bind((Ipv4Addr::UNSPECIFIED, local_port))
            .await
            .map_err(NetUmpError::TransportUnavailable)?;
        let mut engine = NetUmpEngine::new(config.endpoint);
        engine.set_handler(handler);
        engine.start_initiator(remote);
        Self::spawn(engine, Arc::new(transport))
    }

    /// Start a session listener awaiting an invitation.
    pub async fn listen(
        config: NetUmpConfig,
        local_port: u16,
        handler: Box<dyn UmpHandler>,
    ) -> Result<Self> {
        let transport = UdpTransport::bind((Ipv4Addr::UNSPECIFIED, local_port))
            .await
            .map_err(NetUmpError::TransportUnavailable)?;
        let mut engine = NetUmpEngine::new(config.endpoint);
        engine.set_handler(handler);
        engine.start_listener();
        Self::spawn(engine, Arc::new(transport))
    }

    fn spawn<T: Transport>(engine: NetUmpEngine, transport: Arc<T>) -> Result<Self> {
        let local_addr = transport.local_addr()?;
        let ump = engine.sender();
        let watch = engine.watch();
        let flags = Arc::new(SessionFlags::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let driver = tokio::spawn(run_driver(engine, transport, cmd_rx, Arc::clone(&flags)));
        Ok(Self {
            cmd_tx,
            ump,
            watch,
            flags,
            local_addr,
            driver,
        })
    }

    /// Queue one complete UMP message (1–4 words, length implied by MT) for
    /// transmission. Callable from any thread, but only one producer at a
    /// time. Returns `false` when the session is not open or the queue is
    /// full.
    pub fn send_ump(&self, message: &[u32]) -> bool {
        self.ump.send(message)
    }

    /// Producer handle for feeding UMP messages from a non-async thread.
    pub fn sender(&self) -> UmpSender {
        self.ump.clone()
    }

    /// Current session state.
    pub fn status(&self) -> SessionState {
        self.watch.state()
    }

    /// Address the endpoint socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True once after the session has been lost (peer timeout or bye).
    pub fn read_and_clear_connection_lost(&self) -> bool {
        self.flags.connection_lost.swap(false, Ordering::AcqRel)
    }

    /// True once after the partner closed the session with a BYE.
    pub fn read_and_clear_peer_closed(&self) -> bool {
        self.flags.peer_closed.swap(false, Ordering::AcqRel)
    }

    /// Replace the UMP handler. The swap is serialised against the tick loop
    /// by the driver task, so no messages are delivered to a half-installed
    /// handler.
    pub async fn set_handler(&self, handler: Box<dyn UmpHandler>) -> Result<()> {
        self.cmd_tx
            .send(DriverCmd::SetHandler(handler))
            .await
            .map_err(|_| NetUmpError::Closed)
    }

    /// Re-enter the invitation phase towards the configured remote node.
    pub async fn restart_initiator(&self) -> Result<()> {
        self.cmd_tx
            .send(DriverCmd::RestartInitiator)
            .await
            .map_err(|_| NetUmpError::Closed)
    }

    /// Engine counters.
    pub async fn stats(&self) -> Result<NetUmpStats> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(DriverCmd::Stats { reply })
            .await
            .map_err(|_| NetUmpError::Closed)?;
        rx.await.map_err(|_| NetUmpError::Closed)
    }

    /// Terminate the session and release the socket. Sends a BYE to the
    /// partner when the session is open and lets it depart before the socket
    /// drops.
    pub async fn close(self) -> Result<()> {
        let _ = self.cmd_tx.send(DriverCmd::Close).await;
        self.driver.await.map_err(|_| NetUmpError::Closed)
    }
}

async fn run_driver<T: Transport>(
    mut engine: NetUmpEngine,
    transport: Arc<T>,
    mut cmd_rx: mpsc::Receiver<DriverCmd>,
    flags: Arc<SessionFlags>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut buf = vec![0u8; 2 * MAX_DATAGRAM_BYTES];

    loop {
        tokio::select! {
            biased;

            // Millisecond tick (prioritised to keep protocol timing honest).
            _ = interval.tick() => {
                engine.tick();
                flush_output(&mut engine, &transport).await;
                publish_flags(&mut engine, &flags);
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(DriverCmd::SetHandler(handler)) => engine.set_handler(handler),
                    Some(DriverCmd::RestartInitiator) => engine.restart_initiator(),
                    Some(DriverCmd::Stats { reply }) => {
                        let _ = reply.send(*engine.stats());
                    }
                    Some(DriverCmd::Close) | None => {
                        engine.close();
                        flush_output(&mut engine, &transport).await;
                        tokio::time::sleep(CLOSE_LINGER).await;
                        debug!("endpoint driver stopped");
                        break;
                    }
                }
            }

            received = transport.recv_from(&mut buf) => {
                match received {
                    Ok((len, from)) => {
                        engine.input(&buf[..len], from);
                        flush_output(&mut engine, &transport).await;
                        publish_flags(&mut engine, &flags);
                    }
                    Err(e) => trace!(error = %e, "transport recv_from failed"),
                }
            }
        }
    }
}

/// Send all queued outbound datagrams over the transport.
async fn flush_output<T: Transport>(engine: &mut NetUmpEngine, transport: &Arc<T>) {
    let datagrams: Vec<_> = engine.drain_output().collect();
    for (target, datagram) in datagrams {
        if let Err(e) = transport.send_to(&datagram, target).await {
            trace!(error = %e, %target, "transport send_to failed");
        }
    }
}

/// Mirror the engine's edge-triggered latches into the shared flags.
fn publish_flags(engine: &mut NetUmpEngine, flags: &SessionFlags) {
    if engine.read_and_clear_connection_lost() {
        flags.connection_lost.store(true, Ordering::Release);
    }
    if engine.read_and_clear_peer_closed() {
        flags.peer_closed.store(true, Ordering::Release);
    }
}
