use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connect::{Connection, Listener, SessionConfig};
use crate::error::SessionError;
use crate::exchange::{InboundExchanger, OutboundExchanger, SessionIo};
use crate::peer::{PeerIdentity, SessionContext};

/// Where a session is in its life. `Disconnected` is terminal: a new session
/// takes a new manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Establishing,
    Connected,
    Disconnected,
}

/// Owns one session: the transport, the current-peer context and the two
/// exchanger tasks running against it.
pub struct SessionManager {
    config: SessionConfig,
    context: SessionContext,
    cancel: CancellationToken,
    state: SessionState,
    exchangers: Option<Exchangers>,
}

struct Exchangers {
    outbound: JoinHandle<()>,
    inbound: JoinHandle<()>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            context: SessionContext::new(),
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
            exchangers: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle on the per-session current-peer slot.
    pub fn context(&self) -> SessionContext {
        self.context.clone()
    }

    /// Token that interrupts establishment and stops both exchangers. Wire it
    /// to Ctrl-C to abort a dial mid-retry.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Actively dial `peer` and start exchanging messages.
    pub async fn connect(
        &mut self,
        peer: PeerIdentity,
        io: SessionIo,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.state = SessionState::Establishing;

        let conn = match Connection::dial(peer.addr, &self.config, &self.cancel).await {
            Ok(conn) => conn,
            Err(error) => {
                self.state = SessionState::Disconnected;
                return Err(error);
            }
        };

        self.start(conn, peer, io).await.map(|_| ())
    }

    /// Wait for one peer to dial in on `listener`, then start exchanging.
    /// `prompt_name` is asked for the peer's display name once the connection
    /// is accepted. Returns the identity published into the context.
    pub async fn listen<F, Fut>(
        &mut self,
        listener: Listener,
        io: SessionIo,
        prompt_name: F,
    ) -> Result<Arc<PeerIdentity>, SessionError>
    where
        F: FnOnce(SocketAddr) -> Fut,
        Fut: Future<Output = io::Result<String>>,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.state = SessionState::Establishing;

        let (conn, peer_addr) = match listener.accept_once().await {
            Ok(accepted) => accepted,
            Err(error) => {
                self.state = SessionState::Disconnected;
                return Err(error);
            }
        };

        let name = match prompt_name(peer_addr).await {
            Ok(name) => name,
            Err(error) => {
                // conn drops here, so no half-open transport survives
                self.state = SessionState::Disconnected;
                return Err(error.into());
            }
        };

        self.start(conn, PeerIdentity::new(name, peer_addr), io).await
    }

    /// Publish the peer, then spawn the exchangers against the split
    /// transport. Publishing first is load-bearing: the inbound exchanger
    /// tags messages with the context from its first read onward.
    async fn start(
        &mut self,
        conn: Connection,
        peer: PeerIdentity,
        io: SessionIo,
    ) -> Result<Arc<PeerIdentity>, SessionError> {
        let local_addr = match conn.local_addr() {
            Ok(addr) => addr,
            Err(error) => {
                self.state = SessionState::Disconnected;
                return Err(error.into());
            }
        };
        let local = Arc::new(PeerIdentity::new(self.config.local_name.clone(), local_addr));
        let role = conn.role();

        let peer = self.context.publish(peer).await;
        let (read_half, write_half) = conn.into_split();

        let outbound = OutboundExchanger {
            input: io.input,
            writer: write_half,
            local,
            cancel: self.cancel.clone(),
        }
        .spawn();
        let inbound = InboundExchanger {
            reader: read_half,
            context: self.context.clone(),
            display: io.display,
            cancel: self.cancel.clone(),
        }
        .spawn();

        self.exchangers = Some(Exchangers { outbound, inbound });
        self.state = SessionState::Connected;
        info!(peer = %peer.name, addr = %peer.addr, ?role, "session connected");
        Ok(peer)
    }

    /// Tear the session down: stop both exchangers, close the transport,
    /// clear the context. Idempotent: safe after the exchangers have already
    /// finished on their own, and safe to call twice.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        self.join_exchangers().await;
        self.context.clear().await;
        self.state = SessionState::Disconnected;
    }

    /// Block until both exchangers finish on their own (local input ended, or
    /// the peer closed the connection), then clean up.
    pub async fn wait(&mut self) {
        self.join_exchangers().await;
        self.context.clear().await;
        self.state = SessionState::Disconnected;
    }

    async fn join_exchangers(&mut self) {
        if let Some(Exchangers { outbound, inbound }) = self.exchangers.take() {
            if let Err(error) = outbound.await {
                warn!(%error, "outbound exchanger task failed");
            }
            if let Err(error) = inbound.await {
                warn!(%error, "inbound exchanger task failed");
            }
        }
    }
}
