use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::lookup_host;
use tokio::sync::RwLock;

use crate::error::SessionError;

/// The person on the other end of a session: a display name plus the
/// resolved address we dial (or accepted) them on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub name: String,
    pub addr: SocketAddr,
}

impl PeerIdentity {
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
        }
    }

    /// Resolve `host` and build an identity for the active (dialing) side.
    /// Prefers an IPv4 address when the name resolves to both families.
    pub async fn resolve(
        name: impl Into<String>,
        host: &str,
        port: u16,
    ) -> Result<Self, SessionError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|_| SessionError::UnresolvedAddress(host.to_string()))?
            .collect();

        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| SessionError::UnresolvedAddress(host.to_string()))?;

        Ok(Self::new(name, addr))
    }
}

/// Per-session "current peer" slot shared by the exchangers and the
/// controller. Cloning hands out another handle on the same slot.
///
/// `publish` and `clear` each make a single assignment under the write lock,
/// so a reader observes either no peer or a complete identity, never a
/// half-written one.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    current: Arc<RwLock<Option<Arc<PeerIdentity>>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connected peer. Returns the shared handle the exchangers tag
    /// messages with.
    pub async fn publish(&self, peer: PeerIdentity) -> Arc<PeerIdentity> {
        let peer = Arc::new(peer);
        *self.current.write().await = Some(peer.clone());
        peer
    }

    /// Drop the current peer. Idempotent.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    pub async fn current_peer(&self) -> Option<Arc<PeerIdentity>> {
        self.current.read().await.clone()
    }
}
