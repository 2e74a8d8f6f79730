use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SessionError;

/// Port both sides use unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9990;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display name attached to locally produced messages.
    pub local_name: String,
    /// Well-known port to dial and listen on.
    pub port: u16,
    /// Dial attempts before giving up.
    pub max_tries: u32,
    /// Pause between failed dial attempts.
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_name: "you".to_string(),
            port: DEFAULT_PORT,
            max_tries: 10,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Which side of the session opened the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Initiator,
    Responder,
}

/// A live transport to the peer. Split into halves when the exchangers
/// start; fully closed once both halves are gone.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    role: ConnectionRole,
}

impl Connection {
    /// Dial `addr`, retrying up to `config.max_tries` times with
    /// `config.retry_delay` between attempts. Cancelling `cancel` during the
    /// pause aborts the remaining retries with [`SessionError::Interrupted`];
    /// no partial connection is left behind either way.
    pub async fn dial(
        addr: SocketAddr,
        config: &SessionConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        for attempt in 1..=config.max_tries {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    info!(peer = %addr, attempt, "connected");
                    return Ok(Self {
                        stream,
                        role: ConnectionRole::Initiator,
                    });
                }
                Err(error) => {
                    warn!(
                        peer = %addr,
                        attempt,
                        remaining = config.max_tries - attempt,
                        %error,
                        "connection attempt failed"
                    );
                }
            }

            if attempt < config.max_tries {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SessionError::Interrupted),
                    _ = time::sleep(config.retry_delay) => {}
                }
            }
        }

        Err(SessionError::ConnectionFailed {
            tries: config.max_tries,
        })
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    pub(crate) fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

/// Accepts exactly one inbound connection, then is gone. A fresh listener is
/// needed for every passive session.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind `port` on all interfaces. Port 0 picks a free port; see
    /// [`Listener::local_addr`].
    pub async fn bind(port: u16) -> Result<Self, SessionError> {
        let inner = TcpListener::bind(("0.0.0.0", port)).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Block until one peer dials in. Consumes the listener, so nothing else
    /// is ever accepted on it; a later dial to the same port is refused.
    pub async fn accept_once(self) -> Result<(Connection, SocketAddr), SessionError> {
        let (stream, addr) = self.inner.accept().await?;
        info!(peer = %addr, "accepted inbound connection");
        Ok((
            Connection {
                stream,
                role: ConnectionRole::Responder,
            },
            addr,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn refused_addr() -> SocketAddr {
        // Bind and immediately drop a listener to find a port nothing is
        // listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn dial_exhausts_all_tries() {
        let addr = refused_addr();
        let config = SessionConfig {
            max_tries: 3,
            retry_delay: Duration::from_millis(100),
            ..Default::default()
        };

        let start = Instant::now();
        let err = Connection::dial(addr, &config, &CancellationToken::new())
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, SessionError::ConnectionFailed { tries: 3 }));
        // three attempts, two pauses between them
        assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn dial_interrupted_during_retry_delay() {
        let addr = refused_addr();
        let config = SessionConfig {
            max_tries: 10,
            retry_delay: Duration::from_secs(30),
            ..Default::default()
        };

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = Connection::dial(addr, &config, &cancel).await.unwrap_err();

        assert!(matches!(err, SessionError::Interrupted));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn accept_once_consumes_the_listener() {
        let listener = Listener::bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

        let dialer = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (conn, peer_addr) = listener.accept_once().await.unwrap();
        assert_eq!(conn.role(), ConnectionRole::Responder);
        assert!(peer_addr.ip().is_loopback());
        let _stream = dialer.await.unwrap().unwrap();

        // The listener is gone; the port no longer accepts connections.
        let second = TcpStream::connect(addr).await;
        assert!(second.is_err());
    }
}
