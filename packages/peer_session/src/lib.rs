//! Peer Session - point-to-point chat sessions over TCP
//!
//! One session connects exactly two peers over a single TCP stream and keeps
//! a full-duplex line-based conversation running until either side ends it.
//! The library covers establishment (active dial-with-retry or passive
//! single-accept listen) and the two background exchanger tasks that move
//! lines between the socket and the caller's channels. Prompting, printing
//! and the process entry point stay with the caller.
//!
//! # Example
//!
//! ```no_run
//! use peer_session::{Listener, SessionConfig, SessionIo, SessionManager};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), peer_session::SessionError> {
//!     let config = SessionConfig::default();
//!     let listener = Listener::bind(config.port).await?;
//!
//!     let (line_tx, line_rx) = mpsc::channel(16);
//!     let (display_tx, mut display_rx) = mpsc::channel(16);
//!     let io = SessionIo {
//!         input: line_rx,
//!         display: display_tx,
//!     };
//!
//!     let mut session = SessionManager::new(config);
//!     let peer = session
//!         .listen(listener, io, |_addr| async { Ok("alice".to_string()) })
//!         .await?;
//!     println!("connected to {}", peer.name);
//!
//!     line_tx.send("hello".to_string()).await.ok();
//!     if let Some(message) = display_rx.recv().await {
//!         println!("{message}");
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

mod connect;
mod error;
mod exchange;
mod message;
mod peer;
mod session;


pub use connect::{Connection, ConnectionRole, DEFAULT_PORT, Listener, SessionConfig};
pub use error::SessionError;
pub use exchange::SessionIo;
pub use message::Message;
pub use peer::{PeerIdentity, SessionContext};
pub use session::{SessionManager, SessionState};
