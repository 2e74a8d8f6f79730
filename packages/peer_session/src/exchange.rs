use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::message::Message;
use crate::peer::{PeerIdentity, SessionContext};

/// Channel ends a session exchanges with its surroundings: locally produced
/// lines come in on `input` (closing the sender is the local end-of-stream),
/// messages from the peer go out on `display`.
pub struct SessionIo {
    pub input: mpsc::Receiver<String>,
    pub display: mpsc::Sender<Message>,
}

/// Background task draining local input into the socket. One line in, one
/// newline-terminated line out, flushed immediately.
pub(crate) struct OutboundExchanger {
    pub(crate) input: mpsc::Receiver<String>,
    pub(crate) writer: OwnedWriteHalf,
    pub(crate) local: Arc<PeerIdentity>,
    pub(crate) cancel: CancellationToken,
}

impl OutboundExchanger {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => break,
                line = self.input.recv() => line,
            };

            let Some(text) = line else {
                debug!("local input closed");
                break;
            };

            let message = Message::new(text, self.local.clone());
            if let Err(error) = self.write_line(&message).await {
                // a failed write is an implicit disconnect
                error!(%error, "write to peer failed");
                break;
            }
        }

        // Half-close so the peer's reader sees end-of-stream, then bring the
        // rest of the session down with us.
        let _ = self.writer.shutdown().await;
        self.cancel.cancel();
        debug!("outbound exchanger finished");
    }

    async fn write_line(&mut self, message: &Message) -> std::io::Result<()> {
        self.writer.write_all(message.text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

/// Background task draining the socket into the display sink, tagging each
/// line with the session's current peer.
pub(crate) struct InboundExchanger {
    pub(crate) reader: OwnedReadHalf,
    pub(crate) context: SessionContext,
    pub(crate) display: mpsc::Sender<Message>,
    pub(crate) cancel: CancellationToken,
}

impl InboundExchanger {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut lines = BufReader::new(self.reader).lines();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(text)) => {
                    let Some(origin) = self.context.current_peer().await else {
                        // context already cleared: the session is coming down
                        break;
                    };
                    if self.display.send(Message::new(text, origin)).await.is_err() {
                        debug!("display sink dropped");
                        break;
                    }
                }
                Ok(None) => {
                    info!("peer closed the connection");
                    break;
                }
                Err(error) => {
                    error!(%error, "read from peer failed");
                    break;
                }
            }
        }

        // The read half drops with this task; cancelling stops the outbound
        // exchanger, which closes the write half in turn.
        self.cancel.cancel();
        debug!("inbound exchanger finished");
    }
}
