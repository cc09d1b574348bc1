//! Socket transport for relay connections.
//!
//! The relay manager only sees a [`RelayChannel`]: an unbounded sender for
//! outgoing text frames and a receiver for incoming ones. Dropping the
//! sender closes the socket; the receiver yields `None` once the peer is
//! gone.

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::RelayUrl;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("Connection to {0} timed out")]
    Timeout(String),
}

pub struct RelayChannel {
    pub outgoing: mpsc::UnboundedSender<String>,
    pub incoming: mpsc::UnboundedReceiver<String>,
}

/// Opens socket connections to relays.
pub trait Connector: Send + Sync + 'static {
    fn connect<'a>(
        &'a self,
        url: &'a RelayUrl,
    ) -> BoxFuture<'a, Result<RelayChannel, TransportError>>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// Each connection gets a writer task and a reader task bridging the socket
/// to the channel pair.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect<'a>(
        &'a self,
        url: &'a RelayUrl,
    ) -> BoxFuture<'a, Result<RelayChannel, TransportError>> {
        Box::pin(async move {
            let (ws, _response) =
                connect_async(url.as_str())
                    .await
                    .map_err(|e| TransportError::ConnectFailed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;

            let (mut sink, mut stream) = ws.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

            let writer_url = url.clone();
            tokio::spawn(async move {
                while let Some(text) = out_rx.recv().await {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::debug!(url = %writer_url, error = %e, "websocket write failed");
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            let reader_url = url.clone();
            tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            if in_tx.send(text).is_err() {
                                break;
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            tracing::debug!(url = %reader_url, ?frame, "relay closed connection");
                            break;
                        }
                        // Pings are answered by tungstenite itself.
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!(url = %reader_url, error = %e, "websocket read failed");
                            break;
                        }
                    }
                }
            });

            Ok(RelayChannel {
                outgoing: out_tx,
                incoming: in_rx,
            })
        })
    }
}
