//! Client channel transport
//!
//! A [`Connector`] opens one bidirectional channel to the server. The session
//! only ever sees [`Frame`]s; the tungstenite connector pumps them to and from
//! a real socket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message},
};
use tracing::{debug, warn};
use url::Url;

/// Close code reported when the peer closed without a status
pub const NO_STATUS_RECEIVED: u16 = 1005;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for ConnectionError {
    fn from(err: url::ParseError) -> Self {
        ConnectionError::InvalidUrl(err.to_string())
    }
}

/// One open channel. Dropping `outbound` closes the write side; `inbound`
/// ends when the socket is gone.
pub struct Channel {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<Result<Frame, ConnectionError>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Channel, ConnectionError>;
}

/// Connector backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<Channel, ConnectionError> {
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let (message, closing) = match frame {
                    Frame::Text(text) => (Message::Text(text), false),
                    Frame::Close { code, reason } => (
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        })),
                        true,
                    ),
                };

                if let Err(e) = sink.send(message).await {
                    debug!(error = %e, "Socket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let frame = match message {
                    Ok(Message::Text(text)) => Ok(Frame::Text(text)),
                    Ok(Message::Close(close)) => Ok(match close {
                        Some(close) => Frame::Close {
                            code: close.code.into(),
                            reason: close.reason.into_owned(),
                        },
                        None => Frame::Close {
                            code: NO_STATUS_RECEIVED,
                            reason: String::new(),
                        },
                    }),
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Socket read failed");
                        Err(ConnectionError::Protocol(e.to_string()))
                    }
                };

                let terminal = !matches!(frame, Ok(Frame::Text(_)));
                if inbound_tx.send(frame).is_err() || terminal {
                    break;
                }
            }
        });

        Ok(Channel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
