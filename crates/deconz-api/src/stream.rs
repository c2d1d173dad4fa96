//! Gateway event stream connection.
//!
//! A single WebSocket connection to `ws://{host}:{ws_port}`. This module only
//! owns the socket: connect with a bounded handshake, read frames, send
//! keepalive pings, close. Reconnection policy and the keepalive watchdog
//! belong to the caller (see `deconz_core::connection`), which drives one
//! `StreamConnection` per connection generation.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── StreamFrame ──────────────────────────────────────────────────────

/// What a single read from the stream produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A text message; usually a JSON event.
    Message(String),
    /// The peer pinged us. The pong is sent by tungstenite.
    Ping,
    /// The peer answered one of our pings.
    Pong,
    /// The peer sent a close frame.
    Closed { code: u16, reason: String },
    /// The socket ended without a close frame.
    Ended,
}

// ── StreamConnection ─────────────────────────────────────────────────

/// An open event stream.
pub struct StreamConnection {
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
}

/// `ws://host:port`
pub fn stream_url(host: &str, port: u16) -> Result<Url, Error> {
    Ok(Url::parse(&format!("ws://{host}:{port}"))?)
}

impl StreamConnection {
    /// Open the stream, failing with [`Error::Timeout`] if the handshake
    /// does not complete within `timeout`.
    pub async fn connect(url: &Url, timeout: Duration) -> Result<Self, Error> {
        tracing::info!(url = %url, "connecting to event stream");

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (socket, _response) = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| Error::StreamConnect(e.to_string()))?;

        let (write, read) = socket.split();
        Ok(Self { write, read })
    }

    /// Wait for the next meaningful frame.
    ///
    /// Binary and raw frames are skipped. Read errors are returned as
    /// [`Error::StreamConnect`]; the connection is unusable afterwards.
    pub async fn next_frame(&mut self) -> Result<StreamFrame, Error> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(StreamFrame::Message(text.to_string())),
                Some(Ok(Message::Ping(_))) => return Ok(StreamFrame::Ping),
                Some(Ok(Message::Pong(_))) => return Ok(StreamFrame::Pong),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or((1005, String::new()), |cf| {
                        (u16::from(cf.code), cf.reason.to_string())
                    });
                    return Ok(StreamFrame::Closed { code, reason });
                }
                Some(Ok(Message::Binary(_) | Message::Frame(_))) => {}
                Some(Err(e)) => return Err(Error::StreamConnect(e.to_string())),
                None => return Ok(StreamFrame::Ended),
            }
        }
    }

    /// Send a keepalive ping.
    pub async fn ping(&mut self) -> Result<(), Error> {
        self.write
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| Error::StreamConnect(e.to_string()))
    }

    /// Send a close frame and flush. Errors are ignored: the socket is being
    /// discarded either way.
    pub async fn close(mut self) {
        match self.write.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {}
            Err(e) => tracing::debug!(error = %e, "error while closing event stream"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn builds_stream_url() {
        let url = stream_url("192.168.1.20", 443).unwrap();
        assert_eq!(url.as_str(), "ws://192.168.1.20:443/");
    }

    #[tokio::test]
    async fn reads_text_and_close_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::text(r#"{"r":"lights","id":"1"}"#.to_owned()))
                .await
                .unwrap();
            ws.send(Message::Ping(Vec::new().into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let url = stream_url("127.0.0.1", port).unwrap();
        let mut conn = StreamConnection::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            conn.next_frame().await.unwrap(),
            StreamFrame::Message(r#"{"r":"lights","id":"1"}"#.to_owned())
        );
        assert_eq!(conn.next_frame().await.unwrap(), StreamFrame::Ping);
        assert!(matches!(
            conn.next_frame().await.unwrap(),
            StreamFrame::Closed { .. }
        ));
    }

    #[tokio::test]
    async fn connect_refused_is_stream_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = stream_url("127.0.0.1", port).unwrap();
        let err = StreamConnection::connect(&url, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::StreamConnect(_)));
    }
}
