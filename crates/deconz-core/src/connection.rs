// ── Event stream connection manager ──
//
// One task per session owns the stream socket, the outbound ping interval
// and the keepalive watchdog. Because all three live in the same task, a
// failure is detected and handled exactly once: the task marks every device
// unavailable, optionally re-discovers the gateway, then reconnects either
// immediately (new host) or after the fixed delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use deconz_api::{DiscoveryClient, StreamConnection, StreamFrame, stream_url};

use crate::error::CoreError;
use crate::session::GatewaySession;

/// Reason given to devices while the stream is down.
pub const STREAM_DOWN_REASON: &str = "Websocket is down";

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        })
    }
}

// ── Task handle ──────────────────────────────────────────────────

/// A cancellable background task.
pub(crate) struct TaskHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn spawn<F>(f: impl FnOnce(CancellationToken) -> F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(f(cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel and wait until the task has fully stopped.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!(error = %e, "background task panicked");
            }
        }
    }
}

// ── Auto-repair ──────────────────────────────────────────────────

/// Result of re-discovering the gateway address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    HostChanged { previous: Option<String>, host: String },
    Unchanged,
}

/// Ask the discovery endpoint where the gateway is now. On a new address,
/// persist it, then swap the session config. Does not touch the connection.
pub(crate) async fn repair_host(session: &GatewaySession) -> Result<RepairOutcome, CoreError> {
    let options = session.options();
    let discovery = DiscoveryClient::new(options.discovery_url.clone(), &options.transport())?;
    let candidate = discovery.discover().await?;

    let current = session.config();
    if current.host.as_deref() == Some(candidate.internalipaddress.as_str()) {
        debug!(host = %candidate.internalipaddress, "gateway address unchanged");
        return Ok(RepairOutcome::Unchanged);
    }

    session
        .settings()
        .persist_host(&candidate.internalipaddress)?;
    session.swap_config(Arc::new(current.with_host(candidate.internalipaddress.clone())));

    info!(
        previous = current.host.as_deref().unwrap_or("<none>"),
        host = %candidate.internalipaddress,
        "gateway address repaired"
    );
    Ok(RepairOutcome::HostChanged {
        previous: current.host.clone(),
        host: candidate.internalipaddress,
    })
}

/// Background flavor: errors are logged, never returned.
async fn attempt_auto_repair(session: &GatewaySession) -> bool {
    match repair_host(session).await {
        Ok(RepairOutcome::HostChanged { .. }) => true,
        Ok(RepairOutcome::Unchanged) => false,
        Err(e) => {
            warn!(error = %e, "auto-repair failed");
            false
        }
    }
}

// ── Connection loop ──────────────────────────────────────────────

/// How one connection generation ended.
enum Ended {
    Cancelled,
    Lost { was_connected: bool, reason: String },
}

/// Main loop: connect, read until the stream drops, recover, repeat.
pub(crate) async fn run(session: GatewaySession, cancel: CancellationToken) {
    loop {
        let config = session.config();
        let Some(endpoint) = config.endpoint() else {
            warn!(
                missing = ?config.missing_fields(),
                "gateway settings incomplete, fill all the fields to connect"
            );
            session.set_state(ConnectionState::Disconnected);
            return;
        };

        let url = match stream_url(endpoint.host, endpoint.ws_port) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, host = endpoint.host, "invalid event stream address");
                session.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        let (was_connected, reason) = match connect_and_read(&session, &url, &cancel).await {
            Ended::Cancelled => break,
            Ended::Lost {
                was_connected,
                reason,
            } => (was_connected, reason),
        };

        session.set_state(ConnectionState::Disconnected);
        error!(%reason, was_connected, "event stream closed");
        session.registry().set_all_unavailable(STREAM_DOWN_REASON);

        let options = session.options();
        if was_connected && options.auto_repair && attempt_auto_repair(&session).await {
            info!("reconnecting to repaired gateway address");
            continue;
        }

        info!(
            delay_secs = options.reconnect_delay.as_secs_f64(),
            "reconnecting after delay"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(options.reconnect_delay) => {}
        }
    }

    session.set_state(ConnectionState::Disconnected);
    debug!("connection task exiting");
}

/// One connection generation. The ping interval and watchdog are created
/// here and dropped on return, so nothing outlives the socket.
async fn connect_and_read(
    session: &GatewaySession,
    url: &url::Url,
    cancel: &CancellationToken,
) -> Ended {
    let options = session.options();
    session.set_state(ConnectionState::Connecting);

    let connect = StreamConnection::connect(url, options.request_timeout);
    let mut conn = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ended::Cancelled,
        result = connect => match result {
            Ok(conn) => conn,
            Err(e) => {
                return Ended::Lost {
                    was_connected: false,
                    reason: e.to_string(),
                };
            }
        },
    };

    session.set_state(ConnectionState::Connected);
    info!(url = %url, "event stream is up");

    let ping_every = options.ping_interval;
    let keepalive = options.keepalive_timeout();
    let mut ping = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let watchdog = tokio::time::sleep(keepalive);
    tokio::pin!(watchdog);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                session.set_state(ConnectionState::Closing);
                within(options.request_timeout, "close", conn.close()).await;
                return Ended::Cancelled;
            }
            () = &mut watchdog => {
                error!(
                    timeout_secs = keepalive.as_secs_f64(),
                    "connection lost: no ping from gateway"
                );
                within(options.request_timeout, "close", conn.close()).await;
                return Ended::Lost {
                    was_connected: true,
                    reason: "keepalive timeout".into(),
                };
            }
            _ = ping.tick() => {
                match within(options.request_timeout, "ping", conn.ping()).await {
                    Some(Ok(())) => trace!("ping sent"),
                    Some(Err(e)) => {
                        return Ended::Lost {
                            was_connected: true,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        return Ended::Lost {
                            was_connected: true,
                            reason: "ping timed out".into(),
                        };
                    }
                }
            }
            frame = conn.next_frame() => match frame {
                Ok(StreamFrame::Message(text)) => {
                    session.handle_message(&text);
                }
                Ok(StreamFrame::Ping) => {
                    trace!("ping from gateway");
                    watchdog.as_mut().reset(Instant::now() + keepalive);
                }
                Ok(StreamFrame::Pong) => trace!("pong from gateway"),
                Ok(StreamFrame::Closed { code, reason }) => {
                    return Ended::Lost {
                        was_connected: true,
                        reason: format!("closed by gateway (code {code}) {reason}"),
                    };
                }
                Ok(StreamFrame::Ended) => {
                    return Ended::Lost {
                        was_connected: true,
                        reason: "stream ended".into(),
                    };
                }
                Err(e) => {
                    return Ended::Lost {
                        was_connected: true,
                        reason: e.to_string(),
                    };
                }
            },
        }
    }
}

/// Bound an outbound write. A peer that stopped reading must not stall the
/// loop, since the watchdog and cancellation are not polled meanwhile.
async fn within<F: Future>(limit: Duration, op: &'static str, write: F) -> Option<F::Output> {
    let out = tokio::time::timeout(limit, write).await.ok();
    if out.is_none() {
        warn!(op, timeout_secs = limit.as_secs_f64(), "event stream write timed out");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_write_gives_up_after_limit() {
        let started = Instant::now();
        let out = within(Duration::from_secs(2), "close", std::future::pending::<()>()).await;
        assert!(out.is_none());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_write_passes_through() {
        let out = within(Duration::from_secs(2), "ping", async { 7 }).await;
        assert_eq!(out, Some(7));
    }
}
