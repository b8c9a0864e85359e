//! Interactive terminal session against a pod container or node shell.
//!
//! A session owns one transport and applies its events in receipt order.
//! Keystrokes go out immediately, one `stdin` message per chunk; a
//! keep-alive ping runs on a timer while the transport is open.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SessionError;
use crate::stats::{Rates, ThroughputEstimator};
use crate::streaming::{TerminalConnector, TerminalMessage, TransportEvent, TransportHandle};
use crate::structs::{ConnectionState, SessionTarget};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const INITIAL_RESIZE_DELAY: Duration = Duration::from_millis(100);
/// Geometry used for the initial resize when the surface has not been
/// measured yet.
const DEFAULT_GEOMETRY: (u16, u16) = (80, 24);

/// Rendered output of one [`TerminalSession::pump`] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Remote stdout/stderr, verbatim and in order.
    Output(String),
    /// Inline status line (info, connected, error, close notices).
    Status(String),
    StateChanged(ConnectionState),
}

pub struct TerminalSession {
    target: SessionTarget,
    state: ConnectionState,
    transport: Option<TransportHandle>,
    stats: ThroughputEstimator,
    size: (u16, u16),
    close_notice_sent: bool,
}

impl TerminalSession {
    /// Start connecting to `target`. Must be called within a Tokio runtime;
    /// the connector runs as a spawned task and reports back through the
    /// transport event channel.
    #[tracing::instrument(skip(connector))]
    pub fn connect(connector: &dyn TerminalConnector, target: SessionTarget) -> Self {
        let (peer, handle) = TransportHandle::channel();
        let error_tx = peer.events.clone();
        let fut = connector.connect(target.clone(), peer);
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                let _ = error_tx.send(TransportEvent::Error(e.to_string()));
            }
        });

        Self {
            target,
            state: ConnectionState::Connecting,
            transport: Some(handle),
            stats: ThroughputEstimator::new(),
            size: DEFAULT_GEOMETRY,
            close_notice_sent: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    /// Apply pending transport events and return what the view should
    /// render. Messages are never reordered or deduplicated.
    pub fn pump(&mut self) -> Vec<TerminalEvent> {
        let mut out = Vec::new();
        let Some(transport) = self.transport.as_mut() else {
            return out;
        };

        while let Some(event) = transport.try_next() {
            match event {
                TransportEvent::Open => {
                    self.state = ConnectionState::Open;
                    self.stats.reset();
                    spawn_keepalive(transport.sender(), transport.cancel_token());
                    spawn_initial_resize(transport.sender(), transport.cancel_token(), self.size);
                    out.push(TerminalEvent::StateChanged(self.state));
                }
                TransportEvent::Message(msg) => match msg {
                    TerminalMessage::Stdout { data } | TerminalMessage::Stderr { data } => {
                        self.stats.record_in(data.len());
                        out.push(TerminalEvent::Output(data));
                    }
                    TerminalMessage::Info { message } => {
                        out.push(TerminalEvent::Status(message));
                    }
                    TerminalMessage::Connected => {
                        out.push(TerminalEvent::Status("connected".to_string()));
                    }
                    TerminalMessage::Error { message } => {
                        // Errored is terminal-state only; teardown stays
                        // explicit so the error remains on screen.
                        self.state = ConnectionState::Errored;
                        out.push(TerminalEvent::Status(format!("error: {message}")));
                        out.push(TerminalEvent::StateChanged(self.state));
                    }
                    TerminalMessage::Pong => {}
                    TerminalMessage::Stdin { .. }
                    | TerminalMessage::Resize { .. }
                    | TerminalMessage::Ping
                    | TerminalMessage::Unknown => {}
                },
                TransportEvent::Error(message) => {
                    self.state = ConnectionState::Errored;
                    out.push(TerminalEvent::Status(format!("error: {message}")));
                    out.push(TerminalEvent::StateChanged(self.state));
                }
                TransportEvent::Closed { abnormal } => {
                    transport.close();
                    if self.state != ConnectionState::Errored
                        && self.state != ConnectionState::Closed
                    {
                        self.state = ConnectionState::Closed;
                        out.push(TerminalEvent::StateChanged(self.state));
                    }
                    if !self.close_notice_sent {
                        self.close_notice_sent = true;
                        let notice = if abnormal {
                            "connection closed unexpectedly"
                        } else {
                            "connection closed"
                        };
                        out.push(TerminalEvent::Status(notice.to_string()));
                    }
                }
            }
        }
        out
    }

    /// Forward one chunk of user input immediately. No batching; latency
    /// matters more than framing efficiency.
    pub fn send_input(&mut self, data: &str) -> Result<(), SessionError> {
        let transport = self.transport.as_ref().ok_or(SessionError::NotConnected)?;
        transport.send(TerminalMessage::Stdin {
            data: data.to_string(),
        })?;
        self.stats.record_out(data.len());
        Ok(())
    }

    /// Record the measured surface size and notify the remote pty.
    /// Debouncing is the resize observer's job; every call forwards.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.size = (cols, rows);
        if self.state == ConnectionState::Open {
            if let Some(transport) = &self.transport {
                transport.send(TerminalMessage::Resize { cols, rows })?;
            }
        }
        Ok(())
    }

    /// Sample transfer rates for the current window. Views call this on a
    /// fixed tick ([`crate::stats::SAMPLE_INTERVAL`]).
    pub fn sample_rates(&mut self) -> Rates {
        self.stats.sample()
    }

    /// Deliberate teardown. Idempotent; a close event arriving afterwards
    /// appends no second notice.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Closing;
        }
        if let Some(transport) = &self.transport {
            transport.close();
        }
        debug!(target = ?self.target, "terminal session closed");
        self.state = ConnectionState::Closed;
        self.close_notice_sent = true;
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Some(transport) = &self.transport {
            transport.close();
        }
    }
}

fn spawn_keepalive(sender: mpsc::UnboundedSender<TerminalMessage>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut tick = time::interval(KEEPALIVE_INTERVAL);
        // An interval fires immediately; the first ping waits a full period.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if sender.send(TerminalMessage::Ping).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Establish the remote pty geometry shortly after open, before output
/// arrives in volume.
fn spawn_initial_resize(
    sender: mpsc::UnboundedSender<TerminalMessage>,
    cancel: CancellationToken,
    (cols, rows): (u16, u16),
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = time::sleep(INITIAL_RESIZE_DELAY) => {
                let _ = sender.send(TerminalMessage::Resize { cols, rows });
            }
        }
    });
}
