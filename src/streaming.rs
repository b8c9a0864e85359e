//! Transport plumbing shared by terminal and log sessions.
//!
//! A session owns exactly one live transport at a time. The transport side
//! runs as async tasks that push events into an unbounded channel; the
//! session drains it non-blockingly and applies events in receipt order.
//! Teardown is a cancellation token, safe to trigger any number of times.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::structs::{LogFetchResponse, LogOptions, SessionTarget};

/// JSON-framed message exchanged over a terminal transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TerminalMessage {
    Stdin { data: String },
    Stdout { data: String },
    Stderr { data: String },
    Resize { cols: u16, rows: u16 },
    Ping,
    Pong,
    Info { message: String },
    Connected,
    Error { message: String },
    /// Forward compatibility: unrecognized types are consumed silently.
    #[serde(other)]
    Unknown,
}

/// Inbound transport lifecycle notification for a terminal session.
#[derive(Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(TerminalMessage),
    /// Transport-level failure (connect error, socket fault).
    Error(String),
    Closed {
        abnormal: bool,
    },
}

/// Inbound event on a log stream.
#[derive(Debug, PartialEq, Eq)]
pub enum LogEvent {
    Connected,
    Line(String),
    /// Structured server error; the stream stays open.
    Error(String),
    /// Transport-level failure; the stream is gone.
    Failed(String),
    Closed,
}

/// Transport side of a terminal connection: pushes lifecycle events and
/// inbound messages, consumes outbound messages, observes cancellation.
pub struct TransportPeer {
    pub events: mpsc::UnboundedSender<TransportEvent>,
    pub outbound: mpsc::UnboundedReceiver<TerminalMessage>,
    pub cancel: CancellationToken,
}

/// Session side of a terminal connection.
pub struct TransportHandle {
    sender: mpsc::UnboundedSender<TerminalMessage>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
}

impl TransportHandle {
    /// Build a connected peer/handle pair.
    pub fn channel() -> (TransportPeer, TransportHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        (
            TransportPeer {
                events: event_tx,
                outbound: out_rx,
                cancel: cancel.clone(),
            },
            TransportHandle {
                sender: out_tx,
                events: event_rx,
                cancel,
            },
        )
    }

    pub fn send(&self, msg: TerminalMessage) -> Result<(), SessionError> {
        self.sender.send(msg).map_err(|_| SessionError::ChannelClosed)
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<TerminalMessage> {
        self.sender.clone()
    }

    /// Drain one event without blocking.
    pub fn try_next(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tear the transport down. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Transport side of a log stream.
pub struct LogStreamPeer {
    pub events: mpsc::UnboundedSender<LogEvent>,
    pub cancel: CancellationToken,
}

impl LogStreamPeer {
    pub fn sender(&self) -> mpsc::UnboundedSender<LogEvent> {
        self.events.clone()
    }
}

/// Session side of a log stream.
pub struct LogStreamHandle {
    events: mpsc::UnboundedReceiver<LogEvent>,
    cancel: CancellationToken,
}

impl LogStreamHandle {
    pub fn channel() -> (LogStreamPeer, LogStreamHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        (
            LogStreamPeer {
                events: event_tx,
                cancel: cancel.clone(),
            },
            LogStreamHandle {
                events: event_rx,
                cancel,
            },
        )
    }

    pub fn try_next(&mut self) -> Option<LogEvent> {
        self.events.try_recv().ok()
    }

    /// Tear the stream down. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Binds a target to a live bidirectional terminal transport.
///
/// Implementations connect, send [`TransportEvent::Open`] once the remote
/// side is attached, then shuttle messages until cancelled or the remote
/// end closes. The returned future resolves when the transport is done;
/// a connect failure is reported through the future's error.
pub trait TerminalConnector: Send + Sync + 'static {
    fn connect(
        &self,
        target: SessionTarget,
        peer: TransportPeer,
    ) -> BoxFuture<'static, Result<(), SessionError>>;
}

/// Binds a target to a one-way log push stream, or serves the one-shot
/// static fetch.
pub trait LogConnector: Send + Sync + 'static {
    fn stream(
        &self,
        target: SessionTarget,
        options: LogOptions,
        peer: LogStreamPeer,
    ) -> BoxFuture<'static, Result<(), SessionError>>;

    fn fetch(
        &self,
        target: SessionTarget,
        options: LogOptions,
    ) -> BoxFuture<'static, Result<LogFetchResponse, SessionError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_framing() {
        let msg = TerminalMessage::Stdin {
            data: "ls\n".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"stdin","data":"ls\n"}"#);

        let back: TerminalMessage =
            serde_json::from_str(r#"{"type":"resize","cols":120,"rows":40}"#).unwrap();
        assert_eq!(back, TerminalMessage::Resize { cols: 120, rows: 40 });
    }

    #[test]
    fn test_unknown_message_type_tolerated() {
        let back: TerminalMessage = serde_json::from_str(r#"{"type":"telemetry"}"#).unwrap();
        assert_eq!(back, TerminalMessage::Unknown);
    }

    #[test]
    fn test_handle_close_is_idempotent() {
        let (peer, handle) = TransportHandle::channel();
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(peer.cancel.is_cancelled());
    }

    #[test]
    fn test_events_drain_in_order() {
        let (peer, mut handle) = TransportHandle::channel();
        peer.events.send(TransportEvent::Open).unwrap();
        peer.events
            .send(TransportEvent::Message(TerminalMessage::Pong))
            .unwrap();
        assert_eq!(handle.try_next(), Some(TransportEvent::Open));
        assert_eq!(
            handle.try_next(),
            Some(TransportEvent::Message(TerminalMessage::Pong))
        );
        assert_eq!(handle.try_next(), None);
    }
}
