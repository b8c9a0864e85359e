//! Log tail session: one-shot fetch or streaming follow of container logs.
//!
//! Lines are append-only and never reordered. A clear advances a start
//! offset instead of deleting lines, so it is O(1) and undoable by
//! scrolling; every derived view applies the offset.

use futures::FutureExt;
use tracing::debug;

use crate::error::SessionError;
use crate::filter;
use crate::stats::{Rates, ThroughputEstimator};
use crate::streaming::{LogConnector, LogEvent, LogStreamHandle};
use crate::structs::{LogOptions, LogState, SessionTarget};

pub struct LogTailSession {
    target: SessionTarget,
    options: LogOptions,
    state: LogState,
    lines: Vec<String>,
    start_offset: usize,
    stats: ThroughputEstimator,
    stream: Option<LogStreamHandle>,
    last_error: Option<String>,
}

impl LogTailSession {
    /// Open a session. Follow mode keeps a push stream; static mode runs a
    /// single fetch and keeps no transport afterwards. Must be called
    /// within a Tokio runtime.
    #[tracing::instrument(skip(connector))]
    pub fn open(connector: &dyn LogConnector, target: SessionTarget, options: LogOptions) -> Self {
        let (peer, handle) = LogStreamHandle::channel();
        let error_tx = peer.sender();

        let fut = if options.follow {
            connector.stream(target.clone(), options.clone(), peer)
        } else {
            let fetch = connector.fetch(target.clone(), options.clone());
            async move {
                let resp = fetch.await?;
                let _ = peer.events.send(LogEvent::Connected);
                for line in resp.logs {
                    let _ = peer.events.send(LogEvent::Line(line));
                }
                let _ = peer.events.send(LogEvent::Closed);
                Ok(())
            }
            .boxed()
        };
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                let _ = error_tx.send(LogEvent::Failed(e.to_string()));
            }
        });

        Self {
            target,
            options,
            state: LogState::Loading,
            lines: Vec::new(),
            start_offset: 0,
            stats: ThroughputEstimator::new(),
            stream: Some(handle),
            last_error: None,
        }
    }

    pub fn state(&self) -> LogState {
        self.state
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn options(&self) -> &LogOptions {
        &self.options
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply pending stream events. Returns the number of lines appended.
    pub fn pump(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let mut appended = 0;
        let mut drop_stream = false;

        while let Some(event) = stream.try_next() {
            match event {
                LogEvent::Connected => {
                    // A new stream always starts from empty; lines from a
                    // prior configuration must not linger.
                    self.lines.clear();
                    self.start_offset = 0;
                    self.stats.reset();
                    if self.options.follow {
                        self.state = LogState::Streaming;
                    }
                }
                LogEvent::Line(line) => {
                    self.stats.record_in(line.len());
                    self.lines.push(line);
                    appended += 1;
                }
                LogEvent::Error(message) => {
                    // Recoverable: render inline, keep streaming.
                    self.lines.push(format!("error: {message}"));
                    self.last_error = Some(message);
                    appended += 1;
                }
                LogEvent::Failed(message) => {
                    self.state = LogState::Errored;
                    self.last_error = Some(message);
                }
                LogEvent::Closed => {
                    if self.state != LogState::Errored {
                        self.state = if self.options.follow {
                            LogState::Closed
                        } else {
                            LogState::Loaded
                        };
                    }
                    if !self.options.follow {
                        drop_stream = true;
                    }
                }
            }
        }

        if drop_stream {
            self.stream = None;
        }
        appended
    }

    /// Total buffered lines, cleared ones included.
    pub fn buffered_len(&self) -> usize {
        self.lines.len()
    }

    /// Lines after the clear offset, unfiltered.
    pub fn visible(&self) -> &[String] {
        self.lines.get(self.start_offset..).unwrap_or(&[])
    }

    /// Hide everything received so far without deleting it.
    pub fn clear(&mut self) {
        self.start_offset = self.lines.len();
    }

    /// Case-insensitive substring search over the stripped text of visible
    /// lines, capped to the most recent [`filter::DISPLAY_CAP`] matches.
    pub fn search(&self, query: &str) -> Vec<&str> {
        filter::search_lines(&self.lines, self.start_offset, query)
    }

    pub fn sample_rates(&mut self) -> Rates {
        self.stats.sample()
    }

    /// Deliberate teardown. Idempotent; safe while a connect is still in
    /// flight.
    pub fn close(&mut self) {
        if let Some(stream) = &self.stream {
            stream.close();
        }
        if self.state != LogState::Errored && self.state != LogState::Loaded {
            self.state = LogState::Closed;
        }
        debug!(target = ?self.target, "log session closed");
    }
}

impl Drop for LogTailSession {
    fn drop(&mut self) {
        if let Some(stream) = &self.stream {
            stream.close();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::streaming::LogStreamPeer;
    use crate::structs::LogFetchResponse;
    use crate::terminal::tests::settle;

    pub(crate) struct MockStream {
        pub events: mpsc::UnboundedSender<LogEvent>,
        pub cancel: CancellationToken,
    }

    #[derive(Clone)]
    pub(crate) struct MockLogConnector {
        pub streams: Arc<Mutex<Vec<MockStream>>>,
        pub stream_opens: Arc<AtomicUsize>,
        pub fetch_lines: Arc<Mutex<Vec<String>>>,
    }

    impl Default for MockLogConnector {
        fn default() -> Self {
            Self {
                streams: Arc::new(Mutex::new(Vec::new())),
                stream_opens: Arc::new(AtomicUsize::new(0)),
                fetch_lines: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl LogConnector for MockLogConnector {
        fn stream(
            &self,
            _target: SessionTarget,
            _options: LogOptions,
            peer: LogStreamPeer,
        ) -> BoxFuture<'static, Result<(), SessionError>> {
            self.stream_opens.fetch_add(1, Ordering::SeqCst);
            self.streams.lock().unwrap().push(MockStream {
                events: peer.events.clone(),
                cancel: peer.cancel.clone(),
            });
            futures::future::ready(Ok(())).boxed()
        }

        fn fetch(
            &self,
            target: SessionTarget,
            options: LogOptions,
        ) -> BoxFuture<'static, Result<LogFetchResponse, SessionError>> {
            let mut logs = self.fetch_lines.lock().unwrap().clone();
            if let Some(tail) = options.tail_lines {
                let tail = tail as usize;
                if logs.len() > tail {
                    logs = logs[logs.len() - tail..].to_vec();
                }
            }
            futures::future::ready(Ok(LogFetchResponse {
                logs,
                container: options.container,
                pod: target.name,
                namespace: target.namespace,
            }))
            .boxed()
        }
    }

    fn target() -> SessionTarget {
        SessionTarget::pod("default", "web-1", None)
    }

    fn follow_options() -> LogOptions {
        LogOptions {
            follow: true,
            ..LogOptions::default()
        }
    }

    #[tokio::test]
    async fn test_static_fetch_loads_and_drops_transport() {
        let mock = MockLogConnector::default();
        *mock.fetch_lines.lock().unwrap() =
            (0..150).map(|i| format!("line-{i}")).collect();

        let options = LogOptions {
            follow: false,
            tail_lines: Some(100),
            ..LogOptions::default()
        };
        let mut session = LogTailSession::open(&mock, target(), options);
        assert_eq!(session.state(), LogState::Loading);
        settle().await;

        session.pump();
        assert_eq!(session.state(), LogState::Loaded);
        assert!(session.buffered_len() <= 100);
        assert!(session.stream.is_none());
    }

    #[tokio::test]
    async fn test_streaming_appends_in_order_then_closes() {
        let mock = MockLogConnector::default();
        let mut session = LogTailSession::open(&mock, target(), follow_options());
        settle().await;

        {
            let streams = mock.streams.lock().unwrap();
            let s = &streams[0];
            s.events.send(LogEvent::Connected).unwrap();
            for line in ["line1", "line2", "line3"] {
                s.events.send(LogEvent::Line(line.to_string())).unwrap();
            }
            s.events.send(LogEvent::Closed).unwrap();
        }

        assert_eq!(session.pump(), 3);
        assert_eq!(session.visible(), ["line1", "line2", "line3"]);
        assert_eq!(session.state(), LogState::Closed);
    }

    #[tokio::test]
    async fn test_connected_clears_stale_buffer() {
        let mock = MockLogConnector::default();
        let mut session = LogTailSession::open(&mock, target(), follow_options());
        settle().await;

        let streams = mock.streams.lock().unwrap();
        streams[0].events.send(LogEvent::Connected).unwrap();
        streams[0]
            .events
            .send(LogEvent::Line("old".into()))
            .unwrap();
        // Backend re-established the stream from scratch.
        streams[0].events.send(LogEvent::Connected).unwrap();
        streams[0]
            .events
            .send(LogEvent::Line("new".into()))
            .unwrap();
        drop(streams);

        session.pump();
        assert_eq!(session.visible(), ["new"]);
    }

    #[tokio::test]
    async fn test_structured_error_keeps_stream() {
        let mock = MockLogConnector::default();
        let mut session = LogTailSession::open(&mock, target(), follow_options());
        settle().await;

        let streams = mock.streams.lock().unwrap();
        streams[0].events.send(LogEvent::Connected).unwrap();
        streams[0]
            .events
            .send(LogEvent::Error("container restarting".into()))
            .unwrap();
        streams[0]
            .events
            .send(LogEvent::Line("back".into()))
            .unwrap();
        drop(streams);

        session.pump();
        assert_eq!(session.state(), LogState::Streaming);
        assert_eq!(session.visible(), ["error: container restarting", "back"]);
        assert_eq!(session.last_error(), Some("container restarting"));
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_buffer() {
        let mock = MockLogConnector::default();
        let mut session = LogTailSession::open(&mock, target(), follow_options());
        settle().await;

        let streams = mock.streams.lock().unwrap();
        streams[0].events.send(LogEvent::Connected).unwrap();
        streams[0]
            .events
            .send(LogEvent::Line("kept".into()))
            .unwrap();
        streams[0]
            .events
            .send(LogEvent::Failed("socket reset".into()))
            .unwrap();
        drop(streams);

        session.pump();
        assert_eq!(session.state(), LogState::Errored);
        assert_eq!(session.visible(), ["kept"]);
    }

    #[tokio::test]
    async fn test_clear_is_non_destructive() {
        let mock = MockLogConnector::default();
        let mut session = LogTailSession::open(&mock, target(), follow_options());
        settle().await;

        {
            let streams = mock.streams.lock().unwrap();
            streams[0].events.send(LogEvent::Connected).unwrap();
            for i in 0..5 {
                streams[0]
                    .events
                    .send(LogEvent::Line(format!("line-{i}")))
                    .unwrap();
            }
        }
        session.pump();

        session.clear();
        assert_eq!(session.buffered_len(), 5);
        assert!(session.visible().is_empty());
        assert!(session.search("").is_empty());

        mock.streams.lock().unwrap()[0]
            .events
            .send(LogEvent::Line("after".into()))
            .unwrap();
        session.pump();
        assert_eq!(session.search(""), vec!["after"]);
        assert_eq!(session.buffered_len(), 6);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = MockLogConnector::default();
        let mut session = LogTailSession::open(&mock, target(), follow_options());
        settle().await;

        session.close();
        session.close();
        assert_eq!(session.state(), LogState::Closed);
        assert!(mock.streams.lock().unwrap()[0].cancel.is_cancelled());
    }
}
