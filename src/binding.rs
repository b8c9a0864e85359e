//! Maps a logical target to a live session and recreates the session
//! deterministically when the target changes.
//!
//! Rebinding is teardown-then-connect as one step: the old transport is
//! force-closed before the new one is constructed, so no two transports
//! for the same logical session ever coexist. A generation counter tags
//! each attempt for tracing; a superseded session cannot touch newer
//! state because its channels die with it.

use std::sync::Arc;

use tracing::debug;

use crate::logs::LogTailSession;
use crate::streaming::{LogConnector, TerminalConnector};
use crate::structs::{LogOptions, PodCandidate, SessionTarget};
use crate::terminal::TerminalSession;

pub struct TerminalBinding {
    connector: Arc<dyn TerminalConnector>,
    session: Option<TerminalSession>,
    target: Option<SessionTarget>,
    generation: u64,
}

impl TerminalBinding {
    pub fn new(connector: Arc<dyn TerminalConnector>) -> Self {
        Self {
            connector,
            session: None,
            target: None,
            generation: 0,
        }
    }

    /// Bind to `target`, recreating the session when anything about the
    /// target changed. The remote pty is bound to its target at spawn
    /// time, so even "compatible" changes reconnect.
    pub fn rebind(&mut self, target: SessionTarget) -> &mut TerminalSession {
        let reuse = self.target.as_ref() == Some(&target) && self.session.is_some();
        if !reuse {
            if let Some(mut old) = self.session.take() {
                old.close();
            }
            self.generation += 1;
            debug!(generation = self.generation, ?target, "terminal rebind");

            self.session = Some(TerminalSession::connect(self.connector.as_ref(), target.clone()));
            self.target = Some(target);
        }
        self.session.as_mut().expect("session present after rebind")
    }

    pub fn session(&mut self) -> Option<&mut TerminalSession> {
        self.session.as_mut()
    }

    /// Dispose the current session, if any. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut old) = self.session.take() {
            old.close();
        }
        self.target = None;
    }
}

pub struct LogBinding {
    connector: Arc<dyn LogConnector>,
    session: Option<LogTailSession>,
    target: Option<SessionTarget>,
    options: Option<LogOptions>,
    generation: u64,
}

impl LogBinding {
    pub fn new(connector: Arc<dyn LogConnector>) -> Self {
        Self {
            connector,
            session: None,
            target: None,
            options: None,
            generation: 0,
        }
    }

    /// Bind to `target` with `options`. Tail semantics exist only at
    /// stream-open time, so any option change recreates the session too.
    pub fn rebind(&mut self, target: SessionTarget, options: LogOptions) -> &mut LogTailSession {
        let reuse = self.target.as_ref() == Some(&target)
            && self.options.as_ref() == Some(&options)
            && self.session.is_some();
        if !reuse {
            if let Some(mut old) = self.session.take() {
                old.close();
            }
            self.generation += 1;
            debug!(generation = self.generation, ?target, "log rebind");

            self.session = Some(LogTailSession::open(
                self.connector.as_ref(),
                target.clone(),
                options.clone(),
            ));
            self.target = Some(target);
            self.options = Some(options);
        }
        self.session.as_mut().expect("session present after rebind")
    }

    pub fn session(&mut self) -> Option<&mut LogTailSession> {
        self.session.as_mut()
    }

    /// Dispose the current session, if any. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut old) = self.session.take() {
            old.close();
        }
        self.target = None;
        self.options = None;
    }
}

/// Resolve which pod a session should attach to. An explicit selection
/// wins while it still exists; otherwise the most recently created
/// candidate is chosen.
pub fn select_default_pod<'a>(
    candidates: &'a [PodCandidate],
    selected: Option<&str>,
) -> Option<&'a PodCandidate> {
    if let Some(name) = selected {
        if let Some(found) = candidates.iter().find(|c| c.name == name) {
            return Some(found);
        }
    }
    candidates.iter().max_by_key(|c| c.created_at)
}
