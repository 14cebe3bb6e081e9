//! Live session controller.
//!
//! Owns the one live session at a time. Each session runs its read loop on its
//! own task; every write to the shared [`LiveView`] happens under the view's
//! write lock after checking that the session is still live, and `start`
//! swaps in the new session under that same lock. Once a newer session has
//! started, nothing an older loop does can reach the view or the event stream,
//! whatever order the pending reads resolve in.

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::state::{Action, LiveView, SessionId, SessionReport, SessionState, Status, TraceRequest};
use crate::trace::error::{ReadError, SessionError};
use crate::trace::lines::LineReassembler;
use crate::trace::parser::{HopParser, ParsedEvent};
use crate::trace::transport::{ChunkSource, Opened, Transport};

/// Notifications for front-ends. Only the live session emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Started(SessionId),
    /// Hop table, output or state changed
    Updated(SessionId),
    /// Spinner tick, monotonic within a session
    Tick(SessionId, u64),
    /// Terminal status, sent exactly once per surfaced session
    Finished(SessionId, Status),
}

impl SessionEvent {
    pub fn session(&self) -> SessionId {
        match *self {
            Self::Started(id) | Self::Updated(id) | Self::Tick(id, _) | Self::Finished(id, _) => id,
        }
    }
}

/// Where parsed lines go, fixed at session start
#[derive(Debug, Clone, Copy)]
enum Pipeline {
    HopReport(HopParser),
    PlainText,
}

impl Pipeline {
    fn for_action(action: Action, parser: HopParser) -> Self {
        if action.is_hop_report() {
            Self::HopReport(parser)
        } else {
            Self::PlainText
        }
    }

    /// Apply complete lines to the view; true if anything changed
    fn apply(&self, view: &mut LiveView, lines: Vec<String>) -> bool {
        let mut changed = false;
        match self {
            Self::PlainText => {
                changed = !lines.is_empty();
                view.output.extend(lines);
            }
            Self::HopReport(parser) => {
                for line in lines {
                    let Some(event) = parser.parse(&line) else {
                        continue;
                    };
                    changed |= match (event, view.table.as_mut()) {
                        (ParsedEvent::PlainText(text), _) => {
                            view.output.push(text);
                            true
                        }
                        (ParsedEvent::HopData(data), Some(table)) => table.apply_hop_data(data),
                        (ParsedEvent::HopDirective { index, hidden: true }, Some(table)) => {
                            table.apply_directive(index)
                        }
                        (ParsedEvent::HopUnknown { index }, Some(table)) => table.apply_unknown(index),
                        _ => false,
                    };
                }
            }
        }
        changed
    }
}

struct Inner {
    next_id: u64,
    /// Session allowed to write the view
    live: Option<SessionId>,
    view: LiveView,
    /// Spinner of the live session
    ticker: Option<CancellationToken>,
}

struct Shared {
    inner: RwLock<Inner>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        // Receiver gone just means nobody is watching
        let _ = self.events.send(event);
    }

    fn is_live(&self, id: SessionId) -> bool {
        self.inner.read().live == Some(id)
    }

    /// State to report for a session that lost the view
    fn detached_state(&self, id: SessionId) -> SessionState {
        let inner = self.inner.read();
        match inner.view.session {
            Some(ref s) if s.id == id => s.state,
            _ => SessionState::Superseded,
        }
    }

    fn apply(&self, id: SessionId, pipeline: &Pipeline, lines: Vec<String>) -> bool {
        let mut inner = self.inner.write();
        if inner.live != Some(id) {
            return false;
        }
        if pipeline.apply(&mut inner.view, lines) {
            self.emit(SessionEvent::Updated(id));
        }
        true
    }

    fn begin_streaming(self: &Arc<Self>, id: SessionId, tick_interval: Duration) -> bool {
        let mut inner = self.inner.write();
        if inner.live != Some(id) {
            return false;
        }
        if let Some(session) = inner.view.session.as_mut() {
            session.state = SessionState::Streaming;
        }
        let token = CancellationToken::new();
        if let Some(old) = inner.ticker.replace(token.clone()) {
            old.cancel();
        }
        spawn_ticker(self.clone(), id, tick_interval, token);
        debug!(session = %id, "streaming");
        self.emit(SessionEvent::Updated(id));
        true
    }

    fn tick(&self, id: SessionId) -> bool {
        let mut inner = self.inner.write();
        if inner.live != Some(id) {
            return false;
        }
        inner.view.ticks += 1;
        self.emit(SessionEvent::Tick(id, inner.view.ticks));
        true
    }

    /// End of stream: classify by what the backend wrote
    fn complete(&self, id: SessionId) -> SessionState {
        let mut inner = self.inner.write();
        if inner.live != Some(id) {
            drop(inner);
            return self.detached_state(id);
        }
        let outcome = match SessionError::from_output(&inner.view.output) {
            Some(err) => Err(err),
            None => Ok(()),
        };
        self.finish_locked(&mut inner, id, outcome, Vec::new())
    }

    fn finish(&self, id: SessionId, err: SessionError, trailing: Vec<String>) -> SessionState {
        let mut inner = self.inner.write();
        if inner.live != Some(id) {
            drop(inner);
            return self.detached_state(id);
        }
        self.finish_locked(&mut inner, id, Err(err), trailing)
    }

    fn finish_locked(
        &self,
        inner: &mut Inner,
        id: SessionId,
        outcome: Result<(), SessionError>,
        trailing: Vec<String>,
    ) -> SessionState {
        let state = match outcome {
            Ok(()) => {
                info!(session = %id, "finished");
                SessionState::Finished
            }
            Err(err) => {
                info!(session = %id, error = %err, "session failed");
                if let Some(line) = err.sentinel_line() {
                    inner.view.output.push(line);
                }
                err.terminal_state()
            }
        };
        inner.view.output.extend(trailing);
        if let Some(session) = inner.view.session.as_mut() {
            session.state = state;
        }
        inner.live = None;
        if let Some(ticker) = inner.ticker.take() {
            ticker.cancel();
        }
        self.emit(SessionEvent::Finished(id, state.status().unwrap_or(Status::Error)));
        state
    }
}

fn spawn_ticker(shared: Arc<Shared>, id: SessionId, period: Duration, cancel: CancellationToken) {
    let period = period.max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if !shared.tick(id) {
                        break;
                    }
                }
            }
        }
    });
}

/// Handle to a started session's read loop
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    task: JoinHandle<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the loop to exit. A loop that lost the view reports `Superseded`
    /// (or `Aborted` if the user stopped it).
    pub async fn wait(self) -> Result<SessionState, JoinError> {
        self.task.await
    }
}

/// Starts sessions and owns the live view
pub struct SessionController<T: Transport> {
    transport: Arc<T>,
    config: Config,
    shared: Arc<Shared>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, config: Config) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            inner: RwLock::new(Inner {
                next_id: 0,
                live: None,
                view: LiveView::default(),
                ticker: None,
            }),
            events: tx,
        });
        let controller = Self {
            transport: Arc::new(transport),
            config,
            shared,
        };
        (controller, rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a new session, superseding the live one. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, request: TraceRequest) -> SessionHandle {
        let id = {
            let mut inner = self.shared.inner.write();
            inner.next_id += 1;
            let id = SessionId(inner.next_id);
            if let Some(old) = inner.live.take() {
                debug!(session = %old, by = %id, "superseded");
            }
            if let Some(ticker) = inner.ticker.take() {
                ticker.cancel();
            }
            inner.view = LiveView::new(id, request.clone(), self.config.max_hops);
            inner.live = Some(id);
            self.shared.emit(SessionEvent::Started(id));
            id
        };
        info!(session = %id, action = %request.action, target = %request.target, "starting session");

        let task = tokio::spawn(run_session(
            self.transport.clone(),
            self.shared.clone(),
            self.config.clone(),
            id,
            request,
        ));
        SessionHandle { id, task }
    }

    /// Stop the live session, keeping its output. Returns the aborted id.
    pub fn abort(&self) -> Option<SessionId> {
        let mut inner = self.shared.inner.write();
        let id = inner.live.take()?;
        if let Some(ticker) = inner.ticker.take() {
            ticker.cancel();
        }
        if let Some(session) = inner.view.session.as_mut() {
            session.state = SessionState::Aborted;
        }
        info!(session = %id, "aborted");
        self.shared.emit(SessionEvent::Finished(id, Status::Aborted));
        Some(id)
    }

    /// Session currently allowed to write output
    pub fn live_session(&self) -> Option<SessionId> {
        self.shared.inner.read().live
    }

    /// Read access to the view
    pub fn view(&self) -> MappedRwLockReadGuard<'_, LiveView> {
        RwLockReadGuard::map(self.shared.inner.read(), |inner| &inner.view)
    }

    /// Snapshot of the current (or last) session for export
    pub fn report(&self) -> Option<SessionReport> {
        self.view().report()
    }
}

async fn run_session<T: Transport>(
    transport: Arc<T>,
    shared: Arc<Shared>,
    config: Config,
    id: SessionId,
    request: TraceRequest,
) -> SessionState {
    let opened = match tokio::time::timeout(config.connect_timeout, transport.open(&request)).await {
        Ok(Ok(opened)) => opened,
        Ok(Err(err)) => return shared.finish(id, err.into(), Vec::new()),
        Err(_) => return shared.finish(id, SessionError::ConnectTimeout, Vec::new()),
    };

    let mut body = match opened {
        Opened::Stream(body) => body,
        Opened::Rejected {
            status,
            reason,
            body,
        } => {
            let lines = body
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect();
            return shared.finish(id, SessionError::HttpError { status, reason }, lines);
        }
    };

    if !shared.begin_streaming(id, config.tick_interval) {
        return shared.detached_state(id);
    }

    let pipeline = Pipeline::for_action(request.action, HopParser::new(config.loss_scale));
    let mut lines = LineReassembler::new();
    // Inactivity is measured from the last chunk, not from the last attempt
    let mut deadline = Instant::now() + config.read_timeout;

    loop {
        match tokio::time::timeout_at(deadline, body.next_chunk()).await {
            Ok(Ok(Some(chunk))) => {
                deadline = Instant::now() + config.read_timeout;
                let complete = lines.feed(&chunk);
                if !shared.apply(id, &pipeline, complete) {
                    debug!(session = %id, "dropping output from stale session");
                    return shared.detached_state(id);
                }
            }
            Ok(Ok(None)) => {
                let tail = lines.flush().into_iter().collect();
                if !shared.apply(id, &pipeline, tail) {
                    return shared.detached_state(id);
                }
                return shared.complete(id);
            }
            Ok(Err(ReadError::Transient(cause))) => {
                if !shared.is_live(id) {
                    return shared.detached_state(id);
                }
                warn!(session = %id, %cause, "read failed, re-acquiring reader");
                body.reacquire();
            }
            Ok(Err(ReadError::Fatal(cause))) => {
                return shared.finish(id, SessionError::ReadFailure(cause), Vec::new());
            }
            Err(_) => {
                drop(body);
                return shared.finish(id, SessionError::ReadTimeout(config.read_timeout), Vec::new());
            }
        }
    }
}
