//! Integration tests for the request→stream→view pipeline
//!
//! A channel-backed transport lets each test decide exactly when every chunk
//! of every session arrives, without a backend or network access.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use webtrace::config::Config;
use webtrace::state::{Action, RowState, SessionState, Status, TraceRequest};
use webtrace::trace::{
    ChunkSource, Opened, ReadError, SessionController, SessionEvent, Transport, TransportError,
};

type Feed = mpsc::UnboundedSender<Result<Vec<u8>, ReadError>>;

/// Streams whatever the test pushes for each target. Unknown targets never
/// answer, which is how connect timeouts are simulated.
#[derive(Default)]
struct ChannelTransport {
    bodies: Mutex<HashMap<String, mpsc::UnboundedReceiver<Result<Vec<u8>, ReadError>>>>,
}

impl ChannelTransport {
    fn register(&self, target: &str) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.bodies.lock().insert(target.to_string(), rx);
        tx
    }
}

struct ChannelBody {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, ReadError>>,
}

impl ChunkSource for ChannelBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ReadError> {
        match self.rx.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(err)) => Err(err),
            // Sender dropped: end of stream
            None => Ok(None),
        }
    }
}

impl Transport for ChannelTransport {
    type Body = ChannelBody;

    async fn open(&self, request: &TraceRequest) -> Result<Opened<ChannelBody>, TransportError> {
        let rx = self.bodies.lock().remove(&request.target);
        match rx {
            Some(rx) => Ok(Opened::Stream(ChannelBody { rx })),
            None => std::future::pending().await,
        }
    }
}

fn config() -> Config {
    Config {
        connect_timeout: Duration::from_millis(200),
        read_timeout: Duration::from_secs(30),
        ..Config::default()
    }
}

fn send(feed: &Feed, text: &str) {
    feed.send(Ok(text.as_bytes().to_vec())).unwrap();
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_mtr_session_end_to_end() {
    let transport = ChannelTransport::default();
    let feed = transport.register("example.com");
    let (ctl, mut rx) = SessionController::new(transport, config());

    let handle = ctl.start(TraceRequest::new(Action::Mtr, "example.com"));
    let id = handle.id();

    send(&feed, "HOST: probe  Loss%\n1 gw 10.0.0.1 0 5 5 1 2 3\n2 ");
    send(&feed, "core1 192.0.2.1 50000 5 10 4 5 6\n2 core2 192.0.2.2 50000 5 10 4 5 7\n");
    send(&feed, "3 edge 198.51.100.1 12345 8 9 7 8 9\n-3\n\n5 ???\n");
    drop(feed);

    assert_eq!(handle.wait().await.unwrap(), SessionState::Finished);

    let view = ctl.view();
    assert_eq!(view.output, vec!["HOST: probe  Loss%"]);
    let rows = view.table.as_ref().unwrap().rows();
    assert_eq!(rows.len(), 5);

    assert_eq!(rows[0].hosts, vec!["gw [10.0.0.1]"]);
    assert_eq!(rows[0].loss, "0%");

    // ECMP: both routers at hop 2, first-seen order
    assert_eq!(rows[1].hosts, vec!["core1 [192.0.2.1]", "core2 [192.0.2.2]"]);
    assert_eq!(rows[1].loss, "50%");
    assert_eq!(rows[1].worst, "7");

    // Hidden by the backend but data kept
    assert_eq!(rows[2].state, RowState::Stale);
    assert_eq!(rows[2].loss, "12.345%");

    // Never reported, then explicitly unknown
    assert_eq!(rows[3].state, RowState::Unknown);
    assert_eq!(rows[4].state, RowState::Unknown);

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&SessionEvent::Started(id)));
    assert_eq!(events.last(), Some(&SessionEvent::Finished(id, Status::Finished)));
}

#[tokio::test]
async fn test_superseded_session_is_silenced() {
    let transport = ChannelTransport::default();
    let feed_a = transport.register("a.example");
    let feed_b = transport.register("b.example");
    let (ctl, mut rx) = SessionController::new(transport, config());

    let a = ctl.start(TraceRequest::new(Action::Mtr, "a.example"));
    let a_id = a.id();
    send(&feed_a, "1 gwA 10.0.0.1 0 1 1 1 1 1\n");
    wait_until(|| ctl.view().table.as_ref().is_some_and(|t| t.len() == 1)).await;
    let events_before_b = drain(&mut rx);
    assert!(events_before_b.iter().all(|e| e.session() == a_id));

    let b = ctl.start(TraceRequest::new(Action::Mtr, "b.example"));
    let b_id = b.id();

    // A's reads resolve after B took over
    send(&feed_a, "2 lateA 10.9.9.9 0 1 1 1 1 1\nERROR: late failure\n");
    drop(feed_a);
    assert_eq!(a.wait().await.unwrap(), SessionState::Superseded);

    send(&feed_b, "1 gwB 10.0.0.2 0 1 1 1 1 1\n");
    drop(feed_b);
    assert_eq!(b.wait().await.unwrap(), SessionState::Finished);

    let view = ctl.view();
    assert_eq!(view.session.as_ref().map(|s| s.id), Some(b_id));
    assert!(view.output.is_empty());
    let rows = view.table.as_ref().unwrap().rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hosts, vec!["gwB [10.0.0.2]"]);

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.session() == b_id), "{:?}", events);
    assert_eq!(events.last(), Some(&SessionEvent::Finished(b_id, Status::Finished)));
}

#[tokio::test]
async fn test_supersede_before_old_session_reads() {
    let transport = ChannelTransport::default();
    let feed_a = transport.register("a.example");
    let feed_b = transport.register("b.example");
    let (ctl, mut rx) = SessionController::new(transport, config());

    // A's whole body is queued before its loop ever runs
    let a = ctl.start(TraceRequest::new(Action::Trace, "a.example"));
    send(&feed_a, "traceroute to a.example\n 1  gw\n");
    drop(feed_a);
    let b = ctl.start(TraceRequest::new(Action::Trace, "b.example"));
    let b_id = b.id();

    // B delivers first, A's loop drains afterwards
    send(&feed_b, "traceroute to b.example\n");
    wait_until(|| !ctl.view().output.is_empty()).await;
    assert_eq!(a.wait().await.unwrap(), SessionState::Superseded);
    drop(feed_b);
    assert_eq!(b.wait().await.unwrap(), SessionState::Finished);

    assert_eq!(ctl.view().output, vec!["traceroute to b.example"]);
    let finished: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Finished(..)))
        .collect();
    assert_eq!(finished, vec![SessionEvent::Finished(b_id, Status::Finished)]);
}

#[tokio::test]
async fn test_backend_error_line_fails_session() {
    let transport = ChannelTransport::default();
    let feed = transport.register("x");
    let (ctl, _rx) = SessionController::new(transport, config());

    let handle = ctl.start(TraceRequest::new(Action::Trace, "x"));
    send(&feed, "ERROR: permission denied\n");
    drop(feed);

    assert_eq!(handle.wait().await.unwrap(), SessionState::Failed);
    let view = ctl.view();
    assert_eq!(view.status(), Some(Status::Error));
    assert_eq!(view.status_text(), "Error");
    assert_eq!(view.output, vec!["ERROR: permission denied"]);
}

#[tokio::test]
async fn test_connect_timeout_reports_timeout() {
    let (ctl, mut rx) = SessionController::new(ChannelTransport::default(), config());

    let handle = ctl.start(TraceRequest::new(Action::Mtr, "unreachable"));
    let id = handle.id();
    assert_eq!(handle.wait().await.unwrap(), SessionState::TimedOut);

    let view = ctl.view();
    assert_eq!(view.status(), Some(Status::Timeout));
    assert!(view.output.iter().any(|l| l.starts_with("TIMEOUT:")));
    assert!(view.table.as_ref().is_some_and(|t| t.is_empty()));
    assert!(
        drain(&mut rx).contains(&SessionEvent::Finished(id, Status::Timeout))
    );
}

#[tokio::test]
async fn test_transient_read_errors_do_not_end_session() {
    let transport = ChannelTransport::default();
    let feed = transport.register("x");
    let (ctl, _rx) = SessionController::new(transport, config());

    let handle = ctl.start(TraceRequest::new(Action::Trace, "x"));
    send(&feed, " 1  g");
    feed.send(Err(ReadError::Transient("reader released".into()))).unwrap();
    send(&feed, "w\n");
    drop(feed);

    assert_eq!(handle.wait().await.unwrap(), SessionState::Finished);
    assert_eq!(ctl.view().output, vec![" 1  gw"]);
}

#[tokio::test]
async fn test_report_snapshot_after_finish() {
    let transport = ChannelTransport::default();
    let feed = transport.register("example.com");
    let (ctl, _rx) = SessionController::new(transport, config());

    let handle = ctl.start(
        TraceRequest::new(Action::Mtr, "example.com").with_aftype(Some("6".into())),
    );
    send(&feed, "1 gw 2001:db8::1 0 1 1 1 1 1\n");
    drop(feed);
    handle.wait().await.unwrap();

    let report = ctl.report().unwrap();
    assert_eq!(report.target, "example.com");
    assert_eq!(report.aftype.as_deref(), Some("6"));
    assert_eq!(report.status, Some(Status::Finished));
    assert_eq!(report.hops.len(), 1);
}
