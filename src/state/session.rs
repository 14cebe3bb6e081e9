use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::table::{HopRow, HopTable};

/// Opaque, monotonically increasing session identity
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Diagnostic the backend should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// One-shot traceroute, output shown as plain text
    #[default]
    Trace,
    /// Continuous mtr run, output parsed into the hop table
    Mtr,
}

impl Action {
    /// Path segment of the backend endpoint
    pub fn path(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Mtr => "mtr",
        }
    }

    /// Whether this action streams the hop-report wire format
    pub fn is_hop_report(&self) -> bool {
        matches!(self, Self::Mtr)
    }

    /// Cycle to the other action
    pub fn next(self) -> Self {
        match self {
            Self::Trace => Self::Mtr,
            Self::Mtr => Self::Trace,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" | "traceroute" => Ok(Self::Trace),
            "mtr" => Ok(Self::Mtr),
            other => Err(format!("Unknown action: {}. Use trace or mtr", other)),
        }
    }
}

/// What the user asked for: action, target host and optional address family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRequest {
    pub action: Action,
    /// Forwarded verbatim to the backend; never executed locally
    pub target: String,
    /// Address family hint (empty = backend default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aftype: Option<String>,
}

impl TraceRequest {
    pub fn new(action: Action, target: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            aftype: None,
        }
    }

    pub fn with_aftype(mut self, aftype: Option<String>) -> Self {
        self.aftype = aftype.filter(|a| !a.trim().is_empty());
        self
    }
}

/// Lifecycle of a single session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Streaming,
    Finished,
    Failed,
    TimedOut,
    /// Stopped by the user, output kept
    Aborted,
    /// Replaced by a newer session; never surfaced
    Superseded,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::TimedOut | Self::Aborted | Self::Superseded
        )
    }

    /// Status shown to the user, if this state is ever shown at all
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Idle | Self::Superseded => None,
            Self::Starting | Self::Streaming => Some(Status::Working),
            Self::Finished => Some(Status::Finished),
            Self::Failed => Some(Status::Error),
            Self::TimedOut => Some(Status::Timeout),
            Self::Aborted => Some(Status::Aborted),
        }
    }
}

/// Status surfaced to front-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Working,
    Finished,
    Error,
    Timeout,
    Aborted,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Working => "Working",
            Self::Finished => "Finished",
            Self::Error => "Error",
            Self::Timeout => "Timeout",
            Self::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The session currently owning the live view
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub request: TraceRequest,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
}

/// Everything a front-end paints: the session, its hop table and plain output
#[derive(Debug, Clone, Default)]
pub struct LiveView {
    pub session: Option<SessionInfo>,
    /// Present only for hop-report actions
    pub table: Option<HopTable>,
    /// Plain diagnostic lines, in arrival order
    pub output: Vec<String>,
    /// Spinner ticks since the session started streaming
    pub ticks: u64,
}

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

impl LiveView {
    /// Fresh view for a new session; nothing carries over from the last one
    pub fn new(id: SessionId, request: TraceRequest, max_hops: u8) -> Self {
        let table = request
            .action
            .is_hop_report()
            .then(|| HopTable::new(max_hops as usize));
        Self {
            session: Some(SessionInfo {
                id,
                request,
                state: SessionState::Starting,
                started_at: Utc::now(),
            }),
            table,
            output: Vec::new(),
            ticks: 0,
        }
    }

    pub fn status(&self) -> Option<Status> {
        self.session.as_ref().and_then(|s| s.state.status())
    }

    /// Status line text, e.g. `Working /` or `Finished`
    pub fn status_text(&self) -> String {
        match self.status() {
            Some(Status::Working) => {
                format!("Working {}", SPINNER[(self.ticks % SPINNER.len() as u64) as usize])
            }
            Some(status) => status.label().to_string(),
            None => String::new(),
        }
    }

    /// Serializable snapshot for export
    pub fn report(&self) -> Option<SessionReport> {
        let session = self.session.as_ref()?;
        Some(SessionReport {
            target: session.request.target.clone(),
            action: session.request.action,
            aftype: session.request.aftype.clone(),
            started_at: session.started_at,
            status: session.state.status(),
            hops: self.table.as_ref().map(|t| t.rows()).unwrap_or_default(),
            output: self.output.clone(),
        })
    }
}

/// A finished (or in-flight) session, as exported
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub target: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aftype: Option<String>,
    pub started_at: DateTime<Utc>,
    pub status: Option<Status>,
    pub hops: Vec<HopRow>,
    pub output: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!("mtr".parse::<Action>(), Ok(Action::Mtr));
        assert_eq!("TRACE".parse::<Action>(), Ok(Action::Trace));
        assert_eq!("traceroute".parse::<Action>(), Ok(Action::Trace));
        assert!("ping".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_cycle() {
        assert_eq!(Action::Trace.next(), Action::Mtr);
        assert_eq!(Action::Mtr.next(), Action::Trace);
        assert!(Action::Mtr.is_hop_report());
        assert!(!Action::Trace.is_hop_report());
    }

    #[test]
    fn test_blank_aftype_is_dropped() {
        let req = TraceRequest::new(Action::Trace, "example.com").with_aftype(Some("  ".into()));
        assert_eq!(req.aftype, None);
        let req = TraceRequest::new(Action::Trace, "example.com").with_aftype(Some("6".into()));
        assert_eq!(req.aftype.as_deref(), Some("6"));
    }

    #[test]
    fn test_state_to_status() {
        assert_eq!(SessionState::Idle.status(), None);
        assert_eq!(SessionState::Starting.status(), Some(Status::Working));
        assert_eq!(SessionState::Streaming.status(), Some(Status::Working));
        assert_eq!(SessionState::Failed.status(), Some(Status::Error));
        assert_eq!(SessionState::TimedOut.status(), Some(Status::Timeout));
        assert_eq!(SessionState::Superseded.status(), None);
        assert!(SessionState::Superseded.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
    }

    #[test]
    fn test_live_view_table_only_for_mtr() {
        let view = LiveView::new(SessionId(1), TraceRequest::new(Action::Trace, "a"), 30);
        assert!(view.table.is_none());
        let view = LiveView::new(SessionId(2), TraceRequest::new(Action::Mtr, "a"), 30);
        assert!(view.table.is_some());
    }

    #[test]
    fn test_status_text_spins() {
        let mut view = LiveView::new(SessionId(1), TraceRequest::new(Action::Mtr, "a"), 30);
        assert_eq!(view.status_text(), "Working |");
        view.ticks = 1;
        assert_eq!(view.status_text(), "Working /");
        view.ticks = 7;
        assert_eq!(view.status_text(), "Working \\");

        if let Some(session) = view.session.as_mut() {
            session.state = SessionState::TimedOut;
        }
        assert_eq!(view.status_text(), "Timeout");
    }

    #[test]
    fn test_report_serialization_roundtrip() {
        let mut view = LiveView::new(
            SessionId(3),
            TraceRequest::new(Action::Trace, "test.com").with_aftype(Some("4".into())),
            30,
        );
        view.output.push("traceroute to test.com".into());

        let report = view.report().unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let restored: SessionReport = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.target, "test.com");
        assert_eq!(restored.action, Action::Trace);
        assert_eq!(restored.aftype.as_deref(), Some("4"));
        assert_eq!(restored.status, Some(Status::Working));
        assert_eq!(restored.output.len(), 1);
    }
}
