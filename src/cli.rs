use clap::Parser;
use std::time::Duration;

use webtrace::config::{Config, DEFAULT_SERVER, LossScale};
use webtrace::state::{Action, TraceRequest};

/// Live traceroute/mtr client for a webtrace backend
#[derive(Parser, Debug, Clone)]
#[command(name = "webtrace")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IP address or hostname), resolved by the backend
    pub target: Option<String>,

    /// Diagnostic to run (trace, mtr)
    #[arg(short = 'a', long = "action", default_value = "trace")]
    pub action: String,

    /// Backend base URL (default: last used, then http://127.0.0.1:5000)
    #[arg(short = 's', long = "server")]
    pub server: Option<String>,

    /// Ask the backend for IPv4
    #[arg(short = '4', long = "ipv4")]
    pub ipv4: bool,

    /// Ask the backend for IPv6
    #[arg(short = '6', long = "ipv6")]
    pub ipv6: bool,

    /// Raw address family value forwarded to the backend
    #[arg(long = "aftype", conflicts_with_all = ["ipv4", "ipv6"])]
    pub aftype: Option<String>,

    /// Seconds to wait for the backend to respond
    #[arg(long = "connect-timeout", default_value = "5")]
    pub connect_timeout: f64,

    /// Seconds of silence tolerated while streaming
    #[arg(long = "read-timeout", default_value = "5")]
    pub read_timeout: f64,

    /// Maximum hop index shown
    #[arg(short = 'm', long = "max-hops", default_value = "30")]
    pub max_hops: u8,

    /// Scale of the loss field (thousandths, tenths)
    #[arg(long = "loss-scale", default_value = "thousandths")]
    pub loss_scale: String,

    /// Disable TUI (streaming output mode)
    #[arg(long = "no-tui")]
    pub no_tui: bool,

    /// Output JSON when the run ends (batch mode)
    #[arg(long = "json")]
    pub json: bool,

    /// Output CSV when the run ends (batch mode)
    #[arg(long = "csv")]
    pub csv: bool,

    /// Report mode (batch)
    #[arg(long = "report")]
    pub report: bool,

    /// Color theme (default, dracula, nord, monochrome)
    #[arg(long = "theme", default_value = "default")]
    pub theme: String,

    /// Debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Write logs to this file (the TUI otherwise logs nothing)
    #[arg(long = "log-file")]
    pub log_file: Option<String>,
}

impl Args {
    /// Check if running in batch mode (non-interactive)
    pub fn is_batch_mode(&self) -> bool {
        self.json || self.csv || self.report
    }

    /// Whether the terminal UI owns the screen
    pub fn is_interactive(&self) -> bool {
        !self.is_batch_mode() && !self.no_tui
    }

    pub fn parsed_action(&self) -> Result<Action, String> {
        self.action.parse()
    }

    /// Address family forwarded to the backend
    pub fn aftype(&self) -> Option<String> {
        if self.ipv4 {
            Some("4".to_string())
        } else if self.ipv6 {
            Some("6".to_string())
        } else {
            self.aftype.clone().filter(|a| !a.trim().is_empty())
        }
    }

    /// Initial request, if a target was given
    pub fn request(&self) -> Option<TraceRequest> {
        let target = self.target.as_ref()?;
        let action = self.parsed_action().ok()?;
        Some(TraceRequest::new(action, target.clone()).with_aftype(self.aftype()))
    }

    /// Build the runtime config. `saved_server` is the last server from prefs.
    pub fn config(&self, saved_server: Option<&str>) -> Config {
        let server = self
            .server
            .as_deref()
            .or(saved_server)
            .unwrap_or(DEFAULT_SERVER)
            .to_string();

        Config {
            server,
            connect_timeout: Duration::from_secs_f64(self.connect_timeout),
            read_timeout: Duration::from_secs_f64(self.read_timeout),
            max_hops: self.max_hops,
            loss_scale: self.loss_scale.parse().unwrap_or(LossScale::Thousandths),
            ..Config::default()
        }
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        self.parsed_action()?;
        self.loss_scale.parse::<LossScale>()?;

        if self.ipv4 && self.ipv6 {
            return Err("Cannot specify both -4 and -6".into());
        }

        if !self.is_interactive() && self.target.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err("A target is required with --no-tui, --json, --csv or --report".into());
        }

        if [self.json, self.csv, self.report].iter().filter(|&&b| b).count() > 1 {
            return Err("Choose only one of --json, --csv, --report".into());
        }

        if !(self.connect_timeout > 0.0 && self.connect_timeout.is_finite()) {
            return Err("Connect timeout must be positive".into());
        }

        if !(self.read_timeout > 0.0 && self.read_timeout.is_finite()) {
            return Err("Read timeout must be positive".into());
        }

        if self.max_hops == 0 {
            return Err("Max hops must be at least 1".into());
        }

        const MAX_SAFE_HOPS: u8 = 64;
        if self.max_hops > MAX_SAFE_HOPS {
            return Err(format!("Max hops cannot exceed {}", MAX_SAFE_HOPS));
        }

        if let Some(ref server) = self.server
            && !(server.starts_with("http://") || server.starts_with("https://"))
        {
            return Err(format!("Server must be an http(s) URL: {}", server));
        }

        Ok(())
    }
}
