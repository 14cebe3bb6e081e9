use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;
mod prefs;
mod tui;

use cli::Args;
use prefs::Prefs;
use tui::{Theme, TuiOptions, run_tui};
use webtrace::export::{export_csv, export_json, generate_report, write_hop_table};
use webtrace::state::{Action, SessionId, Status};
use webtrace::trace::{HttpTransport, SessionController, SessionEvent};

type Controller = SessionController<HttpTransport>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&args)?;

    let prefs = Prefs::load();
    let config = args.config(prefs.server.as_deref());
    let transport = HttpTransport::new(config.server.clone(), config.connect_timeout)?;
    let (controller, events) = SessionController::new(transport, config);

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup Ctrl+C handler (the TUI reads Ctrl+C as a key instead)
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    // Run in appropriate mode
    let status = if args.is_batch_mode() {
        Some(run_batch_mode(&args, &controller, events, cancel).await?)
    } else if args.no_tui {
        Some(run_streaming_mode(&args, &controller, events, cancel).await?)
    } else {
        run_interactive_mode(&args, &controller, events, prefs).await?;
        None
    };

    remember_server(&args);

    if matches!(status, Some(Status::Error | Status::Timeout)) {
        std::process::exit(1);
    }
    Ok(())
}

/// Logs go to stderr outside the TUI, and only to `--log-file` inside it
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "warn,webtrace=debug" } else { "warn" })
    });

    if let Some(ref path) = args.log_file {
        let file = File::create(path).with_context(|| format!("Failed to create log file: {}", path))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else if !args.is_interactive() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Save an explicitly given server as the new default (best effort)
fn remember_server(args: &Args) {
    if let Some(ref server) = args.server {
        let mut prefs = Prefs::load();
        if prefs.server.as_deref() != Some(server) {
            prefs.server = Some(server.clone());
            let _ = prefs.save();
        }
    }
}

/// Follow one session until it reports a terminal status. Ctrl+C aborts it.
async fn follow_session(
    controller: &Controller,
    events: &mut UnboundedReceiver<SessionEvent>,
    id: SessionId,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(&Controller) -> Result<()>,
) -> Result<Status> {
    let mut dirty = false;
    let mut aborted = false;
    let mut interval = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = cancel.cancelled(), if !aborted => {
                aborted = true;
                controller.abort();
            }
            event = events.recv() => {
                let Some(event) = event else {
                    anyhow::bail!("session event stream closed");
                };
                if event.session() != id {
                    continue;
                }
                match event {
                    SessionEvent::Updated(_) => dirty = true,
                    SessionEvent::Finished(_, status) => {
                        on_progress(controller)?;
                        return Ok(status);
                    }
                    SessionEvent::Started(_) | SessionEvent::Tick(..) => {}
                }
            }
            _ = interval.tick() => {
                if dirty {
                    on_progress(controller)?;
                    dirty = false;
                }
            }
        }
    }
}

async fn run_batch_mode(
    args: &Args,
    controller: &Controller,
    mut events: UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
) -> Result<Status> {
    let request = args.request().context("No target specified")?;
    let handle = controller.start(request);
    let status = follow_session(controller, &mut events, handle.id(), &cancel, |_| Ok(())).await?;

    let report = controller.report().context("No session to report")?;
    if args.json {
        export_json(&report, std::io::stdout())?;
        println!();
    } else if args.csv {
        export_csv(&report, std::io::stdout())?;
    } else if args.report {
        generate_report(&report, std::io::stdout())?;
    }

    Ok(status)
}

async fn run_streaming_mode(
    args: &Args,
    controller: &Controller,
    mut events: UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
) -> Result<Status> {
    let request = args.request().context("No target specified")?;
    let handle = controller.start(request);

    // Print output lines as they arrive, and the hop table each time it changes
    let mut printed = 0;
    let mut last_rows = Vec::new();
    let status = follow_session(controller, &mut events, handle.id(), &cancel, |controller| {
        let (rows, new_lines) = {
            let view = controller.view();
            let rows = view.table.as_ref().map(|t| t.rows()).unwrap_or_default();
            let new_lines: Vec<String> = view.output.iter().skip(printed).cloned().collect();
            printed = view.output.len();
            (rows, new_lines)
        };

        let mut out = std::io::stdout().lock();
        if !rows.is_empty() && rows != last_rows {
            write_hop_table(&rows, &mut out)?;
            writeln!(out, "---")?;
            last_rows = rows;
        }
        for line in new_lines {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(())
    })
    .await?;

    eprintln!("{}", status);
    Ok(status)
}

async fn run_interactive_mode(
    args: &Args,
    controller: &Controller,
    events: UnboundedReceiver<SessionEvent>,
    prefs: Prefs,
) -> Result<()> {
    // Determine theme: CLI override > saved preference > default
    let theme_name = if args.theme != "default" {
        &args.theme
    } else {
        prefs.theme.as_deref().unwrap_or("default")
    };

    // Same precedence for the action; "trace" is the CLI default
    let action = match args.parsed_action() {
        Ok(Action::Trace) => prefs.action.unwrap_or_default(),
        Ok(action) => action,
        Err(_) => Action::default(),
    };

    let options = TuiOptions {
        theme: Theme::by_name(theme_name),
        action,
        aftype: args.aftype(),
        target: args.target.clone(),
        server: controller.config().server.clone(),
    };

    let outcome = run_tui(controller, events, options).await?;

    // Save preferences (best effort, don't fail on save error)
    let mut prefs = Prefs::load();
    prefs.theme = Some(outcome.theme);
    prefs.action = Some(outcome.action);
    let _ = prefs.save();

    Ok(())
}
