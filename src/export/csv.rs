use anyhow::Result;
use std::io::Write;

use crate::state::SessionReport;

/// Export hop rows to CSV. Plain-text sessions have no rows and produce
/// only the header.
pub fn export_csv<W: Write>(report: &SessionReport, mut writer: W) -> Result<()> {
    writeln!(writer, "hop,hosts,loss,rcvd,sent,best,avg,worst,state")?;

    for row in &report.hops {
        let state = match row.state {
            crate::state::RowState::Unknown => "unknown",
            crate::state::RowState::Live => "live",
            crate::state::RowState::Stale => "stale",
        };
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{}",
            row.index,
            escape_csv(&row.host_label("; ")),
            escape_csv(&row.loss),
            escape_csv(&row.received),
            escape_csv(&row.sent),
            escape_csv(&row.best),
            escape_csv(&row.avg),
            escape_csv(&row.worst),
            state
        )?;
    }

    Ok(())
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
