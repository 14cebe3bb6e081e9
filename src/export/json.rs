use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::state::SessionReport;

/// Export a session report as pretty JSON
pub fn export_json<W: Write>(report: &SessionReport, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// File name for a report: `webtrace-<target>-<timestamp>.json`
pub fn export_file_name(report: &SessionReport) -> String {
    let target: String = report
        .target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!(
        "webtrace-{}-{}.json",
        target,
        report.started_at.format("%Y%m%d-%H%M%S")
    )
}

/// Write a report to the current directory, returning the file name
pub fn export_json_file(report: &SessionReport) -> Result<String> {
    let filename = export_file_name(report);
    let file = File::create(&filename).with_context(|| format!("Failed to create {}", filename))?;
    let mut writer = BufWriter::new(file);
    export_json(report, &mut writer)?;
    writer.flush()?;
    Ok(filename)
}
