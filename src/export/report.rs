use std::io::Write;

use crate::state::{HEADER, HopRow, RowState, SessionReport};

/// Generate a text report similar to mtr --report
pub fn generate_report<W: Write>(report: &SessionReport, mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "webtrace {} report for {}", report.action, report.target)?;
    writeln!(writer, "Started: {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    if let Some(ref aftype) = report.aftype {
        writeln!(writer, "Address family: {}", aftype)?;
    }
    if let Some(status) = report.status {
        writeln!(writer, "Status: {}", status)?;
    }
    writeln!(writer)?;

    write_hop_table(&report.hops, &mut writer)?;

    if !report.output.is_empty() {
        if !report.hops.is_empty() {
            writeln!(writer)?;
        }
        for line in &report.output {
            writeln!(writer, "{}", line)?;
        }
    }

    Ok(())
}

/// Write hop rows as an mtr-style table. Nothing is written for no rows.
pub fn write_hop_table<W: Write>(rows: &[HopRow], mut writer: W) -> std::io::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(
        writer,
        "{:>3}  {:<40} {:>7} {:>5} {:>5} {:>7} {:>7} {:>7}",
        HEADER[0], HEADER[1], HEADER[2], HEADER[3], HEADER[4], HEADER[5], HEADER[6], HEADER[7]
    )?;
    writeln!(writer, "{}", "-".repeat(90))?;

    for row in rows {
        let marker = if row.state == RowState::Stale { "~" } else { " " };
        // ECMP hops get one line per host; stats go on the first
        for (i, host) in row.hosts.iter().enumerate() {
            if i == 0 {
                writeln!(
                    writer,
                    "{:>3}{} {:<40} {:>7} {:>5} {:>5} {:>7} {:>7} {:>7}",
                    row.index,
                    marker,
                    host,
                    row.loss,
                    row.received,
                    row.sent,
                    row.best,
                    row.avg,
                    row.worst
                )?;
            } else {
                writeln!(writer, "{:>3}  {:<40}", "", host)?;
            }
        }
    }
    Ok(())
}

/// Generate report to string
pub fn generate_report_string(report: &SessionReport) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail
    let _ = generate_report(report, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
