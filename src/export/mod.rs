pub mod csv;
pub mod json;
pub mod report;

pub use csv::*;
pub use json::*;
pub use report::*;

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use crate::state::{Action, HopData, HopTable, SessionReport, Status};

    /// mtr report with an unknown hop 1 and a stale ECMP hop 2
    pub(crate) fn sample_report() -> SessionReport {
        let mut table = HopTable::new(30);
        for (host, address) in [("hostA", "1.1.1.1"), ("hostB", "2.2.2.2")] {
            table.apply_hop_data(HopData {
                index: 2,
                host: host.into(),
                address: address.into(),
                loss: "50%".into(),
                received: "5".into(),
                sent: "10".into(),
                best: "1.1".into(),
                avg: "2.2".into(),
                worst: "3.3".into(),
            });
        }
        table.apply_directive(2);

        SessionReport {
            target: "example.com".into(),
            action: Action::Mtr,
            aftype: None,
            started_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            status: Some(Status::Finished),
            hops: table.rows(),
            output: vec!["HOST: probe".into()],
        }
    }
}
