//! List command: show stored events.

use eventsync_core::EventRecord;
use eventsync_server::EventStore;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Prints every stored event.
pub async fn run(cli: &Cli, config: &ClientConfig, json: bool) -> ClientResult<()> {
    let store = super::open_store(cli, config).await?;
    let records = store.list().await?;

    if json {
        let out = serde_json::to_string_pretty(&records)
            .map_err(|e| ClientError::Input(format!("failed to serialize events: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    if records.is_empty() {
        println!("No events.");
    }
    for record in &records {
        println!("{}", summary_line(record));
    }
    Ok(())
}

fn summary_line(record: &EventRecord) -> String {
    let when = match record.start_time {
        Some(time) => format!("{} {}", record.start_date, time.format("%H:%M")),
        None => record.start_date.to_string(),
    };
    let status = if record.status.is_published() {
        "published"
    } else {
        "draft"
    };
    let remote = record.remote_id().unwrap_or("-");
    format!(
        "{:>4}  {:<16}  {:<9}  {:<14}  {}",
        record.id.0, when, status, remote, record.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use eventsync_core::{EventBoundary, RecordId};

    #[test]
    fn summary_line_shows_time_and_remote_id() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let start = EventBoundary::timed(date, NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        let mut record = EventRecord::new(RecordId(7), "Summer Fair", start, start, "Park");
        assert_eq!(
            summary_line(&record),
            "   7  2024-06-01 18:30  draft      -               Summer Fair"
        );

        record.remote = Some(eventsync_core::RemoteRef::new("ev0000000007"));
        assert!(summary_line(&record).contains("ev0000000007"));
    }
}
