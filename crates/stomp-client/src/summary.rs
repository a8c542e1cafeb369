//! Channel summary reports.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Local, TimeZone};
use stomp_core::error::StompResult;
use stomp_core::event::Event;
use tracing::info;

/// Descriptions longer than this are cut and suffixed with `...`.
pub const DESCRIPTION_LIMIT: usize = 27;

/// Aggregate counts over a sequence of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub total: usize,
    pub active: usize,
    pub forces_arrival: usize,
}

impl SummaryStats {
    pub fn from_events(events: &[Event]) -> Self {
        Self {
            total: events.len(),
            active: events.iter().filter(|e| e.is_active()).count(),
            forces_arrival: events.iter().filter(|e| e.forces_arrived()).count(),
        }
    }
}

/// Cut a description to [`DESCRIPTION_LIMIT`] characters.
pub fn truncate_description(description: &str) -> String {
    match description.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{}...", &description[..cut]),
        None => description.to_string(),
    }
}

/// Render an epoch timestamp as `DD/MM/YYYY HH:MM:SS` in `tz`.
pub fn format_timestamp<Tz>(timestamp: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

/// Render the summary text. `events` must already be sorted.
pub fn render_summary<Tz>(channel: &str, events: &[Event], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stats = SummaryStats::from_events(events);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "Channel: {channel}\nStats:\nTotal: {}\nactive: {}\nforces arrival at scene: {}\n\
         Event Reports:\n\n",
        stats.total, stats.active, stats.forces_arrival
    );

    for (index, event) in events.iter().enumerate() {
        let _ = write!(
            out,
            "Report_{}:\ncity: {}\ndate time: {}\nevent name: {}\nsummary:{}\n\n",
            index + 1,
            event.city,
            format_timestamp(event.timestamp, tz),
            event.name,
            truncate_description(&event.description),
        );
    }

    out
}

/// Write the summary for `(user, channel)` to `path`, replacing any previous
/// content. Timestamps are rendered in the local zone.
pub fn write_summary(
    path: &Path,
    channel: &str,
    user: &str,
    events: &[Event],
) -> StompResult<SummaryStats> {
    let text = render_summary(channel, events, &Local);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;

    let stats = SummaryStats::from_events(events);
    info!(
        path = %path.display(),
        channel,
        user,
        total = stats.total,
        "summary written"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn event(ts: i64, name: &str, active: &str, forces: &str, description: &str) -> Event {
        Event {
            channel: "police".into(),
            name: name.into(),
            city: "Liberty City".into(),
            timestamp: ts,
            description: description.into(),
            general_information: BTreeMap::from([
                ("active".to_string(), active.to_string()),
                ("forces_arrival_at_scene".to_string(), forces.to_string()),
            ]),
            user: "alice".into(),
        }
    }

    #[test]
    fn truncation_boundary() {
        let exact = "a".repeat(27);
        assert_eq!(truncate_description(&exact), exact);
        let long = "b".repeat(28);
        assert_eq!(truncate_description(&long), format!("{}...", "b".repeat(27)));
        assert_eq!(truncate_description(""), "");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let cut = truncate_description(&text);
        assert_eq!(cut.chars().count(), 30);
        assert!(cut.starts_with(&"é".repeat(27)));
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn counts_only_literal_true() {
        let events = vec![
            event(1, "a", "true", "true", ""),
            event(2, "b", "TRUE", "false", ""),
            event(3, "c", "true", "yes", ""),
        ];
        assert_eq!(
            SummaryStats::from_events(&events),
            SummaryStats { total: 3, active: 2, forces_arrival: 1 }
        );
    }

    #[test]
    fn formats_timestamp_in_zone() {
        assert_eq!(format_timestamp(0, &Utc), "01/01/1970 00:00:00");
        assert_eq!(format_timestamp(1733580000, &Utc), "07/12/2024 14:00:00");
    }

    #[test]
    fn renders_exact_layout() {
        let events = vec![
            event(0, "robbery", "true", "false", "a masked man took the cash register"),
            event(60, "fire", "false", "true", "small"),
        ];
        let text = render_summary("police", &events, &Utc);
        assert_eq!(
            text,
            "Channel: police\nStats:\nTotal: 2\nactive: 1\nforces arrival at scene: 1\n\
             Event Reports:\n\n\
             Report_1:\ncity: Liberty City\ndate time: 01/01/1970 00:00:00\n\
             event name: robbery\nsummary:a masked man took the cash ...\n\n\
             Report_2:\ncity: Liberty City\ndate time: 01/01/1970 00:01:00\n\
             event name: fire\nsummary:small\n\n"
        );
    }

    #[test]
    fn empty_summary_has_zero_counts() {
        let text = render_summary("police", &[], &Utc);
        assert_eq!(
            text,
            "Channel: police\nStats:\nTotal: 0\nactive: 0\nforces arrival at scene: 0\n\
             Event Reports:\n\n"
        );
    }

    #[test]
    fn write_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale content that is longer than the new summary".repeat(10)).unwrap();

        let events = vec![event(5, "x", "true", "true", "d")];
        let stats = write_summary(&path, "police", "alice", &events).unwrap();
        assert_eq!(stats.total, 1);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Channel: police\n"));
        assert!(!written.contains("stale"));
        assert!(written.contains("Report_1:\n"));
    }
}
