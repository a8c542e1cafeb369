//! Event records: the payload reported to and received from channels.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{StompError, StompResult};

/// General-information key: whether the incident is still active.
pub const ACTIVE: &str = "active";
/// General-information key: whether forces arrived at the scene.
pub const FORCES_ARRIVAL: &str = "forces_arrival_at_scene";

/// A reported incident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Channel the event is published to (no leading `/`).
    pub channel: String,
    pub name: String,
    pub city: String,
    /// Epoch seconds.
    pub timestamp: i64,
    pub description: String,
    pub general_information: BTreeMap<String, String>,
    /// User who reported the event.
    pub user: String,
}

impl Event {
    /// Value of a general-information flag, `"false"` when absent.
    pub fn flag(&self, key: &str) -> &str {
        self.general_information
            .get(key)
            .map(String::as_str)
            .unwrap_or("false")
    }

    pub fn is_active(&self) -> bool {
        self.flag(ACTIVE) == "true"
    }

    pub fn forces_arrived(&self) -> bool {
        self.flag(FORCES_ARRIVAL) == "true"
    }

    /// Render the `SEND`/`MESSAGE` body for this event.
    pub fn to_body(&self) -> String {
        format!(
            "user:{}\ncity:{}\nevent name:{}\ndate time:{}\ngeneral information:\n\
             \tactive:{}\n\tforces arrival at scene:{}\ndescription:{}\n",
            self.user,
            self.city,
            self.name,
            self.timestamp,
            self.flag(ACTIVE),
            self.flag(FORCES_ARRIVAL),
            self.description,
        )
    }

    /// Parse a `MESSAGE` body published on `channel`.
    ///
    /// Everything after `description:` up to the end of the body belongs to
    /// the description, so it may span several lines.
    pub fn from_body(channel: &str, body: &str) -> StompResult<Self> {
        let mut user = None;
        let mut city = None;
        let mut name = None;
        let mut timestamp = None;
        let mut description = None;
        let mut general_information = BTreeMap::new();

        let mut rest = body;
        while !rest.is_empty() {
            let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
            rest = tail;

            if let Some(value) = line.strip_prefix("description:") {
                let mut text = value.to_string();
                if !rest.is_empty() {
                    text.push('\n');
                    text.push_str(rest);
                }
                while text.ends_with('\n') {
                    text.pop();
                }
                description = Some(text);
                break;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key {
                "user" => user = Some(value.to_string()),
                "city" => city = Some(value.to_string()),
                "event name" => name = Some(value.to_string()),
                "date time" => {
                    let ts = value.trim().parse::<i64>().map_err(|_| {
                        StompError::InvalidMessage(format!("bad date time '{value}'"))
                    })?;
                    timestamp = Some(ts);
                }
                "\tactive" => {
                    general_information.insert(ACTIVE.to_string(), value.trim().to_string());
                }
                "\tforces arrival at scene" => {
                    general_information
                        .insert(FORCES_ARRIVAL.to_string(), value.trim().to_string());
                }
                _ => {}
            }
        }

        let missing = |field: &str| StompError::InvalidMessage(format!("event body missing '{field}'"));
        Ok(Self {
            channel: channel.trim_start_matches('/').to_string(),
            name: name.ok_or_else(|| missing("event name"))?,
            city: city.unwrap_or_default(),
            timestamp: timestamp.ok_or_else(|| missing("date time"))?,
            description: description.unwrap_or_default(),
            general_information,
            user: user.ok_or_else(|| missing("user"))?,
        })
    }
}

/// Sort events by `(timestamp, name)` ascending. The sort is stable.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Parsed contents of an event file.
#[derive(Debug, Clone)]
pub struct EventFile {
    pub channel: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct RawEventFile {
    channel_name: String,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event_name: String,
    #[serde(default)]
    city: String,
    date_time: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    general_information: BTreeMap<String, serde_json::Value>,
}

/// Parse the JSON text of an event file. Events are attributed to `user`.
pub fn parse_events(json: &str, user: &str) -> StompResult<EventFile> {
    let raw: RawEventFile = serde_json::from_str(json)?;
    let channel = raw.channel_name.trim_start_matches('/').to_string();
    if channel.is_empty() {
        return Err(StompError::EventFile("empty channel_name".into()));
    }

    let events = raw
        .events
        .into_iter()
        .map(|e| Event {
            channel: channel.clone(),
            name: e.event_name,
            city: e.city,
            timestamp: e.date_time,
            description: e.description,
            general_information: e
                .general_information
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, v)
                })
                .collect(),
            user: user.to_string(),
        })
        .collect();

    Ok(EventFile { channel, events })
}

/// Read and parse an event file from disk.
pub fn parse_events_file(path: &Path, user: &str) -> StompResult<EventFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StompError::EventFile(format!("cannot read {}: {e}", path.display())))?;
    let file = parse_events(&content, user)?;
    debug!(path = %path.display(), channel = %file.channel, count = file.events.len(), "parsed event file");
    Ok(file)
}
