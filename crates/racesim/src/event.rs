//! Events reported to the remote collector.

use std::fmt;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One submission to the remote event sink.
///
/// Immutable once built; ownership moves into the dispatch pipeline on submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub key: String,
    pub payload: Value,
    pub collection: String,
    pub priority: bool,
    /// Routing hint for sticky worker assignment (the athlete's race number).
    pub route: Option<u64>,
}

impl Event {
    pub fn new(key: impl Into<String>, payload: Value, collection: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload,
            collection: collection.into(),
            priority: false,
            route: None,
        }
    }

    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    pub fn routed_by(mut self, route: u64) -> Self {
        self.route = Some(route);
        self
    }
}

/// Race-of-record facts. Each one is a priority event in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RaceStart,
    EnterT1,
    BikeStart,
    EnterT2,
    RunStart,
    RaceFinish,
    SwimMat(usize),
    BikeMat(usize),
    RunMat(usize),
    Dnf,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RaceStart => f.write_str("RaceStart"),
            EventKind::EnterT1 => f.write_str("EnterT1"),
            EventKind::BikeStart => f.write_str("BikeStart"),
            EventKind::EnterT2 => f.write_str("EnterT2"),
            EventKind::RunStart => f.write_str("RunStart"),
            EventKind::RaceFinish => f.write_str("RaceFinish"),
            EventKind::SwimMat(n) => write!(f, "SwimTM{n}"),
            EventKind::BikeMat(n) => write!(f, "BikeTM{n}"),
            EventKind::RunMat(n) => write!(f, "RunTM{n}"),
            EventKind::Dnf => f.write_str("DNF"),
        }
    }
}

/// Collection names derived from the race identifier.
#[derive(Debug, Clone)]
pub struct Collections {
    race_id: String,
}

impl Collections {
    pub const RACE_LIST: &'static str = "racelist";

    pub fn new(race_id: impl Into<String>) -> Self {
        Self {
            race_id: race_id.into(),
        }
    }

    pub fn race_id(&self) -> &str {
        &self.race_id
    }

    pub fn for_kind(&self, kind: EventKind) -> String {
        format!("{}-{kind}", self.race_id)
    }

    pub fn locations(&self) -> String {
        format!("{}-locations", self.race_id)
    }

    pub fn race_numbers(&self) -> String {
        format!("{}-racenumbers", self.race_id)
    }

    /// Priority event recording `kind` for athlete `race_num` at `at`.
    pub fn fact(&self, kind: EventKind, race_num: u32, at: OffsetDateTime) -> Event {
        Event::new(
            race_num.to_string(),
            Value::String(format_timestamp(at)),
            self.for_kind(kind),
        )
        .with_priority(true)
        .routed_by(race_num as u64)
    }
}

/// Non-blocking event intake, implemented by the dispatcher.
///
/// `report` must only enqueue; it may never wait on the sink.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);

    /// Events queued but not yet delivered. Advisory only.
    fn backlog(&self) -> usize;
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// Percent-encodes everything outside the URL-safe unreserved set.
pub fn encode_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_collection_names() {
        let c = Collections::new("2024-10-12-1");
        assert_eq!(c.for_kind(EventKind::RaceStart), "2024-10-12-1-RaceStart");
        assert_eq!(c.for_kind(EventKind::BikeMat(3)), "2024-10-12-1-BikeTM3");
        assert_eq!(c.for_kind(EventKind::Dnf), "2024-10-12-1-DNF");
        assert_eq!(c.locations(), "2024-10-12-1-locations");
    }

    #[test]
    fn test_fact_is_priority_and_routed() {
        let c = Collections::new("r");
        let at = datetime!(2024-10-12 06:25:00 UTC);
        let event = c.fact(EventKind::EnterT1, 42, at);
        assert!(event.priority);
        assert_eq!(event.route, Some(42));
        assert_eq!(event.key, "42");
        assert_eq!(event.payload, Value::String("2024-10-12T06:25:00Z".into()));
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("abc-1.2"), "abc-1.2");
        assert_eq!(encode_key("a b/c"), "a+b%2Fc");
    }
}
