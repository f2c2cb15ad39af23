use crate::errors::{AppError, AppResult};
use crate::stability::StabilityScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Positive,
    Negative,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" | "+" => Ok(Self::Positive),
            "negative" | "-" => Ok(Self::Negative),
            other => Err(AppError::ValidationRejected(format!("unknown event kind: {other}"))),
        }
    }
}

/// One logged occurrence. Fields are private so a created event cannot be
/// edited afterwards; deserialization goes through the same checks as `at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "EventRecord")]
pub struct Event {
    kind: EventKind,
    emotion: String,
    habit: String,
    occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, emotion: &str, habit: &str) -> AppResult<Self> {
        Self::at(kind, emotion, habit, Utc::now())
    }

    pub fn at(kind: EventKind, emotion: &str, habit: &str, occurred_at: DateTime<Utc>) -> AppResult<Self> {
        if emotion.trim().is_empty() {
            return Err(AppError::ValidationRejected("emotion must be selected".to_string()));
        }
        if habit.trim().is_empty() {
            return Err(AppError::ValidationRejected("habit must be selected".to_string()));
        }
        Ok(Self {
            kind,
            emotion: emotion.to_string(),
            habit: habit.to_string(),
            occurred_at,
        })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn emotion(&self) -> &str {
        &self.emotion
    }

    pub fn habit(&self) -> &str {
        &self.habit
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    kind: EventKind,
    emotion: String,
    habit: String,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<EventRecord> for Event {
    type Error = AppError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        Self::at(record.kind, &record.emotion, &record.habit, record.occurred_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "LinkRecord")]
pub struct Link {
    name: String,
    history: Vec<Event>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkRecord {
    name: String,
    #[serde(default)]
    history: Vec<Event>,
}

impl TryFrom<LinkRecord> for Link {
    type Error = AppError;

    fn try_from(record: LinkRecord) -> Result<Self, Self::Error> {
        if record.name.trim().is_empty() {
            return Err(AppError::ValidationRejected("link name cannot be empty".to_string()));
        }
        Ok(Self {
            name: record.name,
            history: record.history,
        })
    }
}

impl Link {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.history.push(event);
    }

    pub fn summary(&self, index: usize) -> LinkSummary {
        let positive = self
            .history
            .iter()
            .filter(|event| event.kind() == EventKind::Positive)
            .count();
        LinkSummary {
            index,
            name: self.name.clone(),
            event_count: self.history.len(),
            positive_count: positive,
            negative_count: self.history.len() - positive,
            last_event_at: self.history.last().map(Event::occurred_at),
        }
    }
}

/// Full persisted state as read back from a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub stability_score: StabilityScore,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// What the store hands to a gateway; the gateway assigns `capturedAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub stability_score: StabilityScore,
    pub links: Vec<Link>,
}

impl SnapshotPayload {
    pub fn into_snapshot(self, captured_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            captured_at,
            stability_score: self.stability_score,
            links: self.links,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReceipt {
    pub id: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSummary {
    pub index: usize,
    pub name: String,
    pub event_count: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerView {
    pub loaded: bool,
    pub stability_score: StabilityScore,
    pub links: Vec<LinkSummary>,
    pub save_pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub autosave_delay_ms: u64,
    pub strict_vocabulary: bool,
    pub skip_empty_snapshots: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            autosave_delay_ms: 2_000,
            strict_vocabulary: false,
            skip_empty_snapshots: false,
        }
    }
}
