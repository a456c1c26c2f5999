//! Log records: decision entries and phase brackets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a logged decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Initial session placement.
    Placement,
    /// GA/PSO fitness change.
    Optimization,
    /// Constraint enforcement.
    Constraint,
    /// Priority-based displacement.
    Preemption,
    Conflict,
    /// Recorded by a caller, outside the pipeline.
    Manual,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Placement => "PLACEMENT",
            Self::Optimization => "OPTIMIZATION",
            Self::Constraint => "CONSTRAINT",
            Self::Preemption => "PREEMPTION",
            Self::Conflict => "CONFLICT",
            Self::Manual => "MANUAL",
        };
        f.write_str(name)
    }
}

/// One logged decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationEntry {
    /// `exp_{n}`, unique within one log.
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// One-line description.
    pub summary: String,
    pub details: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ExplanationEntry {
    /// Reads a string detail.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

/// Index of a phase within its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseId(pub(crate) usize);

/// A bracketed unit of work and the entries logged inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub name: String,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    /// Set by `end_phase`.
    pub summary: Option<String>,
    /// Ids of entries logged while the phase was open.
    pub entry_ids: Vec<String>,
}

impl PhaseRecord {
    pub(crate) fn open(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            summary: None,
            entry_ids: Vec::new(),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub(crate) fn close(&mut self, summary: Option<String>) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0));
        self.ended_at = Some(now);
        if summary.is_some() {
            self.summary = summary;
        }
    }
}
