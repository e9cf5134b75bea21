//! Events published by the executor while a run is in flight.
//!
//! For one run the order is always `Started`, zero or more `Progress`
//! (non-decreasing values), then exactly one `Completion`. A run cancelled
//! before a worker picked it up skips `Started` and `Progress`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RunId;
use super::state::EntityKind;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedEvent {
    pub name: String,
    pub kind: EntityKind,
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub name: String,
    pub kind: EntityKind,
    pub run_id: RunId,
    /// Percentage in `0..=100`.
    pub value: u8,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub name: String,
    pub kind: EntityKind,
    pub run_id: RunId,
    pub status: CompletionStatus,
    /// Set for failed runs (`"cancelled"` for cancellations).
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorEvent {
    Started(StartedEvent),
    Progress(ProgressEvent),
    Completion(CompletionEvent),
}

impl ExecutorEvent {
    pub fn name(&self) -> &str {
        match self {
            ExecutorEvent::Started(e) => &e.name,
            ExecutorEvent::Progress(e) => &e.name,
            ExecutorEvent::Completion(e) => &e.name,
        }
    }

    pub fn run_id(&self) -> RunId {
        match self {
            ExecutorEvent::Started(e) => e.run_id,
            ExecutorEvent::Progress(e) => e.run_id,
            ExecutorEvent::Completion(e) => e.run_id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            ExecutorEvent::Started(e) => e.kind,
            ExecutorEvent::Progress(e) => e.kind,
            ExecutorEvent::Completion(e) => e.kind,
        }
    }

    pub fn as_completion(&self) -> Option<&CompletionEvent> {
        match self {
            ExecutorEvent::Completion(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<&ProgressEvent> {
        match self {
            ExecutorEvent::Progress(e) => Some(e),
            _ => None,
        }
    }
}
