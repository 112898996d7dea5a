//! Bounded, append-only log of pipeline runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Normalize,
    Reconcile,
    DiscrepancyCheck,
    Forecast,
    HealthScore,
    Insights,
    AuditReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    pub run_id: Uuid,
    pub kind: RunKind,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub records: usize,
    pub flagged: usize,
}

/// Keeps the most recent `capacity` entries; older ones fall off the front.
pub struct RunLog {
    capacity: usize,
    entries: Mutex<VecDeque<RunLogEntry>>,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn append(&self, entry: RunLogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<RunLogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
