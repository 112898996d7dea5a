//! Persistence seam for discrepancy alerts.
//!
//! Storage is owned by an external collaborator; the pipeline only hands
//! alerts over and never lets a persistence failure change its result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::models::DiscrepancyAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// An alert as handed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAlert {
    pub artist_id: String,
    pub severity: AlertSeverity,
    pub alert: DiscrepancyAlert,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn persist(&self, alert: StoredAlert) -> anyhow::Result<()>;

    /// Most recent alerts first. Sinks that cannot read back return nothing.
    async fn recent(&self, _limit: usize) -> anyhow::Result<Vec<StoredAlert>> {
        Ok(Vec::new())
    }
}

pub const DEFAULT_ALERT_CAPACITY: usize = 1000;

/// Keeps the newest `capacity` alerts in process memory.
pub struct InMemoryAlertSink {
    capacity: usize,
    alerts: Mutex<VecDeque<StoredAlert>>,
}

impl Default for InMemoryAlertSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ALERT_CAPACITY)
    }
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            alerts: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn persist(&self, alert: StoredAlert) -> anyhow::Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut alerts = self.alerts.lock().unwrap();
        while alerts.len() >= self.capacity {
            alerts.pop_front();
        }
        alerts.push_back(alert);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<StoredAlert>> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.iter().rev().take(limit).cloned().collect())
    }
}
