use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info};

/// Type of vault event being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditEventType {
    Upstream,
    Downstream,
    Rekey,
    ProofOfAccess,
    Error,
}

/// Record of a vault operation
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub event_type: AuditEventType,
    pub operation_id: String,
    pub secret_id: Option<u32>,
    pub message: String,
    pub timestamp: String, // RFC3339
}

impl AuditRecord {
    pub fn new(event_type: AuditEventType, operation_id: &str, secret_id: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            event_type,
            operation_id: operation_id.to_string(),
            secret_id,
            message: message.into(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn event_type_label(&self) -> &'static str {
        match self.event_type {
            AuditEventType::Upstream => "UPSTREAM",
            AuditEventType::Downstream => "DOWNSTREAM",
            AuditEventType::Rekey => "REKEY",
            AuditEventType::ProofOfAccess => "PROOF",
            AuditEventType::Error => "ERROR",
        }
    }
}

/// Bounded in-memory audit trail, oldest entries evicted first
#[derive(Debug)]
pub struct AuditTracker {
    records: Mutex<VecDeque<AuditRecord>>,
    max_entries: usize,
}

impl AuditTracker {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    /// Record a new event in the audit log
    pub fn log(&self, record: AuditRecord) {
        let secret = record.secret_id.map_or(String::new(), |id| format!(" (secret #{id})"));
        if record.event_type == AuditEventType::Error {
            error!(operation_id = %record.operation_id, "AUDIT [{}]{} :: {}", record.event_type_label(), secret, record.message);
        } else {
            info!(operation_id = %record.operation_id, "AUDIT [{}]{} :: {}", record.event_type_label(), secret, record.message);
        }

        let mut records = self.lock();
        if records.len() == self.max_entries {
            records.pop_front(); // evict oldest
        }
        records.push_back(record);
    }

    /// Most recent records, newest first
    pub fn recent(&self, count: usize) -> Vec<AuditRecord> {
        self.lock().iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole trail, oldest first, as a JSON array
    pub fn export_json(&self) -> serde_json::Result<String> {
        let records = self.lock();
        serde_json::to_string(&*records)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditRecord>> {
        // records are pushed whole, so a poisoned lock still guards a consistent ring
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AuditTracker {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Helper to get current timestamp as RFC3339 string
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
