//! In-flight operation tracking
//!
//! Replaces a single shared "loading" boolean: every service call takes an
//! [`InFlight`] guard, which records a per-operation report and releases the
//! in-flight count when dropped, whichever way the call ends.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Refresh,
    Borrow,
    Return,
    CreateTool,
    UpdateTool,
    DeleteTool,
    Reconcile,
    PruneBorrowers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Counts running operations and keeps the latest report per operation kind
#[derive(Debug, Default)]
pub struct ActivityTracker {
    in_flight: AtomicUsize,
    latest: DashMap<OperationKind, OperationReport>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, kind: OperationKind) -> InFlight<'_> {
        let report = OperationReport {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            status: OperationStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.latest.insert(kind, report.clone());

        InFlight {
            tracker: self,
            report,
            finished: false,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Aggregate flag for UIs that only show a spinner
    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn latest(&self, kind: OperationKind) -> Option<OperationReport> {
        self.latest.get(&kind).map(|entry| entry.value().clone())
    }

    /// Latest report of every kind seen so far, most recent first
    pub fn reports(&self) -> Vec<OperationReport> {
        let mut reports: Vec<OperationReport> = self
            .latest
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        reports
    }

    fn record(&self, report: &OperationReport) {
        // A newer operation of the same kind may have started meanwhile
        if let Some(mut current) = self.latest.get_mut(&report.kind) {
            if current.id == report.id {
                *current = report.clone();
            }
        }
    }
}

/// Guard for one running operation
#[derive(Debug)]
pub struct InFlight<'a> {
    tracker: &'a ActivityTracker,
    report: OperationReport,
    finished: bool,
}

impl InFlight<'_> {
    pub fn id(&self) -> &str {
        &self.report.id
    }

    /// Record the outcome and release the guard
    pub fn finish<T>(mut self, result: &Result<T, DomainError>) -> OperationReport {
        self.report.status = match result {
            Ok(_) => OperationStatus::Succeeded,
            Err(e) => OperationStatus::Failed {
                error: e.to_string(),
            },
        };
        self.report.finished_at = Some(Utc::now());
        self.finished = true;
        self.tracker.record(&self.report);
        self.report.clone()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Future dropped before completion
            self.report.status = OperationStatus::Failed {
                error: "operation abandoned".to_string(),
            };
            self.report.finished_at = Some(Utc::now());
            self.tracker.record(&self.report);
        }
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
