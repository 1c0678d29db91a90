// src/registry.rs
//
// Authoritative in-memory store of in-flight alerts. All state transitions
// go through this component; the mutex around the map is the single
// serialization point for alert state. No I/O happens under the lock.

use crate::error::{AlertError, CancelOutcome};
use crate::types::{Alert, Contact, Severity};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

pub struct AlertRegistry {
    alerts: Mutex<HashMap<Uuid, Alert>>,
    window: Duration,
}

/// Outcome of folding one incident frame into the registry, decided inside
/// a single critical section so the escalation edge fires at most once.
#[derive(Debug, Clone)]
pub enum IngestDecision {
    Pending { alert: Alert },
    Escalating { alert: Alert },
}

impl AlertRegistry {
    pub fn new(window: Duration) -> Self {
        Self {
            alerts: Mutex::new(HashMap::new()),
            window,
        }
    }

    pub fn pending_window(&self) -> Duration {
        self.window
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Alert>> {
        // A poisoned lock means a panic mid-update elsewhere; the map itself
        // is still usable.
        self.alerts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a fresh alert with evidence_count = 1.
    pub fn create(
        &self,
        contact: Contact,
        severity: Severity,
        image_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Alert {
        let alert = Alert {
            id: Uuid::new_v4(),
            created_at: now,
            contact,
            evidence_count: 1,
            severity,
            cancelled: false,
            notified: false,
            image_ref,
        };
        self.guard().insert(alert.id, alert.clone());
        alert
    }

    pub fn get(&self, id: Uuid) -> Option<Alert> {
        self.guard().get(&id).cloned()
    }

    /// First non-cancelled alert still inside its pending window, if any.
    /// The policy tracks a single global incident channel, so "first match"
    /// is sufficient.
    pub fn find_active(&self, now: DateTime<Utc>) -> Option<Alert> {
        self.guard()
            .values()
            .find(|a| a.is_active(now, self.window))
            .cloned()
    }

    /// Increment evidence on an existing alert. Returns the new count, or
    /// None if the alert is gone.
    pub fn record_evidence(&self, id: Uuid) -> Option<u32> {
        let mut alerts = self.guard();
        let alert = alerts.get_mut(&id)?;
        alert.evidence_count += 1;
        Some(alert.evidence_count)
    }

    /// Idempotent: the notified flag only ever goes false -> true.
    pub fn mark_notified(&self, id: Uuid) {
        if let Some(alert) = self.guard().get_mut(&id) {
            alert.notified = true;
        }
    }

    pub fn mark_cancelled(&self, id: Uuid) -> Result<CancelOutcome, AlertError> {
        let mut alerts = self.guard();
        let alert = alerts.get_mut(&id).ok_or(AlertError::NotFound(id))?;
        if alert.cancelled {
            info!("Alert {} was already cancelled", id);
            return Ok(CancelOutcome::AlreadyCancelled);
        }
        alert.cancelled = true;
        info!("Alert {} marked as CANCELLED by user", id);
        Ok(CancelOutcome::Cancelled)
    }

    /// Remove every non-cancelled alert whose window has elapsed. Cancelled
    /// entries are deliberately left in place; this mirrors the established
    /// lifecycle where only the expiry path prunes.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut alerts = self.guard();
        let expired: Vec<Uuid> = alerts
            .iter()
            .filter(|(_, a)| !a.cancelled && now - a.created_at >= self.window)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            alerts.remove(id);
            info!("Alert {} expired without cancellation or dispatch", id);
        }
        expired
    }

    /// All alerts currently inside their window and not cancelled.
    pub fn snapshot_active(&self, now: DateTime<Utc>) -> Vec<Alert> {
        self.guard()
            .values()
            .filter(|a| a.is_active(now, self.window))
            .cloned()
            .collect()
    }

    /// Fold one incident frame in: match the active alert or open a new one,
    /// bump evidence, overwrite severity/image_ref, and claim the escalation
    /// edge if the threshold was just crossed. Runs entirely under one lock
    /// guard so a concurrent frame cannot double-claim.
    pub fn observe_incident(
        &self,
        contact: &Contact,
        severity: Severity,
        image_ref: Option<String>,
        now: DateTime<Utc>,
        min_evidence: u32,
    ) -> IngestDecision {
        let mut alerts = self.guard();

        let active_id = alerts
            .values()
            .find(|a| a.is_active(now, self.window))
            .map(|a| a.id);

        if let Some(id) = active_id {
            // Entry is guaranteed present: we hold the lock.
            if let Some(alert) = alerts.get_mut(&id) {
                alert.evidence_count += 1;
                alert.severity = severity;
                if image_ref.is_some() {
                    alert.image_ref = image_ref;
                }
                if alert.evidence_count >= min_evidence && !alert.notified {
                    alert.notified = true;
                    return IngestDecision::Escalating {
                        alert: alert.clone(),
                    };
                }
                return IngestDecision::Pending {
                    alert: alert.clone(),
                };
            }
            warn!("Active alert {} vanished mid-ingest", id);
        }

        let mut alert = Alert {
            id: Uuid::new_v4(),
            created_at: now,
            contact: contact.clone(),
            evidence_count: 1,
            severity,
            cancelled: false,
            notified: false,
            image_ref,
        };

        if min_evidence <= 1 {
            alert.notified = true;
            alerts.insert(alert.id, alert.clone());
            return IngestDecision::Escalating { alert };
        }

        alerts.insert(alert.id, alert.clone());
        IngestDecision::Pending { alert }
    }
}
