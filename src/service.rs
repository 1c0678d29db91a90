// src/service.rs
//
// Ties the classifier, aggregator, registry and dispatcher together and
// owns the side effects of escalation: notification dispatch and the
// deferred cancellation check both run as spawned tasks so the frame
// submission path never blocks on network I/O.

use crate::aggregator::{Aggregator, AggregatorResult};
use crate::classifier::classify;
use crate::error::{AlertError, CancelOutcome};
use crate::metrics::AlertMetrics;
use crate::notifier::Dispatcher;
use crate::registry::AlertRegistry;
use crate::types::{Alert, AlertStatus, Config, Contact, Detection, DetectionConfig};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AlertService {
    registry: Arc<AlertRegistry>,
    aggregator: Aggregator,
    dispatcher: Arc<Dispatcher>,
    metrics: AlertMetrics,
    detection: DetectionConfig,
    pending_window: Duration,
}

/// Terminal outcome recorded when the pending window elapses after an
/// escalation. Purely observational: nothing is deleted or mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    ConfirmedIncident,
    CancelledByUser,
    NotFound,
}

/// Read the live cancelled flag at fire time. This is the only
/// synchronized access the timer performs; no lock is held while waiting.
pub fn resolve_timer_outcome(registry: &AlertRegistry, id: Uuid) -> TimerOutcome {
    match registry.get(id) {
        Some(alert) if alert.cancelled => TimerOutcome::CancelledByUser,
        Some(_) => TimerOutcome::ConfirmedIncident,
        None => TimerOutcome::NotFound,
    }
}

impl AlertService {
    pub fn new(config: &Config) -> Result<Self> {
        let window_seconds = config.alerting.pending_window_seconds;
        let registry = Arc::new(AlertRegistry::new(chrono::Duration::seconds(
            window_seconds as i64,
        )));
        let aggregator = Aggregator::new(
            Arc::clone(&registry),
            config.detection.min_crash_detections_required,
        );
        let dispatcher = Arc::new(Dispatcher::new(
            &config.sms,
            &config.email,
            config.location.clone(),
            window_seconds,
        )?);

        Ok(Self {
            registry,
            aggregator,
            dispatcher,
            metrics: AlertMetrics::new(),
            detection: config.detection.clone(),
            pending_window: Duration::from_secs(window_seconds),
        })
    }

    pub fn metrics(&self) -> &AlertMetrics {
        &self.metrics
    }

    /// Classify one frame's detections and fold the verdict into the alert
    /// state. On an escalation edge this schedules dispatch and the
    /// cancellation timer before returning; neither is awaited here.
    pub fn submit_frame(
        &self,
        detections: &[Detection],
        contact: Contact,
        image_ref: Option<String>,
    ) -> AggregatorResult {
        self.metrics.inc(&self.metrics.frames_processed);

        let frame = classify(detections, image_ref, &self.detection);
        if frame.incident_detected {
            self.metrics.inc(&self.metrics.incident_frames);
        }

        let result = self.aggregator.ingest(&frame, &contact, Utc::now());

        match &result {
            AggregatorResult::NoIncident { swept } => {
                self.metrics.add(&self.metrics.alerts_swept, swept.len() as u64);
            }
            AggregatorResult::Pending { alert } => {
                if alert.evidence_count == 1 {
                    self.metrics.inc(&self.metrics.alerts_created);
                }
            }
            AggregatorResult::Escalating { alert } => {
                if alert.evidence_count == 1 {
                    self.metrics.inc(&self.metrics.alerts_created);
                }
                self.metrics.inc(&self.metrics.escalations);
                self.on_escalation(alert.clone());
            }
        }

        result
    }

    /// Fire-and-forget side effects for a freshly claimed escalation. The
    /// alert snapshot is immutable from here on; only the timer consults
    /// live state again.
    fn on_escalation(&self, alert: Alert) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let metrics = self.metrics.clone();
        let snapshot = alert.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&snapshot).await;
            if !outcome.sms_ok {
                metrics.inc(&metrics.sms_failures);
            }
            if !outcome.email_ok {
                metrics.inc(&metrics.email_failures);
            }
            if outcome.total_failure() {
                metrics.inc(&metrics.total_dispatch_failures);
            }
        });

        let registry = Arc::clone(&self.registry);
        let metrics = self.metrics.clone();
        let window = self.pending_window;
        let id = alert.id;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            match resolve_timer_outcome(&registry, id) {
                TimerOutcome::ConfirmedIncident => {
                    metrics.inc(&metrics.confirmed_incidents);
                    warn!(
                        "Alert {} was NOT cancelled within {}s, assuming confirmed incident",
                        id,
                        window.as_secs()
                    );
                }
                TimerOutcome::CancelledByUser => {
                    metrics.inc(&metrics.cancelled_by_user);
                    info!("Alert {} was successfully cancelled by user", id);
                }
                TimerOutcome::NotFound => {
                    warn!("Alert {} not found during cancellation check", id);
                }
            }
        });
    }

    pub fn cancel(&self, id: Uuid) -> Result<CancelOutcome, AlertError> {
        let outcome = self.registry.mark_cancelled(id)?;
        if outcome == CancelOutcome::Cancelled {
            self.metrics.inc(&self.metrics.cancellations);
        }
        Ok(outcome)
    }

    /// Point-in-time view of one alert: the record, its derived status and
    /// whether it is still active.
    pub fn status(&self, id: Uuid) -> Result<(Alert, AlertStatus, bool), AlertError> {
        let alert = self.registry.get(id).ok_or(AlertError::NotFound(id))?;
        let now = Utc::now();
        let window = self.registry.pending_window();
        let status = alert.status(now, window);
        let active = alert.is_active(now, window);
        Ok((alert, status, active))
    }

    pub fn list_active(&self) -> Vec<Alert> {
        self.registry.snapshot_active(Utc::now())
    }

    /// Background reaper for memory hygiene under incident-only traffic,
    /// using the same removal predicate as the on-path sweep. Status
    /// semantics are unchanged: expired alerts already read as not-found.
    pub fn spawn_reaper(&self, interval_seconds: u64) {
        let registry = Arc::clone(&self.registry);
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = registry.sweep_expired(Utc::now());
                if !removed.is_empty() {
                    info!("Reaper pruned {} expired alert(s)", removed.len());
                    metrics.add(&metrics.alerts_swept, removed.len() as u64);
                }
            }
        });
    }
}
