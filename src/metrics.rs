// src/metrics.rs
//
// Operational counters for the alerting pipeline. Exported via the
// /metrics endpoint and periodic logs. TotalDispatchFailure gets its own
// counter so the alerting system itself can be alerted on.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AlertMetrics {
    pub frames_processed: Arc<AtomicU64>,
    pub incident_frames: Arc<AtomicU64>,
    pub alerts_created: Arc<AtomicU64>,
    pub escalations: Arc<AtomicU64>,
    pub cancellations: Arc<AtomicU64>,
    pub alerts_swept: Arc<AtomicU64>,
    pub sms_failures: Arc<AtomicU64>,
    pub email_failures: Arc<AtomicU64>,
    pub total_dispatch_failures: Arc<AtomicU64>,
    pub confirmed_incidents: Arc<AtomicU64>,
    pub cancelled_by_user: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AlertMetrics {
    pub fn new() -> Self {
        Self {
            frames_processed: Arc::new(AtomicU64::new(0)),
            incident_frames: Arc::new(AtomicU64::new(0)),
            alerts_created: Arc::new(AtomicU64::new(0)),
            escalations: Arc::new(AtomicU64::new(0)),
            cancellations: Arc::new(AtomicU64::new(0)),
            alerts_swept: Arc::new(AtomicU64::new(0)),
            sms_failures: Arc::new(AtomicU64::new(0)),
            email_failures: Arc::new(AtomicU64::new(0)),
            total_dispatch_failures: Arc::new(AtomicU64::new(0)),
            confirmed_incidents: Arc::new(AtomicU64::new(0)),
            cancelled_by_user: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            incident_frames: self.incident_frames.load(Ordering::Relaxed),
            alerts_created: self.alerts_created.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            alerts_swept: self.alerts_swept.load(Ordering::Relaxed),
            sms_failures: self.sms_failures.load(Ordering::Relaxed),
            email_failures: self.email_failures.load(Ordering::Relaxed),
            total_dispatch_failures: self.total_dispatch_failures.load(Ordering::Relaxed),
            confirmed_incidents: self.confirmed_incidents.load(Ordering::Relaxed),
            cancelled_by_user: self.cancelled_by_user.load(Ordering::Relaxed),
        }
    }
}

impl Default for AlertMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub uptime_seconds: u64,
    pub frames_processed: u64,
    pub incident_frames: u64,
    pub alerts_created: u64,
    pub escalations: u64,
    pub cancellations: u64,
    pub alerts_swept: u64,
    pub sms_failures: u64,
    pub email_failures: u64,
    pub total_dispatch_failures: u64,
    pub confirmed_incidents: u64,
    pub cancelled_by_user: u64,
}
