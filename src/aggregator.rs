// src/aggregator.rs
//
// Converts a stream of noisy per-frame verdicts into deduplicated alert
// transitions. One logical incident channel: concurrent incident frames
// fold into the same open alert instead of spawning parallel ones.

use crate::registry::{AlertRegistry, IngestDecision};
use crate::types::{Alert, ClassifiedFrame, Contact};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Aggregator {
    registry: Arc<AlertRegistry>,
    min_evidence: u32,
}

#[derive(Debug, Clone)]
pub enum AggregatorResult {
    /// Clean frame. Carries the ids pruned by the opportunistic sweep.
    NoIncident { swept: Vec<Uuid> },
    /// An alert exists (or was just opened) but evidence is still below the
    /// escalation threshold, or escalation already happened earlier.
    Pending { alert: Alert },
    /// Evidence just crossed the threshold for the first time. The caller
    /// is responsible for scheduling dispatch and the cancellation timer.
    Escalating { alert: Alert },
}

impl Aggregator {
    pub fn new(registry: Arc<AlertRegistry>, min_evidence: u32) -> Self {
        if min_evidence == 0 {
            warn!("min_evidence of 0 behaves like 1: every incident frame escalates");
        }
        Self {
            registry,
            min_evidence,
        }
    }

    /// Process one classified frame. Synchronous; never blocks on I/O.
    pub fn ingest(
        &self,
        frame: &ClassifiedFrame,
        contact: &Contact,
        now: DateTime<Utc>,
    ) -> AggregatorResult {
        if !frame.incident_detected {
            // The no-incident path doubles as the opportunistic sweep.
            let swept = self.registry.sweep_expired(now);
            return AggregatorResult::NoIncident { swept };
        }

        let decision = self.registry.observe_incident(
            contact,
            frame.severity,
            frame.image_ref.clone(),
            now,
            self.min_evidence,
        );

        match decision {
            IngestDecision::Pending { alert } => {
                if alert.evidence_count == 1 {
                    info!("New potential alert created: {}", alert.id);
                } else {
                    info!(
                        "Existing alert {} - consecutive detections: {}",
                        alert.id, alert.evidence_count
                    );
                }
                AggregatorResult::Pending { alert }
            }
            IngestDecision::Escalating { alert } => {
                info!(
                    "Alert {} crossed escalation threshold ({} detections, severity {})",
                    alert.id, alert.evidence_count, alert.severity
                );
                AggregatorResult::Escalating { alert }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::types::{Detection, DetectionConfig, Severity};
    use chrono::Duration;

    fn contact() -> Contact {
        Contact {
            phone: "9999999999".to_string(),
            email: "contact@example.com".to_string(),
        }
    }

    fn det(confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            confidence,
            bbox: None,
        }
    }

    fn incident_frame() -> ClassifiedFrame {
        classify(&[det(0.9)], None, &DetectionConfig::default())
    }

    fn clean_frame() -> ClassifiedFrame {
        classify(&[], None, &DetectionConfig::default())
    }

    fn aggregator(min_evidence: u32) -> (Aggregator, Arc<AlertRegistry>) {
        let registry = Arc::new(AlertRegistry::new(Duration::seconds(60)));
        (Aggregator::new(Arc::clone(&registry), min_evidence), registry)
    }

    #[test]
    fn test_three_frame_escalation_scenario() {
        let (agg, _) = aggregator(3);
        let now = Utc::now();
        let c = contact();

        let r1 = agg.ingest(&incident_frame(), &c, now);
        let id = match r1 {
            AggregatorResult::Pending { ref alert } => {
                assert_eq!(alert.evidence_count, 1);
                assert_eq!(alert.severity, Severity::Moderate);
                alert.id
            }
            _ => panic!("frame 1 must be pending"),
        };

        match agg.ingest(&incident_frame(), &c, now) {
            AggregatorResult::Pending { alert } => {
                assert_eq!(alert.id, id);
                assert_eq!(alert.evidence_count, 2);
            }
            _ => panic!("frame 2 must be pending"),
        }

        match agg.ingest(&incident_frame(), &c, now) {
            AggregatorResult::Escalating { alert } => {
                assert_eq!(alert.id, id);
                assert_eq!(alert.evidence_count, 3);
                assert!(alert.notified);
            }
            _ => panic!("frame 3 must escalate"),
        }
    }

    #[test]
    fn test_no_double_escalation_on_continued_evidence() {
        let (agg, _) = aggregator(3);
        let now = Utc::now();
        let c = contact();

        for _ in 0..3 {
            agg.ingest(&incident_frame(), &c, now);
        }
        for _ in 0..5 {
            match agg.ingest(&incident_frame(), &c, now) {
                AggregatorResult::Pending { alert } => assert!(alert.notified),
                _ => panic!("already-escalated alert must stay pending"),
            }
        }
    }

    #[test]
    fn test_immediate_escalation_on_severe_single_frame() {
        let (agg, _) = aggregator(1);
        let now = Utc::now();

        let frame = classify(
            &[det(0.9), det(0.8)],
            None,
            &DetectionConfig::default(),
        );
        assert_eq!(frame.severity, Severity::Severe);

        match agg.ingest(&frame, &contact(), now) {
            AggregatorResult::Escalating { alert } => {
                assert_eq!(alert.evidence_count, 1);
                assert_eq!(alert.severity, Severity::Severe);
            }
            _ => panic!("threshold 1 must escalate on frame 1"),
        }
    }

    #[test]
    fn test_cancel_between_frames_blocks_escalation() {
        let (agg, registry) = aggregator(3);
        let now = Utc::now();
        let c = contact();

        agg.ingest(&incident_frame(), &c, now);
        agg.ingest(&incident_frame(), &c, now);
        let first = registry.find_active(now).unwrap();
        registry.mark_cancelled(first.id).unwrap();

        match agg.ingest(&incident_frame(), &c, now) {
            AggregatorResult::Pending { alert } => {
                assert_ne!(alert.id, first.id);
                assert_eq!(alert.evidence_count, 1);
                assert!(!alert.notified);
            }
            _ => panic!("cancelled alerts never re-open or escalate"),
        }
    }

    #[test]
    fn test_no_incident_frame_sweeps_expired_alert() {
        let (agg, registry) = aggregator(3);
        let t0 = Utc::now();
        let c = contact();

        agg.ingest(&incident_frame(), &c, t0);
        let pending = registry.find_active(t0).unwrap();

        // Past the window with no further evidence: the next clean frame
        // prunes it.
        let t1 = t0 + Duration::seconds(61);
        match agg.ingest(&clean_frame(), &c, t1) {
            AggregatorResult::NoIncident { swept } => assert_eq!(swept, vec![pending.id]),
            _ => panic!("clean frame expected"),
        }
        assert!(registry.get(pending.id).is_none());
    }

    #[test]
    fn test_no_incident_frame_leaves_live_alert_alone() {
        let (agg, registry) = aggregator(3);
        let now = Utc::now();
        let c = contact();

        agg.ingest(&incident_frame(), &c, now);
        let pending = registry.find_active(now).unwrap();

        match agg.ingest(&clean_frame(), &c, now + Duration::seconds(5)) {
            AggregatorResult::NoIncident { swept } => assert!(swept.is_empty()),
            _ => panic!("clean frame expected"),
        }
        // Evidence is never decremented by absence of detection
        assert_eq!(registry.get(pending.id).unwrap().evidence_count, 1);
    }

    #[test]
    fn test_expired_alert_is_not_extended_by_new_evidence() {
        let (agg, registry) = aggregator(3);
        let t0 = Utc::now();
        let c = contact();

        agg.ingest(&incident_frame(), &c, t0);
        let first = registry.find_active(t0).unwrap();

        // Evidence past the window opens a fresh alert instead
        let t1 = t0 + Duration::seconds(61);
        match agg.ingest(&incident_frame(), &c, t1) {
            AggregatorResult::Pending { alert } => {
                assert_ne!(alert.id, first.id);
                assert_eq!(alert.evidence_count, 1);
            }
            _ => panic!("expired alert must not accumulate evidence"),
        }
    }

    #[test]
    fn test_severity_downgrade_is_preserved() {
        let (agg, registry) = aggregator(5);
        let now = Utc::now();
        let c = contact();

        let severe = classify(&[det(0.9), det(0.8)], None, &DetectionConfig::default());
        let moderate = incident_frame();

        agg.ingest(&severe, &c, now);
        agg.ingest(&moderate, &c, now);

        let alert = registry.find_active(now).unwrap();
        assert_eq!(alert.severity, Severity::Moderate);
    }
}
