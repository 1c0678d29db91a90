// src/classifier.rs
//
// Reduces a raw detection set to an incident-in-frame signal plus a
// severity grade. Absence of detections is a normal result, not a failure.

use crate::types::{ClassifiedFrame, Detection, DetectionConfig, Severity};
use tracing::debug;

/// Classify one frame's detections against the incident class and
/// confidence threshold.
///
/// Severity rule: two or more qualifying detections grade `severe`, exactly
/// one grades `moderate`. The `minor` fallback is unreachable under this
/// rule but kept for compatibility with the established grading contract.
pub fn classify(
    detections: &[Detection],
    image_ref: Option<String>,
    config: &DetectionConfig,
) -> ClassifiedFrame {
    let qualifying: Vec<&Detection> = detections
        .iter()
        .filter(|d| {
            d.class_id == config.incident_class_id && d.confidence > config.crash_conf_threshold
        })
        .collect();

    if qualifying.is_empty() {
        return ClassifiedFrame {
            incident_detected: false,
            severity: Severity::None,
            image_ref: None,
        };
    }

    let severity = match qualifying.len() {
        n if n >= 2 => Severity::Severe,
        1 => Severity::Moderate,
        _ => Severity::Minor,
    };

    debug!(
        "Incident frame: {} qualifying detection(s), severity={}",
        qualifying.len(),
        severity
    );

    ClassifiedFrame {
        incident_detected: true,
        severity,
        image_ref,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: None,
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    #[test]
    fn test_no_detections_is_clean_frame() {
        let frame = classify(&[], None, &config());
        assert!(!frame.incident_detected);
        assert_eq!(frame.severity, Severity::None);
        assert!(frame.image_ref.is_none());
    }

    #[test]
    fn test_single_confident_detection_is_moderate() {
        let frame = classify(&[det(0, 0.9)], Some("frame_001.jpg".into()), &config());
        assert!(frame.incident_detected);
        assert_eq!(frame.severity, Severity::Moderate);
        assert_eq!(frame.image_ref.as_deref(), Some("frame_001.jpg"));
    }

    #[test]
    fn test_multiple_detections_are_severe() {
        let frame = classify(&[det(0, 0.9), det(0, 0.8)], None, &config());
        assert!(frame.incident_detected);
        assert_eq!(frame.severity, Severity::Severe);
    }

    #[test]
    fn test_below_threshold_is_filtered() {
        // 0.5 is not strictly above the threshold
        let frame = classify(&[det(0, 0.5), det(0, 0.3)], None, &config());
        assert!(!frame.incident_detected);
        assert_eq!(frame.severity, Severity::None);
    }

    #[test]
    fn test_other_classes_are_ignored() {
        let frame = classify(&[det(1, 0.99), det(7, 0.95)], None, &config());
        assert!(!frame.incident_detected);
    }

    #[test]
    fn test_mixed_classes_count_only_incident_class() {
        let frame = classify(&[det(0, 0.9), det(3, 0.9)], None, &config());
        assert!(frame.incident_detected);
        assert_eq!(frame.severity, Severity::Moderate);
    }
}
