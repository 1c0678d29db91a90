// src/types.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub crash_conf_threshold: f32,
    pub min_crash_detections_required: u32,
    pub incident_class_id: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            crash_conf_threshold: 0.5,
            min_crash_detections_required: 3,
            incident_class_id: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    pub pending_window_seconds: u64,
    pub reaper_enabled: bool,
    pub reaper_interval_seconds: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            pending_window_seconds: 60,
            reaper_enabled: true,
            reaper_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: "Unknown location".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub api_url: String,
    pub sender_id: String,
    pub timeout_seconds: u64,
    /// Gateway API key, normally injected via FAST2SMS_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.fast2sms.com/devUtility/sms".to_string(),
            sender_id: "FSTSMS".to_string(),
            timeout_seconds: 10,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub from_address: String,
    pub timeout_seconds: u64,
    /// Relay endpoint, normally injected via EMAIL_RELAY_URL.
    #[serde(default)]
    pub relay_url: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: "alerts@resq.local".to_string(),
            timeout_seconds: 10,
            relay_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "accident_alert=info".to_string(),
        }
    }
}

/// A single raw detection from the external vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Minor,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }

    /// Uppercase form used in outbound SMS/email bodies.
    pub fn as_upper(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Minor => "MINOR",
            Severity::Moderate => "MODERATE",
            Severity::Severe => "SEVERE",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-frame verdict produced by the classifier. Produced fresh per frame,
/// never mutated.
#[derive(Debug, Clone)]
pub struct ClassifiedFrame {
    pub incident_detected: bool,
    pub severity: Severity,
    /// Identifier of the annotated frame persisted upstream, if any.
    pub image_ref: Option<String>,
}

/// Recipient identity for an alert. Immutable for the alert's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub phone: String,
    pub email: String,
}

/// The tracked record of a suspected incident, from first detection to a
/// terminal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub contact: Contact,
    pub evidence_count: u32,
    pub severity: Severity,
    pub cancelled: bool,
    pub notified: bool,
    pub image_ref: Option<String>,
}

/// Derived lifecycle state. Not stored; computed from the flags and the
/// pending window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Escalated,
    Cancelled,
    Expired,
    Confirmed,
}

impl Alert {
    /// Whether this alert can still absorb evidence or be escalated.
    pub fn is_active(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.cancelled && now - self.created_at < window
    }

    pub fn status(&self, now: DateTime<Utc>, window: Duration) -> AlertStatus {
        if self.cancelled {
            AlertStatus::Cancelled
        } else if now - self.created_at >= window {
            if self.notified {
                AlertStatus::Confirmed
            } else {
                AlertStatus::Expired
            }
        } else if self.notified {
            AlertStatus::Escalated
        } else {
            AlertStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(cancelled: bool, notified: bool, age_secs: i64) -> (Alert, DateTime<Utc>) {
        let now = Utc::now();
        let alert = Alert {
            id: Uuid::new_v4(),
            created_at: now - Duration::seconds(age_secs),
            contact: Contact {
                phone: "9999999999".to_string(),
                email: "contact@example.com".to_string(),
            },
            evidence_count: 1,
            severity: Severity::Moderate,
            cancelled,
            notified,
            image_ref: None,
        };
        (alert, now)
    }

    #[test]
    fn test_status_pending_within_window() {
        let (a, now) = alert(false, false, 10);
        assert_eq!(a.status(now, Duration::seconds(60)), AlertStatus::Pending);
        assert!(a.is_active(now, Duration::seconds(60)));
    }

    #[test]
    fn test_status_escalated_then_confirmed() {
        let (a, now) = alert(false, true, 10);
        assert_eq!(a.status(now, Duration::seconds(60)), AlertStatus::Escalated);

        let (a, now) = alert(false, true, 61);
        assert_eq!(a.status(now, Duration::seconds(60)), AlertStatus::Confirmed);
    }

    #[test]
    fn test_status_cancelled_wins_over_everything() {
        let (a, now) = alert(true, true, 120);
        assert_eq!(a.status(now, Duration::seconds(60)), AlertStatus::Cancelled);
        assert!(!a.is_active(now, Duration::seconds(60)));
    }

    #[test]
    fn test_status_expired_without_escalation() {
        let (a, now) = alert(false, false, 61);
        assert_eq!(a.status(now, Duration::seconds(60)), AlertStatus::Expired);
        assert!(!a.is_active(now, Duration::seconds(60)));
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Severe).unwrap(),
            "\"severe\""
        );
        assert_eq!(Severity::Moderate.as_upper(), "MODERATE");
    }
}
