// src/notifier.rs
//
// Outbound notification channels. Each channel is "send, get boolean":
// failures are logged and reported per-channel, never propagated. Dispatch
// works on an immutable snapshot of the alert taken at escalation time;
// later mutations (including cancellation) do not affect an in-flight send.

use crate::types::{Alert, EmailConfig, LocationConfig, SmsConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-channel result of one dispatch attempt.
#[derive(Debug, Clone, Copy)]
pub struct NotifyOutcome {
    pub sms_ok: bool,
    pub email_ok: bool,
}

impl NotifyOutcome {
    pub fn total_failure(&self) -> bool {
        !self.sms_ok && !self.email_ok
    }
}

// ============================================================================
// SMS CHANNEL (Fast2SMS-style gateway)
// ============================================================================

pub struct SmsChannel {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    sender_id: String,
}

#[derive(Debug, Deserialize)]
struct SmsGatewayResponse {
    #[serde(rename = "return", default)]
    accepted: bool,
}

impl SmsChannel {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build SMS HTTP client")?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        })
    }

    pub async fn send(&self, phone_number: &str, message: &str) -> bool {
        let Some(api_key) = &self.api_key else {
            warn!("FAST2SMS_API_KEY not set, SMS alert skipped");
            return false;
        };

        let payload = serde_json::json!({
            "sender_id": self.sender_id,
            "message": message,
            "language": "english",
            "route": "p",
            "numbers": phone_number,
        });

        let response = self
            .http_client
            .post(&self.api_url)
            .header("authorization", api_key)
            .header("cache-control", "no-cache")
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) => {
                if !response.status().is_success() {
                    error!(
                        "SMS gateway returned {} for {}",
                        response.status(),
                        phone_number
                    );
                    return false;
                }
                match response.json::<SmsGatewayResponse>().await {
                    Ok(body) if body.accepted => {
                        info!("SMS alert sent to {}", phone_number);
                        true
                    }
                    Ok(_) => {
                        error!("SMS gateway rejected message for {}", phone_number);
                        false
                    }
                    Err(e) => {
                        error!("Failed to parse SMS gateway response: {}", e);
                        false
                    }
                }
            }
            Err(e) if e.is_timeout() => {
                error!("SMS request to {} timed out", phone_number);
                false
            }
            Err(e) => {
                error!("SMS sending failed for {}: {}", phone_number, e);
                false
            }
        }
    }
}

// ============================================================================
// EMAIL CHANNEL (HTTP relay)
// ============================================================================

pub struct EmailChannel {
    http_client: reqwest::Client,
    relay_url: Option<String>,
    from_address: String,
}

impl EmailChannel {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build email HTTP client")?;

        Ok(Self {
            http_client,
            relay_url: config.relay_url.clone(),
            from_address: config.from_address.clone(),
        })
    }

    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
        let Some(relay_url) = &self.relay_url else {
            warn!("EMAIL_RELAY_URL not set, email alert skipped");
            return false;
        };

        let payload = serde_json::json!({
            "from": self.from_address,
            "to": recipient,
            "subject": subject,
            "body": body,
        });

        match self.http_client.post(relay_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Email alert sent to {}", recipient);
                true
            }
            Ok(response) => {
                error!(
                    "Email relay returned {} for {}",
                    response.status(),
                    recipient
                );
                false
            }
            Err(e) if e.is_timeout() => {
                error!("Email relay request for {} timed out", recipient);
                false
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", recipient, e);
                false
            }
        }
    }
}

// ============================================================================
// DISPATCH COORDINATOR
// ============================================================================

pub struct Dispatcher {
    sms: SmsChannel,
    email: EmailChannel,
    location: LocationConfig,
    pending_window_seconds: u64,
}

impl Dispatcher {
    pub fn new(
        sms_config: &SmsConfig,
        email_config: &EmailConfig,
        location: LocationConfig,
        pending_window_seconds: u64,
    ) -> Result<Self> {
        Ok(Self {
            sms: SmsChannel::new(sms_config)?,
            email: EmailChannel::new(email_config)?,
            location,
            pending_window_seconds,
        })
    }

    /// Attempt both channels for an escalated alert. Channels run
    /// independently; one failing does not stop the other. Never fails
    /// outward.
    pub async fn dispatch(&self, alert: &Alert) -> NotifyOutcome {
        info!("Triggering emergency alerts for {}", alert.id);

        let sms_message = self.sms_message(alert);
        let email_subject = self.email_subject(alert);
        let email_body = self.email_body(alert);

        let (sms_ok, email_ok) = tokio::join!(
            self.sms.send(&alert.contact.phone, &sms_message),
            self.email.send(&alert.contact.email, &email_subject, &email_body),
        );

        let outcome = NotifyOutcome { sms_ok, email_ok };
        if outcome.total_failure() {
            // Operational blind spot: escalation is claimed but no human
            // was reached. Surfaced at error level and in metrics.
            error!(
                "TOTAL DISPATCH FAILURE for alert {}: no channel delivered",
                alert.id
            );
        } else {
            info!(
                "Emergency alerts dispatched for {} (sms={}, email={})",
                alert.id, sms_ok, email_ok
            );
        }
        outcome
    }

    fn sms_message(&self, alert: &Alert) -> String {
        format!(
            "EMERGENCY: Road Accident Detected! Severity: {}. Location: {} ({}, {}). Alert {} - CHECK DASHBOARD.",
            alert.severity.as_upper(),
            self.location.name,
            self.location.latitude,
            self.location.longitude,
            alert.id,
        )
    }

    fn email_subject(&self, alert: &Alert) -> String {
        format!(
            "ResQ ALERT: Critical Road Accident Detected - ID {} (Severity: {})",
            alert.id,
            alert.severity.as_upper(),
        )
    }

    fn email_body(&self, alert: &Alert) -> String {
        format!(
            "Dear Emergency Contact,\n\n\
             An automated accident detection system (ResQ) has identified a potential road accident.\n\n\
             Alert ID: {}\n\
             Severity: {}\n\
             Location: {}\n\
             Latitude: {}, Longitude: {}\n\
             Timestamp: {}\n\n\
             Please check the ResQ dashboard for the annotated image and more details.\n\
             (If this is a false alarm, please cancel the alert on the dashboard within {} seconds.)\n\n\
             ---\n\
             This is an automated message. Do not reply.\n",
            alert.id,
            alert.severity.as_upper(),
            self.location.name,
            self.location.latitude,
            self.location.longitude,
            alert.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.pending_window_seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Contact, Severity};
    use chrono::Utc;
    use uuid::Uuid;

    fn alert() -> Alert {
        Alert {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            contact: Contact {
                phone: "9999999999".to_string(),
                email: "contact@example.com".to_string(),
            },
            evidence_count: 3,
            severity: Severity::Severe,
            cancelled: false,
            notified: true,
            image_ref: Some("crash_20260826.jpg".to_string()),
        }
    }

    fn dispatcher() -> Dispatcher {
        let location = LocationConfig {
            name: "Test Junction".to_string(),
            latitude: 12.9,
            longitude: 80.2,
        };
        Dispatcher::new(&SmsConfig::default(), &EmailConfig::default(), location, 60).unwrap()
    }

    #[test]
    fn test_message_content_carries_identity_and_location() {
        let d = dispatcher();
        let a = alert();

        let sms = d.sms_message(&a);
        assert!(sms.contains("SEVERE"));
        assert!(sms.contains("Test Junction"));
        assert!(sms.contains(&a.id.to_string()));

        let subject = d.email_subject(&a);
        assert!(subject.contains(&a.id.to_string()));

        let body = d.email_body(&a);
        assert!(body.contains("SEVERE"));
        assert!(body.contains("within 60 seconds"));
    }

    #[tokio::test]
    async fn test_unconfigured_channels_fail_fast_without_network() {
        // No api key and no relay url: both sends short-circuit to false,
        // and the coordinator reports total failure without erroring.
        let d = dispatcher();
        let outcome = d.dispatch(&alert()).await;
        assert!(!outcome.sms_ok);
        assert!(!outcome.email_ok);
        assert!(outcome.total_failure());
    }

    #[tokio::test]
    async fn test_sms_skipped_without_key() {
        let sms = SmsChannel::new(&SmsConfig::default()).unwrap();
        assert!(!sms.send("9999999999", "test").await);
    }

    #[tokio::test]
    async fn test_email_skipped_without_relay() {
        let email = EmailChannel::new(&EmailConfig::default()).unwrap();
        assert!(!email.send("a@b.c", "subject", "body").await);
    }
}
