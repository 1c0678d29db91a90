// src/config.rs

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let mut config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults.
    /// Environment overrides apply in both cases.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!("Config file {} not found, using defaults", path);
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Environment variables win over the config file. Credentials are
    /// env-only in production deployments.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<f32>("CRASH_CONF_THRESHOLD") {
            self.detection.crash_conf_threshold = v;
        }
        if let Some(v) = parse_env::<u32>("MIN_CRASH_DETECTIONS_REQUIRED") {
            self.detection.min_crash_detections_required = v;
        }
        if let Some(v) = parse_env::<u64>("PENDING_WINDOW_SECONDS") {
            self.alerting.pending_window_seconds = v;
        }
        if let Ok(v) = std::env::var("FAST2SMS_API_KEY") {
            if !v.is_empty() {
                self.sms.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("FAST2SMS_SENDER_ID") {
            if !v.is_empty() {
                self.sms.sender_id = v;
            }
        }
        if let Ok(v) = std::env::var("EMAIL_RELAY_URL") {
            if !v.is_empty() {
                self.email.relay_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("BIND_ADDR") {
            if !v.is_empty() {
                self.server.bind_addr = v;
            }
        }
    }

    pub fn log_summary(&self) {
        info!(
            "Alert policy: conf_threshold={:.2}, min_detections={}, pending_window={}s",
            self.detection.crash_conf_threshold,
            self.detection.min_crash_detections_required,
            self.alerting.pending_window_seconds
        );
        info!(
            "Channels: sms={}, email={}",
            if self.sms.api_key.is_some() {
                "configured"
            } else {
                "missing key"
            },
            if self.email.relay_url.is_some() {
                "configured"
            } else {
                "missing relay"
            }
        );
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparseable {}={}", name, raw);
            None
        }
    }
}
