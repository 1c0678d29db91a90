// src/api.rs
//
// HTTP surface. The JSON field names (`alert_id`, `crash_detected`,
// `severity`, `image_url`, `cancelled`, `detection_count`, ...) are an
// observed external contract consumed by the dashboard and must not drift.
//
// The vision model lives upstream: this endpoint ingests its detections,
// not raw images. Undecodable payloads are rejected here and never reach
// the alert core.

use crate::aggregator::AggregatorResult;
use crate::error::{AlertError, CancelOutcome};
use crate::service::AlertService;
use crate::types::{Alert, AlertStatus, Contact, Detection, LocationConfig};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub struct AppState {
    pub service: Arc<AlertService>,
    pub location: LocationConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/detect_and_alert", post(detect_and_alert))
        .route("/cancel_alert/:alert_id", post(cancel_alert))
        .route("/alert_status/:alert_id", get(alert_status))
        .route("/active_alerts", get(active_alerts))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct DetectAndAlertRequest {
    pub detections: Vec<Detection>,
    pub contact_number: String,
    pub contact_email: String,
    #[serde(default)]
    pub image_ref: Option<String>,
}

enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::NotFound(id) => {
                ApiError::NotFound(format!("Alert ID {} not found or has expired.", id))
            }
        }
    }
}

fn parse_alert_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::NotFound(format!("Alert ID {} not found or has expired.", raw)))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "ResQ AI Accident Detection API is running!" }))
}

async fn detect_and_alert(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DetectAndAlertRequest>,
) -> Json<Value> {
    let contact = Contact {
        phone: request.contact_number,
        email: request.contact_email,
    };

    let result = state
        .service
        .submit_frame(&request.detections, contact, request.image_ref);

    Json(submission_response(&result))
}

async fn cancel_alert(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_alert_id(&alert_id)?;
    match state.service.cancel(id)? {
        CancelOutcome::Cancelled => Ok(Json(json!({
            "message": format!("Alert {} cancelled successfully.", id),
        }))),
        CancelOutcome::AlreadyCancelled => Ok(Json(json!({
            "message": format!("Alert {} was already cancelled.", id),
            "status": "already_cancelled",
        }))),
    }
}

async fn alert_status(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_alert_id(&alert_id)?;
    let (alert, status, active) = state.service.status(id)?;
    Ok(Json(status_response(&alert, status, active, &state.location)))
}

async fn active_alerts(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut body = serde_json::Map::new();
    for alert in state.service.list_active() {
        body.insert(
            alert.id.to_string(),
            active_entry(&alert, &state.location),
        );
    }
    Json(Value::Object(body))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.service.metrics().summary()))
}

// ============================================================================
// RESPONSE SHAPING
// ============================================================================

fn image_url(image_ref: Option<&str>) -> Value {
    match image_ref {
        Some(name) => json!(format!("/annotated_images/{}", name)),
        None => Value::Null,
    }
}

fn submission_response(result: &AggregatorResult) -> Value {
    match result {
        AggregatorResult::NoIncident { .. } => json!({
            "crash_detected": false,
            "message": "No crash detected.",
            "alert_id": null,
            "image_url": null,
            "severity": "none",
        }),
        AggregatorResult::Pending { alert } | AggregatorResult::Escalating { alert } => json!({
            "crash_detected": true,
            "alert_id": alert.id,
            "message": "Crash detected! Alert pending.",
            "image_url": image_url(alert.image_ref.as_deref()),
            "severity": alert.severity,
            "detection_count": alert.evidence_count,
        }),
    }
}

fn status_response(
    alert: &Alert,
    status: AlertStatus,
    active: bool,
    location: &LocationConfig,
) -> Value {
    json!({
        "alert_id": alert.id,
        "active": active,
        "status": status,
        "cancelled": alert.cancelled,
        "alert_sent": alert.notified,
        "severity": alert.severity,
        "detection_count": alert.evidence_count,
        "image_url": image_url(alert.image_ref.as_deref()),
        "timestamp": alert.created_at.to_rfc3339(),
        "location_name": location.name,
        "location_lat": location.latitude,
        "location_lon": location.longitude,
    })
}

fn active_entry(alert: &Alert, location: &LocationConfig) -> Value {
    json!({
        "alert_id": alert.id,
        "cancelled": alert.cancelled,
        "alert_sent": alert.notified,
        "severity": alert.severity,
        "timestamp": alert.created_at.to_rfc3339(),
        "image_url": image_url(alert.image_ref.as_deref()),
        "location_name": location.name,
        "location_lat": location.latitude,
        "location_lon": location.longitude,
    })
}
