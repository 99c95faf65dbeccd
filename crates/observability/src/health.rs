//! Health-Check-Endpunkt fuer dmrlink
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Anzahl gebundener IPSC-Systeme

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub systems_bound: usize,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    systems_bound: Arc<AtomicUsize>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            systems_bound: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Meldet ein erfolgreich gebundenes IPSC-System
    pub fn system_gebunden(&self) {
        self.systems_bound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn systeme_gebunden(&self) -> usize {
        self.systems_bound.load(Ordering::Relaxed)
    }

    /// Ohne gebundenes System laeuft die Bridge leer
    pub fn status(&self) -> HealthStatus {
        if self.systeme_gebunden() > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Bridge-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: state.status(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        systems_bound: state.systeme_gebunden(),
    };

    // 200 auch bei degraded (Probe soll nicht failen)
    (StatusCode::OK, Json(response))
}
