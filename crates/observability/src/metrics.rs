//! Prometheus-kompatible Metriken fuer dmrlink
//!
//! Registrierte Metriken:
//! - `dmrlink_frames_received_total` – Counter: Empfangene IPSC-Datagramme
//! - `dmrlink_frame_errors_total` – Counter: Frame-Fehler (label `kind`)
//! - `dmrlink_orphaned_payloads_total` – Counter: Voice-Bursts ohne aktiven Stream
//! - `dmrlink_packets_ignored_total` – Counter: Nicht gebridgte Pakete (label `packet_type`)
//! - `dmrlink_events_delivered_total` – Counter: An das Gateway uebergebene Ereignisse (label `event`)
//! - `dmrlink_events_dropped_total` – Counter: Verworfene Ereignisse (label `event`)
//! - `dmrlink_active_calls` – Gauge: Aktuell belegte Slots

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle dmrlink-Prometheus-Metriken
///
/// `Clone` teilt die zugrundeliegenden Zaehler (atomar, lock-free).
#[derive(Clone)]
pub struct BridgeMetrics {
    pub registry: Arc<Registry>,

    pub frames_received: IntCounter,
    pub frame_errors: IntCounterVec,
    pub orphaned_payloads: IntCounter,
    pub packets_ignored: IntCounterVec,
    pub events_delivered: IntCounterVec,
    pub events_dropped: IntCounterVec,
    pub active_calls: IntGauge,
}

impl BridgeMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let frames_received = IntCounter::with_opts(Opts::new(
            "dmrlink_frames_received_total",
            "Gesamtanzahl empfangener IPSC-Datagramme",
        ))?;
        registry.register(Box::new(frames_received.clone()))?;

        let frame_errors = IntCounterVec::new(
            Opts::new(
                "dmrlink_frame_errors_total",
                "Verworfene oder unvollstaendige Frames nach Fehlerart",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(frame_errors.clone()))?;

        let orphaned_payloads = IntCounter::with_opts(Opts::new(
            "dmrlink_orphaned_payloads_total",
            "Voice-Bursts ohne vorherigen Voice-Header",
        ))?;
        registry.register(Box::new(orphaned_payloads.clone()))?;

        let packets_ignored = IntCounterVec::new(
            Opts::new(
                "dmrlink_packets_ignored_total",
                "Pakete, die nicht an das Gateway gebridgt werden",
            ),
            &["packet_type"],
        )?;
        registry.register(Box::new(packets_ignored.clone()))?;

        let events_delivered = IntCounterVec::new(
            Opts::new(
                "dmrlink_events_delivered_total",
                "An das Vocoder-Gateway uebergebene Ereignisse",
            ),
            &["event"],
        )?;
        registry.register(Box::new(events_delivered.clone()))?;

        let events_dropped = IntCounterVec::new(
            Opts::new(
                "dmrlink_events_dropped_total",
                "Verworfene Ereignisse (Gateway nicht verfuegbar oder Queue voll)",
            ),
            &["event"],
        )?;
        registry.register(Box::new(events_dropped.clone()))?;

        let active_calls = IntGauge::with_opts(Opts::new(
            "dmrlink_active_calls",
            "Anzahl aktuell belegter Timeslots",
        ))?;
        registry.register(Box::new(active_calls.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            frames_received,
            frame_errors,
            orphaned_payloads,
            packets_ignored,
            events_delivered,
            events_dropped,
            active_calls,
        })
    }

    /// Zaehlt einen Frame-Fehler unter dem gegebenen Label
    pub fn frame_fehler(&self, kind: &str) {
        self.frame_errors.with_label_values(&[kind]).inc();
    }

    /// Summe aller verworfenen Ereignisse
    pub fn verworfen_gesamt(&self) -> u64 {
        ["begin_call", "voice_payload", "end_call"]
            .iter()
            .map(|e| self.events_dropped.with_label_values(&[e]).get())
            .sum()
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: BridgeMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<BridgeMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
