//! Prometheus-kompatible Metriken fuer das Relay
//!
//! Registrierte Metriken:
//! - `duett_connections_active` – Gauge: Aktuell verbundene Clients
//! - `duett_rooms_active` – Gauge: Raeume mit mindestens einem Mitglied
//! - `duett_messages_relayed_total` – Counter (kind): Zugestellte Verhandlungsnachrichten
//! - `duett_messages_dropped_total` – Counter (kind): Verworfene Verhandlungsnachrichten
//! - `duett_joins_rejected_total` – Counter: Abgelehnte Beitritte (Raum voll)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Relay-Metriken
///
/// Clone teilt die Registry und alle Zaehler.
#[derive(Clone)]
pub struct RelayMetrics {
    pub registry: Arc<Registry>,
    pub connections_active: IntGauge,
    pub rooms_active: IntGauge,
    pub messages_relayed_total: IntCounterVec,
    pub messages_dropped_total: IntCounterVec,
    pub joins_rejected_total: IntCounter,
}

impl RelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connections_active = IntGauge::with_opts(Opts::new(
            "duett_connections_active",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connections_active.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "duett_rooms_active",
            "Anzahl aktiver Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let messages_relayed_total = IntCounterVec::new(
            Opts::new(
                "duett_messages_relayed_total",
                "Zugestellte Verhandlungsnachrichten",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "duett_messages_dropped_total",
                "Verworfene Verhandlungsnachrichten (kein Empfaenger)",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(messages_dropped_total.clone()))?;

        let joins_rejected_total = IntCounter::with_opts(Opts::new(
            "duett_joins_rejected_total",
            "Abgelehnte Raum-Beitritte",
        ))?;
        registry.register(Box::new(joins_rejected_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connections_active,
            rooms_active,
            messages_relayed_total,
            messages_dropped_total,
            joins_rejected_total,
        })
    }

    /// Zaehlt eine zugestellte Nachricht
    pub fn weitergeleitet(&self, kind: &str, empfaenger: usize) {
        self.messages_relayed_total
            .with_label_values(&[kind])
            .inc_by(empfaenger as u64);
    }

    /// Zaehlt eine verworfene Nachricht
    pub fn verworfen(&self, kind: &str) {
        self.messages_dropped_total.with_label_values(&[kind]).inc();
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
pub fn metrics_router(metriken: RelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetrics>) -> impl IntoResponse {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = RelayMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zwei_instanzen_sind_unabhaengig() {
        let a = RelayMetrics::neu().unwrap();
        let b = RelayMetrics::neu().unwrap();
        a.connections_active.inc();
        assert_eq!(a.connections_active.get(), 1);
        assert_eq!(b.connections_active.get(), 0);
    }

    #[test]
    fn weitergeleitet_zaehlt_empfaenger() {
        let metriken = RelayMetrics::neu().unwrap();
        metriken.weitergeleitet("offer", 1);
        metriken.weitergeleitet("offer", 2);
        let wert = metriken
            .messages_relayed_total
            .with_label_values(&["offer"])
            .get();
        assert_eq!(wert, 3);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = RelayMetrics::neu().unwrap();
        metriken.rooms_active.set(2);
        metriken.verworfen("candidate");

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("duett_rooms_active 2"));
        assert!(output.contains("duett_messages_dropped_total{kind=\"candidate\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
