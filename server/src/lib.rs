//! dmrlink-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, IPSC-Empfaenger, Dispatcher und
//! Gateway-Sende-Tasks und stellt den Einstiegspunkt fuer Tests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use dmrlink_bridge::{
    dispatcher_loop, BridgeDispatcher, GatewayRouter, IpscReceiver, StaticPeerRegistry,
};
use dmrlink_core::{ChannelId, PeerId, SubscriberId};
use dmrlink_observability::{observability_server_starten, BridgeMetrics, HealthState};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut die Peer-Registry aus der Konfiguration
    pub fn peer_registry(&self) -> StaticPeerRegistry {
        self.config
            .peers
            .iter()
            .map(|z| (SubscriberId(z.teilnehmer), PeerId(z.peer)))
            .collect()
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Observability-Server starten
    /// 2. Gateway-Socket oeffnen, Sende-Tasks pro System und Slot starten
    /// 3. IPSC-Systeme binden und Empfangs-Loops starten
    /// 4. Dispatcher-Task starten
    /// 5. Auf Ctrl-C warten, Empfaenger stoppen, Dispatcher auslaufen lassen
    pub async fn starten(self) -> Result<()> {
        let metriken = BridgeMetrics::neu()?;
        let health = HealthState::neu();

        if self.config.observability.aktiviert {
            let addr = self.config.observability_bind_adresse()?;
            let (m, h) = (metriken.clone(), health.clone());
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, m, h).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let gateway_socket = Arc::new(
            UdpSocket::bind("0.0.0.0:0")
                .await
                .context("Gateway-Socket konnte nicht geoeffnet werden")?,
        );

        let (eingang_tx, eingang_rx) = mpsc::channel(dmrlink_bridge::udp::EINGANGS_QUEUE_GROESSE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut router = GatewayRouter::neu();
        let mut sende_tasks = Vec::new();
        let mut empfangs_tasks = Vec::new();
        let mut kanaele = Vec::new();

        for system in self.config.aktive_systeme() {
            let kanal = ChannelId::neu(&system.name);
            let ziel = self.config.gateway_ziel(system)?;
            let bind = self.config.system_bind_adresse(system)?;

            sende_tasks.extend(router.kanal_anbinden(&kanal, Arc::clone(&gateway_socket), ziel));

            let receiver = IpscReceiver::binden(kanal.clone(), bind)
                .await
                .with_context(|| format!("System '{}' konnte nicht gebunden werden", system.name))?;
            health.system_gebunden();
            tracing::info!(%kanal, gateway = %ziel, "System bereit");

            let (tx, rx) = (eingang_tx.clone(), shutdown_rx.clone());
            empfangs_tasks.push(tokio::spawn(async move {
                receiver.empfangs_loop_starten(tx, rx).await;
            }));
            kanaele.push(kanal);
        }
        // Nur die Empfaenger halten den Eingang offen
        drop(eingang_tx);

        if kanaele.is_empty() {
            tracing::warn!("Kein IPSC-System aktiviert, Bridge laeuft leer");
        }

        let registry = self.peer_registry();
        tracing::info!(eintraege = registry.len(), "Peer-Registry geladen");

        let mut dispatcher = BridgeDispatcher::neu(router, Arc::new(registry), metriken)
            .mit_color_code(self.config.gateway.color_code);
        for kanal in kanaele {
            dispatcher.kanal_registrieren(kanal);
        }
        let dispatch_task = tokio::spawn(async move {
            dispatcher_loop(&mut dispatcher, eingang_rx).await;
        });

        tracing::info!("Bridge laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Bridge wird beendet");

        shutdown_tx.send(true).ok();
        for task in empfangs_tasks {
            task.await.ok();
        }
        // Dispatcher endet sobald alle Empfaenger weg sind und droppt den Router
        dispatch_task.await.ok();
        for handle in sende_tasks {
            handle.beendet().await;
        }

        Ok(())
    }
}
