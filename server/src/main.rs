//! dmrlink Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die Bridge.
//!
//! Konfigurationspfad: erstes Argument, sonst `DMRLINK_CONFIG`, sonst
//! `dmrlink.toml`.

use anyhow::Result;
use dmrlink_observability::logging_initialisieren;
use dmrlink_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DMRLINK_CONFIG").ok())
        .unwrap_or_else(|| "dmrlink.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        systeme = config.aktive_systeme().count(),
        "dmrlink wird initialisiert"
    );

    Server::neu(config).starten().await
}
