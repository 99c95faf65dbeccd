//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist (dann allerdings ohne IPSC-System).
//!
//! ```toml
//! [gateway]
//! adresse = "127.0.0.1"
//! port = 31000
//!
//! [[systems]]
//! name = "IPSC1"
//! port = 50000
//!
//! [[peers]]
//! teilnehmer = 9
//! peer = 312000
//! ```

use anyhow::{bail, Context};
use dmrlink_core::SubscriberId;
use dmrlink_observability::logging::{log_format_gueltig, log_level_gueltig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

/// Hoechster gueltiger DMR-Color-Code
pub const MAX_COLOR_CODE: u8 = 15;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Globales Vocoder-Gateway
    pub gateway: GatewayEinstellungen,
    /// IPSC-Systeme (ein UDP-Socket pro System)
    pub systems: Vec<SystemEinstellungen>,
    /// Statische Zuordnung Teilnehmer → Peer
    pub peers: Vec<PeerZuordnung>,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Vocoder-Gateway (Ziel der TLV-Datagramme)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayEinstellungen {
    pub adresse: String,
    pub port: u16,
    /// Color-Code in BeginTx-Nachrichten
    pub color_code: u8,
}

impl Default for GatewayEinstellungen {
    fn default() -> Self {
        Self {
            adresse: "127.0.0.1".into(),
            port: 31000,
            color_code: 1,
        }
    }
}

/// Ein IPSC-System (Kanal)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemEinstellungen {
    /// Eindeutiger Name, dient als Kanal-ID
    pub name: String,
    pub aktiviert: bool,
    pub bind_adresse: String,
    pub port: u16,
    /// Abweichende Gateway-Adresse fuer dieses System
    pub gateway_adresse: Option<String>,
    /// Abweichender Gateway-Port fuer dieses System
    pub gateway_port: Option<u16>,
}

impl Default for SystemEinstellungen {
    fn default() -> Self {
        Self {
            name: String::new(),
            aktiviert: true,
            bind_adresse: "0.0.0.0".into(),
            port: 50000,
            gateway_adresse: None,
            gateway_port: None,
        }
    }
}

/// Teilnehmer, der hinter einem bestimmten Peer erreichbar ist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerZuordnung {
    pub teilnehmer: u32,
    pub peer: u32,
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    pub bind_adresse: String,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

fn socket_adresse(adresse: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = adresse
        .parse()
        .with_context(|| format!("Ungueltige IP-Adresse '{adresse}'"))?;
    Ok(SocketAddr::new(ip, port))
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => bail!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}"),
        };
        Ok(config)
    }

    /// Parst und validiert eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.validieren()?;
        Ok(config)
    }

    /// Prueft Namen, Adressen und Wertebereiche
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            bail!("Unbekanntes Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("Unbekanntes Log-Format '{}'", self.logging.format);
        }
        if self.gateway.color_code > MAX_COLOR_CODE {
            bail!(
                "Color-Code {} ausserhalb 0..={MAX_COLOR_CODE}",
                self.gateway.color_code
            );
        }
        socket_adresse(&self.gateway.adresse, self.gateway.port)?;

        let mut namen = HashSet::new();
        for system in &self.systems {
            if system.name.trim().is_empty() {
                bail!("System ohne Namen");
            }
            if !namen.insert(system.name.as_str()) {
                bail!("System '{}' ist doppelt konfiguriert", system.name);
            }
            self.system_bind_adresse(system)?;
            self.gateway_ziel(system)?;
        }

        for zuordnung in &self.peers {
            if zuordnung.teilnehmer > SubscriberId::MAX {
                bail!("Teilnehmer {} ist keine 24-Bit-Radio-ID", zuordnung.teilnehmer);
            }
        }

        if self.observability.aktiviert {
            self.observability_bind_adresse()?;
        }
        Ok(())
    }

    /// Nur aktivierte Systeme
    pub fn aktive_systeme(&self) -> impl Iterator<Item = &SystemEinstellungen> {
        self.systems.iter().filter(|s| s.aktiviert)
    }

    /// UDP-Bind-Adresse eines Systems
    pub fn system_bind_adresse(&self, system: &SystemEinstellungen) -> anyhow::Result<SocketAddr> {
        socket_adresse(&system.bind_adresse, system.port)
            .with_context(|| format!("System '{}'", system.name))
    }

    /// Gateway-Ziel eines Systems (System-Wert vor globalem Wert)
    pub fn gateway_ziel(&self, system: &SystemEinstellungen) -> anyhow::Result<SocketAddr> {
        let adresse = system
            .gateway_adresse
            .as_deref()
            .unwrap_or(&self.gateway.adresse);
        let port = system.gateway_port.unwrap_or(self.gateway.port);
        socket_adresse(adresse, port).with_context(|| format!("Gateway von '{}'", system.name))
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        socket_adresse(&self.observability.bind_adresse, self.observability.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.gateway.port, 31000);
        assert_eq!(cfg.gateway.color_code, 1);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.systems.is_empty());
        assert_eq!(
            cfg.observability_bind_adresse().unwrap(),
            "127.0.0.1:9300".parse().unwrap()
        );
    }

    #[test]
    fn config_aus_toml_string() {
        let cfg = ServerConfig::aus_toml(
            r#"
            [gateway]
            adresse = "10.0.0.5"

            [[systems]]
            name = "IPSC1"
            port = 50001

            [[systems]]
            name = "IPSC2"
            aktiviert = false
            gateway_port = 31010

            [[peers]]
            teilnehmer = 9
            peer = 312000
        "#,
        )
        .unwrap();

        assert_eq!(cfg.systems.len(), 2);
        assert_eq!(cfg.aktive_systeme().count(), 1);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.gateway.port, 31000);
        assert_eq!(cfg.systems[0].bind_adresse, "0.0.0.0");
        assert_eq!(
            cfg.system_bind_adresse(&cfg.systems[0]).unwrap(),
            "0.0.0.0:50001".parse().unwrap()
        );
        assert_eq!(cfg.peers, vec![PeerZuordnung { teilnehmer: 9, peer: 312000 }]);
    }

    #[test]
    fn gateway_pro_system_ueberschreibt_global() {
        let cfg = ServerConfig::aus_toml(
            r#"
            [[systems]]
            name = "A"

            [[systems]]
            name = "B"
            port = 50001
            gateway_adresse = "192.168.1.10"
            gateway_port = 31100
        "#,
        )
        .unwrap();

        assert_eq!(
            cfg.gateway_ziel(&cfg.systems[0]).unwrap(),
            "127.0.0.1:31000".parse().unwrap()
        );
        assert_eq!(
            cfg.gateway_ziel(&cfg.systems[1]).unwrap(),
            "192.168.1.10:31100".parse().unwrap()
        );
    }

    #[test]
    fn ungueltige_konfigurationen() {
        let faelle = [
            "[gateway]\ncolor_code = 16",
            "[gateway]\nadresse = \"kein-host\"",
            "[[systems]]\nname = \"\"",
            "[[systems]]\nname = \"A\"\n[[systems]]\nname = \"A\"",
            "[[systems]]\nname = \"A\"\nbind_adresse = \"x\"",
            "[[peers]]\nteilnehmer = 16777216\npeer = 1",
            "[logging]\nlevel = \"verbose\"",
            "[logging]\nformat = \"xml\"",
        ];
        for toml in faelle {
            assert!(ServerConfig::aus_toml(toml).is_err(), "sollte fehlschlagen: {toml}");
        }
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/dmrlink.toml").unwrap();
        assert_eq!(cfg.gateway.port, 31000);
    }
}
