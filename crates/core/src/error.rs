//! Fehlertypen fuer dmrlink
//!
//! Zentraler Fehler-Enum der alle Fehlerzustaende der Bridge abdeckt.
//! Kein Fehler in der Frame-Pipeline ist fatal: Fehler werden gezaehlt und
//! geloggt, der betroffene Frame wird verworfen.

use crate::types::Timeslot;
use thiserror::Error;

/// Globaler Result-Alias fuer dmrlink
pub type Result<T> = std::result::Result<T, DmrlinkError>;

/// Alle moeglichen Fehler im dmrlink-System
#[derive(Debug, Error)]
pub enum DmrlinkError {
    // --- Frame-Pipeline ---
    #[error("Fehlerhafter Frame: {laenge} Bytes (Minimum {minimum})")]
    MalformedFrame { laenge: usize, minimum: usize },

    #[error("Unbekannter Payload-Typ: 0x{0:02X}")]
    UnbekannterPayloadTyp(u8),

    #[error("Zu wenig AMBE-Daten: {vorhanden} Bytes (benoetigt {benoetigt})")]
    InsufficientData { benoetigt: usize, vorhanden: usize },

    #[error("Voice-Frame ohne aktiven Stream auf {slot}")]
    OrphanedVoicePayload { slot: Timeslot },

    #[error("Ungueltige Bitfeld-Laenge: {0} (erlaubt 1..=57)")]
    UngueltigeBitfeldLaenge(usize),

    // --- Gateway ---
    #[error("Vocoder-Gateway nicht verfuegbar: {0}")]
    GatewayNichtVerfuegbar(String),

    #[error("Gateway-Queue voll: {0}")]
    GatewayQueueVoll(String),

    // --- Intern ---
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl DmrlinkError {
    /// Gibt true zurueck wenn der Fehler einen einzelnen Frame betrifft
    ///
    /// Frame-Fehler werden gezaehlt und der Frame verworfen, die Pipeline
    /// laeuft weiter.
    pub fn ist_frame_fehler(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. }
                | Self::UnbekannterPayloadTyp(_)
                | Self::InsufficientData { .. }
                | Self::OrphanedVoicePayload { .. }
        )
    }

    /// Kurzes, stabiles Label fuer Metriken und Logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedFrame { .. } | Self::UnbekannterPayloadTyp(_) => "malformed_frame",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::OrphanedVoicePayload { .. } => "orphaned_voice_payload",
            Self::GatewayNichtVerfuegbar(_) => "gateway_unavailable",
            Self::GatewayQueueVoll(_) => "gateway_queue_full",
            Self::UngueltigeBitfeldLaenge(_) | Self::Anyhow(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = DmrlinkError::MalformedFrame {
            laenge: 10,
            minimum: 31,
        };
        assert_eq!(e.to_string(), "Fehlerhafter Frame: 10 Bytes (Minimum 31)");
    }

    #[test]
    fn payload_typ_hex_anzeige() {
        let e = DmrlinkError::UnbekannterPayloadTyp(0x7F);
        assert!(e.to_string().contains("0x7F"));
    }

    #[test]
    fn frame_fehler_erkennung() {
        assert!(DmrlinkError::InsufficientData {
            benoetigt: 52,
            vorhanden: 40
        }
        .ist_frame_fehler());
        assert!(DmrlinkError::OrphanedVoicePayload {
            slot: Timeslot::Slot1
        }
        .ist_frame_fehler());
        assert!(!DmrlinkError::GatewayNichtVerfuegbar("weg".into()).ist_frame_fehler());
        assert!(!DmrlinkError::UngueltigeBitfeldLaenge(0).ist_frame_fehler());
        assert!(!DmrlinkError::from(anyhow::anyhow!("test")).ist_frame_fehler());
    }

    #[test]
    fn unbekannter_payload_zaehlt_als_malformed() {
        assert_eq!(DmrlinkError::UnbekannterPayloadTyp(3).label(), "malformed_frame");
        assert_eq!(
            DmrlinkError::MalformedFrame {
                laenge: 0,
                minimum: 31
            }
            .label(),
            "malformed_frame"
        );
    }
}
