//! Diagnose-Ausgabe fuer IPSC-Frames
//!
//! Reine Formatierung fuer Offline-Trace-Analyse, nicht Teil der
//! Laufzeit-Pipeline.

use crate::frame::{CallFrame, PayloadType};
use std::fmt::Write;

/// Felder eines Voice-Terminators (Full Link Control), ab Offset 31
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminatorInfo {
    pub rssi_threshold_parity: u8,
    pub length_to_follow: u16,
    pub rssi_status: u8,
    pub slot_type_sync: u8,
    pub data_size: u16,
    pub full_lc_byte1: u8,
    pub full_lc_fid: u8,
    pub service_options: u8,
    pub lc_destination: u32,
    pub lc_source: u32,
}

impl TerminatorInfo {
    /// Letztes benoetigtes Byte (Quelle im Full-LC endet bei Offset 47)
    pub const MIN_FRAME_LAENGE: usize = 47;

    /// Liest die LC-Felder, `None` bei zu kurzem Frame
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::MIN_FRAME_LAENGE {
            return None;
        }
        Some(Self {
            rssi_threshold_parity: raw[31],
            length_to_follow: u16::from_be_bytes([raw[32], raw[33]]),
            rssi_status: raw[34],
            slot_type_sync: raw[35],
            data_size: u16::from_be_bytes([raw[36], raw[37]]),
            full_lc_byte1: raw[38],
            full_lc_fid: raw[39],
            service_options: raw[40],
            lc_destination: u32::from_be_bytes([0, raw[41], raw[42], raw[43]]),
            lc_source: u32::from_be_bytes([0, raw[44], raw[45], raw[46]]),
        })
    }

    /// Daten hinter dem Terminator-Header laut `length_to_follow`
    pub fn daten<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        let ende = (38 + usize::from(self.length_to_follow) * 2)
            .saturating_sub(4)
            .min(raw.len());
        &raw[38.min(ende)..ende]
    }
}

/// Hex-Darstellung ohne Trennzeichen (Kleinbuchstaben)
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Formatiert einen Frame als lesbaren Diagnose-Text
///
/// Erste Zeile: Burst-Art und Rohdaten in Hex. Bei Terminatoren folgt eine
/// Zeile mit den LC-Feldern, zuletzt die Header-Zusammenfassung.
pub fn dump_frame(frame: &CallFrame<'_>) -> String {
    let raw = frame.raw();
    let mut out = String::new();

    match frame.payload_type() {
        PayloadType::VoiceHead => {
            let _ = writeln!(out, "HEAD: {}", hex(raw));
        }
        PayloadType::VoiceTerm => {
            if let Some(term) = TerminatorInfo::parse(raw) {
                let _ = writeln!(
                    out,
                    "{} {} {} {} {} {} {} {} {} {} {}",
                    term.rssi_threshold_parity,
                    term.length_to_follow,
                    term.rssi_status,
                    term.slot_type_sync,
                    term.data_size,
                    hex(term.daten(raw)),
                    term.full_lc_byte1,
                    term.full_lc_fid,
                    term.service_options,
                    term.lc_destination,
                    term.lc_source,
                );
            }
            let _ = writeln!(out, "TERM: {}", hex(raw));
        }
        PayloadType::Slot1Voice => {
            let _ = writeln!(out, "SLOT1: {}", hex(raw));
        }
        PayloadType::Slot2Voice => {
            let _ = writeln!(out, "SLOT2: {}", hex(raw));
        }
        PayloadType::Unknown(typ) => {
            let _ = writeln!(out, "UNKNOWN({typ:02X}): {}", hex(raw));
        }
    }

    let _ = write!(
        out,
        "pt={:02X} pid={} seq={:02X} src={} dst={} ct={:02X} uk={} ci={} rsq={}",
        frame.packet_type().as_u8(),
        frame.peer_id().0,
        frame.sequence(),
        frame.source().0,
        frame.destination().0,
        frame.call_type(),
        frame.call_control_info(),
        frame.call_info(),
        frame.rtp_sequence(),
    );
    out
}
