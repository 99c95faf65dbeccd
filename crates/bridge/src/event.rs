//! Bridge-Ereignisse
//!
//! Der Slot-Tracker erzeugt pro Frame hoechstens ein Ereignis. Der
//! Dispatcher uebersetzt es in eine [`GatewayMessage`].

use dmrlink_core::{PeerId, StreamId, SubscriberId, Timeslot};
use dmrlink_protocol::{AmbeNutzdaten, GatewayMessage};

/// Anrufbeginn auf einem Slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginCall {
    pub slot: Timeslot,
    pub source: SubscriberId,
    pub destination: SubscriberId,
    /// Sendender Peer laut Frame-Header
    pub peer: PeerId,
    /// Peer, dem das Ziel laut Registry zugeordnet ist
    pub destination_peer: Option<PeerId>,
    pub stream_id: StreamId,
    /// RTP-Sequenz des Voice-Headers
    pub initial_sequence: u16,
}

/// AMBE-Nutzdaten eines Voice-Bursts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePayload {
    pub slot: Timeslot,
    /// `None` wenn kein Voice-Header gesehen wurde
    pub stream_id: Option<StreamId>,
    pub rtp_sequence: u16,
    /// Laufende Nummer des Bursts im Stream (ab 1)
    pub frame_count: u32,
    pub ambe: AmbeNutzdaten,
    /// Burst kam ohne aktiven Stream an
    pub orphaned: bool,
}

/// Anrufende auf einem Slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndCall {
    pub slot: Timeslot,
    pub stream_id: StreamId,
    /// Anzahl Voice-Bursts des beendeten Streams
    pub frame_count: u32,
}

/// Alle Ereignisse, die an das Vocoder-Gateway gehen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    BeginCall(BeginCall),
    VoicePayload(VoicePayload),
    EndCall(EndCall),
}

impl BridgeEvent {
    /// Slot, auf den sich das Ereignis bezieht
    pub fn slot(&self) -> Timeslot {
        match self {
            Self::BeginCall(e) => e.slot,
            Self::VoicePayload(e) => e.slot,
            Self::EndCall(e) => e.slot,
        }
    }

    /// Label fuer Metriken und Logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::BeginCall(_) => "begin_call",
            Self::VoicePayload(_) => "voice_payload",
            Self::EndCall(_) => "end_call",
        }
    }

    /// Uebersetzt das Ereignis in das TLV-Format des Gateways
    pub fn gateway_nachricht(&self, color_code: u8) -> GatewayMessage {
        match self {
            Self::BeginCall(e) => GatewayMessage::BeginTx {
                source: e.source,
                peer: e.peer,
                destination: e.destination,
                slot: e.slot,
                color_code,
            },
            Self::VoicePayload(e) => GatewayMessage::Ambe49 {
                slot: e.slot,
                ambe: e.ambe,
            },
            Self::EndCall(e) => GatewayMessage::EndTx { slot: e.slot },
        }
    }
}
