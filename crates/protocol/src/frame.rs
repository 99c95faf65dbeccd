//! IPSC-Call-Frame (UDP)
//!
//! Dekodiert die binaere Paketstruktur eines IPSC-Benutzerpakets.
//! Alle Mehrbyte-Felder sind big-endian und liegen an festen Offsets.
//!
//! ## Paketformat (Header = 31 Bytes, kein serde)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   PacketType (0x80 = Gruppen-Voice, 0x81 = Privat-Voice, ...)
//!  1       4   Peer-ID des Absenders
//!  5       1   IPSC-Sequenz (Stream-Kennung des Anrufs)
//!  6       3   Quell-Teilnehmer (Radio-ID)
//!  9       3   Ziel-Teilnehmer (Radio-ID bzw. Talkgroup)
//! 12       1   Call-Type (Prioritaet Voice/Daten)
//! 13       4   Call-Control-Info
//! 17       1   Call-Info (Bit 0x20 = Timeslot 2, Bit 0x40 = Ende)
//! 18       1   RTP Byte 1
//! 19       1   RTP Byte 2 (Typ)
//! 20       2   RTP-Sequenznummer
//! 22       4   RTP-Zeitstempel
//! 26       4   RTP-SSRC
//! 30       1   Burst-Payload-Typ (Head, Term, Slot1-Voice, Slot2-Voice)
//! 31+      N   Nutzdaten
//! ```

use dmrlink_core::{DmrlinkError, PeerId, Result, StreamId, SubscriberId, Timeslot};

/// Minimale Laenge eines dekodierbaren Frames (Header inkl. Payload-Typ)
pub const MIN_FRAME_LAENGE: usize = 31;

/// Offset der Nutzdaten hinter dem Payload-Typ
pub const PAYLOAD_OFFSET: usize = 31;

// ---------------------------------------------------------------------------
// Call-Info-Masken
// ---------------------------------------------------------------------------

/// Bit-Masken fuer das Call-Info-Feld (Offset 17)
pub struct CallInfoFlags;

impl CallInfoFlags {
    /// Frame gehoert zu Timeslot 2
    pub const TS_CALL_MSK: u8 = 0x20;
    /// Letztes Fragment des Anrufs
    pub const END_MSK: u8 = 0x40;
}

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// Art des IPSC-Pakets (Byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    GroupVoice,
    PrivateVoice,
    GroupData,
    PrivateData,
    RepeaterWakeUp,
    CallMonStatus,
    CallMonRepeat,
    CallMonNack,
    XcmpXnl,
    DeRegistrationRequest,
    /// Nicht von dieser Bridge behandelter Typ
    Unknown(u8),
}

impl PacketType {
    /// Konvertiert ein Byte in einen `PacketType`.
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x80 => Self::GroupVoice,
            0x81 => Self::PrivateVoice,
            0x83 => Self::GroupData,
            0x84 => Self::PrivateData,
            0x85 => Self::RepeaterWakeUp,
            0x61 => Self::CallMonStatus,
            0x62 => Self::CallMonRepeat,
            0x63 => Self::CallMonNack,
            0x70 => Self::XcmpXnl,
            0x9A => Self::DeRegistrationRequest,
            andere => Self::Unknown(andere),
        }
    }

    /// Byte-Wert wie auf der Leitung
    pub fn as_u8(self) -> u8 {
        match self {
            Self::GroupVoice => 0x80,
            Self::PrivateVoice => 0x81,
            Self::GroupData => 0x83,
            Self::PrivateData => 0x84,
            Self::RepeaterWakeUp => 0x85,
            Self::CallMonStatus => 0x61,
            Self::CallMonRepeat => 0x62,
            Self::CallMonNack => 0x63,
            Self::XcmpXnl => 0x70,
            Self::DeRegistrationRequest => 0x9A,
            Self::Unknown(b) => b,
        }
    }
}

// ---------------------------------------------------------------------------
// PayloadType
// ---------------------------------------------------------------------------

/// Burst-Typ der Nutzdaten (Byte 30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// Voice-Header: Beginn eines Anrufs
    VoiceHead,
    /// Voice-Terminator: Ende eines Anrufs
    VoiceTerm,
    Slot1Voice,
    Slot2Voice,
    Unknown(u8),
}

impl PayloadType {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x01 => Self::VoiceHead,
            0x02 => Self::VoiceTerm,
            0x0A => Self::Slot1Voice,
            0x8A => Self::Slot2Voice,
            andere => Self::Unknown(andere),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::VoiceHead => 0x01,
            Self::VoiceTerm => 0x02,
            Self::Slot1Voice => 0x0A,
            Self::Slot2Voice => 0x8A,
            Self::Unknown(b) => b,
        }
    }

    /// Traegt dieser Burst AMBE-Sprachdaten?
    pub fn ist_voice_daten(self) -> bool {
        matches!(self, Self::Slot1Voice | Self::Slot2Voice)
    }
}

// ---------------------------------------------------------------------------
// RtpHeader
// ---------------------------------------------------------------------------

/// RTP-aehnlicher Unter-Header (Offset 18..30)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub byte1: u8,
    pub byte2: u8,
    /// Transport-Sequenznummer, unabhaengig von der IPSC-Sequenz
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

// ---------------------------------------------------------------------------
// CallFrame
// ---------------------------------------------------------------------------

/// Dekodierter IPSC-Call-Frame
///
/// Leiht den Empfangspuffer unveraenderlich aus. Alle Felder sind nur ueber
/// Accessoren lesbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame<'a> {
    raw: &'a [u8],
    packet_type: PacketType,
    peer_id: PeerId,
    sequence: u8,
    source: SubscriberId,
    destination: SubscriberId,
    call_type: u8,
    call_control_info: u32,
    call_info: u8,
    rtp: RtpHeader,
    payload_type: PayloadType,
}

/// Dekodiert einen Frame aus einem Byte-Slice
///
/// # Fehler
/// - `MalformedFrame` wenn das Slice kuerzer als 31 Bytes ist
pub fn decode(buf: &[u8]) -> Result<CallFrame<'_>> {
    CallFrame::decode(buf)
}

impl<'a> CallFrame<'a> {
    /// Dekodiert einen Frame ohne weitere Validierung als die Laenge
    pub fn decode(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < MIN_FRAME_LAENGE {
            return Err(DmrlinkError::MalformedFrame {
                laenge: buf.len(),
                minimum: MIN_FRAME_LAENGE,
            });
        }

        Ok(Self {
            raw: buf,
            packet_type: PacketType::from_u8(buf[0]),
            peer_id: PeerId(u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]])),
            sequence: buf[5],
            source: SubscriberId::from_be_u24([buf[6], buf[7], buf[8]]),
            destination: SubscriberId::from_be_u24([buf[9], buf[10], buf[11]]),
            call_type: buf[12],
            call_control_info: u32::from_be_bytes([buf[13], buf[14], buf[15], buf[16]]),
            call_info: buf[17],
            rtp: RtpHeader {
                byte1: buf[18],
                byte2: buf[19],
                sequence: u16::from_be_bytes([buf[20], buf[21]]),
                timestamp: u32::from_be_bytes([buf[22], buf[23], buf[24], buf[25]]),
                ssrc: u32::from_be_bytes([buf[26], buf[27], buf[28], buf[29]]),
            },
            payload_type: PayloadType::from_u8(buf[30]),
        })
    }

    /// Der komplette Empfangspuffer
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// IPSC-Sequenz (rollierend, wraps bei 256)
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Stream-Kennung des Anrufs
    ///
    /// IPSC haelt das Sequenz-Byte ueber einen ganzen Anruf konstant, es
    /// identifiziert damit den Stream.
    pub fn stream_id(&self) -> StreamId {
        StreamId(self.sequence)
    }

    pub fn source(&self) -> SubscriberId {
        self.source
    }

    pub fn destination(&self) -> SubscriberId {
        self.destination
    }

    pub fn call_type(&self) -> u8 {
        self.call_type
    }

    pub fn call_control_info(&self) -> u32 {
        self.call_control_info
    }

    pub fn call_info(&self) -> u8 {
        self.call_info
    }

    pub fn rtp(&self) -> RtpHeader {
        self.rtp
    }

    pub fn rtp_sequence(&self) -> u16 {
        self.rtp.sequence
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// Nutzdaten ab Offset 31 (Laenge abhaengig vom Payload-Typ)
    pub fn payload(&self) -> &'a [u8] {
        &self.raw[PAYLOAD_OFFSET..]
    }

    /// Prueft ob ein Call-Info-Bit gesetzt ist
    pub fn hat_call_info(&self, maske: u8) -> bool {
        self.call_info & maske != 0
    }

    pub fn ist_timeslot_zwei(&self) -> bool {
        self.hat_call_info(CallInfoFlags::TS_CALL_MSK)
    }

    pub fn ist_letztes_fragment(&self) -> bool {
        self.hat_call_info(CallInfoFlags::END_MSK)
    }

    /// Zeitschlitz laut Call-Info
    pub fn timeslot(&self) -> Timeslot {
        Timeslot::aus_bit(self.ist_timeslot_zwei())
    }
}

// ---------------------------------------------------------------------------
// FrameBuilder
// ---------------------------------------------------------------------------

/// Baut IPSC-Frames byteweise zusammen (Diagnose, Replays, Tests)
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    header: [u8; MIN_FRAME_LAENGE],
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Gruppen-Voice-Frame mit leerem Header
    pub fn neu(payload_type: PayloadType) -> Self {
        let mut header = [0u8; MIN_FRAME_LAENGE];
        header[0] = PacketType::GroupVoice.as_u8();
        header[30] = payload_type.as_u8();
        Self {
            header,
            payload: Vec::new(),
        }
    }

    pub fn packet_type(mut self, typ: PacketType) -> Self {
        self.header[0] = typ.as_u8();
        self
    }

    pub fn peer(mut self, peer: PeerId) -> Self {
        self.header[1..5].copy_from_slice(&peer.to_be_bytes());
        self
    }

    pub fn stream(mut self, stream: StreamId) -> Self {
        self.header[5] = stream.0;
        self
    }

    pub fn source(mut self, rid: SubscriberId) -> Self {
        self.header[6..9].copy_from_slice(&rid.to_be_u24());
        self
    }

    pub fn destination(mut self, rid: SubscriberId) -> Self {
        self.header[9..12].copy_from_slice(&rid.to_be_u24());
        self
    }

    pub fn call_type(mut self, call_type: u8) -> Self {
        self.header[12] = call_type;
        self
    }

    pub fn call_control_info(mut self, wert: u32) -> Self {
        self.header[13..17].copy_from_slice(&wert.to_be_bytes());
        self
    }

    /// Setzt Timeslot-Bit und Ende-Bit im Call-Info-Feld
    pub fn timeslot(mut self, slot: Timeslot) -> Self {
        match slot {
            Timeslot::Slot1 => self.header[17] &= !CallInfoFlags::TS_CALL_MSK,
            Timeslot::Slot2 => self.header[17] |= CallInfoFlags::TS_CALL_MSK,
        }
        self
    }

    pub fn letztes_fragment(mut self, ende: bool) -> Self {
        if ende {
            self.header[17] |= CallInfoFlags::END_MSK;
        } else {
            self.header[17] &= !CallInfoFlags::END_MSK;
        }
        self
    }

    pub fn rtp_sequence(mut self, seq: u16) -> Self {
        self.header[20..22].copy_from_slice(&seq.to_be_bytes());
        self
    }

    pub fn rtp_timestamp(mut self, ts: u32) -> Self {
        self.header[22..26].copy_from_slice(&ts.to_be_bytes());
        self
    }

    /// Rohe Nutzdaten ab Offset 31
    pub fn payload(mut self, daten: &[u8]) -> Self {
        self.payload = daten.to_vec();
        self
    }

    /// Serialisiert den Frame in einen Byte-Vec
    pub fn build(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_FRAME_LAENGE + self.payload.len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
