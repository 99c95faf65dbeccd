//! Wire-Format zum Vocoder-Gateway (UDP)
//!
//! Jede Nachricht ist ein TLV-Datagramm: Tag(u8) + Laenge(u8) + Wert.
//!
//! ## Nachrichten
//!
//! ```text
//! Tag  Name      Wert
//! ---  --------  ----------------------------------------------------
//!  0   BEGIN_TX  Quelle(3) Peer(4) Ziel(3) Slot(1) Color-Code(1)
//!  2   END_TX    Slot(1)
//!  7   AMBE_49   Slot(1) AMBE(21)  – drei 49-Bit-Subframes, je 7 Bytes
//! ```
//!
//! Slot ist die Slot-Nummer (1 oder 2).

use crate::ambe::{AmbeNutzdaten, AMBE_NUTZDATEN_LAENGE};
use bytes::{Buf, BufMut, BytesMut};
use dmrlink_core::{PeerId, SubscriberId, Timeslot};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Groesse von Tag und Laengenfeld
pub const TLV_HEADER_SIZE: usize = 2;

/// Tag-Werte des Gateway-Protokolls
pub struct GatewayTag;

impl GatewayTag {
    pub const BEGIN_TX: u8 = 0;
    pub const END_TX: u8 = 2;
    pub const AMBE_49: u8 = 7;
}

// ---------------------------------------------------------------------------
// GatewayMessage
// ---------------------------------------------------------------------------

/// Nachricht an das Vocoder-Gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMessage {
    /// Anrufbeginn mit Metadaten
    BeginTx {
        source: SubscriberId,
        peer: PeerId,
        destination: SubscriberId,
        slot: Timeslot,
        color_code: u8,
    },
    /// AMBE-Nutzdaten eines Voice-Bursts
    Ambe49 { slot: Timeslot, ambe: AmbeNutzdaten },
    /// Anrufende
    EndTx { slot: Timeslot },
}

impl GatewayMessage {
    /// Tag-Byte dieser Nachricht
    pub fn tag(&self) -> u8 {
        match self {
            Self::BeginTx { .. } => GatewayTag::BEGIN_TX,
            Self::Ambe49 { .. } => GatewayTag::AMBE_49,
            Self::EndTx { .. } => GatewayTag::END_TX,
        }
    }

    /// Slot, an den die Nachricht adressiert ist
    pub fn slot(&self) -> Timeslot {
        match self {
            Self::BeginTx { slot, .. } | Self::Ambe49 { slot, .. } | Self::EndTx { slot } => *slot,
        }
    }

    /// Laenge des Wert-Felds
    pub fn wert_laenge(&self) -> usize {
        match self {
            Self::BeginTx { .. } => 12,
            Self::Ambe49 { .. } => 1 + AMBE_NUTZDATEN_LAENGE,
            Self::EndTx { .. } => 1,
        }
    }

    /// Serialisiert die Nachricht in einen Byte-Vec
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(TLV_HEADER_SIZE + self.wert_laenge());
        self.encode_in(&mut buf);
        buf.to_vec()
    }

    fn encode_in(&self, dst: &mut BytesMut) {
        dst.reserve(TLV_HEADER_SIZE + self.wert_laenge());
        dst.put_u8(self.tag());
        dst.put_u8(self.wert_laenge() as u8);
        match self {
            Self::BeginTx {
                source,
                peer,
                destination,
                slot,
                color_code,
            } => {
                dst.put_slice(&source.to_be_u24());
                dst.put_slice(&peer.to_be_bytes());
                dst.put_slice(&destination.to_be_u24());
                dst.put_u8(slot.nummer());
                dst.put_u8(*color_code);
            }
            Self::Ambe49 { slot, ambe } => {
                dst.put_u8(slot.nummer());
                dst.put_slice(ambe);
            }
            Self::EndTx { slot } => {
                dst.put_u8(slot.nummer());
            }
        }
    }
}

fn ungueltig(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn slot_aus_byte(byte: u8) -> io::Result<Timeslot> {
    match byte {
        1 => Ok(Timeslot::Slot1),
        2 => Ok(Timeslot::Slot2),
        andere => Err(ungueltig(format!("Ungueltige Slot-Nummer: {andere}"))),
    }
}

// ---------------------------------------------------------------------------
// GatewayCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer das TLV-Gateway-Protokoll
#[derive(Debug, Clone, Default)]
pub struct GatewayCodec;

impl GatewayCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<GatewayMessage> for GatewayCodec {
    type Error = io::Error;

    fn encode(&mut self, item: GatewayMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_in(dst);
        Ok(())
    }
}

impl Decoder for GatewayCodec {
    type Item = GatewayMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < TLV_HEADER_SIZE {
            return Ok(None);
        }

        let tag = src[0];
        let laenge = usize::from(src[1]);
        if src.len() < TLV_HEADER_SIZE + laenge {
            src.reserve(TLV_HEADER_SIZE + laenge - src.len());
            return Ok(None);
        }

        src.advance(TLV_HEADER_SIZE);
        let wert = src.split_to(laenge);

        let nachricht = match (tag, laenge) {
            (GatewayTag::BEGIN_TX, 12) => GatewayMessage::BeginTx {
                source: SubscriberId::from_be_u24([wert[0], wert[1], wert[2]]),
                peer: PeerId(u32::from_be_bytes([wert[3], wert[4], wert[5], wert[6]])),
                destination: SubscriberId::from_be_u24([wert[7], wert[8], wert[9]]),
                slot: slot_aus_byte(wert[10])?,
                color_code: wert[11],
            },
            (GatewayTag::AMBE_49, 22) => {
                let mut ambe = [0u8; AMBE_NUTZDATEN_LAENGE];
                ambe.copy_from_slice(&wert[1..]);
                GatewayMessage::Ambe49 {
                    slot: slot_aus_byte(wert[0])?,
                    ambe,
                }
            }
            (GatewayTag::END_TX, 1) => GatewayMessage::EndTx {
                slot: slot_aus_byte(wert[0])?,
            },
            (tag, laenge) => {
                return Err(ungueltig(format!(
                    "Unbekannte TLV-Nachricht: tag={tag} laenge={laenge}"
                )));
            }
        };

        Ok(Some(nachricht))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
