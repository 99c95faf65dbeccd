//! Gemeinsame Identifikationstypen fuer dmrlink
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Peer-, Teilnehmer- und Stream-Kennungen zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kennung eines IPSC-Peers (Repeater oder Master, 32 Bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Big-endian Darstellung wie auf der Leitung
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

/// Funk-Teilnehmerkennung (Radio-ID, 24 Bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub u32);

impl SubscriberId {
    /// Groesster gueltiger Wert (24 Bit)
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Erstellt eine Teilnehmerkennung aus drei big-endian Bytes
    pub fn from_be_u24(bytes: [u8; 3]) -> Self {
        Self(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Die unteren 24 Bit als big-endian Bytes
    pub fn to_be_u24(self) -> [u8; 3] {
        let [_, a, b, c] = self.0.to_be_bytes();
        [a, b, c]
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rid:{}", self.0)
    }
}

/// Kennung eines einzelnen Anrufs (Stream) innerhalb eines Slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u8);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream:{:02X}", self.0)
    }
}

/// Name eines konfigurierten IPSC-Systems (Kanal)
///
/// Guenstig klonbar, da der Name bei jedem Frame als Schluessel dient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub Arc<str>);

impl ChannelId {
    /// Erstellt eine Kanal-ID aus dem Systemnamen
    pub fn neu(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Gibt den Systemnamen zurueck
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel:{}", self.0)
    }
}

/// Einer der zwei TDMA-Zeitschlitze eines Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeslot {
    Slot1,
    Slot2,
}

impl Timeslot {
    /// Beide Slots in Reihenfolge
    pub const ALLE: [Timeslot; 2] = [Timeslot::Slot1, Timeslot::Slot2];

    /// Leitet den Slot aus dem "Timeslot zwei"-Bit ab
    pub fn aus_bit(zweiter_slot: bool) -> Self {
        if zweiter_slot {
            Self::Slot2
        } else {
            Self::Slot1
        }
    }

    /// Slot-Nummer wie im Gateway-Protokoll (1 oder 2)
    pub fn nummer(self) -> u8 {
        match self {
            Self::Slot1 => 1,
            Self::Slot2 => 2,
        }
    }

    /// Array-Index (0 oder 1)
    pub fn index(self) -> usize {
        match self {
            Self::Slot1 => 0,
            Self::Slot2 => 1,
        }
    }
}

impl std::fmt::Display for Timeslot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TS{}", self.nummer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_u24_konvertierung() {
        let rid = SubscriberId::from_be_u24([0x31, 0x32, 0x33]);
        assert_eq!(rid.0, 0x0031_3233);
        assert_eq!(rid.to_be_u24(), [0x31, 0x32, 0x33]);
    }

    #[test]
    fn subscriber_u24_schneidet_oberes_byte_ab() {
        let rid = SubscriberId(0xAA00_0102);
        assert_eq!(rid.to_be_u24(), [0x00, 0x01, 0x02]);
    }

    #[test]
    fn timeslot_aus_bit() {
        assert_eq!(Timeslot::aus_bit(false), Timeslot::Slot1);
        assert_eq!(Timeslot::aus_bit(true), Timeslot::Slot2);
        assert_eq!(Timeslot::Slot2.nummer(), 2);
        assert_eq!(Timeslot::Slot2.index(), 1);
        assert_eq!(Timeslot::Slot1.to_string(), "TS1");
    }

    #[test]
    fn channel_id_display() {
        let kanal = ChannelId::neu("IPSC1");
        assert_eq!(kanal.name(), "IPSC1");
        assert_eq!(kanal.to_string(), "channel:IPSC1");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let peer = PeerId(312000);
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, "312000");
        let peer2: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(peer, peer2);

        let kanal: ChannelId = serde_json::from_str("\"NET\"").unwrap();
        assert_eq!(kanal, ChannelId::neu("NET"));
    }
}
