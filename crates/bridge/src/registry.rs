//! Peer-Registry
//!
//! Ordnet Ziel-Teilnehmer dem Peer zu, hinter dem sie erreichbar sind.
//! Die Bridge nutzt das nur zur Anreicherung von BeginCall-Ereignissen.

use dmrlink_core::{PeerId, SubscriberId};
use std::collections::HashMap;

/// Lookup-Schnittstelle fuer Teilnehmer → Peer
pub trait PeerRegistry: Send + Sync {
    /// Peer, dem der Teilnehmer zugeordnet ist
    fn peer_fuer(&self, teilnehmer: SubscriberId) -> Option<PeerId>;
}

/// Statische Zuordnung aus der Konfiguration
#[derive(Debug, Clone, Default)]
pub struct StaticPeerRegistry {
    eintraege: HashMap<SubscriberId, PeerId>,
}

impl StaticPeerRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Zuordnung ein, eine vorhandene wird ersetzt
    pub fn eintragen(&mut self, teilnehmer: SubscriberId, peer: PeerId) -> Option<PeerId> {
        self.eintraege.insert(teilnehmer, peer)
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }
}

impl FromIterator<(SubscriberId, PeerId)> for StaticPeerRegistry {
    fn from_iter<I: IntoIterator<Item = (SubscriberId, PeerId)>>(iter: I) -> Self {
        Self {
            eintraege: iter.into_iter().collect(),
        }
    }
}

impl PeerRegistry for StaticPeerRegistry {
    fn peer_fuer(&self, teilnehmer: SubscriberId) -> Option<PeerId> {
        self.eintraege.get(&teilnehmer).copied()
    }
}
