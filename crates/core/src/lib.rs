//! dmrlink-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen dmrlink-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{DmrlinkError, Result};
pub use types::{ChannelId, PeerId, StreamId, SubscriberId, Timeslot};
