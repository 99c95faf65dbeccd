//! dmrlink-bridge – vom IPSC-Frame zum Vocoder-Gateway
//!
//! Dieses Crate enthaelt:
//! - Slot-Call-State-Tracker (Idle/Active pro Timeslot)
//! - Bridge-Ereignisse und ihre Uebersetzung in Gateway-Nachrichten
//! - Dispatcher, der den Slot-Zustand aller Kanaele besitzt
//! - Gateway-Zustellung ueber Send-Queues pro Slot
//! - UDP-Empfang pro IPSC-System
//! - Peer-Registry fuer die Zuordnung Teilnehmer → Peer

pub mod dispatcher;
pub mod event;
pub mod gateway;
pub mod registry;
pub mod slot;
pub mod udp;

pub use dispatcher::BridgeDispatcher;
pub use event::{BeginCall, BridgeEvent, EndCall, VoicePayload};
pub use gateway::{GatewayRouter, GatewaySenderHandle, GatewaySink, Zustellung};
pub use registry::{PeerRegistry, StaticPeerRegistry};
pub use slot::{SlotPhase, SlotState};
pub use udp::{dispatcher_loop, IncomingDatagram, IpscReceiver, VoiceFrameHandler};
