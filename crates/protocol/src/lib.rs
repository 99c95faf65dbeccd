//! dmrlink-protocol – IPSC-Wire-Format
//!
//! Dieses Crate dekodiert IPSC-Call-Frames, extrahiert die AMBE-Subframes
//! aus Voice-Bursts und definiert das TLV-Format zum Vocoder-Gateway.

pub mod ambe;
pub mod dump;
pub mod frame;
pub mod gateway;

pub use ambe::{ambe_extrahieren, AmbeNutzdaten};
pub use dump::dump_frame;
pub use frame::{decode, CallFrame, CallInfoFlags, FrameBuilder, PacketType, PayloadType};
pub use gateway::{GatewayCodec, GatewayMessage};
