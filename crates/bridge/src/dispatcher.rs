//! Bridge-Dispatcher
//!
//! Besitzt den Slot-Zustand aller Kanaele und fuehrt jeden empfangenen
//! Frame durch die Pipeline:
//!
//! ```text
//! decode() ── PacketType? ── GroupVoice ──▶ slot::process() ──▶ GatewaySink
//!                 │
//!                 ├── PrivateVoice ──▶ nur geloggt
//!                 └── Rest ──────────▶ gezaehlt und ignoriert
//! ```
//!
//! Frame-Fehler sind nie fatal: sie werden gezaehlt, geloggt und der Frame
//! wird verworfen. Der Dispatcher laeuft in genau einem Task, der Zustand
//! braucht daher keine Locks.

use crate::event::BridgeEvent;
use crate::gateway::GatewaySink;
use crate::registry::PeerRegistry;
use crate::slot::{self, SlotState};
use crate::udp::{IncomingDatagram, VoiceFrameHandler};
use dmrlink_core::{ChannelId, DmrlinkError, Result, Timeslot};
use dmrlink_observability::BridgeMetrics;
use dmrlink_protocol::{decode, dump_frame, CallFrame, PacketType};
use std::collections::HashMap;
use std::sync::Arc;

/// Standard-Color-Code fuer BeginTx
pub const STANDARD_COLOR_CODE: u8 = 1;

/// Zentrale Pipeline vom IPSC-Frame zum Gateway-Ereignis
pub struct BridgeDispatcher<G: GatewaySink> {
    kanaele: HashMap<ChannelId, [SlotState; 2]>,
    gateway: G,
    registry: Arc<dyn PeerRegistry>,
    metriken: BridgeMetrics,
    color_code: u8,
}

impl<G: GatewaySink> BridgeDispatcher<G> {
    pub fn neu(gateway: G, registry: Arc<dyn PeerRegistry>, metriken: BridgeMetrics) -> Self {
        Self {
            kanaele: HashMap::new(),
            gateway,
            registry,
            metriken,
            color_code: STANDARD_COLOR_CODE,
        }
    }

    /// Setzt den Color-Code fuer ausgehende BeginTx-Nachrichten
    pub fn mit_color_code(mut self, color_code: u8) -> Self {
        self.color_code = color_code;
        self
    }

    /// Legt den Slot-Zustand fuer einen Kanal an (beide Slots Idle)
    pub fn kanal_registrieren(&mut self, kanal: ChannelId) {
        self.kanaele.entry(kanal).or_default();
    }

    /// Aktueller Zustand eines Slots
    pub fn slot_zustand(&self, kanal: &ChannelId, slot: Timeslot) -> Option<&SlotState> {
        self.kanaele.get(kanal).map(|slots| &slots[slot.index()])
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Anzahl belegter Slots ueber alle Kanaele
    pub fn aktive_anrufe(&self) -> usize {
        self.kanaele
            .values()
            .flat_map(|slots| slots.iter())
            .filter(|s| s.busy())
            .count()
    }

    /// Verarbeitet ein Datagramm eines Kanals
    ///
    /// Gibt das erzeugte Ereignis zurueck, unabhaengig davon ob das Gateway
    /// es angenommen hat.
    ///
    /// # Fehler
    /// Frame-Fehler (`MalformedFrame`, `UnbekannterPayloadTyp`,
    /// `InsufficientData`). Sie sind bereits gezaehlt und geloggt.
    pub fn frame_verarbeiten(
        &mut self,
        kanal: &ChannelId,
        daten: &[u8],
    ) -> Result<Option<BridgeEvent>> {
        self.metriken.frames_received.inc();

        let frame = match decode(daten) {
            Ok(frame) => frame,
            Err(e) => {
                self.metriken.frame_fehler(e.label());
                tracing::warn!(%kanal, fehler = %e, "Frame verworfen");
                return Err(e);
            }
        };

        tracing::trace!(%kanal, "\n{}", dump_frame(&frame));

        match frame.packet_type() {
            PacketType::GroupVoice => self.gruppen_voice(kanal, &frame),
            PacketType::PrivateVoice => {
                tracing::debug!(
                    %kanal,
                    quelle = %frame.source(),
                    ziel = %frame.destination(),
                    "Privat-Voice wird nicht gebridgt"
                );
                self.ignoriert("private_voice");
                Ok(None)
            }
            andere => {
                tracing::trace!(%kanal, typ = andere.as_u8(), "Paket ignoriert");
                self.ignoriert(packet_label(andere));
                Ok(None)
            }
        }
    }

    fn gruppen_voice(
        &mut self,
        kanal: &ChannelId,
        frame: &CallFrame<'_>,
    ) -> Result<Option<BridgeEvent>> {
        let slot = frame.timeslot();

        if !self.kanaele.contains_key(kanal) {
            tracing::debug!(%kanal, "Frame fuer unbekannten Kanal, Zustand wird angelegt");
        }
        let state = &mut self.kanaele.entry(kanal.clone()).or_default()[slot.index()];

        let war_belegt = state.busy();
        let ergebnis = slot::process(state, slot, frame);
        let ist_belegt = state.busy();

        match (war_belegt, ist_belegt) {
            (false, true) => self.metriken.active_calls.inc(),
            (true, false) => self.metriken.active_calls.dec(),
            _ => {}
        }

        let mut ereignis = match ergebnis {
            Ok(Some(ereignis)) => ereignis,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.metriken.frame_fehler(e.label());
                tracing::warn!(%kanal, %slot, fehler = %e, "Voice-Frame verworfen");
                return Err(e);
            }
        };

        match &mut ereignis {
            BridgeEvent::BeginCall(begin) => {
                begin.destination_peer = self.registry.peer_fuer(begin.destination);
                tracing::info!(
                    %kanal,
                    %slot,
                    stream_id = %begin.stream_id,
                    quelle = %begin.source,
                    ziel = %begin.destination,
                    peer = %begin.peer,
                    ziel_peer = ?begin.destination_peer,
                    "Anrufbeginn"
                );
            }
            BridgeEvent::VoicePayload(payload) if payload.orphaned => {
                self.metriken.orphaned_payloads.inc();
                tracing::debug!(
                    %kanal,
                    rtp_sequence = payload.rtp_sequence,
                    "{}",
                    DmrlinkError::OrphanedVoicePayload { slot }
                );
            }
            _ => {}
        }

        self.zustellen(kanal, &ereignis);
        Ok(Some(ereignis))
    }

    fn zustellen(&self, kanal: &ChannelId, ereignis: &BridgeEvent) {
        let label = ereignis.label();
        match self
            .gateway
            .try_deliver(kanal, ereignis.gateway_nachricht(self.color_code))
        {
            Ok(()) => {
                self.metriken.events_delivered.with_label_values(&[label]).inc();
            }
            Err(e) => {
                self.metriken.events_dropped.with_label_values(&[label]).inc();
                tracing::debug!(%kanal, ereignis = label, fehler = %e, "Ereignis verworfen");
            }
        }
    }

    fn ignoriert(&self, label: &str) {
        self.metriken.packets_ignored.with_label_values(&[label]).inc();
    }
}

impl<G: GatewaySink> VoiceFrameHandler for BridgeDispatcher<G> {
    fn datagramm_verarbeiten(&mut self, datagramm: IncomingDatagram) {
        // Frame-Fehler sind bereits gezaehlt und geloggt
        if let Err(e) = self.frame_verarbeiten(&datagramm.kanal, &datagramm.daten) {
            if !e.ist_frame_fehler() {
                tracing::error!(
                    kanal = %datagramm.kanal,
                    absender = %datagramm.absender,
                    fehler = %e,
                    "Unerwarteter Fehler im Dispatcher"
                );
            }
        }
    }
}

/// Metrik-Label fuer nicht gebridgte Pakettypen
fn packet_label(typ: PacketType) -> &'static str {
    match typ {
        PacketType::GroupVoice => "group_voice",
        PacketType::PrivateVoice => "private_voice",
        PacketType::GroupData => "group_data",
        PacketType::PrivateData => "private_data",
        PacketType::RepeaterWakeUp => "repeater_wake_up",
        PacketType::CallMonStatus => "call_mon_status",
        PacketType::CallMonRepeat => "call_mon_repeat",
        PacketType::CallMonNack => "call_mon_nack",
        PacketType::XcmpXnl => "xcmp_xnl",
        PacketType::DeRegistrationRequest => "de_registration_request",
        PacketType::Unknown(_) => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticPeerRegistry;
    use dmrlink_core::{PeerId, StreamId, SubscriberId};
    use dmrlink_protocol::{FrameBuilder, GatewayMessage, PayloadType};
    use std::cell::RefCell;

    /// Sammelt alle Nachrichten, optional mit Ablehnung
    #[derive(Default)]
    struct SammelSink {
        nachrichten: RefCell<Vec<(ChannelId, GatewayMessage)>>,
        ablehnen: bool,
    }

    impl GatewaySink for SammelSink {
        fn try_deliver(&self, kanal: &ChannelId, nachricht: GatewayMessage) -> Result<()> {
            if self.ablehnen {
                return Err(DmrlinkError::GatewayQueueVoll(kanal.to_string()));
            }
            self.nachrichten.borrow_mut().push((kanal.clone(), nachricht));
            Ok(())
        }
    }

    fn dispatcher(sink: SammelSink) -> BridgeDispatcher<SammelSink> {
        let registry: StaticPeerRegistry =
            [(SubscriberId(9), PeerId(312999))].into_iter().collect();
        let mut d = BridgeDispatcher::neu(sink, Arc::new(registry), BridgeMetrics::neu().unwrap())
            .mit_color_code(3);
        d.kanal_registrieren(ChannelId::neu("IPSC1"));
        d
    }

    fn kanal() -> ChannelId {
        ChannelId::neu("IPSC1")
    }

    fn head(slot: Timeslot, stream: u8) -> Vec<u8> {
        FrameBuilder::neu(PayloadType::VoiceHead)
            .peer(PeerId(312000))
            .stream(StreamId(stream))
            .source(SubscriberId(3120101))
            .destination(SubscriberId(9))
            .timeslot(slot)
            .build()
    }

    fn burst(slot: Timeslot, stream: u8) -> Vec<u8> {
        let typ = match slot {
            Timeslot::Slot1 => PayloadType::Slot1Voice,
            Timeslot::Slot2 => PayloadType::Slot2Voice,
        };
        FrameBuilder::neu(typ)
            .stream(StreamId(stream))
            .timeslot(slot)
            .payload(&[0u8; 21])
            .build()
    }

    fn term(slot: Timeslot, stream: u8) -> Vec<u8> {
        FrameBuilder::neu(PayloadType::VoiceTerm)
            .stream(StreamId(stream))
            .timeslot(slot)
            .letztes_fragment(true)
            .build()
    }

    #[test]
    fn begin_call_wird_mit_registry_angereichert() {
        let mut d = dispatcher(SammelSink::default());
        let ereignis = d
            .frame_verarbeiten(&kanal(), &head(Timeslot::Slot2, 4))
            .unwrap();

        match ereignis {
            Some(BridgeEvent::BeginCall(b)) => {
                assert_eq!(b.slot, Timeslot::Slot2);
                assert_eq!(b.destination_peer, Some(PeerId(312999)));
            }
            andere => panic!("BeginCall erwartet: {andere:?}"),
        }

        let nachrichten = d.gateway().nachrichten.borrow();
        assert_eq!(nachrichten.len(), 1);
        assert!(matches!(
            nachrichten[0].1,
            GatewayMessage::BeginTx { color_code: 3, slot: Timeslot::Slot2, .. }
        ));
        assert_eq!(d.metriken.active_calls.get(), 1);
        assert_eq!(
            d.metriken.events_delivered.with_label_values(&["begin_call"]).get(),
            1
        );
    }

    #[test]
    fn unbekanntes_ziel_bleibt_ohne_peer() {
        let mut d = dispatcher(SammelSink::default());
        let frame = FrameBuilder::neu(PayloadType::VoiceHead)
            .stream(StreamId(7))
            .destination(SubscriberId(4711))
            .timeslot(Timeslot::Slot1)
            .build();

        match d.frame_verarbeiten(&kanal(), &frame).unwrap() {
            Some(BridgeEvent::BeginCall(b)) => {
                assert_eq!(b.destination, SubscriberId(4711));
                assert_eq!(b.destination_peer, None);
            }
            andere => panic!("BeginCall erwartet: {andere:?}"),
        }
    }

    #[test]
    fn slots_sind_unabhaengig() {
        let mut d = dispatcher(SammelSink::default());
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot1, 1)).unwrap();
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot2, 2)).unwrap();
        d.frame_verarbeiten(&kanal(), &term(Timeslot::Slot1, 1)).unwrap();

        let ts1 = d.slot_zustand(&kanal(), Timeslot::Slot1).unwrap();
        let ts2 = d.slot_zustand(&kanal(), Timeslot::Slot2).unwrap();
        assert!(!ts1.busy());
        assert_eq!(ts2.active_stream_id(), Some(StreamId(2)));
        assert_eq!(d.aktive_anrufe(), 1);
        assert_eq!(d.metriken.active_calls.get(), 1);
    }

    #[test]
    fn kanaele_sind_unabhaengig() {
        let mut d = dispatcher(SammelSink::default());
        let zweiter = ChannelId::neu("IPSC2");
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot1, 1)).unwrap();
        d.frame_verarbeiten(&zweiter, &head(Timeslot::Slot1, 1)).unwrap();

        assert_eq!(d.aktive_anrufe(), 2);
        let nachrichten = d.gateway().nachrichten.borrow();
        assert_eq!(nachrichten[0].0, kanal());
        assert_eq!(nachrichten[1].0, zweiter);
    }

    #[test]
    fn fehlerhafter_frame_wird_gezaehlt() {
        let mut d = dispatcher(SammelSink::default());
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot1, 1)).unwrap();
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot2, 2)).unwrap();
        let ts1 = d.slot_zustand(&kanal(), Timeslot::Slot1).cloned().unwrap();
        let ts2 = d.slot_zustand(&kanal(), Timeslot::Slot2).cloned().unwrap();

        // Erstes Byte waere ein gueltiger Voice-Typ, der Rest fehlt
        let fehler = d.frame_verarbeiten(&kanal(), &[0x80; 10]).unwrap_err();
        assert!(matches!(fehler, DmrlinkError::MalformedFrame { laenge: 10, .. }));
        assert_eq!(
            d.metriken.frame_errors.with_label_values(&["malformed_frame"]).get(),
            1
        );
        assert_eq!(d.metriken.frames_received.get(), 3);

        assert_eq!(d.slot_zustand(&kanal(), Timeslot::Slot1), Some(&ts1));
        assert_eq!(d.slot_zustand(&kanal(), Timeslot::Slot2), Some(&ts2));
        assert_eq!(d.aktive_anrufe(), 2);
        assert_eq!(d.gateway().nachrichten.borrow().len(), 2);
    }

    #[test]
    fn kurzer_voice_burst_wird_als_insufficient_data_gezaehlt() {
        let mut d = dispatcher(SammelSink::default());
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot1, 1)).unwrap();
        let kurz = FrameBuilder::neu(PayloadType::Slot1Voice)
            .stream(StreamId(1))
            .payload(&[0u8; 5])
            .build();

        assert!(d.frame_verarbeiten(&kanal(), &kurz).is_err());
        assert_eq!(
            d.metriken.frame_errors.with_label_values(&["insufficient_data"]).get(),
            1
        );
        assert_eq!(d.slot_zustand(&kanal(), Timeslot::Slot1).unwrap().frame_count(), 1);
    }

    #[test]
    fn privat_voice_und_andere_pakete_werden_ignoriert() {
        let mut d = dispatcher(SammelSink::default());
        let privat = FrameBuilder::neu(PayloadType::VoiceHead)
            .packet_type(PacketType::PrivateVoice)
            .build();
        let xnl = FrameBuilder::neu(PayloadType::VoiceHead)
            .packet_type(PacketType::XcmpXnl)
            .build();

        assert!(d.frame_verarbeiten(&kanal(), &privat).unwrap().is_none());
        assert!(d.frame_verarbeiten(&kanal(), &xnl).unwrap().is_none());
        assert_eq!(d.aktive_anrufe(), 0);
        assert_eq!(
            d.metriken.packets_ignored.with_label_values(&["private_voice"]).get(),
            1
        );
        assert_eq!(
            d.metriken.packets_ignored.with_label_values(&["xcmp_xnl"]).get(),
            1
        );
    }

    #[test]
    fn verwaister_burst_wird_gezaehlt_und_zugestellt() {
        let mut d = dispatcher(SammelSink::default());
        let ereignis = d
            .frame_verarbeiten(&kanal(), &burst(Timeslot::Slot1, 7))
            .unwrap();
        assert!(matches!(
            ereignis,
            Some(BridgeEvent::VoicePayload(ref p)) if p.orphaned
        ));
        assert_eq!(d.metriken.orphaned_payloads.get(), 1);
        assert_eq!(d.gateway().nachrichten.borrow().len(), 1);
    }

    #[test]
    fn abgelehnte_zustellung_aendert_zustand_trotzdem() {
        let mut d = dispatcher(SammelSink {
            ablehnen: true,
            ..SammelSink::default()
        });
        d.frame_verarbeiten(&kanal(), &head(Timeslot::Slot1, 1)).unwrap();
        d.frame_verarbeiten(&kanal(), &burst(Timeslot::Slot1, 1)).unwrap();

        assert!(d.slot_zustand(&kanal(), Timeslot::Slot1).unwrap().busy());
        assert_eq!(d.metriken.verworfen_gesamt(), 2);
        assert_eq!(
            d.metriken.events_dropped.with_label_values(&["voice_payload"]).get(),
            1
        );
    }

    #[test]
    fn handler_trait_schluckt_fehler() {
        let mut d = dispatcher(SammelSink::default());
        d.datagramm_verarbeiten(IncomingDatagram {
            kanal: kanal(),
            absender: "127.0.0.1:50000".parse().unwrap(),
            daten: vec![0u8; 3],
        });
        d.datagramm_verarbeiten(IncomingDatagram {
            kanal: kanal(),
            absender: "127.0.0.1:50000".parse().unwrap(),
            daten: head(Timeslot::Slot1, 9),
        });
        assert_eq!(d.metriken.frames_received.get(), 2);
        assert_eq!(d.aktive_anrufe(), 1);
    }
}
