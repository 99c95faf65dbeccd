//! Slot-Call-State-Tracker
//!
//! Zustandsmaschine pro Timeslot mit den Zustaenden `Idle` und `Active`:
//!
//! ```text
//!            VoiceHead (neuer Stream)
//!   Idle ───────────────────────────────▶ Active ◀─┐ VoiceHead (anderer Stream)
//!    ▲                                      │  │    │ verdraengt ohne EndCall
//!    └──────────── VoiceTerm ───────────────┘  └────┘
//! ```
//!
//! Ein Voice-Header mit abweichender Stream-ID verdraengt den laufenden
//! Stream ohne EndCall. Ein verlorener Terminator darf den Slot nie
//! dauerhaft blockieren. Doppelte Header und Terminatoren sind No-ops, auch
//! ein verspaeteter Header des gerade beendeten Streams.
//!
//! Der Zustand gehoert dem Dispatcher und wird per `&mut` uebergeben.

use crate::event::{BeginCall, BridgeEvent, EndCall, VoicePayload};
use dmrlink_core::{DmrlinkError, Result, StreamId, Timeslot};
use dmrlink_protocol::ambe::ambe_extrahieren;
use dmrlink_protocol::{CallFrame, PayloadType};

/// Phase eines Slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    Active,
}

/// Zustand eines einzelnen Timeslots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotState {
    active_stream_id: Option<StreamId>,
    /// Zuletzt begonnener Stream, bleibt nach dem Anrufende erhalten
    last_stream_id: Option<StreamId>,
    last_sequence: Option<u16>,
    frame_count: u32,
    busy: bool,
}

impl SlotState {
    /// Stream, der den Slot gerade belegt
    pub fn active_stream_id(&self) -> Option<StreamId> {
        self.active_stream_id
    }

    /// Zuletzt begonnener Stream (auch nach EndCall)
    pub fn last_stream_id(&self) -> Option<StreamId> {
        self.last_stream_id
    }

    /// Zuletzt gesehene RTP-Sequenz
    pub fn last_sequence(&self) -> Option<u16> {
        self.last_sequence
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// True zwischen BeginCall und EndCall
    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn phase(&self) -> SlotPhase {
        if self.busy {
            SlotPhase::Active
        } else {
            SlotPhase::Idle
        }
    }
}

/// Verarbeitet einen Gruppen-Voice-Frame fuer einen Slot
///
/// Liefert hoechstens ein Ereignis. Bei `InsufficientData` ist der Zustand
/// bereits fortgeschrieben, nur das VoicePayload-Ereignis entfaellt.
///
/// # Fehler
/// - `UnbekannterPayloadTyp` – Zustand bleibt unveraendert
/// - `InsufficientData` – Voice-Burst kuerzer als das AMBE-Fenster
pub fn process(
    state: &mut SlotState,
    slot: Timeslot,
    frame: &CallFrame<'_>,
) -> Result<Option<BridgeEvent>> {
    match frame.payload_type() {
        PayloadType::VoiceHead => Ok(voice_head(state, slot, frame)),
        PayloadType::VoiceTerm => Ok(voice_term(state, slot)),
        PayloadType::Slot1Voice | PayloadType::Slot2Voice => voice_burst(state, slot, frame),
        PayloadType::Unknown(typ) => Err(DmrlinkError::UnbekannterPayloadTyp(typ)),
    }
}

fn voice_head(state: &mut SlotState, slot: Timeslot, frame: &CallFrame<'_>) -> Option<BridgeEvent> {
    let stream_id = frame.stream_id();

    // Header werden mehrfach gesendet und koennen den Terminator ueberholen
    if state.last_stream_id == Some(stream_id) {
        tracing::trace!(%slot, %stream_id, aktiv = state.busy, "Wiederholter Voice-Header");
        return None;
    }

    if let Some(alter_stream) = state.active_stream_id.filter(|_| state.busy) {
        tracing::debug!(
            %slot,
            alter_stream = %alter_stream,
            neuer_stream = %stream_id,
            frames = state.frame_count,
            "Stream verdraengt (Terminator verloren)"
        );
    }

    state.active_stream_id = Some(stream_id);
    state.last_stream_id = Some(stream_id);
    state.last_sequence = Some(frame.rtp_sequence());
    state.frame_count = 0;
    state.busy = true;

    tracing::debug!(%slot, %stream_id, "Stream belegt Slot");

    Some(BridgeEvent::BeginCall(BeginCall {
        slot,
        source: frame.source(),
        destination: frame.destination(),
        peer: frame.peer_id(),
        destination_peer: None,
        stream_id,
        initial_sequence: frame.rtp_sequence(),
    }))
}

fn voice_term(state: &mut SlotState, slot: Timeslot) -> Option<BridgeEvent> {
    let stream_id = match state.active_stream_id.filter(|_| state.busy) {
        Some(id) => id,
        None => {
            tracing::trace!(%slot, "Terminator fuer freien Slot ignoriert");
            return None;
        }
    };

    state.active_stream_id = None;
    state.busy = false;

    tracing::info!(%slot, %stream_id, frames = state.frame_count, "Anrufende");

    Some(BridgeEvent::EndCall(EndCall {
        slot,
        stream_id,
        frame_count: state.frame_count,
    }))
}

fn voice_burst(
    state: &mut SlotState,
    slot: Timeslot,
    frame: &CallFrame<'_>,
) -> Result<Option<BridgeEvent>> {
    state.frame_count = state.frame_count.wrapping_add(1);
    state.last_sequence = Some(frame.rtp_sequence());

    let ambe = ambe_extrahieren(frame.raw())?;
    let orphaned = !state.busy;

    Ok(Some(BridgeEvent::VoicePayload(VoicePayload {
        slot,
        stream_id: state.active_stream_id.filter(|_| state.busy),
        rtp_sequence: frame.rtp_sequence(),
        frame_count: state.frame_count,
        ambe,
        orphaned,
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use dmrlink_core::{PeerId, SubscriberId};
    use dmrlink_protocol::ambe::{ambe_einpacken, AMBE_NUTZDATEN_LAENGE};
    use dmrlink_protocol::{decode, FrameBuilder};

    fn head(stream: u8) -> Vec<u8> {
        FrameBuilder::neu(PayloadType::VoiceHead)
            .peer(PeerId(312000))
            .stream(StreamId(stream))
            .source(SubscriberId(3120101))
            .destination(SubscriberId(9))
            .rtp_sequence(100)
            .build()
    }

    fn burst(stream: u8, seq: u16, fuell: u8) -> Vec<u8> {
        let mut payload = vec![0u8; 2];
        payload.extend_from_slice(&ambe_einpacken(&[fuell; AMBE_NUTZDATEN_LAENGE]));
        FrameBuilder::neu(PayloadType::Slot1Voice)
            .stream(StreamId(stream))
            .rtp_sequence(seq)
            .payload(&payload)
            .build()
    }

    fn term(stream: u8) -> Vec<u8> {
        FrameBuilder::neu(PayloadType::VoiceTerm)
            .stream(StreamId(stream))
            .letztes_fragment(true)
            .build()
    }

    fn verarbeiten(state: &mut SlotState, bytes: &[u8]) -> Result<Option<BridgeEvent>> {
        let frame = decode(bytes).expect("Frame muss dekodierbar sein");
        process(state, Timeslot::Slot1, &frame)
    }

    #[test]
    fn kompletter_anruf() {
        let mut state = SlotState::default();
        let frames = [head(5), burst(5, 101, 0x00), burst(5, 102, 0xFF), term(5)];

        let ereignisse: Vec<BridgeEvent> = frames
            .iter()
            .filter_map(|f| verarbeiten(&mut state, f).unwrap())
            .collect();

        assert_eq!(ereignisse.len(), 4);
        match &ereignisse[0] {
            BridgeEvent::BeginCall(b) => {
                assert_eq!(b.stream_id, StreamId(5));
                assert_eq!(b.source, SubscriberId(3120101));
                assert_eq!(b.destination, SubscriberId(9));
                assert_eq!(b.peer, PeerId(312000));
                assert_eq!(b.initial_sequence, 100);
            }
            andere => panic!("BeginCall erwartet: {andere:?}"),
        }
        let zaehler: Vec<u32> = ereignisse
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::VoicePayload(p) => {
                    assert_eq!(p.stream_id, Some(StreamId(5)));
                    assert!(!p.orphaned);
                    Some(p.frame_count)
                }
                _ => None,
            })
            .collect();
        assert_eq!(zaehler, vec![1, 2]);
        assert!(matches!(
            &ereignisse[3],
            BridgeEvent::EndCall(EndCall { stream_id: StreamId(5), frame_count: 2, .. })
        ));

        assert_eq!(state.phase(), SlotPhase::Idle);
        assert!(!state.busy());
        assert_eq!(state.active_stream_id(), None);
    }

    #[test]
    fn voice_payload_traegt_extrahierte_ambe_daten() {
        let mut state = SlotState::default();
        verarbeiten(&mut state, &head(1)).unwrap();
        // 0xFF in jedem Block: nur die 49 Nutzbits ueberleben das Einpacken
        match verarbeiten(&mut state, &burst(1, 7, 0xFF)).unwrap() {
            Some(BridgeEvent::VoicePayload(p)) => {
                assert_eq!(p.rtp_sequence, 7);
                assert_eq!(&p.ambe[..7], &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x80]);
            }
            andere => panic!("VoicePayload erwartet: {andere:?}"),
        }
        assert_eq!(state.last_sequence(), Some(7));
    }

    #[test]
    fn preemption_ohne_end_call() {
        let mut state = SlotState::default();
        let a = verarbeiten(&mut state, &head(5)).unwrap();
        verarbeiten(&mut state, &burst(5, 101, 0)).unwrap();
        let b = verarbeiten(&mut state, &head(9)).unwrap();

        assert!(matches!(a, Some(BridgeEvent::BeginCall(BeginCall { stream_id: StreamId(5), .. }))));
        assert!(matches!(b, Some(BridgeEvent::BeginCall(BeginCall { stream_id: StreamId(9), .. }))));
        assert_eq!(state.active_stream_id(), Some(StreamId(9)));
        assert_eq!(state.frame_count(), 0, "Neuer Stream setzt den Zaehler zurueck");
        assert_eq!(state.phase(), SlotPhase::Active);
    }

    #[test]
    fn wiederholter_header_ist_noop() {
        let mut state = SlotState::default();
        assert!(verarbeiten(&mut state, &head(5)).unwrap().is_some());
        verarbeiten(&mut state, &burst(5, 101, 0)).unwrap();
        assert!(verarbeiten(&mut state, &head(5)).unwrap().is_none());
        assert_eq!(state.frame_count(), 1);
    }

    #[test]
    fn terminator_auf_freiem_slot_ist_noop() {
        let mut state = SlotState::default();
        assert!(verarbeiten(&mut state, &term(5)).unwrap().is_none());
        assert_eq!(state, SlotState::default());

        verarbeiten(&mut state, &head(5)).unwrap();
        assert!(verarbeiten(&mut state, &term(5)).unwrap().is_some());
        assert!(verarbeiten(&mut state, &term(5)).unwrap().is_none());
    }

    #[test]
    fn verspaeteter_header_nach_ende_ist_noop() {
        let mut state = SlotState::default();
        let ereignisse: Vec<&str> = [head(5), head(5), term(5), head(5)]
            .iter()
            .filter_map(|f| verarbeiten(&mut state, f).unwrap())
            .map(|e| e.label())
            .collect();

        assert_eq!(ereignisse, vec!["begin_call", "end_call"]);
        assert_eq!(state.phase(), SlotPhase::Idle);
        assert_eq!(state.last_stream_id(), Some(StreamId(5)));
    }

    #[test]
    fn neuer_stream_nach_ende_startet_neu() {
        let mut state = SlotState::default();
        verarbeiten(&mut state, &head(5)).unwrap();
        verarbeiten(&mut state, &term(5)).unwrap();
        assert!(matches!(
            verarbeiten(&mut state, &head(6)).unwrap(),
            Some(BridgeEvent::BeginCall(BeginCall { stream_id: StreamId(6), .. }))
        ));
        assert!(state.busy());
    }

    #[test]
    fn voice_ohne_header_ist_verwaist() {
        let mut state = SlotState::default();
        match verarbeiten(&mut state, &burst(3, 50, 0)).unwrap() {
            Some(BridgeEvent::VoicePayload(p)) => {
                assert!(p.orphaned);
                assert_eq!(p.stream_id, None);
                assert_eq!(p.frame_count, 1);
            }
            andere => panic!("VoicePayload erwartet: {andere:?}"),
        }
        assert_eq!(state.phase(), SlotPhase::Idle);
    }

    #[test]
    fn zu_kurzer_burst_unterdrueckt_nur_das_ereignis() {
        let mut state = SlotState::default();
        verarbeiten(&mut state, &head(5)).unwrap();
        let kurz = FrameBuilder::neu(PayloadType::Slot1Voice)
            .stream(StreamId(5))
            .rtp_sequence(101)
            .payload(&[0u8; 10])
            .build();

        assert!(matches!(
            verarbeiten(&mut state, &kurz),
            Err(DmrlinkError::InsufficientData { .. })
        ));
        assert_eq!(state.frame_count(), 1);
        assert!(state.busy());

        match verarbeiten(&mut state, &burst(5, 102, 0)).unwrap() {
            Some(BridgeEvent::VoicePayload(p)) => assert_eq!(p.frame_count, 2),
            andere => panic!("VoicePayload erwartet: {andere:?}"),
        }
    }

    #[test]
    fn unbekannter_payload_typ_aendert_nichts() {
        let mut state = SlotState::default();
        verarbeiten(&mut state, &head(5)).unwrap();
        let vorher = state.clone();

        let mut bytes = head(6);
        bytes[30] = 0x55;
        assert!(matches!(
            verarbeiten(&mut state, &bytes),
            Err(DmrlinkError::UnbekannterPayloadTyp(0x55))
        ));
        assert_eq!(state, vorher);
    }
}
