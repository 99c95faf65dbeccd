//! Gateway-Zustellung – Send-Queue pro Kanal und Slot
//!
//! Der Dispatcher legt Nachrichten nicht-blockierend in eine Queue, ein
//! eigener Sende-Task pro Queue kodiert sie als TLV und schreibt sie per UDP
//! an das Vocoder-Gateway.
//!
//! ```text
//! BridgeDispatcher
//!     |
//!     v  try_deliver (try_send, nie blockierend)
//! GatewayRouter ── (Kanal, Slot) ──▶ mpsc(1) ──▶ GatewaySenderHandle ──▶ UDP send_to
//! ```
//!
//! Pro Slot ist hoechstens ein Ereignis unterwegs. Jede [`Zustellung`] haelt
//! die einzige Freigabe ihres Slots, bis der Sende-Task das Datagramm
//! geschrieben hat; erst dann nimmt der Router das naechste Ereignis an.
//! Ein langsames Gateway bremst nie den Empfang, ueberzaehlige Ereignisse
//! werden verworfen.

use bytes::BytesMut;
use dmrlink_core::{ChannelId, DmrlinkError, Result, Timeslot};
use dmrlink_protocol::{GatewayCodec, GatewayMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::codec::Encoder;

/// Maximal gleichzeitig unterwegs befindliche Ereignisse pro Kanal und Slot
pub const GATEWAY_QUEUE_GROESSE: usize = 1;

/// Eine angenommene Gateway-Nachricht samt Slot-Freigabe
///
/// Die Freigabe wird mit der Zustellung gedroppt.
#[derive(Debug)]
pub struct Zustellung {
    pub nachricht: GatewayMessage,
    _freigabe: OwnedSemaphorePermit,
}

/// Ziel fuer Gateway-Nachrichten
///
/// `try_deliver` darf nie blockieren. Ein Fehler bedeutet, dass die
/// Nachricht verworfen wurde.
pub trait GatewaySink {
    fn try_deliver(&self, kanal: &ChannelId, nachricht: GatewayMessage) -> Result<()>;
}

// ---------------------------------------------------------------------------
// GatewayRouter
// ---------------------------------------------------------------------------

/// Verteilt Gateway-Nachrichten auf die Send-Queues der Slots
#[derive(Debug, Default)]
pub struct GatewayRouter {
    queues: HashMap<(ChannelId, Timeslot), SlotQueue>,
}

#[derive(Debug)]
struct SlotQueue {
    tx: mpsc::Sender<Zustellung>,
    freigaben: Arc<Semaphore>,
}

impl GatewayRouter {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt die Send-Queue fuer einen Slot an
    ///
    /// Gibt die Receive-Seite zurueck, aus der der Sende-Task lesen soll.
    /// Eine bestehende Queue wird ersetzt.
    pub fn slot_queue_anlegen(
        &mut self,
        kanal: ChannelId,
        slot: Timeslot,
    ) -> mpsc::Receiver<Zustellung> {
        let (tx, rx) = mpsc::channel(GATEWAY_QUEUE_GROESSE);
        let freigaben = Arc::new(Semaphore::new(GATEWAY_QUEUE_GROESSE));
        tracing::debug!(%kanal, %slot, "Gateway-Queue angelegt");
        self.queues.insert((kanal, slot), SlotQueue { tx, freigaben });
        rx
    }

    /// Legt Queues fuer beide Slots an und startet die Sende-Tasks
    pub fn kanal_anbinden(
        &mut self,
        kanal: &ChannelId,
        socket: Arc<UdpSocket>,
        ziel: SocketAddr,
    ) -> Vec<GatewaySenderHandle> {
        Timeslot::ALLE
            .iter()
            .map(|&slot| {
                let rx = self.slot_queue_anlegen(kanal.clone(), slot);
                GatewaySenderHandle::starten(Arc::clone(&socket), ziel, rx)
            })
            .collect()
    }

    /// Anzahl angelegter Slot-Queues
    pub fn queue_anzahl(&self) -> usize {
        self.queues.len()
    }
}

impl GatewaySink for GatewayRouter {
    fn try_deliver(&self, kanal: &ChannelId, nachricht: GatewayMessage) -> Result<()> {
        let slot = nachricht.slot();
        let queue = self
            .queues
            .get(&(kanal.clone(), slot))
            .ok_or_else(|| DmrlinkError::GatewayNichtVerfuegbar(format!("{kanal} {slot}")))?;

        // Vorheriges Ereignis noch in der Queue oder im Sende-Task
        let freigabe = Arc::clone(&queue.freigaben)
            .try_acquire_owned()
            .map_err(|_| DmrlinkError::GatewayQueueVoll(format!("{kanal} {slot}")))?;

        // Nicht-blockierend senden – bei voller Queue verwerfen (UDP-Semantik)
        let zustellung = Zustellung {
            nachricht,
            _freigabe: freigabe,
        };
        match queue.tx.try_send(zustellung) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(DmrlinkError::GatewayQueueVoll(format!("{kanal} {slot}")))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(
                DmrlinkError::GatewayNichtVerfuegbar(format!("{kanal} {slot}: Sende-Task beendet")),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// GatewaySenderHandle – Sende-Task pro Slot
// ---------------------------------------------------------------------------

/// Handle fuer einen Gateway-Sende-Task
///
/// Der Task endet, sobald die Send-Seite der Queue gedroppt wird.
pub struct GatewaySenderHandle {
    ziel: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl GatewaySenderHandle {
    /// Startet einen Sende-Task, der `rx` leert und an `ziel` sendet
    pub fn starten(
        socket: Arc<UdpSocket>,
        ziel: SocketAddr,
        mut rx: mpsc::Receiver<Zustellung>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut codec = GatewayCodec;
            let mut buf = BytesMut::with_capacity(64);

            // Die Freigabe lebt bis zum Ende des Schleifendurchlaufs
            while let Some(Zustellung { nachricht, _freigabe }) = rx.recv().await {
                buf.clear();
                if let Err(e) = codec.encode(nachricht, &mut buf) {
                    tracing::warn!(fehler = %e, "Gateway-Nachricht nicht kodierbar");
                    continue;
                }

                match socket.send_to(&buf, ziel).await {
                    Ok(_) => {
                        tracing::trace!(bytes = buf.len(), %ziel, "Gateway-Datagramm gesendet");
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, %ziel, "UDP-Sendefehler zum Gateway");
                    }
                }
            }
            tracing::debug!(%ziel, "Gateway-Sende-Task beendet");
        });

        Self { ziel, task }
    }

    pub fn ziel(&self) -> SocketAddr {
        self.ziel
    }

    /// Wartet bis der Task seine Queue geleert hat
    pub async fn beendet(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(fehler = %e, ziel = %self.ziel, "Gateway-Sende-Task abgebrochen");
        }
    }
}
