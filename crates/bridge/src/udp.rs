//! IPSC-Empfang per UDP
//!
//! Pro konfiguriertem System bindet ein [`IpscReceiver`] einen UDP-Socket.
//! Alle Empfaenger legen ihre Datagramme in eine gemeinsame Queue, die
//! genau ein Dispatcher-Task leert.
//!
//! ```text
//! IpscReceiver (IPSC1) ──┐
//! IpscReceiver (IPSC2) ──┼──▶ mpsc<IncomingDatagram> ──▶ dispatcher_loop ──▶ VoiceFrameHandler
//! IpscReceiver (...)   ──┘
//! ```

use dmrlink_core::ChannelId;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};

/// Maximale UDP-Paketgroesse (groesster IPSC-Frame + Puffer)
const UDP_BUFFER_SIZE: usize = 1500;

/// Groesse der Queue zwischen Empfaengern und Dispatcher
pub const EINGANGS_QUEUE_GROESSE: usize = 1024;

/// Ein empfangenes Datagramm mit Herkunftskanal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingDatagram {
    pub kanal: ChannelId,
    pub absender: SocketAddr,
    pub daten: Vec<u8>,
}

/// Konsument der empfangenen Datagramme
pub trait VoiceFrameHandler {
    fn datagramm_verarbeiten(&mut self, datagramm: IncomingDatagram);
}

// ---------------------------------------------------------------------------
// IpscReceiver
// ---------------------------------------------------------------------------

/// UDP-Empfaenger fuer ein IPSC-System
pub struct IpscReceiver {
    kanal: ChannelId,
    socket: UdpSocket,
}

impl IpscReceiver {
    /// Bindet den UDP-Socket fuer einen Kanal
    pub async fn binden(kanal: ChannelId, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        tracing::info!(%kanal, addr = %socket.local_addr()?, "IPSC-System gebunden");
        Ok(Self { kanal, socket })
    }

    pub fn kanal(&self) -> &ChannelId {
        &self.kanal
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Startet die Empfangs-Loop (laeuft bis `shutdown_rx` `true` meldet)
    ///
    /// Bei voller Eingangs-Queue wird das Datagramm verworfen.
    pub async fn empfangs_loop_starten(
        &self,
        tx: mpsc::Sender<IncomingDatagram>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut buf = [0u8; UDP_BUFFER_SIZE];

        tracing::debug!(kanal = %self.kanal, "IPSC-Empfangs-Loop gestartet");

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, absender)) => {
                            let datagramm = IncomingDatagram {
                                kanal: self.kanal.clone(),
                                absender,
                                daten: buf[..len].to_vec(),
                            };
                            match tx.try_send(datagramm) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    tracing::warn!(kanal = %self.kanal, "Eingangs-Queue voll – Datagramm verworfen");
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    tracing::debug!(kanal = %self.kanal, "Dispatcher beendet");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(kanal = %self.kanal, fehler = %e, "UDP-Empfangsfehler");
                            // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                    }
                }

                ergebnis = shutdown_rx.changed() => {
                    if ergebnis.is_err() || *shutdown_rx.borrow() {
                        tracing::info!(kanal = %self.kanal, "Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::debug!(kanal = %self.kanal, "IPSC-Empfangs-Loop beendet");
    }
}

/// Leert die Eingangs-Queue bis alle Empfaenger beendet sind
pub async fn dispatcher_loop<H: VoiceFrameHandler>(
    handler: &mut H,
    mut rx: mpsc::Receiver<IncomingDatagram>,
) {
    tracing::info!("Dispatcher-Loop gestartet");
    while let Some(datagramm) = rx.recv().await {
        handler.datagramm_verarbeiten(datagramm);
    }
    tracing::info!("Dispatcher-Loop beendet");
}
