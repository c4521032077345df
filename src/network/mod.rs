//! Network surface: voice packet formats and the transport seam
//!
//! The engine does not own a socket. Inbound packets are handed to it by
//! whatever transport the client uses; outbound packets go through the
//! [`VoiceTransport`] trait.

pub mod packet;

pub use packet::{
    decode_rx_packet, decode_tx_packet, encode_rx_packet, encode_tx_packet, RxTransceiver,
    RxVoicePacket, TxVoicePacket,
};

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::NetworkError;

/// Outbound voice channel provided by the transport layer.
pub trait VoiceTransport: Send + Sync {
    /// Whether the channel is currently able to carry packets.
    fn is_open(&self) -> bool;

    /// Hand one compressed voice packet to the transport.
    fn send_voice(&self, packet: TxVoicePacket) -> Result<(), NetworkError>;
}

/// Transport that records every packet instead of sending it.
///
/// Used by tests and local monitoring tools.
pub struct LoopbackTransport {
    open: AtomicBool,
    sent: Mutex<Vec<TxVoicePacket>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Relaxed);
    }

    /// Take every packet recorded so far.
    pub fn take_sent(&self) -> Vec<TxVoicePacket> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceTransport for LoopbackTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    fn send_voice(&self, packet: TxVoicePacket) -> Result<(), NetworkError> {
        if !self.is_open() {
            return Err(NetworkError::ChannelClosed);
        }
        self.sent.lock().push(packet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_records_packets() {
        let transport = LoopbackTransport::new();
        assert!(transport.is_open());

        let pkt = TxVoicePacket {
            callsign: "SWA283".into(),
            radio: 0,
            sequence: 7,
            last_packet: false,
            audio: vec![1, 2, 3],
        };
        transport.send_voice(pkt).unwrap();

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sequence, 7);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn closed_loopback_rejects() {
        let transport = LoopbackTransport::new();
        transport.set_open(false);

        let pkt = TxVoicePacket {
            callsign: "SWA283".into(),
            radio: 0,
            sequence: 0,
            last_packet: true,
            audio: Vec::new(),
        };
        assert!(matches!(
            transport.send_voice(pkt),
            Err(NetworkError::ChannelClosed)
        ));
    }
}
