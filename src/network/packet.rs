//! Voice packet wire format
//!
//! Compact bincode framing of the two voice DTOs. Malformed inbound bytes
//! are logged with a hex dump and rejected; they never reach stream state.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_PACKET_SIZE;
use crate::error::NetworkError;

/// Transceiver a remote station was transmitting on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RxTransceiver {
    /// Tuned frequency in Hz
    pub frequency: u32,
    /// Receiver distance over maximum reception range; drives the
    /// propagation effects
    pub distance_ratio: f64,
}

/// Inbound voice: one compressed frame heard on one or more transceivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RxVoicePacket {
    pub callsign: String,
    pub sequence: u32,
    pub last_packet: bool,
    pub transceivers: Vec<RxTransceiver>,
    pub audio: Vec<u8>,
}

/// Outbound voice: one compressed frame tagged with the transmit radio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxVoicePacket {
    pub callsign: String,
    pub radio: usize,
    pub sequence: u32,
    pub last_packet: bool,
    pub audio: Vec<u8>,
}

pub fn encode_rx_packet(packet: &RxVoicePacket) -> Result<Vec<u8>, NetworkError> {
    let encoded = bincode::serialize(packet).map_err(|_| NetworkError::MalformedPacket)?;
    check_size(encoded)
}

pub fn encode_tx_packet(packet: &TxVoicePacket) -> Result<Vec<u8>, NetworkError> {
    let encoded = bincode::serialize(packet).map_err(|_| NetworkError::MalformedPacket)?;
    check_size(encoded)
}

pub fn decode_rx_packet(data: &[u8]) -> Result<RxVoicePacket, NetworkError> {
    bincode::deserialize(data).map_err(|e| {
        tracing::error!(error = %e, dump = %hex_dump(data), "malformed inbound voice packet");
        NetworkError::MalformedPacket
    })
}

pub fn decode_tx_packet(data: &[u8]) -> Result<TxVoicePacket, NetworkError> {
    bincode::deserialize(data).map_err(|e| {
        tracing::error!(error = %e, dump = %hex_dump(data), "malformed outbound voice packet");
        NetworkError::MalformedPacket
    })
}

fn check_size(encoded: Vec<u8>) -> Result<Vec<u8>, NetworkError> {
    if encoded.len() > MAX_PACKET_SIZE {
        return Err(NetworkError::PacketTooLarge(encoded.len()));
    }
    Ok(encoded)
}

const HEX_DUMP_LIMIT: usize = 64;

fn hex_dump(data: &[u8]) -> String {
    let shown = &data[..data.len().min(HEX_DUMP_LIMIT)];
    let mut out = String::with_capacity(shown.len() * 3 + 16);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", byte));
    }
    if data.len() > HEX_DUMP_LIMIT {
        out.push_str(&format!(" … ({} bytes)", data.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rx() -> RxVoicePacket {
        RxVoicePacket {
            callsign: "DAL1427".into(),
            sequence: 42,
            last_packet: false,
            transceivers: vec![RxTransceiver {
                frequency: 121_500_000,
                distance_ratio: 0.35,
            }],
            audio: vec![0xde, 0xad, 0xbe, 0xef],
        }
    }

    #[test]
    fn rx_packet_roundtrip() {
        let packet = sample_rx();
        let wire = encode_rx_packet(&packet).unwrap();
        let back = decode_rx_packet(&wire).unwrap();

        assert_eq!(back.callsign, packet.callsign);
        assert_eq!(back.sequence, packet.sequence);
        assert_eq!(back.transceivers, packet.transceivers);
        assert_eq!(back.audio, packet.audio);
    }

    #[test]
    fn tx_packet_roundtrip() {
        let packet = TxVoicePacket {
            callsign: "UAL5".into(),
            radio: 1,
            sequence: 9001,
            last_packet: true,
            audio: vec![1, 2, 3],
        };
        let wire = encode_tx_packet(&packet).unwrap();
        let back = decode_tx_packet(&wire).unwrap();

        assert_eq!(back.radio, 1);
        assert!(back.last_packet);
        assert_eq!(back.sequence, 9001);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let wire = encode_rx_packet(&sample_rx()).unwrap();
        assert!(matches!(
            decode_rx_packet(&wire[..wire.len() / 2]),
            Err(NetworkError::MalformedPacket)
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut packet = sample_rx();
        packet.audio = vec![0; MAX_PACKET_SIZE + 1];
        assert!(matches!(
            encode_rx_packet(&packet),
            Err(NetworkError::PacketTooLarge(_))
        ));
    }

    #[test]
    fn hex_dump_is_bounded() {
        let dump = hex_dump(&vec![0xab; 200]);
        assert!(dump.starts_with("ab ab"));
        assert!(dump.ends_with("(200 bytes)"));
    }
}
