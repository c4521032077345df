//! Incoming voice streams keyed by callsign
//!
//! One entry per active transmitter. Entries appear on the first packet
//! from a new callsign, are updated in place on later packets, and are
//! swept away once their source has been idle past the timeout.

use std::collections::{hash_map::Entry, HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::audio::mix::AlignedFrame;
use crate::audio::vhf::VhfFilter;
use crate::audio::{Sample, SampleSource, SourceStatus};
use crate::codec::VoiceDecoder;
use crate::constants::FRAME_SIZE_SAMPLES;
use crate::network::RxTransceiver;

/// Consecutive missing frames concealed before a stream goes inactive
const PLC_FRAME_BUDGET: u32 = 2;

/// Decoded-sample backlog cap, in frames
const MAX_QUEUED_FRAMES: usize = 50;

/// Decoded audio source for one remote transmitter.
pub struct VoiceStream {
    decoder: VoiceDecoder,
    queued: VecDeque<Sample>,
    last_activity: Instant,
    active: bool,
    ending: bool,
    concealed_run: u32,
}

impl VoiceStream {
    pub fn new() -> Result<Self, crate::error::CodecError> {
        Ok(Self {
            decoder: VoiceDecoder::new()?,
            queued: VecDeque::new(),
            last_activity: Instant::now(),
            active: false,
            ending: false,
            concealed_run: 0,
        })
    }

    /// Decode one arriving packet and append its audio.
    ///
    /// Undecodable payloads are logged and discarded without touching
    /// stream state.
    pub fn append_packet(&mut self, audio: &[u8], last_packet: bool) {
        self.last_activity = Instant::now();
        self.ending = last_packet;

        match self.decoder.decode(audio) {
            Ok(samples) => {
                if self.queued.len() + samples.len() > MAX_QUEUED_FRAMES * FRAME_SIZE_SAMPLES {
                    tracing::debug!("voice stream backlog full, dropping oldest audio");
                    let excess = self.queued.len() + samples.len()
                        - MAX_QUEUED_FRAMES * FRAME_SIZE_SAMPLES;
                    self.queued.drain(..excess);
                }
                self.queued.extend(samples.iter().copied());
                self.active = true;
                self.concealed_run = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable voice payload");
            }
        }
    }

    /// Whether the stream is currently producing audio.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When the last packet arrived.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}

impl SampleSource for VoiceStream {
    fn get_audio_frame(&mut self, buffer_out: &mut [Sample]) -> SourceStatus {
        if self.queued.len() >= FRAME_SIZE_SAMPLES {
            for out in buffer_out.iter_mut() {
                // length was checked, the queue cannot run dry mid-frame
                *out = self.queued.pop_front().unwrap_or(0.0);
            }
            return SourceStatus::Ok;
        }

        if !self.ending && self.concealed_run < PLC_FRAME_BUDGET {
            // bridge a jitter gap with concealment
            self.concealed_run += 1;
            return match self.decoder.decode_plc() {
                Ok(samples) => {
                    let n = samples.len().min(buffer_out.len());
                    buffer_out[..n].copy_from_slice(&samples[..n]);
                    buffer_out[n..].fill(0.0);
                    SourceStatus::Ok
                }
                Err(e) => {
                    tracing::warn!(error = %e, "voice stream concealment failed");
                    self.active = false;
                    SourceStatus::Error
                }
            };
        }

        // transmission over or the gap outlived the concealment budget
        self.active = false;
        if self.queued.is_empty() {
            return SourceStatus::Closed;
        }
        let mut written = 0;
        while written < buffer_out.len() {
            match self.queued.pop_front() {
                Some(sample) => {
                    buffer_out[written] = sample;
                    written += 1;
                }
                None => break,
            }
        }
        buffer_out[written..].fill(0.0);
        SourceStatus::Ok
    }
}

/// Registry entry: the stream plus its most recent transceiver list and
/// the per-frame mixing scratch.
pub struct StreamEntry {
    pub source: VoiceStream,
    pub transceivers: Vec<RxTransceiver>,
    pub voice_filter: VhfFilter,
    pub(crate) frame_cache: Box<AlignedFrame>,
    pub(crate) eq_cache: Box<AlignedFrame>,
    pub(crate) cache_valid: bool,
    pub(crate) eq_valid: bool,
}

impl StreamEntry {
    fn new() -> Result<Self, crate::error::CodecError> {
        Ok(Self {
            source: VoiceStream::new()?,
            transceivers: Vec::new(),
            voice_filter: VhfFilter::new(),
            frame_cache: AlignedFrame::zeroed(),
            eq_cache: AlignedFrame::zeroed(),
            cache_valid: false,
            eq_valid: false,
        })
    }
}

/// All incoming streams, keyed by callsign. Guarded externally by the
/// stream-map lock.
#[derive(Default)]
pub struct StreamRegistry {
    streams: HashMap<String, StreamEntry>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
        }
    }

    /// Find-or-create the entry for a callsign, append the packet's audio
    /// and replace the transceiver list.
    pub fn append_packet(&mut self, packet: &crate::network::RxVoicePacket) {
        let entry = match self.streams.entry(packet.callsign.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => match StreamEntry::new() {
                Ok(entry) => {
                    tracing::debug!(callsign = %packet.callsign, "new incoming voice stream");
                    vacant.insert(entry)
                }
                Err(e) => {
                    tracing::error!(error = %e, "cannot set up decoder for incoming stream");
                    return;
                }
            },
        };
        entry.source.append_packet(&packet.audio, packet.last_packet);
        entry.transceivers = packet.transceivers.clone();
    }

    /// Remove entries idle longer than `timeout`. Returns how many were
    /// evicted.
    pub fn sweep_idle(&mut self, timeout: Duration) -> usize {
        let before = self.streams.len();
        let now = Instant::now();
        self.streams.retain(|callsign, entry| {
            let keep = now.duration_since(entry.source.last_activity()) <= timeout;
            if !keep {
                tracing::debug!(callsign = %callsign, "evicting idle voice stream");
            }
            keep
        });
        before - self.streams.len()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut StreamEntry> {
        self.streams.values_mut()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn contains(&self, callsign: &str) -> bool {
        self.streams.contains_key(callsign)
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::VoiceEncoder;
    use crate::constants::DEFAULT_VOICE_BITRATE;
    use crate::network::RxVoicePacket;

    fn encoded_frame(encoder: &mut VoiceEncoder, amplitude: f32) -> Vec<u8> {
        let samples: Vec<Sample> = (0..FRAME_SIZE_SAMPLES)
            .map(|i| (i as f32 * 0.05).sin() * amplitude)
            .collect();
        encoder.encode(&samples).unwrap().to_vec()
    }

    fn packet(callsign: &str, audio: Vec<u8>, last: bool) -> RxVoicePacket {
        RxVoicePacket {
            callsign: callsign.into(),
            sequence: 0,
            last_packet: last,
            transceivers: vec![RxTransceiver {
                frequency: 121_500_000,
                distance_ratio: 0.5,
            }],
            audio,
        }
    }

    #[test]
    fn one_entry_per_callsign() {
        let mut registry = StreamRegistry::new();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();

        registry.append_packet(&packet("AAL1", encoded_frame(&mut encoder, 0.5), false));
        registry.append_packet(&packet("AAL1", encoded_frame(&mut encoder, 0.5), false));
        registry.append_packet(&packet("UAL2", encoded_frame(&mut encoder, 0.5), false));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("AAL1"));
        assert!(registry.contains("UAL2"));
    }

    #[test]
    fn transceiver_list_is_replaced() {
        let mut registry = StreamRegistry::new();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();

        registry.append_packet(&packet("AAL1", encoded_frame(&mut encoder, 0.5), false));
        let mut second = packet("AAL1", encoded_frame(&mut encoder, 0.5), false);
        second.transceivers = vec![RxTransceiver {
            frequency: 118_000_000,
            distance_ratio: 0.1,
        }];
        registry.append_packet(&second);

        let entry = registry.entries_mut().next().unwrap();
        assert_eq!(entry.transceivers.len(), 1);
        assert_eq!(entry.transceivers[0].frequency, 118_000_000);
    }

    #[test]
    fn stream_produces_then_closes_after_terminal_packet() {
        let mut registry = StreamRegistry::new();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();

        registry.append_packet(&packet("AAL1", encoded_frame(&mut encoder, 0.5), true));
        let entry = registry.entries_mut().next().unwrap();
        assert!(entry.source.is_active());

        let mut frame = vec![0.0; FRAME_SIZE_SAMPLES];
        assert_eq!(entry.source.get_audio_frame(&mut frame), SourceStatus::Ok);
        assert_eq!(
            entry.source.get_audio_frame(&mut frame),
            SourceStatus::Closed
        );
        assert!(!entry.source.is_active());
    }

    #[test]
    fn gap_is_concealed_within_budget() {
        let mut stream = VoiceStream::new().unwrap();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();
        stream.append_packet(&encoded_frame(&mut encoder, 0.5), false);

        let mut frame = vec![0.0; FRAME_SIZE_SAMPLES];
        assert_eq!(stream.get_audio_frame(&mut frame), SourceStatus::Ok);
        // no packet arrived: two concealed frames, then the stream closes
        assert_eq!(stream.get_audio_frame(&mut frame), SourceStatus::Ok);
        assert_eq!(stream.get_audio_frame(&mut frame), SourceStatus::Ok);
        assert_eq!(stream.get_audio_frame(&mut frame), SourceStatus::Closed);
        assert!(!stream.is_active());
    }

    #[test]
    fn new_packet_reactivates_stream() {
        let mut stream = VoiceStream::new().unwrap();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();
        stream.append_packet(&encoded_frame(&mut encoder, 0.5), true);

        let mut frame = vec![0.0; FRAME_SIZE_SAMPLES];
        while stream.get_audio_frame(&mut frame) != SourceStatus::Closed {}
        assert!(!stream.is_active());

        stream.append_packet(&encoded_frame(&mut encoder, 0.5), false);
        assert!(stream.is_active());
        assert_eq!(stream.get_audio_frame(&mut frame), SourceStatus::Ok);
    }

    #[test]
    fn undecodable_payload_leaves_stream_intact() {
        let mut stream = VoiceStream::new().unwrap();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();
        stream.append_packet(&encoded_frame(&mut encoder, 0.5), false);
        let queued_before = stream.queued.len();

        stream.append_packet(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff], false);
        // payload was discarded or decoded as noise, but the stream survives
        assert!(stream.queued.len() >= queued_before);
        assert!(stream.is_active());
    }

    #[test]
    fn sweep_evicts_only_idle_entries() {
        let mut registry = StreamRegistry::new();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();

        registry.append_packet(&packet("AAL1", encoded_frame(&mut encoder, 0.5), false));
        assert_eq!(registry.sweep_idle(Duration::from_secs(60)), 0);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.sweep_idle(Duration::ZERO), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn backlog_is_bounded() {
        let mut stream = VoiceStream::new().unwrap();
        let mut encoder = VoiceEncoder::new(DEFAULT_VOICE_BITRATE).unwrap();

        for _ in 0..MAX_QUEUED_FRAMES + 20 {
            stream.append_packet(&encoded_frame(&mut encoder, 0.5), false);
        }
        assert!(stream.queued.len() <= MAX_QUEUED_FRAMES * FRAME_SIZE_SAMPLES);
    }
}
