//! The radio mixing engine
//!
//! Produces one mixed output frame per pull: for every configured radio it
//! selects the incoming streams matching the tuned frequency, applies
//! distance-based propagation effects, and mixes voice plus synthesized
//! receiver noises into a single accumulator. Consumes captured microphone
//! frames on the transmit side.
//!
//! Lock discipline: the radio-state lock is always acquired before the
//! stream-map lock. Frame production holds both for the whole frame;
//! setters hold the radio-state lock briefly; packet arrival holds the
//! stream-map lock briefly. The PTT flag and the transmit sequence counter
//! are atomics and never need a lock.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::audio::generators::SineToneSource;
use crate::audio::mix::{mix_buffers, AlignedFrame};
use crate::audio::sampled::RecordedSampleSource;
use crate::audio::{Sample, SampleSink, SampleSource, SourceStatus};
use crate::config::EngineConfig;
use crate::constants::{
    FRAME_SIZE_SAMPLES, MAINTENANCE_INTERVAL, STREAM_IDLE_TIMEOUT, VU_WINDOW_FRAMES,
};
use crate::error::Result;
use crate::network::{RxVoicePacket, TxVoicePacket, VoiceTransport};
use crate::radio::effects::{
    freq_is_hf, EffectResources, BLOCK_TONE_FREQUENCY_HZ, BLOCK_TONE_GAIN, CLICK_GAIN,
    HF_WHITE_NOISE_GAIN, WHITE_NOISE_GAIN,
};
use crate::radio::meter::RollingAverage;
use crate::radio::streams::StreamRegistry;
use crate::radio::tx::VoiceTxPath;

/// Fixed voice gain for HF reception
const HF_VOICE_GAIN: f32 = 0.38;

/// Attenuation slope applied to VHF voice per unit of crackle factor
const CRACKLE_VOICE_SLOPE: f32 = 3.7;

/// Per-stream crackle contribution to the radio's crackle bed gain
const CRACKLE_ACCUMULATION: f32 = 2.0;

/// Propagation crackle from a transceiver's distance ratio.
///
/// The constants are empirically tuned; they are preserved exactly and
/// intentionally not re-derived.
pub fn crackle_factor(distance_ratio: f64) -> f32 {
    let raw = (distance_ratio.exp() * distance_ratio.powf(-2.5) / 350.0) - 0.00776652;
    raw.max(0.0).min(0.15) as f32
}

/// Receive state for one configured radio.
struct RadioState {
    frequency: u32,
    gain: f32,
    bypass_effects: bool,
    /// Streams heard in the previous frame; a falling edge to zero
    /// triggers the squelch click
    last_rx_count: u32,
    click: Option<RecordedSampleSource>,
    white_noise: Option<RecordedSampleSource>,
    crackle: Option<RecordedSampleSource>,
    block_tone: Option<SineToneSource>,
}

impl RadioState {
    fn new() -> Self {
        Self {
            frequency: 0,
            gain: 1.0,
            bypass_effects: false,
            last_rx_count: 0,
            click: None,
            white_noise: None,
            crackle: None,
            block_tone: None,
        }
    }

    fn reset_effects(&mut self, except_click: bool) {
        if !except_click {
            self.click = None;
            self.last_rx_count = 0;
        }
        self.block_tone = None;
        self.white_noise = None;
        self.crackle = None;
    }
}

/// Everything behind the radio-state lock.
struct MixerState {
    radios: Vec<RadioState>,
    tx_radio: usize,
    mixing_buffer: Box<AlignedFrame>,
    fetch_buffer: Box<AlignedFrame>,
}

/// The receiver simulation and transmit pipeline.
///
/// One instance per client. Wrap it in an [`Arc`]; the `Arc` implements
/// [`SampleSource`] and [`SampleSink`] so the same mixer can be handed to
/// both sides of an audio device while control threads keep their own
/// handles.
pub struct RadioMixer {
    resources: Arc<EffectResources>,
    state: Mutex<MixerState>,
    streams: Mutex<StreamRegistry>,
    tx: Mutex<VoiceTxPath>,
    transport: Mutex<Option<Arc<dyn VoiceTransport>>>,
    callsign: Mutex<String>,
    ptt: AtomicBool,
    last_frame_ptt: AtomicBool,
    tx_sequence: AtomicU32,
    audible_streams: Vec<AtomicU32>,
    incoming_streams: AtomicU32,
    vu_meter: Mutex<RollingAverage>,
}

impl RadioMixer {
    pub fn new(
        radio_count: usize,
        resources: Arc<EffectResources>,
        voice_bitrate: u32,
    ) -> Result<Self> {
        Ok(Self {
            resources,
            state: Mutex::new(MixerState {
                radios: (0..radio_count).map(|_| RadioState::new()).collect(),
                tx_radio: 0,
                mixing_buffer: AlignedFrame::zeroed(),
                fetch_buffer: AlignedFrame::zeroed(),
            }),
            streams: Mutex::new(StreamRegistry::new()),
            tx: Mutex::new(VoiceTxPath::new(voice_bitrate)?),
            transport: Mutex::new(None),
            callsign: Mutex::new(String::new()),
            ptt: AtomicBool::new(false),
            last_frame_ptt: AtomicBool::new(false),
            tx_sequence: AtomicU32::new(0),
            audible_streams: (0..radio_count).map(|_| AtomicU32::new(0)).collect(),
            incoming_streams: AtomicU32::new(0),
            vu_meter: Mutex::new(RollingAverage::new(VU_WINDOW_FRAMES)),
        })
    }

    /// Build a mixer from a configuration in one step.
    pub fn with_config(config: &EngineConfig, resources: Arc<EffectResources>) -> Result<Self> {
        let mixer = Self::new(config.radios.len(), resources, config.voice_bitrate)?;
        for (index, radio) in config.radios.iter().enumerate() {
            mixer.set_frequency(index, radio.frequency_hz);
            mixer.set_gain(index, radio.gain);
        }
        mixer.set_tx_radio(config.tx_radio);
        mixer.set_callsign(&config.callsign);
        mixer.set_output_effects_enabled(config.output_effects);
        mixer.set_input_filter_enabled(config.input_filter);
        Ok(mixer)
    }

    // ------------------------------------------------------------------
    // Frame production (receive side)
    // ------------------------------------------------------------------

    /// Mix one output frame into `buffer_out`.
    pub fn produce_frame(&self, buffer_out: &mut [Sample]) -> SourceStatus {
        let mut state = self.state.lock();
        let mut streams = self.streams.lock();

        // pull exactly one frame from every active source into its cache;
        // a failing source simply drops out of this frame
        let mut all_streams = 0u32;
        for entry in streams.entries_mut() {
            entry.cache_valid = false;
            entry.eq_valid = false;
            if entry.source.is_active() {
                match entry.source.get_audio_frame(&mut entry.frame_cache.0) {
                    SourceStatus::Ok => {
                        entry.cache_valid = true;
                        all_streams += 1;
                    }
                    SourceStatus::Closed => {}
                    SourceStatus::Error => {
                        tracing::warn!("incoming stream failed, skipping it this frame");
                    }
                }
            }
        }
        self.incoming_streams.store(all_streams, Ordering::Relaxed);

        let ptt = self.ptt.load(Ordering::Relaxed);
        let MixerState {
            radios,
            tx_radio,
            mixing_buffer,
            fetch_buffer,
        } = &mut *state;

        mixing_buffer.fill_silence();

        for (index, radio) in radios.iter_mut().enumerate() {
            process_radio(
                radio,
                ptt && *tx_radio == index,
                &mut streams,
                &self.resources,
                mixing_buffer,
                fetch_buffer,
                &self.audible_streams[index],
            );
        }

        let n = buffer_out.len().min(FRAME_SIZE_SAMPLES);
        buffer_out[..n].copy_from_slice(&mixing_buffer.0[..n]);
        SourceStatus::Ok
    }

    // ------------------------------------------------------------------
    // Frame consumption (transmit side)
    // ------------------------------------------------------------------

    /// Feed one captured microphone frame through the transmit path.
    pub fn consume_frame(&self, buffer_in: &[Sample]) {
        let mut peak = 0.0f32;
        for &sample in buffer_in {
            peak = peak.max(sample.abs());
        }
        let peak_db = (20.0 * (peak as f64).log10()).clamp(-40.0, 0.0);
        self.vu_meter.lock().add_datum(peak_db);

        if !self.ptt.load(Ordering::Relaxed) && !self.last_frame_ptt.load(Ordering::Relaxed) {
            // keep the numbering continuous so the receiving side can
            // detect real gaps
            self.tx_sequence.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let compressed = {
            let mut tx = self.tx.lock();
            match tx.compress_frame(buffer_in) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping capture frame");
                    self.tx_sequence.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        };
        self.dispatch_compressed(compressed);
    }

    /// Tag and send one compressed frame.
    ///
    /// Reads the transmit radio and PTT state under the radio-state lock,
    /// but the send itself happens outside every lock.
    fn dispatch_compressed(&self, audio: Bytes) {
        let (radio_index, last_packet) = {
            let state = self.state.lock();
            let ptt = self.ptt.load(Ordering::Relaxed);
            self.last_frame_ptt.store(ptt, Ordering::Relaxed);
            (state.tx_radio, !ptt)
        };
        let sequence = self.tx_sequence.fetch_add(1, Ordering::Relaxed);

        let transport = self.transport.lock().clone();
        let Some(transport) = transport else {
            return;
        };
        if !transport.is_open() {
            return;
        }

        let packet = TxVoicePacket {
            callsign: self.callsign.lock().clone(),
            radio: radio_index,
            sequence,
            last_packet,
            audio: audio.to_vec(),
        };
        if let Err(e) = transport.send_voice(packet) {
            tracing::warn!(error = %e, "voice packet send failed");
        }
    }

    // ------------------------------------------------------------------
    // Incoming packets and maintenance
    // ------------------------------------------------------------------

    /// Handle one decoded "voice received on transceivers" event.
    pub fn rx_voice_packet(&self, packet: &RxVoicePacket) {
        self.streams.lock().append_packet(packet);
    }

    /// Evict streams idle past the timeout.
    pub fn maintain(&self) {
        let evicted = self.streams.lock().sweep_idle(STREAM_IDLE_TIMEOUT);
        if evicted > 0 {
            tracing::debug!(evicted, "incoming stream sweep");
        }
    }

    /// Run [`RadioMixer::maintain`] periodically on the tokio runtime.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mixer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                mixer.maintain();
            }
        })
    }

    // ------------------------------------------------------------------
    // Configuration surface
    // ------------------------------------------------------------------

    /// Tune a radio. Setting the current frequency is a no-op; an actual
    /// retune clears the effect chain but lets a pending squelch click
    /// play out.
    pub fn set_frequency(&self, radio: usize, frequency: u32) {
        let mut state = self.state.lock();
        let Some(radio) = state.radios.get_mut(radio) else {
            return;
        };
        if radio.frequency == frequency {
            return;
        }
        radio.frequency = frequency;
        radio.reset_effects(true);
    }

    pub fn set_gain(&self, radio: usize, gain: f32) {
        let mut state = self.state.lock();
        let Some(radio) = state.radios.get_mut(radio) else {
            return;
        };
        radio.gain = gain;
    }

    pub fn set_tx_radio(&self, radio: usize) {
        let mut state = self.state.lock();
        if radio >= state.radios.len() {
            return;
        }
        state.tx_radio = radio;
    }

    pub fn set_ptt(&self, pressed: bool) {
        self.ptt.store(pressed, Ordering::Relaxed);
    }

    pub fn set_callsign(&self, callsign: &str) {
        *self.callsign.lock() = callsign.to_string();
    }

    pub fn set_transport(&self, transport: Option<Arc<dyn VoiceTransport>>) {
        *self.transport.lock() = transport;
    }

    pub fn set_output_effects_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        for radio in state.radios.iter_mut() {
            radio.bypass_effects = !enabled;
        }
    }

    pub fn set_input_filter_enabled(&self, enabled: bool) {
        self.tx.lock().set_filter_enabled(enabled);
    }

    pub fn input_filter_enabled(&self) -> bool {
        self.tx.lock().filter_enabled()
    }

    /// Drop all incoming streams and transmit state.
    pub fn reset(&self) {
        self.streams.lock().clear();
        self.tx_sequence.store(0, Ordering::Relaxed);
        self.ptt.store(false, Ordering::Relaxed);
        self.last_frame_ptt.store(false, Ordering::Relaxed);
        self.tx.lock().reset();
    }

    // ------------------------------------------------------------------
    // Meters and accessors
    // ------------------------------------------------------------------

    /// Rolling microphone level in dB, clamped to −40.
    pub fn get_vu(&self) -> f64 {
        self.vu_meter.lock().average().max(-40.0)
    }

    /// Rolling microphone peak in dB, clamped to −40.
    pub fn get_peak(&self) -> f64 {
        self.vu_meter.lock().max().max(-40.0)
    }

    /// Streams heard by one radio in the last produced frame.
    pub fn audible_streams(&self, radio: usize) -> u32 {
        self.audible_streams
            .get(radio)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Distinct active streams in the last produced frame.
    pub fn incoming_streams(&self) -> u32 {
        self.incoming_streams.load(Ordering::Relaxed)
    }

    /// Current transmit sequence counter.
    pub fn tx_sequence(&self) -> u32 {
        self.tx_sequence.load(Ordering::Relaxed)
    }

    pub fn radio_count(&self) -> usize {
        self.audible_streams.len()
    }
}

impl SampleSource for Arc<RadioMixer> {
    fn get_audio_frame(&mut self, buffer_out: &mut [Sample]) -> SourceStatus {
        self.produce_frame(buffer_out)
    }
}

impl SampleSink for Arc<RadioMixer> {
    fn put_audio_frame(&mut self, buffer_in: &[Sample]) {
        self.consume_frame(buffer_in)
    }
}

/// Mix everything one radio hears into the accumulator.
#[allow(clippy::too_many_arguments)]
fn process_radio(
    radio: &mut RadioState,
    transmitting: bool,
    streams: &mut StreamRegistry,
    resources: &EffectResources,
    mixing_buffer: &mut AlignedFrame,
    fetch_buffer: &mut AlignedFrame,
    audible: &AtomicU32,
) {
    if transmitting {
        // never mix a radio back into its own transmission
        radio.reset_effects(false);
        audible.store(0, Ordering::Relaxed);
        return;
    }

    let mut crackle_gain = 0.0f32;
    let mut concurrent_streams = 0u32;

    for entry in streams.entries_mut() {
        if !entry.cache_valid {
            continue;
        }
        let Some(transceiver) = entry
            .transceivers
            .iter()
            .find(|t| t.frequency == radio.frequency)
        else {
            continue;
        };

        let mut voice_gain = 1.0f32;
        if !radio.bypass_effects {
            let factor = crackle_factor(transceiver.distance_ratio);
            voice_gain = if freq_is_hf(radio.frequency) {
                HF_VOICE_GAIN
            } else {
                1.0 - CRACKLE_VOICE_SLOPE * factor
            };
            crackle_gain += factor * CRACKLE_ACCUMULATION;
        }

        if radio.bypass_effects {
            mix_buffers(
                &mut mixing_buffer.0,
                &entry.frame_cache.0,
                voice_gain * radio.gain,
            );
        } else {
            if !entry.eq_valid {
                // the emulation copy is computed once per stream per frame
                // and shared by every radio that hears it
                entry
                    .voice_filter
                    .transform_frame(&mut entry.eq_cache.0, &entry.frame_cache.0);
                entry.eq_valid = true;
            }
            mix_buffers(
                &mut mixing_buffer.0,
                &entry.eq_cache.0,
                voice_gain * radio.gain,
            );
        }
        concurrent_streams += 1;
    }

    audible.store(concurrent_streams, Ordering::Relaxed);

    if concurrent_streams > 0 {
        if !radio.bypass_effects {
            let white_noise_gain = ensure_reception_effects(radio, resources, crackle_gain);
            if !mix_effect(
                mixing_buffer,
                fetch_buffer,
                radio.crackle.as_mut(),
                crackle_gain * radio.gain,
            ) {
                radio.crackle = None;
            }
            if !mix_effect(
                mixing_buffer,
                fetch_buffer,
                radio.white_noise.as_mut(),
                white_noise_gain * radio.gain,
            ) {
                radio.white_noise = None;
            }
        }
        if concurrent_streams > 1 {
            if radio.block_tone.is_none() {
                radio.block_tone = Some(SineToneSource::new(BLOCK_TONE_FREQUENCY_HZ));
            }
            if !mix_effect(
                mixing_buffer,
                fetch_buffer,
                radio.block_tone.as_mut(),
                BLOCK_TONE_GAIN * radio.gain,
            ) {
                radio.block_tone = None;
            }
        } else {
            radio.block_tone = None;
        }
    } else {
        radio.reset_effects(true);
        if radio.last_rx_count > 0 {
            // traffic just stopped: squelch tail
            radio.click = Some(RecordedSampleSource::new(resources.click.clone(), false));
        }
    }
    radio.last_rx_count = concurrent_streams;

    // a pending click plays out regardless of the state above
    if !mix_effect(
        mixing_buffer,
        fetch_buffer,
        radio.click.as_mut(),
        CLICK_GAIN * radio.gain,
    ) {
        radio.click = None;
    }
}

/// Lazily create the noise beds for a receiving radio; returns the white
/// noise gain for this frame.
fn ensure_reception_effects(
    radio: &mut RadioState,
    resources: &EffectResources,
    crackle_gain: f32,
) -> f32 {
    let white_noise_gain;
    if freq_is_hf(radio.frequency) {
        white_noise_gain = HF_WHITE_NOISE_GAIN;
        if radio.white_noise.is_none() {
            radio.white_noise = Some(RecordedSampleSource::new(
                resources.hf_white_noise.clone(),
                true,
            ));
        }
    } else {
        white_noise_gain = WHITE_NOISE_GAIN;
        if radio.white_noise.is_none() {
            radio.white_noise = Some(RecordedSampleSource::new(resources.white_noise.clone(), true));
        }
    }
    if crackle_gain > 0.0 && radio.crackle.is_none() {
        radio.crackle = Some(RecordedSampleSource::new(resources.crackle.clone(), true));
    }
    white_noise_gain
}

/// Pull one frame from an effect and mix it in. Returns false when the
/// effect is exhausted or failed and should be dropped.
fn mix_effect<S: SampleSource>(
    mixing_buffer: &mut AlignedFrame,
    fetch_buffer: &mut AlignedFrame,
    effect: Option<&mut S>,
    gain: f32,
) -> bool {
    if let Some(effect) = effect {
        if gain > 0.0 {
            match effect.get_audio_frame(&mut fetch_buffer.0) {
                SourceStatus::Ok => mix_buffers(&mut mixing_buffer.0, &fetch_buffer.0, gain),
                _ => return false,
            }
        }
    }
    true
}
