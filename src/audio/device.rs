//! Thin cpal shell around the engine's source/sink interfaces
//!
//! Opens an output stream pulling from a [`SampleSource`] and optionally an
//! input stream pushing into a [`SampleSink`]. The engine is mono; output
//! frames are duplicated across device channels and input channels are
//! averaged down. Stream errors cross back to the owner over a bounded
//! channel so the audio callback never blocks.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::adapter::{SinkFrameSizeAdapter, SourceFrameSizeAdapter};
use super::{Sample, SampleSink, SampleSource};
use crate::constants::SAMPLE_RATE_HZ;
use crate::error::AudioError;

pub struct AudioDevice {
    output_stream: Option<cpal::Stream>,
    input_stream: Option<cpal::Stream>,
    error_tx: Sender<AudioError>,
    error_rx: Receiver<AudioError>,
}

impl AudioDevice {
    pub fn new() -> Self {
        let (error_tx, error_rx) = bounded(16);
        Self {
            output_stream: None,
            input_stream: None,
            error_tx,
            error_rx,
        }
    }

    /// Open the default output device and start pulling frames from
    /// `source`.
    pub fn open_output(&mut self, source: Box<dyn SampleSource>) -> Result<(), AudioError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default output device".into()))?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());

        let channels = device
            .default_output_config()
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?
            .channels() as usize;
        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(SAMPLE_RATE_HZ),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut adapter = SourceFrameSizeAdapter::new(source);
        let mut mono: Vec<Sample> = Vec::new();
        let error_tx = self.error_tx.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    mono.resize(frames, 0.0);
                    let _ = adapter.pull(&mut mono);
                    for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        frame.fill(sample);
                    }
                },
                {
                    let error_tx = error_tx.clone();
                    move |err| {
                        let _ = error_tx.try_send(AudioError::Stream(err.to_string()));
                    }
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        tracing::info!(device = %name, channels, "output stream started");
        self.output_stream = Some(stream);
        Ok(())
    }

    /// Open the default input device and start pushing captured frames
    /// into `sink`.
    pub fn open_input(&mut self, sink: Box<dyn SampleSink>) -> Result<(), AudioError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default input device".into()))?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());

        let channels = device
            .default_input_config()
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?
            .channels() as usize;
        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(SAMPLE_RATE_HZ),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut adapter = SinkFrameSizeAdapter::new(sink);
        let mut mono: Vec<Sample> = Vec::new();
        let error_tx = self.error_tx.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    mono.clear();
                    mono.extend(
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                    );
                    adapter.push(&mono);
                },
                move |err| {
                    let _ = error_tx.try_send(AudioError::Stream(err.to_string()));
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        tracing::info!(device = %name, channels, "input stream started");
        self.input_stream = Some(stream);
        Ok(())
    }

    /// Stop and drop both streams.
    pub fn close(&mut self) {
        self.output_stream = None;
        self.input_stream = None;
    }

    /// Fetch a pending stream error, if any.
    pub fn check_error(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

impl Default for AudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.close();
    }
}
