//! Microphone capture
//!
//! Owns the cpal input stream and the shared sample buffer the
//! detection loop drains once per tick.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture rate, 16 kHz mono, what the STT providers expect for speech
pub const SAMPLE_RATE: u32 = 16000;

/// Microphone capture over the default input device
///
/// Incoming samples land in a shared buffer from the stream callback;
/// `take_frame` drains everything that arrived since the previous call.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    shared: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device and negotiate a 16 kHz mono config
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` when no device is present or none of its
    /// configurations covers the capture rate
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no microphone available".into()))?;

        let config = input_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            rate = SAMPLE_RATE,
            "microphone ready"
        );

        Ok(Self {
            device,
            config,
            shared: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Begin streaming samples into the shared buffer; calling again
    /// while the stream is up is a no-op
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the input stream cannot be built or
    /// started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let sink = Arc::clone(&self.shared);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| tracing::error!(error = %err, "input stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("microphone capture started");
        Ok(())
    }

    /// Release the input stream and drop whatever is still buffered
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("microphone capture stopped");
        }
        if let Ok(mut buf) = self.shared.lock() {
            buf.clear();
        }
    }

    /// Drain the samples accumulated since the last call
    ///
    /// `None` when the stream is down or nothing has arrived yet;
    /// callers treat that as a skipped tick.
    #[must_use]
    pub fn take_frame(&self) -> Option<Vec<f32>> {
        self.stream.as_ref()?;

        let frame = self
            .shared
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        (!frame.is_empty()).then_some(frame)
    }

    /// Capture sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

impl super::vad::FrameSource for AudioCapture {
    fn next_frame(&mut self) -> Option<Vec<f32>> {
        self.take_frame()
    }
}

/// Find a mono input configuration covering the capture rate
fn input_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(SAMPLE_RATE);

    device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio("microphone does not support 16 kHz mono".into()))
}

/// Encode f32 samples as 16-bit PCM WAV for the recorder and STT APIs
///
/// # Errors
///
/// Returns `Error::Audio` if the WAV writer fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = std::io::Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut out, spec).map_err(|e| Error::Audio(e.to_string()))?;

    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(pcm)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }

    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(out.into_inner())
}
