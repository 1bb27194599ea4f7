//! Audio playback to speakers
//!
//! Playback runs on its own thread so the detection tick loop keeps
//! running while a reply plays, and so a barge-in can stop it
//! immediately. The shared `PlaybackHandle` carries the "is playing"
//! flag read by the barge-in check.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Shared playback state: the playback thread writes it, the barge-in
/// check reads it. All updates are single atomic stores.
///
/// Each playback run holds an epoch token; bumping the epoch (a new
/// run or a stop) cancels the previous run, and a stale run can no
/// longer clear the flag out from under its successor.
#[derive(Debug, Clone, Default)]
pub struct PlaybackHandle {
    playing: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
}

impl PlaybackHandle {
    /// Whether a reply is currently playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Stop playback, best-effort. The playing flag reads false as soon
    /// as this returns; the playback thread notices the epoch change on
    /// its next poll and releases the output stream.
    pub fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.playing.store(false, Ordering::Release);
    }

    /// Mark a new playback run active, cancelling any previous run.
    /// Returns the run's epoch token.
    pub fn begin(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.playing.store(true, Ordering::Release);
        epoch
    }

    /// Whether the run holding `epoch` is still the active one
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }

    /// Clear the playing flag for the run holding `epoch`; a stale run
    /// leaves its successor's flag alone
    pub fn finish(&self, epoch: u64) {
        if self.is_current(epoch) {
            self.playing.store(false, Ordering::Release);
        }
    }
}

/// Plays audio to the default output device
#[derive(Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
    handle: PlaybackHandle,
}

impl AudioPlayback {
    /// Open the default output device and negotiate a config at the
    /// playback rate
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` when no device is present or none of its
    /// configurations covers the playback rate
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no speaker available".into()))?;

        let config = output_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "speaker ready"
        );

        Ok(Self {
            config,
            handle: PlaybackHandle::default(),
        })
    }

    /// Shared handle for the barge-in check
    #[must_use]
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Decode MP3 bytes and start playing them without blocking
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails; playback-thread errors are
    /// logged, not returned.
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let samples = decode_mp3(mp3_data)?;
        self.start(samples);
        Ok(())
    }

    /// Start playing samples on a dedicated thread and return
    /// immediately. The handle's playing flag is set before this
    /// returns and cleared when playback completes or is stopped.
    /// Any playback still in progress is cancelled first.
    pub fn start(&self, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }

        let epoch = self.handle.begin();

        let handle = self.handle.clone();
        let config = self.config.clone();

        // cpal streams aren't Send; the stream lives entirely on this thread
        std::thread::spawn(move || {
            if let Err(e) = run_stream(&config, samples, &handle, epoch) {
                tracing::error!(error = %e, "audio playback error");
            }
            handle.finish(epoch);
        });
    }

    /// Play samples and wait for completion (diagnostics)
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot start
    pub fn play_blocking(&self, samples: Vec<f32>) -> Result<()> {
        self.start(samples);
        while self.handle.is_playing() {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        Ok(())
    }

    /// Decode MP3 bytes, play them, and wait for completion (diagnostics)
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails
    pub fn play_mp3_blocking(&self, mp3_data: &[u8]) -> Result<()> {
        let samples = decode_mp3(mp3_data)?;
        self.play_blocking(samples)
    }
}

/// Find an output configuration at the playback rate, mono preferred,
/// stereo as the fallback
fn output_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(PLAYBACK_SAMPLE_RATE);

    for channels in [1u16, 2] {
        let found = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
            });

        if let Some(config) = found {
            return Ok(config.with_sample_rate(rate).config());
        }
    }

    Err(Error::Audio("speaker does not support 24 kHz output".into()))
}

/// Drive one output stream to completion or cancellation
fn run_stream(
    config: &StreamConfig,
    samples: Vec<f32>,
    handle: &PlaybackHandle,
    epoch: u64,
) -> Result<()> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no speaker available".into()))?;

    let channels = config.channels as usize;
    let sample_count = samples.len();

    let done = Arc::new(AtomicBool::new(false));
    let done_cb = Arc::clone(&done);

    let mut pos = 0usize;
    let stream = device
        .build_output_stream(
            config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in out.chunks_mut(channels) {
                    let value = samples.get(pos).copied().unwrap_or_else(|| {
                        done_cb.store(true, Ordering::Release);
                        0.0
                    });
                    frame.fill(value);

                    if pos < samples.len() {
                        pos += 1;
                    }
                }
            },
            |err| tracing::error!(error = %err, "output stream error"),
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll for completion, cancellation, or (as a backstop) one clip
    // length plus a little slack
    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(duration_ms + 500);

    while !done.load(Ordering::Acquire) && handle.is_current(epoch) {
        if std::time::Instant::now() > deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    if handle.is_current(epoch) {
        // Let the tail of the buffer drain before the stream drops
        std::thread::sleep(std::time::Duration::from_millis(100));
        tracing::debug!(samples = sample_count, "playback complete");
    } else {
        tracing::debug!("playback cancelled");
    }

    drop(stream);
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples, averaging stereo pairs
pub(crate) fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        let frame = match decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3::Error::Eof) => return Ok(samples),
            Err(e) => return Err(Error::Audio(format!("mp3 decode failed: {e}"))),
        };

        if frame.channels == 2 {
            samples.extend(frame.data.chunks_exact(2).map(|pair| {
                let left = f32::from(pair[0]) / 32768.0;
                let right = f32::from(pair[1]) / 32768.0;
                f32::midpoint(left, right)
            }));
        } else {
            samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
        }
    }
}
