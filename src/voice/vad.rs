//! Energy-based voice activity detection
//!
//! A calibrated fixed-threshold RMS detector with hysteresis. The
//! sampler reads one frame per tick, the calibrator derives a working
//! threshold from ambient energy once at session start, and the state
//! machine turns the per-tick energy signal into speech-start and
//! speech-end events.

use std::time::Duration;

/// One tick's worth of audio with its RMS energy
#[derive(Debug, Clone)]
pub struct EnergyFrame {
    /// Raw samples drained from the input stream this tick
    pub samples: Vec<f32>,
    /// Root-mean-square energy of those samples
    pub rms: f32,
}

/// Source of raw audio frames, one per sampler tick
///
/// Returning `None` means the stream is temporarily unavailable or
/// produced nothing; the tick is skipped and no error propagates to the
/// state machine.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Vec<f32>>;
}

/// Computes one energy sample per tick from a frame source
pub struct EnergySampler<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> EnergySampler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Read one frame and compute its RMS; `None` skips the tick
    pub fn sample(&mut self) -> Option<EnergyFrame> {
        let samples = self.source.next_frame()?;
        let rms = rms(&samples);
        Some(EnergyFrame { samples, rms })
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Derives the session's detection threshold from ambient energy
///
/// Accumulates mean RMS over the calibration window; the working
/// threshold is `max(floor, ambient * multiplier)` and stays fixed for
/// the rest of the session. With zero samples (stream failure during
/// calibration) the threshold falls back to the floor.
#[derive(Debug)]
pub struct Calibrator {
    floor: f32,
    multiplier: f32,
    accum: f32,
    count: u32,
}

impl Calibrator {
    #[must_use]
    pub const fn new(floor: f32, multiplier: f32) -> Self {
        Self {
            floor,
            multiplier,
            accum: 0.0,
            count: 0,
        }
    }

    /// Feed one ambient RMS sample
    pub fn add_sample(&mut self, rms: f32) {
        self.accum += rms;
        self.count += 1;
    }

    /// Number of samples observed so far
    #[must_use]
    pub const fn sample_count(&self) -> u32 {
        self.count
    }

    /// Finish calibration and return the working threshold
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(self) -> f32 {
        if self.count == 0 {
            tracing::warn!(floor = self.floor, "no calibration samples, using floor threshold");
            return self.floor;
        }

        let ambient = self.accum / self.count as f32;
        let threshold = (ambient * self.multiplier).max(self.floor);
        tracing::debug!(ambient, threshold, "calibration complete");
        threshold
    }
}

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// Waiting for sustained speech
    Idle,
    /// Inside an utterance, waiting for sustained silence
    Speaking,
}

/// Event emitted by the state machine, at most once per transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    SpeechStart,
    SpeechEnd,
}

/// Hysteresis state machine over per-tick RMS samples
///
/// A short confirm window opens an utterance and a longer one closes
/// it, so transient noise doesn't trigger and natural pauses don't
/// truncate.
#[derive(Debug)]
pub struct VadDetector {
    threshold: f32,
    min_speech_frames: u32,
    end_silence_frames: u32,
    state: VadState,
    frames_above: u32,
    frames_below: u32,
}

impl VadDetector {
    /// Create a detector with hysteresis windows given in wall time;
    /// frame counts are the ceiling of window / tick
    #[must_use]
    pub fn new(threshold: f32, min_speech: Duration, end_silence: Duration, tick: Duration) -> Self {
        Self {
            threshold,
            min_speech_frames: frames_for(min_speech, tick),
            end_silence_frames: frames_for(end_silence, tick),
            state: VadState::Idle,
            frames_above: 0,
            frames_below: 0,
        }
    }

    /// Feed one tick's RMS; returns the transition event, if any
    pub fn tick(&mut self, rms: f32) -> Option<VadEvent> {
        if rms > self.threshold {
            self.frames_above += 1;
            self.frames_below = 0;

            if self.state == VadState::Idle && self.frames_above >= self.min_speech_frames {
                self.state = VadState::Speaking;
                self.frames_above = 0;
                tracing::debug!(rms, "speech start");
                return Some(VadEvent::SpeechStart);
            }
        } else {
            self.frames_below += 1;
            self.frames_above = 0;

            if self.state == VadState::Speaking && self.frames_below >= self.end_silence_frames {
                self.state = VadState::Idle;
                self.frames_below = 0;
                tracing::debug!(rms, "speech end");
                return Some(VadEvent::SpeechEnd);
            }
        }

        None
    }

    /// Reset to idle with cleared counters
    pub fn reset(&mut self) {
        self.state = VadState::Idle;
        self.frames_above = 0;
        self.frames_below = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> VadState {
        self.state
    }

    /// Working threshold the detector was built with
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Ceiling of `window / tick`, at least one frame
fn frames_for(window: Duration, tick: Duration) -> u32 {
    let tick_ms = tick.as_millis().max(1);
    let frames = window.as_millis().div_ceil(tick_ms);
    u32::try_from(frames).unwrap_or(u32::MAX).max(1)
}
