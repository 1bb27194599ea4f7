//! Voice session coordinator
//!
//! Owns the capture stream, calibration pass, detector, recorder, and
//! playback handle for one session, and drives the detection tick
//! loop. Dispatch round trips run on spawned tasks so detection and
//! barge-in keep working while a reply is in flight or playing.

use std::time::Instant;

use tokio::sync::mpsc;

use super::capture::{AudioCapture, SAMPLE_RATE};
use super::dispatch::Dispatcher;
use super::playback::{AudioPlayback, PlaybackHandle};
use super::recorder::{Encoding, UtteranceClip, UtteranceRecorder};
use super::vad::{Calibrator, EnergySampler, VadDetector, VadEvent};
use crate::config::VoiceConfig;
use crate::Result;

/// One microphone-to-relay voice session
pub struct VoiceSession {
    config: VoiceConfig,
    sampler: EnergySampler<AudioCapture>,
    recorder: UtteranceRecorder,
    detector: Option<VadDetector>,
    dispatcher: Dispatcher,
    playback: AudioPlayback,
    playback_handle: PlaybackHandle,
}

impl VoiceSession {
    /// Set up a session against `relay_url`
    ///
    /// Negotiates the clip encoding up front: with no supported
    /// encoding this fails with a capability error and the session
    /// never starts.
    ///
    /// # Errors
    ///
    /// Returns error if audio devices can't be opened or no recording
    /// encoding is supported
    pub fn new(config: VoiceConfig, relay_url: String) -> Result<Self> {
        let encoding = Encoding::negotiate(&Encoding::CANDIDATES)?;

        let capture = AudioCapture::new()?;
        let playback = AudioPlayback::new()?;
        let playback_handle = playback.handle();

        let dispatcher = Dispatcher::new(
            relay_url,
            config.user_id.clone(),
            config.prompt_name.clone(),
        );

        Ok(Self {
            config,
            sampler: EnergySampler::new(capture),
            recorder: UtteranceRecorder::new(encoding, SAMPLE_RATE),
            detector: None,
            dispatcher,
            playback,
            playback_handle,
        })
    }

    /// Run the session until shutdown is requested
    ///
    /// Calibration completes before the first detection tick; teardown
    /// stops the input stream, discards any in-progress recording, and
    /// resets the detector.
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream fails to start
    pub async fn run(mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        self.sampler.source_mut().start()?;

        // Calibration samples ambient energy, so the greeting waits
        // until the window has closed
        let Some(threshold) = self.calibrate(shutdown_rx).await else {
            self.teardown();
            return Ok(());
        };

        self.detector = Some(VadDetector::new(
            threshold,
            self.config.min_speech,
            self.config.end_silence,
            self.config.tick_interval,
        ));

        // The greeting plays while detection runs; speaking over it
        // barges in like any other reply
        self.greet().await;
        tracing::info!(threshold, "listening");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(self.config.tick_interval) => {
                    self.tick();
                }
            }
        }

        self.teardown();
        Ok(())
    }

    /// Speak the session-start greeting; failures are logged, never fatal
    async fn greet(&self) {
        if self.config.greeting.is_empty() {
            return;
        }

        match self.dispatcher.synthesize(&self.config.greeting).await {
            Ok(Some(audio)) => {
                if let Err(e) = self.playback.play_mp3(&audio) {
                    tracing::warn!(error = %e, "greeting playback failed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "greeting TTS failed"),
        }
    }

    /// Sample ambient energy for the calibration window and derive the
    /// working threshold. Returns `None` if shutdown arrived first.
    async fn calibrate(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Option<f32> {
        let mut calibrator =
            Calibrator::new(self.config.rms_floor, self.config.ambient_multiplier);
        let started = Instant::now();

        while started.elapsed() < self.config.calibration_window {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown during calibration");
                    return None;
                }
                () = tokio::time::sleep(self.config.tick_interval) => {
                    // A failed read just skips this calibration sample
                    if let Some(frame) = self.sampler.sample() {
                        calibrator.add_sample(frame.rms);
                    }
                }
            }
        }

        tracing::debug!(samples = calibrator.sample_count(), "calibration window complete");
        Some(calibrator.finish())
    }

    /// One detection tick: sample, advance the state machine, and
    /// route audio into the open utterance
    fn tick(&mut self) {
        let Some(detector) = self.detector.as_mut() else {
            return;
        };

        // Stream unavailable: skip the tick, the loop keeps running
        let Some(frame) = self.sampler.sample() else {
            return;
        };

        match detector.tick(frame.rms) {
            Some(VadEvent::SpeechStart) => {
                // Barge-in: a reply still playing gets cut off before
                // the new recording begins. Best-effort.
                if self.playback_handle.is_playing() {
                    self.playback_handle.stop();
                }

                self.recorder.begin();
                self.recorder.push(&frame.samples);
                tracing::info!("speech detected, recording utterance");
            }
            Some(VadEvent::SpeechEnd) => {
                self.recorder.push(&frame.samples);

                match self.recorder.finish() {
                    Ok(Some(clip)) => {
                        tracing::info!(bytes = clip.bytes.len(), "utterance captured, sending");
                        self.spawn_dispatch(clip);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "utterance finalize failed"),
                }
            }
            None => {
                if self.recorder.is_recording() {
                    self.recorder.push(&frame.samples);
                }
            }
        }
    }

    /// Run the relay round trip concurrently with the tick loop
    fn spawn_dispatch(&self, clip: UtteranceClip) {
        let dispatcher = self.dispatcher.clone();
        let playback = self.playback.clone();

        tokio::spawn(async move {
            match dispatcher.send(clip).await {
                Ok(exchange) => {
                    if !exchange.transcript.is_empty() {
                        tracing::info!(transcript = %exchange.transcript, "you");
                    }
                    if !exchange.reply.is_empty() {
                        tracing::info!(reply = %exchange.reply, "bot");
                    }

                    match exchange.decode_audio() {
                        Ok(Some(audio)) => {
                            if let Err(e) = playback.play_mp3(&audio) {
                                tracing::warn!(error = %e, "reply playback failed");
                            }
                        }
                        Ok(None) => tracing::warn!("no audio returned from relay"),
                        Err(e) => tracing::warn!(error = %e, "reply audio decode failed"),
                    }
                }
                // One line; the session keeps listening
                Err(e) => tracing::warn!(error = %e, "voice exchange failed"),
            }
        });
    }

    /// Release resources and reset state so a future session starts clean
    fn teardown(&mut self) {
        self.sampler.source_mut().stop();
        self.recorder.abandon();
        if let Some(detector) = self.detector.as_mut() {
            detector.reset();
        }
        tracing::debug!("voice session torn down");
    }
}
