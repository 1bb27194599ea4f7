//! Voice processing module
//!
//! Microphone capture, calibrated voice-activity detection,
//! per-utterance recording, dispatch to the relay pipeline, and
//! interruptible reply playback.

mod capture;
pub mod dispatch;
mod playback;
mod recorder;
mod session;
mod stt;
mod tts;
pub mod vad;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use dispatch::{Dispatcher, VoiceExchange};
pub use playback::{AudioPlayback, PlaybackHandle};
pub use recorder::{Encoding, UtteranceClip, UtteranceRecorder};
pub use session::VoiceSession;
pub use stt::SpeechToText;
pub use tts::{TextToSpeech, TTS_AUDIO_MIME};
pub use vad::{Calibrator, EnergyFrame, EnergySampler, FrameSource, VadDetector, VadEvent, VadState};
