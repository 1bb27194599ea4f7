//! Per-utterance recording
//!
//! Buffers raw audio between speech-start and speech-end, then
//! finalizes the buffer into a single encoded clip for dispatch.

use super::capture::samples_to_wav;
use crate::{Error, Result};

/// Clip encodings, ranked by preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Opus in a WebM container
    OpusWebm,
    /// Opus in an Ogg container
    OggOpus,
    /// Ogg with the default codec
    Ogg,
    /// 16-bit PCM WAV
    Wav,
}

impl Encoding {
    /// Default candidate ranking for negotiation
    pub const CANDIDATES: [Self; 4] = [Self::OpusWebm, Self::OggOpus, Self::Ogg, Self::Wav];

    /// MIME type reported for clips in this encoding
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::OpusWebm => "audio/webm;codecs=opus",
            Self::OggOpus => "audio/ogg;codecs=opus",
            Self::Ogg => "audio/ogg",
            Self::Wav => "audio/wav",
        }
    }

    /// Whether this process can produce the encoding
    ///
    /// Only WAV is backed by the built-in PCM encoder; the Opus/Ogg
    /// entries exist so the ranked negotiation matches what richer
    /// encoders would offer.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Wav)
    }

    /// Pick the first supported encoding from a ranked candidate list
    ///
    /// # Errors
    ///
    /// Returns a capability error when no candidate is supported; the
    /// session must fail fast before any recording is attempted.
    pub fn negotiate(candidates: &[Self]) -> Result<Self> {
        candidates
            .iter()
            .copied()
            .find(|c| c.is_supported())
            .ok_or_else(|| {
                Error::Capability("no supported recording encoding".to_string())
            })
    }
}

/// A finalized utterance, ready for dispatch
#[derive(Debug, Clone)]
pub struct UtteranceClip {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Records one utterance at a time
///
/// At most one buffer is open per recorder; `begin` opens it,
/// `push` appends incoming chunks, and `finish` closes and encodes it.
#[derive(Debug)]
pub struct UtteranceRecorder {
    encoding: Encoding,
    sample_rate: u32,
    buffer: Option<Vec<f32>>,
}

impl UtteranceRecorder {
    /// Create a recorder for a negotiated encoding
    #[must_use]
    pub const fn new(encoding: Encoding, sample_rate: u32) -> Self {
        Self {
            encoding,
            sample_rate,
            buffer: None,
        }
    }

    /// Open a fresh buffer for a new utterance
    pub fn begin(&mut self) {
        self.buffer = Some(Vec::new());
    }

    /// Append a chunk of raw samples; ignored while no buffer is open
    pub fn push(&mut self, samples: &[f32]) {
        if let Some(buf) = self.buffer.as_mut() {
            buf.extend_from_slice(samples);
        }
    }

    /// Whether an utterance buffer is currently open
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.buffer.is_some()
    }

    /// Close the buffer and encode it into one clip
    ///
    /// An empty buffer (zero captured chunks) yields `None` and is
    /// silently dropped -- nothing is dispatched for it.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn finish(&mut self) -> Result<Option<UtteranceClip>> {
        let Some(samples) = self.buffer.take() else {
            return Ok(None);
        };

        if samples.is_empty() {
            tracing::debug!("empty utterance buffer dropped");
            return Ok(None);
        }

        let bytes = match self.encoding {
            Encoding::Wav => samples_to_wav(&samples, self.sample_rate)?,
            other => {
                return Err(Error::Capability(format!(
                    "encoder for {} not available",
                    other.mime()
                )));
            }
        };

        tracing::debug!(
            samples = samples.len(),
            bytes = bytes.len(),
            mime = self.encoding.mime(),
            "utterance finalized"
        );

        Ok(Some(UtteranceClip {
            bytes,
            mime: self.encoding.mime(),
        }))
    }

    /// Discard any open buffer without encoding (session teardown)
    pub fn abandon(&mut self) {
        self.buffer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_lands_on_wav() {
        let encoding = Encoding::negotiate(&Encoding::CANDIDATES).unwrap();
        assert_eq!(encoding, Encoding::Wav);
        assert_eq!(encoding.mime(), "audio/wav");
    }

    #[test]
    fn test_negotiation_fails_without_supported_candidate() {
        let err = Encoding::negotiate(&[Encoding::OpusWebm, Encoding::Ogg]).unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
    }

    #[test]
    fn test_empty_buffer_is_dropped() {
        let mut recorder = UtteranceRecorder::new(Encoding::Wav, 16000);
        recorder.begin();
        assert!(recorder.finish().unwrap().is_none());
    }

    #[test]
    fn test_finish_without_begin_is_none() {
        let mut recorder = UtteranceRecorder::new(Encoding::Wav, 16000);
        assert!(recorder.finish().unwrap().is_none());
    }

    #[test]
    fn test_chunks_accumulate_into_one_clip() {
        let mut recorder = UtteranceRecorder::new(Encoding::Wav, 16000);
        recorder.begin();
        recorder.push(&[0.1; 160]);
        recorder.push(&[0.2; 160]);

        let clip = recorder.finish().unwrap().unwrap();
        assert_eq!(clip.mime, "audio/wav");
        // 44-byte WAV header + 320 samples * 2 bytes
        assert_eq!(clip.bytes.len(), 44 + 320 * 2);
        assert_eq!(&clip.bytes[0..4], b"RIFF");

        // Buffer is closed after finalize
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_push_outside_utterance_is_ignored() {
        let mut recorder = UtteranceRecorder::new(Encoding::Wav, 16000);
        recorder.push(&[0.5; 160]);
        assert!(recorder.finish().unwrap().is_none());
    }

    #[test]
    fn test_abandon_discards_data() {
        let mut recorder = UtteranceRecorder::new(Encoding::Wav, 16000);
        recorder.begin();
        recorder.push(&[0.5; 160]);
        recorder.abandon();
        assert!(!recorder.is_recording());
        assert!(recorder.finish().unwrap().is_none());
    }
}
