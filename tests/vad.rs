//! Voice pipeline integration tests
//!
//! Drives the sampler, calibrator, detector, and recorder with
//! scripted frames -- no audio hardware required.

use std::collections::VecDeque;
use std::time::Duration;

use murmur_relay::voice::{
    samples_to_wav, Calibrator, Encoding, EnergySampler, FrameSource, PlaybackHandle,
    UtteranceRecorder, VadDetector, VadEvent, VadState, SAMPLE_RATE,
};

/// Tick interval used throughout (matches the session default)
const TICK: Duration = Duration::from_millis(50);

/// Samples per 50ms tick at 16kHz
const FRAME_LEN: usize = 800;

/// Frame source fed from a prepared script of frames
struct ScriptedSource {
    frames: VecDeque<Option<Vec<f32>>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Option<Vec<f32>>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Option<Vec<f32>> {
        self.frames.pop_front().flatten()
    }
}

/// A constant-amplitude frame whose RMS equals `level`
fn frame_at(level: f32) -> Vec<f32> {
    vec![level; FRAME_LEN]
}

fn detector(threshold: f32) -> VadDetector {
    VadDetector::new(
        threshold,
        Duration::from_millis(250),
        Duration::from_millis(800),
        TICK,
    )
}

#[test]
fn calibration_scenario_ambient_beats_floor() {
    // Ambient RMS 0.01 for the whole window: threshold = 0.01 * 3 = 0.03
    let mut cal = Calibrator::new(0.02, 3.0);
    for _ in 0..20 {
        cal.add_sample(0.01);
    }
    let threshold = cal.finish();
    assert!((threshold - 0.03).abs() < 1e-6);
}

#[test]
fn speech_start_fires_exactly_on_the_fifth_tick() {
    let mut det = detector(0.03);

    for tick in 1..=5 {
        let event = det.tick(0.05);
        if tick < 5 {
            assert_eq!(event, None, "no event expected on tick {tick}");
            assert_eq!(det.state(), VadState::Idle);
        } else {
            assert_eq!(event, Some(VadEvent::SpeechStart));
            assert_eq!(det.state(), VadState::Speaking);
        }
    }
}

#[test]
fn speech_end_fires_exactly_on_the_sixteenth_silent_tick() {
    let mut det = detector(0.03);

    for _ in 0..5 {
        det.tick(0.05);
    }
    assert_eq!(det.state(), VadState::Speaking);

    for tick in 1..=16 {
        let event = det.tick(0.01);
        if tick < 16 {
            assert_eq!(event, None, "no event expected on silent tick {tick}");
            assert_eq!(det.state(), VadState::Speaking);
        } else {
            assert_eq!(event, Some(VadEvent::SpeechEnd));
            assert_eq!(det.state(), VadState::Idle);
        }
    }
}

#[test]
fn boundary_rms_counts_as_silence() {
    // RMS exactly at the threshold does not count as speech
    let mut det = detector(0.03);
    assert!((det.threshold() - 0.03).abs() < f32::EPSILON);

    for _ in 0..10 {
        assert_eq!(det.tick(0.03), None);
    }
    assert_eq!(det.state(), VadState::Idle);
}

#[test]
fn pauses_shorter_than_the_silence_window_do_not_split_an_utterance() {
    let mut det = detector(0.03);

    for _ in 0..5 {
        det.tick(0.05);
    }
    assert_eq!(det.state(), VadState::Speaking);

    // 15 silent ticks (just under the window), then speech resumes
    for _ in 0..15 {
        assert_eq!(det.tick(0.01), None);
    }
    assert_eq!(det.tick(0.05), None);
    assert_eq!(det.state(), VadState::Speaking);
}

#[test]
fn full_utterance_is_finalized_as_one_clip() {
    // Script: 5 loud ticks open the utterance, 3 more loud ticks, then
    // 16 quiet ticks close it.
    let mut frames: Vec<Option<Vec<f32>>> = Vec::new();
    for _ in 0..8 {
        frames.push(Some(frame_at(0.05)));
    }
    for _ in 0..16 {
        frames.push(Some(frame_at(0.01)));
    }

    let mut sampler = EnergySampler::new(ScriptedSource::new(frames));
    let mut det = detector(0.03);
    let mut recorder = UtteranceRecorder::new(Encoding::Wav, SAMPLE_RATE);
    let mut clips = Vec::new();

    while let Some(frame) = sampler.sample() {
        match det.tick(frame.rms) {
            Some(VadEvent::SpeechStart) => {
                recorder.begin();
                recorder.push(&frame.samples);
            }
            Some(VadEvent::SpeechEnd) => {
                recorder.push(&frame.samples);
                if let Some(clip) = recorder.finish().unwrap() {
                    clips.push(clip);
                }
            }
            None => {
                if recorder.is_recording() {
                    recorder.push(&frame.samples);
                }
            }
        }
    }

    assert_eq!(clips.len(), 1);
    let clip = &clips[0];
    assert_eq!(clip.mime, "audio/wav");
    assert_eq!(&clip.bytes[0..4], b"RIFF");

    // Recording spans the speech-start tick (5) through the speech-end
    // tick (24): 20 frames in one clip, 16-bit samples after the
    // 44-byte header
    let recorded_frames = 20;
    assert_eq!(clip.bytes.len(), 44 + recorded_frames * FRAME_LEN * 2);

    // Nothing left open after finalize
    assert!(!recorder.is_recording());
    assert_eq!(det.state(), VadState::Idle);
}

#[test]
fn unavailable_stream_skips_ticks_without_resetting_state() {
    // Speech confirm window interleaved with dropped frames: dropped
    // ticks are skipped, they neither feed nor reset the detector
    let frames = vec![
        Some(frame_at(0.05)),
        Some(frame_at(0.05)),
        None,
        Some(frame_at(0.05)),
        None,
        Some(frame_at(0.05)),
        Some(frame_at(0.05)),
    ];

    let mut sampler = EnergySampler::new(ScriptedSource::new(frames));
    let mut det = detector(0.03);
    let mut started = false;

    for _ in 0..7 {
        if let Some(frame) = sampler.sample() {
            if det.tick(frame.rms) == Some(VadEvent::SpeechStart) {
                started = true;
            }
        }
    }

    assert!(started, "five delivered loud frames should open speech");
}

#[test]
fn calibration_with_dead_stream_falls_back_to_floor() {
    let mut sampler = EnergySampler::new(ScriptedSource::new(vec![None, None, None]));
    let mut cal = Calibrator::new(0.02, 3.0);

    for _ in 0..3 {
        if let Some(frame) = sampler.sample() {
            cal.add_sample(frame.rms);
        }
    }

    assert_eq!(cal.sample_count(), 0);
    assert!((cal.finish() - 0.02).abs() < 1e-6);
}

#[test]
fn zero_chunk_utterance_is_never_dispatched() {
    let mut recorder = UtteranceRecorder::new(Encoding::Wav, SAMPLE_RATE);
    recorder.begin();
    // Speech ended before any chunk arrived
    assert!(recorder.finish().unwrap().is_none());
}

#[test]
fn barge_in_stops_playback_before_recording() {
    let playback = PlaybackHandle::default();
    let mut det = detector(0.03);
    let mut recorder = UtteranceRecorder::new(Encoding::Wav, SAMPLE_RATE);

    // A reply is playing while the user starts talking
    playback.begin();
    assert!(playback.is_playing());

    for _ in 0..5 {
        if det.tick(0.05) == Some(VadEvent::SpeechStart) {
            if playback.is_playing() {
                playback.stop();
            }
            // The flag must read false before recording proceeds
            assert!(!playback.is_playing());
            recorder.begin();
        }
    }

    assert!(recorder.is_recording());
}

#[test]
fn encoding_negotiation_prefers_ranked_order() {
    // The ranked list lands on the first supported entry
    let encoding = Encoding::negotiate(&Encoding::CANDIDATES).unwrap();
    assert_eq!(encoding, Encoding::Wav);

    // No supported entry: capability error, the session must not start
    assert!(Encoding::negotiate(&[Encoding::OpusWebm, Encoding::OggOpus]).is_err());
}

#[test]
fn wav_clip_has_valid_header_and_rate() {
    let samples: Vec<f32> = (0..1600)
        .map(|i| (i as f32 / 16000.0 * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5)
        .collect();
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");

    let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(reader.len(), 1600);
}
