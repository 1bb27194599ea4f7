use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur_relay::voice::{AudioCapture, AudioPlayback, TextToSpeech, vad};
use murmur_relay::{Config, Daemon};

/// Murmur - voice-chat relay with on-device utterance detection
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(long, env = "MURMUR_PORT")]
    port: Option<u16>,

    /// Relay endpoint the voice session posts utterances to; defaults
    /// to the local server
    #[arg(long, env = "MURMUR_RELAY_URL")]
    relay_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable the local voice session (for headless servers without
    /// audio hardware)
    #[arg(long, env = "MURMUR_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,murmur_relay=info",
        1 => "info,murmur_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    // Load configuration; missing credentials are fatal here
    let mut config = Config::load(cli.disable_voice)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.relay_url.is_some() {
        config.voice.relay_url = cli.relay_url;
    }

    tracing::info!(
        port = config.server.port,
        voice = config.voice.enabled,
        "starting murmur relay"
    );

    let voice_enabled = config.voice.enabled;
    let daemon = Daemon::new(config).await?;

    if voice_enabled {
        tracing::info!("murmur ready - speak after the greeting");
    } else {
        tracing::info!("murmur ready (relay-only mode, voice disabled)");
    }

    // Run until interrupted
    daemon.run().await?;

    Ok(())
}

/// Width of the RMS meter in the mic test
const METER_WIDTH: usize = 50;

/// Print a once-a-second RMS/peak meter from live microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Listening for {duration} seconds - speak into your microphone.\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("Capture rate: {} Hz\n", capture.sample_rate());

    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_frame().unwrap_or_default();
        let energy = vad::rms(&samples);
        let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let filled = ((energy * 100.0) as usize).min(METER_WIDTH);
        println!(
            "[{second:2}s] rms {energy:.4}  peak {peak:.4}  |{:<width$}|",
            "#".repeat(filled),
            width = METER_WIDTH
        );
    }

    capture.stop();

    println!("\nA flat meter usually means the wrong input device is active.");
    println!("Check `pactl info` / `arecord -l` for the current source.");

    Ok(())
}

/// Play a short sine tone through the default output device
fn test_speaker() -> anyhow::Result<()> {
    const TONE_HZ: f32 = 440.0;
    const TONE_SECS: f32 = 2.0;
    const RATE: u32 = 24000;

    println!("Playing a {TONE_HZ} Hz tone for {TONE_SECS} seconds...");

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let samples: Vec<f32> = (0..(RATE as f32 * TONE_SECS) as usize)
        .map(|n| {
            let t = n as f32 / RATE as f32;
            (t * TONE_HZ * std::f32::consts::TAU).sin() * 0.3
        })
        .collect();

    let playback = AudioPlayback::new()?;
    playback.play_blocking(samples)?;

    println!("Done. If the tone was missing, check the default sink with `pactl info`.");

    Ok(())
}

/// Synthesize a line through the configured TTS provider and play it
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Synthesizing: \"{text}\"");

    let config = Config::load(true)?;
    let tts = TextToSpeech::new_deepgram(
        config.api_keys.deepgram.unwrap_or_default(),
        config.tts_model,
    )?;

    let mp3 = tts.synthesize(text).await?;
    println!("Received {} bytes of audio", mp3.len());

    let playback = AudioPlayback::new()?;
    playback.play_mp3_blocking(&mp3)?;

    println!("Done. If you heard the line, TTS is working.");

    Ok(())
}
