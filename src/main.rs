use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use santa_chat::chatbot::capture::CaptureController;
use santa_chat::chatbot::engine::ChatSession;
use santa_chat::chatbot::host::{HostEvent, SpeechRecognizer, SpeechSynthesizer, check_binary_available};
use santa_chat::chatbot::recognizer::CommandRecognizer;
use santa_chat::chatbot::reply::ReplySelector;
use santa_chat::chatbot::terminal::{HELP, Input, TerminalView, header, parse_input};
use santa_chat::chatbot::tts::{CommandSynthesizer, SpeechOutput, SynthCommand};
use santa_chat::config::{Config, RecognizerConfig};

#[tokio::main]
async fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Logs go to stderr and a file; stdout is the chat.
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "santa-chat.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::WARN.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🎅 Starting santa-chat...");
    if let Some(ref path) = config.config_path {
        info!("Loaded config from {}", path.display());
    }

    let selector = match ReplySelector::new(config.keyword_match) {
        Ok(selector) => selector,
        Err(e) => {
            eprintln!("failed to build keyword patterns: {e}");
            std::process::exit(1);
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<HostEvent>();

    // Speech output
    let synth_command = SynthCommand::detect(config.speech_backend).await;
    if let Some(ref command) = synth_command {
        spawn_voice_refresh(command.clone(), events_tx.clone());
    } else {
        info!("No speech synthesizer available");
    }
    let synth = synth_command
        .clone()
        .map(|command| Box::new(CommandSynthesizer::new(command)) as Box<dyn SpeechSynthesizer>);
    let speech = SpeechOutput::new(synth, config.speech_enabled, config.persona);

    // Voice input
    let recognizer = build_recognizer(&config, events_tx.clone()).await;
    let capture = CaptureController::new(recognizer);

    let mut session = ChatSession::new(
        selector,
        speech,
        capture,
        Box::new(rand::thread_rng()),
        Box::new(TerminalView::new(std::io::stdout())),
    );

    println!("{}", header());
    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read input: {e}");
                        break;
                    }
                };
                match parse_input(&line) {
                    Input::Say(text) => session.submit(&text),
                    Input::Talk => session.press_talk(),
                    Input::Stop => session.release_talk(),
                    Input::Speech(enabled) => session.set_speech_enabled(enabled),
                    Input::Persona(persona) => session.set_persona(persona),
                    Input::Voices => match synth_command {
                        Some(ref command) => spawn_voice_refresh(command.clone(), events_tx.clone()),
                        None => println!("No speech synthesizer available"),
                    },
                    Input::Help => println!("{HELP}"),
                    Input::Quit => break,
                    Input::Invalid(msg) => println!("{msg}"),
                }
            }
            Some(event) = events_rx.recv() => session.handle_event(event),
        }
    }

    session.release_talk();
    info!("Goodbye");
}

/// Query the synthesizer's voices in the background.
fn spawn_voice_refresh(command: SynthCommand, events: mpsc::UnboundedSender<HostEvent>) {
    tokio::spawn(async move {
        match command.list_voices().await {
            Ok(voices) => {
                let _ = events.send(HostEvent::VoicesChanged(voices));
            }
            Err(e) => warn!("Failed to list voices: {e}"),
        }
    });
}

async fn build_recognizer(
    config: &Config,
    events: mpsc::UnboundedSender<HostEvent>,
) -> Option<Box<dyn SpeechRecognizer>> {
    match config.recognizer {
        RecognizerConfig::None => None,
        RecognizerConfig::Command(ref argv) => {
            let program = argv.first()?;
            if !Path::new(program).exists() && check_binary_available(program).await.is_none() {
                warn!("Recognizer command '{program}' not found");
                return None;
            }
            match CommandRecognizer::new(argv, events) {
                Ok(recognizer) => Some(Box::new(recognizer)),
                Err(e) => {
                    warn!("Recognizer unavailable: {e}");
                    None
                }
            }
        }
        RecognizerConfig::Whisper(ref model_path) => whisper_recognizer(config, model_path, events).await,
    }
}

#[cfg(feature = "whisper")]
async fn whisper_recognizer(
    config: &Config,
    model_path: &Path,
    events: mpsc::UnboundedSender<HostEvent>,
) -> Option<Box<dyn SpeechRecognizer>> {
    use santa_chat::chatbot::whisper::{CaptureInput, Whisper, WhisperRecognizer};

    if check_binary_available("ffmpeg").await.is_none() {
        warn!("ffmpeg not found, voice input disabled");
        return None;
    }
    let whisper = match Whisper::new(model_path, &config.recognition_lang) {
        Ok(whisper) => whisper,
        Err(e) => {
            warn!("{e}");
            return None;
        }
    };
    let input = CaptureInput {
        format: config.capture_format.clone(),
        device: config.capture_device.clone(),
        max_secs: config.max_capture_secs,
    };
    Some(Box::new(WhisperRecognizer::new(whisper, input, events)))
}

#[cfg(not(feature = "whisper"))]
async fn whisper_recognizer(
    _config: &Config,
    model_path: &Path,
    _events: mpsc::UnboundedSender<HostEvent>,
) -> Option<Box<dyn SpeechRecognizer>> {
    warn!(
        "whisper_model_path {:?} set, but this build has no whisper support (enable the `whisper` feature)",
        model_path
    );
    None
}
