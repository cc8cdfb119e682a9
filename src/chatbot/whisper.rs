//! Offline speech-to-text using whisper-rs.
//!
//! A capture session records 16 kHz mono PCM from the microphone through
//! ffmpeg until the talk control is released (or the time cap hits), then
//! runs Whisper over the recording on a blocking thread.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::chatbot::host::{HostError, HostEvent, RecognitionEvent, SessionId, SpeechRecognizer};
use crate::chatbot::message::truncate_safe;
use crate::chatbot::recognizer::{CaptureSession, is_active, request_stop, send};

/// Whisper transcription engine.
pub struct Whisper {
    ctx: WhisperContext,
    /// Two-letter language code handed to the model.
    language: String,
}

impl Whisper {
    /// Load a Whisper model from a .bin file.
    ///
    /// `lang` is a BCP 47 tag such as "en-US"; only the language part is used.
    pub fn new(model_path: &Path, lang: &str) -> Result<Self, String> {
        info!("Loading Whisper model from {:?}", model_path);

        if !model_path.exists() {
            return Err(format!("Model file not found: {:?}", model_path));
        }

        let ctx = WhisperContext::new_with_params(
            model_path.to_str().ok_or("Invalid model path")?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| format!("Failed to load Whisper model: {e}"))?;

        info!("Whisper model loaded successfully");
        Ok(Self {
            ctx,
            language: language_code(lang),
        })
    }

    /// Transcribe 16 kHz mono f32 samples.
    pub fn transcribe(&self, samples: &[f32]) -> Result<String, String> {
        debug!("Transcribing {} samples", samples.len());

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| format!("Failed to create Whisper state: {e}"))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(self.language.as_str()));
        params.set_translate(false);
        params.set_no_timestamps(true);
        params.set_single_segment(false);

        state
            .full(params, samples)
            .map_err(|e| format!("Whisper transcription failed: {e}"))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            if let Ok(s) = segment.to_str() {
                text.push_str(s);
                text.push(' ');
            }
        }

        let text = text.trim().to_string();
        info!("Transcribed: \"{}\"", truncate_safe(&text, 100));
        Ok(text)
    }
}

/// "en-US" -> "en".
fn language_code(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .filter(|code| !code.is_empty())
        .unwrap_or("en")
        .to_lowercase()
}

/// Convert 16-bit little-endian PCM to f32 samples.
fn pcm_to_samples(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / 32768.0
        })
        .collect()
}

/// Where ffmpeg records from, and for how long at most.
#[derive(Debug, Clone)]
pub struct CaptureInput {
    /// ffmpeg input format, e.g. "pulse", "alsa", "avfoundation".
    pub format: String,
    /// ffmpeg input device, e.g. "default" or ":0".
    pub device: String,
    pub max_secs: u32,
}

impl CaptureInput {
    fn ffmpeg_args(&self) -> Vec<String> {
        let max_secs = self.max_secs.to_string();
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            self.format.as_str(),
            "-i",
            self.device.as_str(),
            "-t",
            max_secs.as_str(),
            "-ar",
            "16000",
            "-ac",
            "1",
            "-f",
            "s16le",
            "-acodec",
            "pcm_s16le",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Push-to-talk recognizer: ffmpeg capture plus local Whisper.
pub struct WhisperRecognizer {
    whisper: Arc<Whisper>,
    input: CaptureInput,
    events: mpsc::UnboundedSender<HostEvent>,
    session: Option<CaptureSession>,
    last_id: SessionId,
}

impl WhisperRecognizer {
    pub fn new(whisper: Whisper, input: CaptureInput, events: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self {
            whisper: Arc::new(whisper),
            input,
            events,
            session: None,
            last_id: 0,
        }
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn start(&mut self) -> Result<SessionId, HostError> {
        if is_active(&self.session) {
            return Err(HostError::AlreadyActive);
        }

        let child = Command::new("ffmpeg")
            .args(self.input.ffmpeg_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HostError::Spawn { program: "ffmpeg".into(), source: e })?;

        let (session, stop_rx, done) = CaptureSession::new();
        let events = self.events.clone();
        let whisper = self.whisper.clone();
        self.last_id += 1;
        let id = self.last_id;

        info!("Recording from {} {} (session {id})", self.input.format, self.input.device);
        send(&events, id, RecognitionEvent::Started);
        tokio::spawn(async move {
            match record(child, stop_rx).await {
                Ok(samples) if samples.is_empty() => debug!("Nothing recorded"),
                Ok(samples) => {
                    match tokio::task::spawn_blocking(move || whisper.transcribe(&samples)).await {
                        Ok(Ok(text)) if !text.is_empty() => send(&events, id, RecognitionEvent::Transcript(text)),
                        Ok(Ok(_)) => debug!("Whisper heard nothing"),
                        Ok(Err(e)) => send(&events, id, RecognitionEvent::Error(e)),
                        Err(e) => send(&events, id, RecognitionEvent::Error(format!("transcription task failed: {e}"))),
                    }
                }
                Err(e) => {
                    warn!("Recording failed: {e}");
                    send(&events, id, RecognitionEvent::Error(e));
                }
            }
            done.store(true, Ordering::SeqCst);
            send(&events, id, RecognitionEvent::Ended);
        });

        self.session = Some(session);
        Ok(id)
    }

    fn stop(&mut self) -> Result<(), HostError> {
        request_stop(&mut self.session)
    }
}

/// Record until ffmpeg exits, asking it to finish on stop.
async fn record(mut child: tokio::process::Child, stop_rx: oneshot::Receiver<()>) -> Result<Vec<f32>, String> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();

    let reader = tokio::spawn(async move {
        let mut pcm = Vec::new();
        if let Some(mut out) = stdout {
            out.read_to_end(&mut pcm).await?;
        }
        Ok::<_, std::io::Error>(pcm)
    });

    tokio::select! {
        _ = stop_rx => {
            // 'q' makes ffmpeg flush and exit cleanly.
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(b"q").await;
            }
        }
        _ = child.wait() => {}
    }

    child
        .wait()
        .await
        .map_err(|e| format!("ffmpeg wait failed: {e}"))?;

    let pcm = reader
        .await
        .map_err(|e| format!("capture reader failed: {e}"))?
        .map_err(|e| format!("failed to read audio: {e}"))?;

    debug!("Recorded {} bytes of PCM", pcm.len());
    Ok(pcm_to_samples(&pcm))
}
