use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::chatbot::persona::Persona;
use crate::chatbot::reply::MatchMode;
use crate::chatbot::tts::SpeechBackend;

/// Upper bound for one push-to-talk recording.
const MAX_CAPTURE_SECS_LIMIT: u32 = 60;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    persona: Persona,
    #[serde(default = "default_true")]
    speech_enabled: bool,
    /// "auto", "espeak", "say" or "none".
    #[serde(default)]
    speech_backend: SpeechBackend,
    /// "substring" (loose) or "word" (whole words only).
    #[serde(default)]
    keyword_match: MatchMode,
    /// Transcription command and arguments; prints one utterance on stdout.
    recognizer_command: Option<Vec<String>>,
    /// Path to Whisper model file (.bin) for offline recognition.
    whisper_model_path: Option<String>,
    /// ffmpeg input format for Whisper capture (e.g. "pulse", "avfoundation").
    capture_format: Option<String>,
    /// ffmpeg input device for Whisper capture (e.g. "default", ":0").
    capture_device: Option<String>,
    #[serde(default = "default_max_capture_secs")]
    max_capture_secs: u32,
    #[serde(default = "default_recognition_lang")]
    recognition_lang: String,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_capture_secs() -> u32 {
    15
}

fn default_recognition_lang() -> String {
    "en-US".to_string()
}

fn default_capture_format() -> &'static str {
    if cfg!(target_os = "macos") { "avfoundation" } else { "pulse" }
}

fn default_capture_device() -> &'static str {
    if cfg!(target_os = "macos") { ":0" } else { "default" }
}

/// How spoken input is captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerConfig {
    /// No voice input.
    None,
    /// External transcription command (argv).
    Command(Vec<String>),
    /// Local Whisper model; needs the `whisper` feature.
    Whisper(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path the config was loaded from, if any.
    pub config_path: Option<PathBuf>,
    pub persona: Persona,
    pub speech_enabled: bool,
    pub speech_backend: SpeechBackend,
    pub keyword_match: MatchMode,
    pub recognizer: RecognizerConfig,
    pub recognition_lang: String,
    pub capture_format: String,
    pub capture_device: String,
    pub max_capture_secs: u32,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            persona: Persona::default(),
            speech_enabled: true,
            speech_backend: SpeechBackend::default(),
            keyword_match: MatchMode::default(),
            recognizer: RecognizerConfig::None,
            recognition_lang: default_recognition_lang(),
            capture_format: default_capture_format().to_string(),
            capture_device: default_capture_device().to_string(),
            max_capture_secs: default_max_capture_secs(),
            data_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let recognizer = match (file.recognizer_command, file.whisper_model_path) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "set either recognizer_command or whisper_model_path, not both".into(),
                ));
            }
            (Some(argv), None) => {
                if argv.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(ConfigError::Validation("recognizer_command must name a program".into()));
                }
                RecognizerConfig::Command(argv)
            }
            (None, Some(model)) => RecognizerConfig::Whisper(PathBuf::from(model)),
            (None, None) => RecognizerConfig::None,
        };

        if file.max_capture_secs == 0 || file.max_capture_secs > MAX_CAPTURE_SECS_LIMIT {
            return Err(ConfigError::Validation(format!(
                "max_capture_secs must be between 1 and {MAX_CAPTURE_SECS_LIMIT}"
            )));
        }
        if file.recognition_lang.trim().is_empty() {
            return Err(ConfigError::Validation("recognition_lang must not be empty".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path: Some(config_path),
            persona: file.persona,
            speech_enabled: file.speech_enabled,
            speech_backend: file.speech_backend,
            keyword_match: file.keyword_match,
            recognizer,
            recognition_lang: file.recognition_lang,
            capture_format: file
                .capture_format
                .unwrap_or_else(|| default_capture_format().to_string()),
            capture_device: file
                .capture_device
                .unwrap_or_else(|| default_capture_device().to_string()),
            max_capture_secs: file.max_capture_secs,
            data_dir,
        })
    }
}
