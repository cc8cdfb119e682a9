//! Host capabilities the chat session talks to.
//!
//! The session never spawns anything itself: synthesis and recognition sit
//! behind these traits, and asynchronous host callbacks come back as
//! [`HostEvent`]s on a channel owned by the event loop.

use std::fmt;

use crate::chatbot::voice::Voice;

/// Failures raised by host speech capabilities.
#[derive(Debug)]
pub enum HostError {
    /// The capability does not exist on this system.
    Unsupported(String),
    /// Failed to launch the backing program.
    Spawn { program: String, source: std::io::Error },
    /// A capture session is already running.
    AlreadyActive,
    /// No capture session is running.
    NotActive,
    /// The host reported some other failure.
    Failed(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(what) => write!(f, "{what} is not supported on this system"),
            Self::Spawn { program, source } => write!(f, "failed to run '{program}': {source}"),
            Self::AlreadyActive => write!(f, "capture session already active"),
            Self::NotActive => write!(f, "no capture session active"),
            Self::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One utterance to read aloud.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    /// `None` leaves the choice to the synthesizer.
    pub voice: Option<Voice>,
    pub pitch: f32,
    pub rate: f32,
}

/// Text-to-speech output.
pub trait SpeechSynthesizer {
    /// Start reading `request` aloud. Returns once playback has started.
    fn speak(&mut self, request: &SpeechRequest) -> Result<(), HostError>;

    /// Stop whatever is being read, if anything.
    fn cancel(&mut self);
}

/// Identifies one capture session. Ids only grow within a recognizer.
pub type SessionId = u64;

/// Speech-to-text capture. Progress is reported as [`RecognitionEvent`]s.
pub trait SpeechRecognizer {
    /// Begin a capture session; its callbacks carry the returned id.
    fn start(&mut self) -> Result<SessionId, HostError>;
    fn stop(&mut self) -> Result<(), HostError>;
}

/// Callbacks from a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The host confirmed the session is capturing.
    Started,
    /// Recognized text for one utterance.
    Transcript(String),
    /// The session failed; `Ended` may or may not follow.
    Error(String),
    /// The session is over.
    Ended,
}

/// Everything the host can push into the session.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A fresh voice catalog snapshot.
    VoicesChanged(Vec<Voice>),
    Capture { session: SessionId, event: RecognitionEvent },
}

/// Locate `name` on PATH.
pub async fn check_binary_available(name: &str) -> Option<String> {
    if let Ok(output) = tokio::process::Command::new("which")
        .arg(name)
        .output()
        .await
        && output.status.success()
    {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            HostError::Unsupported("speech recognition".into()).to_string(),
            "speech recognition is not supported on this system"
        );
        assert_eq!(HostError::AlreadyActive.to_string(), "capture session already active");
        let err = HostError::Spawn {
            program: "espeak-ng".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("espeak-ng"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_missing_binary_not_found() {
        assert_eq!(check_binary_available("definitely-not-a-real-binary-xyz").await, None);
    }
}
