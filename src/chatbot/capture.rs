//! Push-to-talk capture state machine.
//!
//! Gestures move the machine into `Starting`/`Stopping` right away so the
//! listening indicator follows the user, but it only settles into `Active`
//! or `Idle` on recognizer callbacks. Any host failure collapses to `Idle`.
//!
//! Callbacks are tagged with their session id. Lifecycle callbacks from any
//! session other than the latest one are dropped, so a slow `Ended` from a
//! failed session cannot cancel the session that replaced it.

use tracing::{debug, info, warn};

use crate::chatbot::host::{RecognitionEvent, SessionId, SpeechRecognizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    /// Start requested, waiting for the host to confirm.
    Starting,
    Active,
    /// Stop requested, waiting for the session to end.
    Stopping,
}

/// Owns the recognizer and the capture state.
pub struct CaptureController {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    state: CaptureState,
    /// Latest session the recognizer accepted.
    session: Option<SessionId>,
}

impl CaptureController {
    /// `recognizer` is `None` when the host cannot recognize speech.
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        Self {
            recognizer,
            state: CaptureState::Idle,
            session: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether the talk control should show as recording.
    pub fn is_listening(&self) -> bool {
        matches!(self.state, CaptureState::Starting | CaptureState::Active)
    }

    /// Talk control pressed.
    pub fn press(&mut self) {
        let Some(ref mut recognizer) = self.recognizer else {
            return;
        };
        if self.state != CaptureState::Idle {
            debug!("Talk pressed while {:?}, ignoring", self.state);
            return;
        }

        self.state = CaptureState::Starting;
        match recognizer.start() {
            Ok(id) => self.session = Some(id),
            Err(e) => {
                warn!("Recognition start error: {e}");
                self.state = CaptureState::Idle;
            }
        }
    }

    /// Talk control released (or the pointer left it).
    pub fn release(&mut self) {
        let Some(ref mut recognizer) = self.recognizer else {
            return;
        };
        if !matches!(self.state, CaptureState::Starting | CaptureState::Active) {
            return;
        }

        self.state = CaptureState::Stopping;
        if let Err(e) = recognizer.stop() {
            warn!("Recognition stop error: {e}");
            self.state = CaptureState::Idle;
        }
    }

    /// Apply a recognizer callback. Returns recognized text worth answering.
    ///
    /// Transcripts are answered whichever session produced them.
    pub fn on_event(&mut self, session: SessionId, event: RecognitionEvent) -> Option<String> {
        if self.session != Some(session) && !matches!(event, RecognitionEvent::Transcript(_)) {
            debug!("Dropping {:?} from stale session {session}", event);
            return None;
        }

        match event {
            RecognitionEvent::Started => {
                if self.state == CaptureState::Starting {
                    self.state = CaptureState::Active;
                }
                None
            }
            RecognitionEvent::Transcript(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                info!("Heard: \"{}\"", text);
                Some(text.to_string())
            }
            RecognitionEvent::Error(msg) => {
                warn!("Recognition error: {msg}");
                self.state = CaptureState::Idle;
                None
            }
            RecognitionEvent::Ended => {
                self.state = CaptureState::Idle;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::host::HostError;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        starts: usize,
        stops: usize,
    }

    struct FakeRecognizer {
        calls: Arc<Mutex<Calls>>,
        fail_start: bool,
        fail_stop: bool,
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn start(&mut self) -> Result<SessionId, HostError> {
            let mut calls = self.calls.lock().unwrap();
            calls.starts += 1;
            if self.fail_start { Err(HostError::AlreadyActive) } else { Ok(calls.starts as SessionId) }
        }

        fn stop(&mut self) -> Result<(), HostError> {
            self.calls.lock().unwrap().stops += 1;
            if self.fail_stop { Err(HostError::NotActive) } else { Ok(()) }
        }
    }

    fn controller(fail_start: bool, fail_stop: bool) -> (CaptureController, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let recognizer = FakeRecognizer { calls: calls.clone(), fail_start, fail_stop };
        (CaptureController::new(Some(Box::new(recognizer))), calls)
    }

    #[test]
    fn test_full_session() {
        let (mut capture, calls) = controller(false, false);
        capture.press();
        assert_eq!(capture.state(), CaptureState::Starting);
        assert!(capture.is_listening());

        capture.on_event(1, RecognitionEvent::Started);
        assert_eq!(capture.state(), CaptureState::Active);

        capture.release();
        assert_eq!(capture.state(), CaptureState::Stopping);
        assert!(!capture.is_listening());

        let heard = capture.on_event(1, RecognitionEvent::Transcript("  hello santa ".into()));
        assert_eq!(heard.as_deref(), Some("hello santa"));

        capture.on_event(1, RecognitionEvent::Ended);
        assert_eq!(capture.state(), CaptureState::Idle);

        let calls = calls.lock().unwrap();
        assert_eq!((calls.starts, calls.stops), (1, 1));
    }

    #[test]
    fn test_press_while_listening_is_noop() {
        let (mut capture, calls) = controller(false, false);
        capture.press();
        capture.on_event(1, RecognitionEvent::Started);
        capture.press();
        capture.press();
        assert_eq!(capture.state(), CaptureState::Active);
        assert!(capture.is_listening());
        assert_eq!(calls.lock().unwrap().starts, 1);
    }

    #[test]
    fn test_press_while_stopping_is_noop() {
        let (mut capture, calls) = controller(false, false);
        capture.press();
        capture.release();
        capture.press();
        assert_eq!(capture.state(), CaptureState::Stopping);
        assert_eq!(calls.lock().unwrap().starts, 1);
    }

    #[test]
    fn test_release_while_idle_is_noop() {
        let (mut capture, calls) = controller(false, false);
        capture.release();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(calls.lock().unwrap().stops, 0);
    }

    #[test]
    fn test_start_failure_collapses_to_idle() {
        let (mut capture, _) = controller(true, false);
        capture.press();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(!capture.is_listening());
    }

    #[test]
    fn test_stop_failure_collapses_to_idle() {
        let (mut capture, _) = controller(false, true);
        capture.press();
        capture.on_event(1, RecognitionEvent::Started);
        capture.release();
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_release_before_started_confirmation() {
        let (mut capture, _) = controller(false, false);
        capture.press();
        capture.release();
        // A late Started must not resurrect the session.
        capture.on_event(1, RecognitionEvent::Started);
        assert_eq!(capture.state(), CaptureState::Stopping);
    }

    #[test]
    fn test_error_collapses_to_idle() {
        let (mut capture, _) = controller(false, false);
        capture.press();
        capture.on_event(1, RecognitionEvent::Started);
        capture.on_event(1, RecognitionEvent::Error("no-speech".into()));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_stale_end_does_not_cancel_new_session() {
        let (mut capture, calls) = controller(false, false);
        capture.press();
        capture.on_event(1, RecognitionEvent::Started);
        capture.on_event(1, RecognitionEvent::Error("audio-capture".into()));
        assert_eq!(capture.state(), CaptureState::Idle);

        // Pressed again before the failed session's Ended was delivered.
        capture.press();
        assert_eq!(capture.state(), CaptureState::Starting);
        capture.on_event(1, RecognitionEvent::Ended);
        capture.on_event(2, RecognitionEvent::Started);
        assert_eq!(capture.state(), CaptureState::Active);
        assert!(capture.is_listening());

        capture.press();
        assert_eq!(calls.lock().unwrap().starts, 2);

        capture.release();
        capture.on_event(2, RecognitionEvent::Ended);
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_stale_error_is_ignored() {
        let (mut capture, _) = controller(false, false);
        capture.press();
        capture.on_event(1, RecognitionEvent::Ended);
        capture.press();
        capture.on_event(2, RecognitionEvent::Started);
        capture.on_event(1, RecognitionEvent::Error("network".into()));
        assert_eq!(capture.state(), CaptureState::Active);
    }

    #[test]
    fn test_stale_transcript_is_still_answered() {
        let (mut capture, _) = controller(false, false);
        capture.press();
        capture.on_event(1, RecognitionEvent::Ended);
        capture.press();
        let heard = capture.on_event(1, RecognitionEvent::Transcript("thanks santa".into()));
        assert_eq!(heard.as_deref(), Some("thanks santa"));
        assert_eq!(capture.state(), CaptureState::Starting);
    }

    #[test]
    fn test_blank_transcript_ignored() {
        let (mut capture, _) = controller(false, false);
        assert_eq!(capture.on_event(1, RecognitionEvent::Transcript("   ".into())), None);
    }

    #[test]
    fn test_unsupported_ignores_gestures() {
        let mut capture = CaptureController::new(None);
        assert!(!capture.is_supported());
        capture.press();
        assert_eq!(capture.state(), CaptureState::Idle);
        capture.release();
        assert_eq!(capture.state(), CaptureState::Idle);
    }
}
