//! Speech-to-text through an external transcription command.
//!
//! The configured command is expected to listen for one utterance and print
//! its transcript on stdout. Stopping the session kills the command, so a
//! stopped session ends without a transcript.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::chatbot::host::{HostError, HostEvent, RecognitionEvent, SessionId, SpeechRecognizer};

/// Handle to a running capture task.
pub(crate) struct CaptureSession {
    stop_tx: oneshot::Sender<()>,
    done: Arc<AtomicBool>,
}

impl CaptureSession {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>, Arc<AtomicBool>) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let done = Arc::new(AtomicBool::new(false));
        (Self { stop_tx, done: done.clone() }, stop_rx, done)
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }
}

pub(crate) fn is_active(session: &Option<CaptureSession>) -> bool {
    session.as_ref().is_some_and(CaptureSession::is_running)
}

/// Ask the running session (if any) to stop.
pub(crate) fn request_stop(session: &mut Option<CaptureSession>) -> Result<(), HostError> {
    match session.take() {
        Some(s) if s.is_running() => {
            // The task may have finished in between; that is fine.
            let _ = s.stop_tx.send(());
            Ok(())
        }
        _ => Err(HostError::NotActive),
    }
}

pub(crate) fn send(events: &mpsc::UnboundedSender<HostEvent>, session: SessionId, event: RecognitionEvent) {
    if events.send(HostEvent::Capture { session, event }).is_err() {
        debug!("Event loop gone, dropping recognition event");
    }
}

/// Recognizer backed by a transcription command.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    events: mpsc::UnboundedSender<HostEvent>,
    session: Option<CaptureSession>,
    last_id: SessionId,
}

impl CommandRecognizer {
    /// `argv` is the command and its arguments; it must not be empty.
    pub fn new(argv: &[String], events: mpsc::UnboundedSender<HostEvent>) -> Result<Self, HostError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HostError::Failed("empty recognizer command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            events,
            session: None,
            last_id: 0,
        })
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(&mut self) -> Result<SessionId, HostError> {
        if is_active(&self.session) {
            return Err(HostError::AlreadyActive);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HostError::Spawn { program: self.program.clone(), source: e })?;

        let stdout = child.stdout.take();
        let (session, stop_rx, done) = CaptureSession::new();
        let events = self.events.clone();
        self.last_id += 1;
        let id = self.last_id;

        info!("Listening via {} (session {id})", self.program);
        send(&events, id, RecognitionEvent::Started);
        tokio::spawn(async move {
            run_command_session(child, stdout, stop_rx, &events, id).await;
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

async fn run_command_session(
    mut child: Child,
    stdout: Option<ChildStdout>,
    stop_rx: oneshot::Receiver<()>,
    events: &mpsc::UnboundedSender<HostEvent>,
    id: SessionId,
) {
    let read = async move {
        let mut text = String::new();
        if let Some(mut out) = stdout {
            out.read_to_string(&mut text).await?;
        }
        Ok::<_, std::io::Error>(text)
    };

    tokio::select! {
        result = read => {
            let text = match result {
                Ok(text) => text,
                Err(e) => {
                    send(events, id, RecognitionEvent::Error(format!("failed to read transcript: {e}")));
                    let _ = child.start_kill();
                    return;
                }
            };
            match child.wait().await {
                Ok(status) if status.success() => {
                    let text = text.trim();
                    if !text.is_empty() {
                        send(events, id, RecognitionEvent::Transcript(text.to_string()));
                    }
                }
                Ok(status) => {
                    warn!("Recognizer exited with {status}");
                    send(events, id, RecognitionEvent::Error(format!("recognizer exited with {status}")));
                }
                Err(e) => send(events, id, RecognitionEvent::Error(format!("recognizer wait failed: {e}"))),
            }
        }
        _ = stop_rx => {
            debug!("Capture stopped before a transcript arrived");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::capture::{CaptureController, CaptureState};

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    async fn collect_until_ended(
        rx: &mut mpsc::UnboundedReceiver<HostEvent>,
        expected: SessionId,
    ) -> Vec<RecognitionEvent> {
        let mut seen = Vec::new();
        while let Some(HostEvent::Capture { session, event }) = rx.recv().await {
            assert_eq!(session, expected, "event {event:?} from wrong session");
            let ended = event == RecognitionEvent::Ended;
            seen.push(event);
            if ended {
                break;
            }
        }
        seen
    }

    #[test]
    fn test_empty_command_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(CommandRecognizer::new(&[], tx).is_err());
    }

    #[tokio::test]
    async fn test_transcript_from_stdout() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(&argv(&["echo", "  merry christmas "]), tx).unwrap();
        let id = recognizer.start().unwrap();

        let events = collect_until_ended(&mut rx, id).await;
        assert_eq!(
            events,
            vec![
                RecognitionEvent::Started,
                RecognitionEvent::Transcript("merry christmas".into()),
                RecognitionEvent::Ended,
            ]
        );
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(&argv(&["sleep", "5"]), tx).unwrap();
        let id = recognizer.start().unwrap();
        assert!(matches!(recognizer.start(), Err(HostError::AlreadyActive)));

        recognizer.stop().unwrap();
        let events = collect_until_ended(&mut rx, id).await;
        assert_eq!(events, vec![RecognitionEvent::Started, RecognitionEvent::Ended]);
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(&argv(&["true"]), tx).unwrap();
        assert!(matches!(recognizer.stop(), Err(HostError::NotActive)));
    }

    #[tokio::test]
    async fn test_failing_command_reports_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(&argv(&["false"]), tx).unwrap();
        let id = recognizer.start().unwrap();
        let events = collect_until_ended(&mut rx, id).await;
        assert!(matches!(events[1], RecognitionEvent::Error(_)));
        assert_eq!(events.last(), Some(&RecognitionEvent::Ended));
    }

    #[tokio::test]
    async fn test_sessions_get_fresh_ids() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut recognizer = CommandRecognizer::new(&argv(&["echo", "ho ho"]), tx).unwrap();

        let first = recognizer.start().unwrap();
        collect_until_ended(&mut rx, first).await;
        let second = recognizer.start().unwrap();
        assert!(second > first);
        let events = collect_until_ended(&mut rx, second).await;
        assert_eq!(events.first(), Some(&RecognitionEvent::Started));
    }

    #[tokio::test]
    async fn test_controller_survives_late_end_of_failed_run() {
        // First run fails, later runs keep listening until stopped.
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let script = format!(
            "if [ -e '{0}' ]; then sleep 5; else touch '{0}'; exit 1; fi",
            marker.display()
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recognizer = CommandRecognizer::new(&argv(&["sh", "-c", &script]), tx).unwrap();
        let mut capture = CaptureController::new(Some(Box::new(recognizer)));

        capture.press();
        let mut late_end = None;
        while let Some(HostEvent::Capture { session, event }) = rx.recv().await {
            if event == RecognitionEvent::Ended {
                late_end = Some(session);
                break;
            }
            capture.on_event(session, event);
        }
        assert_eq!(capture.state(), CaptureState::Idle);

        capture.press();
        assert_eq!(capture.state(), CaptureState::Starting);
        capture.on_event(late_end.unwrap(), RecognitionEvent::Ended);

        let Some(HostEvent::Capture { session, event }) = rx.recv().await else {
            panic!("channel closed");
        };
        assert_eq!(event, RecognitionEvent::Started);
        capture.on_event(session, event);
        assert_eq!(capture.state(), CaptureState::Active);
        assert!(capture.is_listening());

        capture.release();
        while let Some(HostEvent::Capture { session, event }) = rx.recv().await {
            let ended = event == RecognitionEvent::Ended;
            capture.on_event(session, event);
            if ended {
                break;
            }
        }
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut recognizer =
            CommandRecognizer::new(&argv(&["definitely-not-a-real-binary-xyz"]), tx).unwrap();
        assert!(matches!(recognizer.start(), Err(HostError::Spawn { .. })));
    }
}
