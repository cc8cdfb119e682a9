//! Chat session - turns user input into rendered (and spoken) replies.
//!
//! All mutable state (voice catalog, capture state, speech toggle) lives in
//! one [`ChatSession`], so several sessions can run side by side.

use tracing::{debug, info};

use crate::chatbot::capture::CaptureController;
use crate::chatbot::host::HostEvent;
use crate::chatbot::message::{ChatMessage, Sender, truncate_safe};
use crate::chatbot::persona::Persona;
use crate::chatbot::reply::{RandomSource, ReplySelector};
use crate::chatbot::tts::SpeechOutput;

/// Santa's opening line. Shown, not spoken.
pub const WELCOME: &str = "Ho ho ho! I'm Santa Claus, chatting live from the North Pole. What would you like to talk about today?";

pub const SPEECH_UNSUPPORTED: &str = "Speech output is not supported on this system";
pub const VOICE_UNSUPPORTED: &str = "Voice input is not supported on this system";

/// Where the session renders its output.
pub trait ChatView {
    fn show_message(&mut self, message: &ChatMessage);
    /// The talk control switched between idle and recording.
    fn show_listening(&mut self, listening: bool);
    fn show_notice(&mut self, notice: &str);
}

/// One conversation with Santa.
pub struct ChatSession {
    selector: ReplySelector,
    rng: Box<dyn RandomSource>,
    speech: SpeechOutput,
    capture: CaptureController,
    view: Box<dyn ChatView>,
    transcript: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(
        selector: ReplySelector,
        speech: SpeechOutput,
        capture: CaptureController,
        rng: Box<dyn RandomSource>,
        view: Box<dyn ChatView>,
    ) -> Self {
        Self {
            selector,
            rng,
            speech,
            capture,
            view,
            transcript: Vec::new(),
        }
    }

    /// Announce missing capabilities and greet the user.
    pub fn start(&mut self) {
        if !self.speech.is_supported() {
            self.view.show_notice(SPEECH_UNSUPPORTED);
        }
        if !self.capture.is_supported() {
            self.view.show_notice(VOICE_UNSUPPORTED);
        }
        self.render(ChatMessage::now(Sender::Santa, WELCOME));
    }

    /// A typed message was submitted. Blank input is ignored.
    pub fn submit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.render(ChatMessage::now(Sender::User, text));
        self.handle_user_message(text);
    }

    /// Reply to one utterance: render it, then read it aloud if enabled.
    pub fn handle_user_message(&mut self, text: &str) -> &'static str {
        let reply = self.selector.select(text, self.rng.as_mut());
        info!("\"{}\" → \"{}\"", truncate_safe(text, 100), truncate_safe(reply, 40));

        self.render(ChatMessage::now(Sender::Santa, reply));
        if self.speech.speak_reply(reply) {
            debug!("Speaking as {}", self.speech.persona());
        }
        reply
    }

    pub fn press_talk(&mut self) {
        let was_listening = self.capture.is_listening();
        self.capture.press();
        self.sync_listening(was_listening);
    }

    pub fn release_talk(&mut self) {
        let was_listening = self.capture.is_listening();
        self.capture.release();
        self.sync_listening(was_listening);
    }

    /// Apply an asynchronous host callback.
    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::VoicesChanged(voices) => self.speech.replace_voices(voices),
            HostEvent::Capture { session, event } => {
                let was_listening = self.capture.is_listening();
                let heard = self.capture.on_event(session, event);
                self.sync_listening(was_listening);

                if let Some(text) = heard {
                    self.render(ChatMessage::now(Sender::User, text.as_str()));
                    self.handle_user_message(&text);
                }
            }
        }
    }

    pub fn set_speech_enabled(&mut self, enabled: bool) {
        if enabled && !self.speech.is_supported() {
            self.view.show_notice(SPEECH_UNSUPPORTED);
        }
        self.speech.set_enabled(enabled);
        info!("Speech output {}", if enabled { "on" } else { "off" });
    }

    pub fn set_persona(&mut self, persona: Persona) {
        self.speech.set_persona(persona);
        info!("Persona set to {persona}");
    }

    pub fn is_listening(&self) -> bool {
        self.capture.is_listening()
    }

    pub fn speech(&self) -> &SpeechOutput {
        &self.speech
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    /// Everything rendered so far.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    fn render(&mut self, message: ChatMessage) {
        self.view.show_message(&message);
        self.transcript.push(message);
    }

    fn sync_listening(&mut self, was_listening: bool) {
        let listening = self.capture.is_listening();
        if listening != was_listening {
            self.view.show_listening(listening);
        }
    }
}
