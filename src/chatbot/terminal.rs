//! Terminal front end: input commands and stdout rendering.

use std::io::Write;

use chrono::{Datelike, Local};

use crate::chatbot::engine::ChatView;
use crate::chatbot::message::ChatMessage;
use crate::chatbot::persona::Persona;

pub const HELP: &str = "\
Type a message and press Enter to chat with Santa.
  /talk            start talking (push-to-talk)
  /stop            stop talking
  /speech on|off   read replies aloud
  /persona NAME    santa, mrs_claus or elf
  /voices          reload the voice list
  /help            show this help
  /quit            leave";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Say(String),
    Talk,
    Stop,
    Speech(bool),
    Persona(Persona),
    Voices,
    Help,
    Quit,
    /// A slash command that could not be understood.
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name.to_lowercase().as_str() {
        "talk" => Input::Talk,
        "stop" => Input::Stop,
        "speech" => match arg.to_lowercase().as_str() {
            "on" => Input::Speech(true),
            "off" => Input::Speech(false),
            _ => Input::Invalid("usage: /speech on|off".into()),
        },
        "persona" => match arg.parse() {
            Ok(persona) => Input::Persona(persona),
            Err(e) => Input::Invalid(e.to_string()),
        },
        "voices" => Input::Voices,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Invalid(format!("unknown command /{name}, try /help")),
    }
}

/// Banner shown once at start-up.
pub fn header() -> String {
    format!("🎄 Chat with Santa 🎄  (c) {}  /help for commands", Local::now().year())
}

/// Renders the session on stdout.
pub struct TerminalView<W: Write> {
    out: W,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // A closed stdout leaves nothing to report to.
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn show_message(&mut self, message: &ChatMessage) {
        self.line(&message.format());
    }

    fn show_listening(&mut self, listening: bool) {
        if listening {
            self.line("🔴 Listening… (/stop when done)");
        } else {
            self.line("🎙️ Hold to talk (/talk)");
        }
    }

    fn show_notice(&mut self, notice: &str) {
        self.line(&format!("⚠️  {notice}"));
    }
}
