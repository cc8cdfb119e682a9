//! Chatbot module - scripted Santa replies with optional voice I/O.

pub mod capture;
pub mod engine;
pub mod host;
pub mod message;
pub mod persona;
pub mod recognizer;
pub mod reply;
pub mod terminal;
pub mod tts;
pub mod voice;
#[cfg(feature = "whisper")]
pub mod whisper;


pub use engine::{ChatSession, ChatView};
pub use host::{
    HostError, HostEvent, RecognitionEvent, SessionId, SpeechRecognizer, SpeechRequest, SpeechSynthesizer,
};
pub use message::{ChatMessage, Sender};
pub use persona::Persona;
pub use reply::{MatchMode, RandomSource, ReplySelector};
pub use voice::{Voice, pick_voice};
