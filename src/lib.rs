//! Santa chat companion: keyword replies, persona voices, push-to-talk.

pub mod chatbot;
pub mod config;
