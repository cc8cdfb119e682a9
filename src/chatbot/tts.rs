//! Text-to-speech: the speech toggle plus a command-line synthesizer.
//!
//! Replies are read by a local synthesizer program (`espeak-ng`/`espeak` or
//! macOS `say`), one child process per utterance. Starting a new utterance
//! cancels the previous one so successive replies never overlap.

use std::process::Stdio;

use regex::Regex;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::chatbot::host::{HostError, SpeechRequest, SpeechSynthesizer, check_binary_available};
use crate::chatbot::persona::Persona;
use crate::chatbot::voice::{Voice, pick_voice};

/// espeak's default pitch (0-99) and everyone's default rate (words/min).
const ESPEAK_BASE_PITCH: f32 = 50.0;
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Which synthesizer to use, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    /// Whatever is installed, `say` first on macOS.
    #[default]
    Auto,
    Espeak,
    Say,
    /// Never speak.
    None,
}

/// Synthesizer program family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthKind {
    Espeak,
    Say,
}

/// A located synthesizer program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthCommand {
    pub kind: SynthKind,
    pub program: String,
}

impl SynthCommand {
    /// Find an installed synthesizer for `backend`.
    pub async fn detect(backend: SpeechBackend) -> Option<Self> {
        let candidates: &[(SynthKind, &str)] = match backend {
            SpeechBackend::None => &[],
            SpeechBackend::Espeak => &[(SynthKind::Espeak, "espeak-ng"), (SynthKind::Espeak, "espeak")],
            SpeechBackend::Say => &[(SynthKind::Say, "say")],
            SpeechBackend::Auto if cfg!(target_os = "macos") => &[
                (SynthKind::Say, "say"),
                (SynthKind::Espeak, "espeak-ng"),
                (SynthKind::Espeak, "espeak"),
            ],
            SpeechBackend::Auto => &[(SynthKind::Espeak, "espeak-ng"), (SynthKind::Espeak, "espeak")],
        };

        for (kind, name) in candidates {
            if let Some(program) = check_binary_available(name).await {
                info!("Speech synthesizer: {program}");
                return Some(Self { kind: *kind, program });
            }
        }
        None
    }

    /// Command-line arguments that read `request` aloud.
    pub fn args(&self, request: &SpeechRequest) -> Vec<String> {
        let words_per_minute = (request.rate * BASE_WORDS_PER_MINUTE).round() as u32;
        let mut args = Vec::new();

        match self.kind {
            SynthKind::Espeak => {
                // espeak selects voices by language.
                if let Some(ref voice) = request.voice {
                    args.extend(["-v".to_string(), voice.lang.clone()]);
                }
                let pitch = (request.pitch * ESPEAK_BASE_PITCH).round().clamp(0.0, 99.0) as u32;
                args.extend(["-p".to_string(), pitch.to_string()]);
                args.extend(["-s".to_string(), words_per_minute.to_string()]);
            }
            SynthKind::Say => {
                if let Some(ref voice) = request.voice {
                    args.extend(["-v".to_string(), voice.name.clone()]);
                }
                args.extend(["-r".to_string(), words_per_minute.to_string()]);
            }
        }

        args.push(request.text.clone());
        args
    }

    /// Query the installed voices.
    pub async fn list_voices(&self) -> Result<Vec<Voice>, HostError> {
        let list_arg = match self.kind {
            SynthKind::Espeak => "--voices",
            SynthKind::Say => "-v?",
        };
        let output = Command::new(&self.program)
            .arg(list_arg)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HostError::Spawn { program: self.program.clone(), source: e })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Failed(format!("voice listing failed: {}", stderr.trim())));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let voices = match self.kind {
            SynthKind::Espeak => parse_espeak_voices(&listing),
            SynthKind::Say => parse_say_voices(&listing)?,
        };
        debug!("{} lists {} voices", self.program, voices.len());
        Ok(voices)
    }
}

/// Parse the `espeak --voices` table.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en
/// ```
fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let name = fields[3].replace('_', " ");
            // Age/Gender column, e.g. "--/F".
            let name = match fields[2].rsplit('/').next() {
                Some("M") => format!("{name} male"),
                Some("F") => format!("{name} female"),
                _ => name,
            };
            Some(Voice::new(name, fields[1]))
        })
        .collect()
}

/// Parse `say -v?` output.
///
/// ```text
/// Daniel              en_GB    # Hello! My name is Daniel.
/// Eddy (English (US)) en_US    # Hello! My name is Eddy.
/// ```
fn parse_say_voices(listing: &str) -> Result<Vec<Voice>, HostError> {
    let line_re = Regex::new(r"^(?P<name>.+?)\s+(?P<lang>[a-z]{2,3}(?:[_-][A-Za-z0-9]+)+)\s+#")
        .map_err(|e| HostError::Failed(format!("bad voice pattern: {e}")))?;

    Ok(listing
        .lines()
        .filter_map(|line| {
            let caps = line_re.captures(line)?;
            Some(Voice::new(caps["name"].trim(), &caps["lang"]))
        })
        .collect())
}

/// Speaks through a synthesizer program, one child per utterance.
pub struct CommandSynthesizer {
    command: SynthCommand,
    current: Option<Child>,
}

impl CommandSynthesizer {
    pub fn new(command: SynthCommand) -> Self {
        Self { command, current: None }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&mut self, request: &SpeechRequest) -> Result<(), HostError> {
        if self.command.kind == SynthKind::Say && request.pitch != 1.0 {
            debug!("say has no pitch control, ignoring pitch {}", request.pitch);
        }

        let child = Command::new(&self.command.program)
            .args(self.command.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HostError::Spawn { program: self.command.program.clone(), source: e })?;

        // Replacing a running child drops it, which kills it.
        self.current = Some(child);
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.current.take()
            && let Err(e) = child.start_kill()
        {
            debug!("Synthesizer already finished: {e}");
        }
    }
}

/// Speech output state: toggle, persona, cached voice catalog.
pub struct SpeechOutput {
    synth: Option<Box<dyn SpeechSynthesizer>>,
    enabled: bool,
    persona: Persona,
    /// Latest catalog snapshot from the host.
    voices: Vec<Voice>,
}

impl SpeechOutput {
    /// `synth` is `None` when the host cannot speak at all.
    pub fn new(synth: Option<Box<dyn SpeechSynthesizer>>, enabled: bool, persona: Persona) -> Self {
        Self {
            synth,
            enabled,
            persona,
            voices: Vec::new(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synth.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled && let Some(ref mut synth) = self.synth {
            synth.cancel();
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Swap in a fresh catalog; the previous snapshot is discarded.
    pub fn replace_voices(&mut self, voices: Vec<Voice>) {
        debug!("Voice catalog refreshed: {} voices", voices.len());
        self.voices = voices;
    }

    /// Build the synthesis request for `text` with the current persona.
    pub fn request_for(&self, text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            voice: pick_voice(self.persona, &self.voices).cloned(),
            pitch: self.persona.pitch(),
            rate: self.persona.rate(),
        }
    }

    /// Read `text` aloud if speech is on. Returns whether playback started.
    pub fn speak_reply(&mut self, text: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let request = self.request_for(text);
        let Some(ref mut synth) = self.synth else {
            return false;
        };

        synth.cancel();
        match synth.speak(&request) {
            Ok(()) => true,
            Err(e) => {
                warn!("Speech synthesis failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(voice: Option<Voice>, pitch: f32, rate: f32) -> SpeechRequest {
        SpeechRequest {
            text: "Ho ho ho".to_string(),
            voice,
            pitch,
            rate,
        }
    }

    #[test]
    fn test_espeak_args() {
        let cmd = SynthCommand { kind: SynthKind::Espeak, program: "espeak-ng".into() };
        let args = cmd.args(&request(Some(Voice::new("English (America)", "en-us")), 0.8, 0.95));
        assert_eq!(args, ["-v", "en-us", "-p", "40", "-s", "166", "Ho ho ho"]);
    }

    #[test]
    fn test_espeak_pitch_clamped() {
        let cmd = SynthCommand { kind: SynthKind::Espeak, program: "espeak".into() };
        let args = cmd.args(&request(None, 3.0, 1.0));
        assert_eq!(args, ["-p", "99", "-s", "175", "Ho ho ho"]);
    }

    #[test]
    fn test_say_args() {
        let cmd = SynthCommand { kind: SynthKind::Say, program: "say".into() };
        let args = cmd.args(&request(Some(Voice::new("Daniel", "en_GB")), 1.4, 1.05));
        assert_eq!(args, ["-v", "Daniel", "-r", "184", "Ho ho ho"]);
    }

    #[test]
    fn test_parse_espeak_voices() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/M      English_(Great_Britain) gmw/en       (en 2)
 2  en-us           --/F      English_(America)  gmw/en-US            (en 3)
";
        let voices = parse_espeak_voices(listing);
        assert_eq!(
            voices,
            vec![
                Voice::new("Afrikaans male", "af"),
                Voice::new("English (Great Britain) male", "en-gb"),
                Voice::new("English (America) female", "en-us"),
            ]
        );
    }

    #[test]
    fn test_espeak_gender_reaches_persona_mapper() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 2  en-gb           --/M      English_(Great_Britain) gmw/en
 2  en-us           --/F      English_(America)  gmw/en-US
 5  en-sc           --/-      English_(Scotland) gmw/en-GB-scotland
";
        let voices = parse_espeak_voices(listing);
        assert_eq!(voices[2].name, "English (Scotland)");
        assert_eq!(pick_voice(Persona::MrsClaus, &voices).unwrap().lang, "en-us");
        assert_eq!(pick_voice(Persona::Santa, &voices).unwrap().lang, "en-gb");
    }

    #[test]
    fn test_parse_say_voices() {
        let listing = "\
Daniel              en_GB    # Hello! My name is Daniel.
Eddy (English (US)) en_US    # Hello! My name is Eddy.
Thomas              fr_FR    # Bonjour, je m'appelle Thomas.
garbage line
";
        let voices = parse_say_voices(listing).unwrap();
        assert_eq!(
            voices,
            vec![
                Voice::new("Daniel", "en_GB"),
                Voice::new("Eddy (English (US))", "en_US"),
                Voice::new("Thomas", "fr_FR"),
            ]
        );
    }

    #[tokio::test]
    async fn test_detect_none_backend() {
        assert_eq!(SynthCommand::detect(SpeechBackend::None).await, None);
    }
}
