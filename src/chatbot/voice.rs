//! Matching synthesized voices to personas.
//!
//! Voice names are vendor free text, so this is a guess: prefer English
//! voices, then the first one whose name hints at the persona, then whatever
//! comes first. No match is never an error.

use crate::chatbot::persona::Persona;

/// One voice offered by the host synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name, also what the synthesizer is asked for.
    pub name: String,
    /// Language tag as the host reports it ("en-gb", "en_US", ...).
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    pub fn is_english(&self) -> bool {
        self.lang.to_lowercase().starts_with("en")
    }
}

/// Pick the voice to use for `persona`, or `None` for the platform default.
pub fn pick_voice(persona: Persona, voices: &[Voice]) -> Option<&Voice> {
    let english: Vec<&Voice> = voices.iter().filter(|v| v.is_english()).collect();
    let candidates: Vec<&Voice> = if english.is_empty() {
        voices.iter().collect()
    } else {
        english
    };

    let hints = persona.name_hints();
    candidates
        .iter()
        .find(|v| {
            let name = v.name.to_lowercase();
            hints.iter().any(|hint| name.contains(hint))
        })
        .or_else(|| candidates.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, &str)]) -> Vec<Voice> {
        entries.iter().map(|(n, l)| Voice::new(*n, *l)).collect()
    }

    #[test]
    fn test_empty_catalog() {
        for persona in Persona::ALL {
            assert_eq!(pick_voice(persona, &[]), None);
        }
    }

    #[test]
    fn test_prefers_english() {
        let voices = catalog(&[("Amelie female", "fr-CA"), ("Alex", "en-US")]);
        let picked = pick_voice(Persona::MrsClaus, &voices).unwrap();
        assert_eq!(picked.name, "Alex");
    }

    #[test]
    fn test_non_english_only_uses_full_catalog() {
        let voices = catalog(&[("Thomas", "fr-FR"), ("Anna female", "de-DE")]);
        assert_eq!(pick_voice(Persona::MrsClaus, &voices).unwrap().name, "Anna female");
        assert_eq!(pick_voice(Persona::Elf, &voices).unwrap().name, "Thomas");
    }

    #[test]
    fn test_female_voice_for_mrs_claus() {
        let voices = catalog(&[
            ("Google UK English Male", "en-GB"),
            ("Google UK English Female", "en-GB"),
        ]);
        let picked = pick_voice(Persona::MrsClaus, &voices).unwrap();
        assert_eq!(picked.name, "Google UK English Female");
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let voices = catalog(&[("Karen", "en_AU"), ("DANIEL", "en_GB")]);
        assert_eq!(pick_voice(Persona::Santa, &voices).unwrap().name, "DANIEL");
    }

    #[test]
    fn test_elf_matches_child_voice() {
        let voices = catalog(&[("Fred", "en_US"), ("Junior Kid", "en_US")]);
        assert_eq!(pick_voice(Persona::Elf, &voices).unwrap().name, "Junior Kid");
    }

    #[test]
    fn test_falls_back_to_first_candidate() {
        let voices = catalog(&[("Zarvox", "en_US"), ("Trinoids", "en_US")]);
        for persona in Persona::ALL {
            assert_eq!(pick_voice(persona, &voices).unwrap().name, "Zarvox");
        }
    }

    #[test]
    fn test_language_tag_case_insensitive() {
        assert!(Voice::new("x", "EN-us").is_english());
        assert!(!Voice::new("x", "").is_english());
    }
}
