//! Speaking personas.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which character the replies are read aloud as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    #[default]
    Santa,
    MrsClaus,
    Elf,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Santa, Persona::MrsClaus, Persona::Elf];

    /// Pitch multiplier, 1.0 being the platform default.
    pub fn pitch(self) -> f32 {
        match self {
            Persona::Santa => 0.8,
            Persona::MrsClaus => 1.2,
            Persona::Elf => 1.4,
        }
    }

    /// Rate multiplier, 1.0 being the platform default.
    pub fn rate(self) -> f32 {
        match self {
            Persona::Santa => 0.95,
            Persona::MrsClaus => 1.0,
            Persona::Elf => 1.05,
        }
    }

    /// Lowercase fragments that suggest a voice name suits this persona.
    pub fn name_hints(self) -> &'static [&'static str] {
        match self {
            Persona::Santa => &["male", "man", "david", "daniel"],
            Persona::MrsClaus => &["female", "woman", "girl"],
            Persona::Elf => &["child", "kid", "boy", "girl"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Santa => "santa",
            Persona::MrsClaus => "mrs_claus",
            Persona::Elf => "elf",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPersona(pub String);

impl fmt::Display for UnknownPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown persona '{}' (expected santa, mrs_claus or elf)", self.0)
    }
}

impl std::error::Error for UnknownPersona {}

impl FromStr for Persona {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "santa" => Ok(Persona::Santa),
            "mrs_claus" | "mrsclaus" => Ok(Persona::MrsClaus),
            "elf" => Ok(Persona::Elf),
            _ => Err(UnknownPersona(s.to_string())),
        }
    }
}
