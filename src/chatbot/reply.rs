//! Keyword-driven reply selection.
//!
//! Every turn is classified on its own: the lowercased utterance is checked
//! against the topic keyword groups in a fixed order and the first group with
//! a hit picks the reply. Anything unmatched gets a random generic reply.

use rand::Rng;
use regex::Regex;
use serde::Deserialize;

/// Reply for input too short to classify.
pub const CLARIFY_REPLY: &str =
    "Ho ho ho, I didn't quite catch that. Could you say it again a bit more clearly?";

/// Fallback pool, drawn uniformly when no topic matches.
pub const GENERIC_REPLIES: [&str; 5] = [
    "That sounds wonderful! Tell me more — Santa loves hearing about your day.",
    "Ho ho ho, that made me smile! What else is going on in your world?",
    "The elves are listening in too and nodding along. Anything special you’re looking forward to this season?",
    "What a magical thought! If you could wish for one thing this year (besides presents!), what would it be?",
    "I love hearing from you. Remember, being kind to others is one of the greatest gifts you can give!",
];

/// Minimum trimmed length (in chars) before keyword matching kicks in.
const MIN_UTTERANCE_CHARS: usize = 2;

/// Keyword groups, in match precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Gift,
    NiceList,
    Location,
    Name,
    Thanks,
    Greeting,
    School,
}

impl Topic {
    /// All topics, highest precedence first.
    pub const ALL: [Topic; 7] = [
        Topic::Gift,
        Topic::NiceList,
        Topic::Location,
        Topic::Name,
        Topic::Thanks,
        Topic::Greeting,
        Topic::School,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Topic::Gift => &["gift", "present", "ps5", "xbox", "toy", "iphone", "bike"],
            Topic::NiceList => &["nice list", "naughty", "good", "bad"],
            Topic::Location => &["where are you", "north pole", "where do you live"],
            Topic::Name => &["name"],
            Topic::Thanks => &["thank"],
            Topic::Greeting => &["merry christmas"],
            Topic::School => &["school", "grades"],
        }
    }

    pub fn reply(self) -> &'static str {
        match self {
            Topic::Gift => {
                "Gifts, you say? 🎁 My elves and I are hard at work in the workshop. Tell me what you're wishing for, and remember: kindness makes the magic even stronger!"
            }
            Topic::NiceList => {
                "Ah, the famous Nice List! 🎄 I keep a very special magical list. If you've been trying your best to be kind, helpful, and honest, you're absolutely on the right track!"
            }
            Topic::Location => {
                "I live at the North Pole, of course! 🧊 Surrounded by snow, candy canes, twinkling lights, and a very busy toy workshop."
            }
            Topic::Name => {
                "Well, you can call me Santa, St. Nick, or Father Christmas. But I’d love to know your name too!"
            }
            Topic::Thanks => {
                "You're very welcome! Ho ho ho! Spreading joy is my favorite thing to do."
            }
            Topic::Greeting => {
                "Merry Christmas to you too! 🌟 May your days be merry, bright, and full of cozy hot cocoa."
            }
            Topic::School => {
                "Doing your best at school is a wonderful way to stay on the Nice List. Keep learning and shining — I’m very proud of you!"
            }
        }
    }
}

/// How keywords are tested against the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain substring test: "badger" matches "bad".
    #[default]
    Substring,
    /// Whole words only, allowing a trailing plural "s"/"es".
    Word,
}

/// Source of the index used to pick a generic reply.
///
/// Injected so tests can pin the fallback.
pub trait RandomSource {
    /// Return an index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

impl RandomSource for rand::rngs::ThreadRng {
    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

impl RandomSource for rand::rngs::StdRng {
    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

/// Maps an utterance to a canned reply.
pub struct ReplySelector {
    mode: MatchMode,
    /// One alternation per topic, only built in word mode.
    word_patterns: Vec<(Topic, Regex)>,
}

impl ReplySelector {
    pub fn new(mode: MatchMode) -> Result<Self, regex::Error> {
        let word_patterns = match mode {
            MatchMode::Substring => Vec::new(),
            MatchMode::Word => Topic::ALL
                .iter()
                .map(|&topic| word_pattern(topic.keywords()).map(|re| (topic, re)))
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(Self { mode, word_patterns })
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Find the highest-precedence topic mentioned in the utterance.
    ///
    /// Returns `None` for too-short input as well as for no match.
    pub fn classify(&self, utterance: &str) -> Option<Topic> {
        if is_too_short(utterance) {
            return None;
        }
        let text = utterance.to_lowercase();

        match self.mode {
            MatchMode::Substring => Topic::ALL
                .into_iter()
                .find(|topic| topic.keywords().iter().any(|kw| text.contains(kw))),
            MatchMode::Word => self
                .word_patterns
                .iter()
                .find(|(_, re)| re.is_match(&text))
                .map(|(topic, _)| *topic),
        }
    }

    /// Pick the reply for one turn. Never empty.
    pub fn select(&self, utterance: &str, rng: &mut dyn RandomSource) -> &'static str {
        if is_too_short(utterance) {
            return CLARIFY_REPLY;
        }
        match self.classify(utterance) {
            Some(topic) => topic.reply(),
            None => {
                let index = rng.pick(GENERIC_REPLIES.len()).min(GENERIC_REPLIES.len() - 1);
                GENERIC_REPLIES[index]
            }
        }
    }
}

fn is_too_short(utterance: &str) -> bool {
    utterance.trim().chars().count() < MIN_UTTERANCE_CHARS
}

fn word_pattern(keywords: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = keywords
        .iter()
        .map(|kw| regex::escape(kw))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})(?:e?s)?\b"))
}
