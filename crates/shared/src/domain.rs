use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// One question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slide {
    pub question: String,
    pub answer: String,
}

impl Slide {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A named, ordered collection of slides.
///
/// Decks are never edited in place; a change of deck replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    pub slides: Vec<Slide>,
}

impl Deck {
    /// Builds a deck, normalizing `name` to its alphanumeric characters.
    pub fn new(name: &str, slides: Vec<Slide>) -> Result<Self, ParseError> {
        let name = normalize_deck_name(name);
        if name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        Ok(Self { name, slides })
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Keeps only ASCII letters and digits.
pub fn normalize_deck_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// An imported file blob before it has been parsed into a deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}
