//! Two-column CSV codec for decks.
//!
//! Every non-empty line is one slide: a question cell and an answer cell,
//! each either wrapped in double quotes (and then free to contain commas) or
//! bare (and then free of commas). Quoted cells cannot contain quotes.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::{
    domain::{Deck, RawFile, Slide},
    error::{ParseError, SerializeError},
};

pub const DECK_FILE_EXTENSION: &str = ".csv";

static ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:"([^"]*)"|([^,]+))\s*,\s*(?:"([^"]*)"|([^,]+))\s*$"#)
        .expect("row pattern is a valid regex")
});

/// File name a deck is exported under.
pub fn deck_file_name(deck_name: &str) -> String {
    format!("{deck_name}{DECK_FILE_EXTENSION}")
}

pub fn parse_deck(file_name: &str, text: &str) -> Result<Deck, ParseError> {
    let stem = file_name
        .strip_suffix(DECK_FILE_EXTENSION)
        .ok_or_else(|| ParseError::BadExtension(file_name.to_string()))?;
    let slides = parse_slides(text)?;
    Deck::new(stem, slides)
}

pub fn parse_slides(text: &str) -> Result<Vec<Slide>, ParseError> {
    text.trim()
        .split('\n')
        .enumerate()
        .map(|(index, line)| parse_slide(index + 1, line.trim_end_matches('\r')))
        .collect()
}

fn parse_slide(line_number: usize, line: &str) -> Result<Slide, ParseError> {
    let captures = ROW_PATTERN
        .captures(line)
        .ok_or_else(|| ParseError::InvalidRow {
            line: line_number,
            content: line.to_string(),
        })?;

    let cell = |quoted: usize, bare: usize| -> Result<String, ParseError> {
        let value = match (captures.get(quoted), captures.get(bare)) {
            (Some(quoted), _) => quoted.as_str(),
            (None, Some(bare)) if bare.as_str().starts_with('"') => {
                return Err(ParseError::UnbalancedQuote { line: line_number });
            }
            (None, Some(bare)) => bare.as_str().trim(),
            (None, None) => "",
        };
        if value.is_empty() {
            return Err(ParseError::EmptyCell { line: line_number });
        }
        Ok(value.to_string())
    };

    Ok(Slide {
        question: cell(1, 2)?,
        answer: cell(3, 4)?,
    })
}

/// Parses an imported blob. Failures are logged and come back as `None`.
pub fn parse_from_file(file: &RawFile) -> Option<Deck> {
    let parsed = std::str::from_utf8(&file.contents)
        .map_err(|_| ParseError::Encoding)
        .and_then(|text| parse_deck(&file.name, text));
    match parsed {
        Ok(deck) => Some(deck),
        Err(error) => {
            warn!(file = %file.name, %error, "rejected deck file");
            None
        }
    }
}

pub fn serialize_deck(deck: &Deck) -> Result<String, SerializeError> {
    let mut out = String::new();
    for (index, slide) in deck.slides.iter().enumerate() {
        out.push_str(&serialize_cell(index, &slide.question)?);
        out.push(',');
        out.push_str(&serialize_cell(index, &slide.answer)?);
        out.push('\n');
    }
    Ok(out)
}

fn serialize_cell(index: usize, value: &str) -> Result<String, SerializeError> {
    if value.is_empty() {
        return Err(SerializeError::EmptyCell { index });
    }
    if value.contains(['\n', '\r']) {
        return Err(SerializeError::LineBreak { index });
    }
    let needs_quotes = value.contains(',')
        || value.starts_with('"')
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if !needs_quotes {
        return Ok(value.to_string());
    }
    if value.contains('"') {
        return Err(SerializeError::UnquotableCell { index });
    }
    Ok(format!("\"{value}\""))
}

#[cfg(test)]
#[path = "tests/deck_csv_tests.rs"]
mod tests;
