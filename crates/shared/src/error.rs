use thiserror::Error;

/// Why a file could not become a deck.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("deck file '{0}' must have a .csv extension")]
    BadExtension(String),
    #[error("deck name is empty after normalization")]
    EmptyName,
    #[error("deck file is not valid UTF-8")]
    Encoding,
    #[error("line {line} is not a two-column row: {content:?}")]
    InvalidRow { line: usize, content: String },
    #[error("line {line} has an unbalanced quote")]
    UnbalancedQuote { line: usize },
    #[error("line {line} has an empty cell")]
    EmptyCell { line: usize },
}

/// Why a deck could not be written back as two-column CSV.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("slide {index} has an empty cell")]
    EmptyCell { index: usize },
    #[error("slide {index} contains a line break")]
    LineBreak { index: usize },
    #[error("slide {index} needs quoting but contains a double quote")]
    UnquotableCell { index: usize },
}
