pub mod deck_csv;
pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::{normalize_deck_name, Deck, RawFile, Slide};
pub use error::{ParseError, SerializeError};
