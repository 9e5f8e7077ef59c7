use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::domain::{Deck, RawFile, Slide};

/// Named bus channels. Each channel carries exactly one shape of value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    DeckChanged,
    Navigate,
    ShuffleToggled,
    EndlessToggled,
    FlipToggled,
    CorrectnessMarked,
    DeckCompleted,
    ImportRequested,
    RemoveRequested,
    SlideShown,
    ProgressChanged,
    AnswerRevealed,
    TransitionEnded,
}

impl Channel {
    pub const ALL: [Channel; 13] = [
        Channel::DeckChanged,
        Channel::Navigate,
        Channel::ShuffleToggled,
        Channel::EndlessToggled,
        Channel::FlipToggled,
        Channel::CorrectnessMarked,
        Channel::DeckCompleted,
        Channel::ImportRequested,
        Channel::RemoveRequested,
        Channel::SlideShown,
        Channel::ProgressChanged,
        Channel::AnswerRevealed,
        Channel::TransitionEnded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::DeckChanged => "deck-changed",
            Channel::Navigate => "navigate",
            Channel::ShuffleToggled => "shuffle-toggled",
            Channel::EndlessToggled => "endless-toggled",
            Channel::FlipToggled => "flip-toggled",
            Channel::CorrectnessMarked => "correctness-marked",
            Channel::DeckCompleted => "deck-completed",
            Channel::ImportRequested => "import-requested",
            Channel::RemoveRequested => "remove-requested",
            Channel::SlideShown => "slide-shown",
            Channel::ProgressChanged => "progress-changed",
            Channel::AnswerRevealed => "answer-revealed",
            Channel::TransitionEnded => "transition-ended",
        }
    }

    /// Runtime guard: does `value` have the shape this channel carries?
    pub fn accepts(self, value: &ChannelValue) -> bool {
        match (self, value) {
            (Channel::DeckChanged, ChannelValue::Deck(deck)) => {
                deck.as_ref().map_or(true, |deck| !deck.name.is_empty())
            }
            (Channel::Navigate, ChannelValue::Delta(_)) => true,
            (
                Channel::ShuffleToggled
                | Channel::EndlessToggled
                | Channel::FlipToggled
                | Channel::CorrectnessMarked
                | Channel::DeckCompleted,
                ChannelValue::Flag(_),
            ) => true,
            (Channel::ImportRequested, ChannelValue::Files(_)) => true,
            (Channel::RemoveRequested, ChannelValue::DeckName(_)) => true,
            (Channel::SlideShown, ChannelValue::Slide(_)) => true,
            (Channel::ProgressChanged, ChannelValue::Progress(_)) => true,
            (Channel::AnswerRevealed, ChannelValue::Answer(_)) => true,
            (Channel::TransitionEnded, ChannelValue::Signal) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    Deck(Option<Arc<Deck>>),
    Delta(i64),
    Flag(bool),
    Files(Vec<RawFile>),
    DeckName(String),
    Slide(Option<SlideView>),
    Progress(ProgressSnapshot),
    Answer(Option<RevealedAnswer>),
    Signal,
}

/// The slide currently in front of the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideView {
    /// Index of the slide in the deck's canonical order; stable under shuffles.
    pub slide_id: usize,
    /// Zero-based position in the active (possibly shuffled) order.
    pub position: usize,
    pub total: usize,
    pub slide: Slide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Zero-based position of the current slide, if any.
    pub position: Option<usize>,
    pub total: usize,
    pub correct: usize,
    pub current_correct: bool,
    pub complete: bool,
}

impl ProgressSnapshot {
    /// Human-facing `current/total` label, `-/-` when nothing is shown.
    pub fn label(&self) -> String {
        match self.position {
            Some(position) if self.total > 0 => format!("{}/{}", position + 1, self.total),
            _ => "-/-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAnswer {
    pub slide_id: usize,
    pub html: String,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
