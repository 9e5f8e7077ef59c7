use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use shared::protocol::{Channel, ChannelValue, ProgressSnapshot, SlideView};
use tracing::info;

use crate::{bus::EventBus, lock};

#[derive(Default)]
struct ProgressState {
    /// Canonical slide ids marked correct in the current deck.
    correct: HashSet<usize>,
    total: usize,
    current: Option<(usize, usize)>,
    complete: bool,
}

impl ProgressState {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            position: self.current.map(|(_, position)| position),
            total: self.total,
            correct: self.correct.len(),
            current_correct: self
                .current
                .is_some_and(|(slide_id, _)| self.correct.contains(&slide_id)),
            complete: self.complete,
        }
    }
}

/// Tracks which slides of the current deck were answered correctly.
pub struct ProgressTracker {
    bus: Arc<EventBus>,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            state: Mutex::new(ProgressState::default()),
        })
    }

    pub fn attach(self: &Arc<Self>) {
        self.bus
            .subscribe_weak(Channel::DeckChanged, self, |this, value| {
                if let ChannelValue::Deck(deck) = value {
                    this.reset(deck.as_ref().map_or(0, |deck| deck.len()));
                }
            });
        self.bus.subscribe_weak(Channel::SlideShown, self, |this, value| {
            if let ChannelValue::Slide(view) = value {
                this.show(view.as_ref());
            }
        });
        self.bus
            .subscribe_weak(Channel::CorrectnessMarked, self, |this, value| {
                if let ChannelValue::Flag(correct) = value {
                    this.mark(*correct);
                }
            });
    }

    /// Forgets all marks; the deck now has `total` slides.
    pub fn reset(&self, total: usize) {
        let (snapshot, was_complete) = {
            let mut state = lock(&self.state);
            let was_complete = state.complete;
            *state = ProgressState {
                total,
                ..ProgressState::default()
            };
            (state.snapshot(), was_complete)
        };
        self.bus
            .publish(Channel::ProgressChanged, ChannelValue::Progress(snapshot));
        if was_complete {
            self.bus
                .publish(Channel::DeckCompleted, ChannelValue::Flag(false));
        }
    }

    pub fn show(&self, view: Option<&SlideView>) {
        let snapshot = {
            let mut state = lock(&self.state);
            state.current = view.map(|view| (view.slide_id, view.position));
            if let Some(view) = view {
                state.total = view.total;
            }
            state.snapshot()
        };
        self.bus
            .publish(Channel::ProgressChanged, ChannelValue::Progress(snapshot));
    }

    /// Marks the current slide. Completion is announced on every mark that
    /// leaves the deck complete, and retracted once when it stops being so.
    pub fn mark(&self, correct: bool) {
        let (snapshot, was_complete) = {
            let mut state = lock(&self.state);
            let Some((slide_id, _)) = state.current else {
                return;
            };
            state.correct.remove(&slide_id);
            if correct {
                state.correct.insert(slide_id);
            }
            let was_complete = state.complete;
            state.complete = state.total > 0 && state.correct.len() == state.total;
            (state.snapshot(), was_complete)
        };
        self.bus
            .publish(Channel::ProgressChanged, ChannelValue::Progress(snapshot));
        if snapshot.complete {
            if !was_complete {
                info!(total = snapshot.total, "deck completed");
            }
            self.bus
                .publish(Channel::DeckCompleted, ChannelValue::Flag(true));
        } else if was_complete {
            self.bus
                .publish(Channel::DeckCompleted, ChannelValue::Flag(false));
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        lock(&self.state).snapshot()
    }
}

#[cfg(test)]
#[path = "tests/progress_tests.rs"]
mod tests;
