use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::{
    domain::Deck,
    protocol::{Channel, ChannelValue, SlideView},
};
use tracing::debug;

use crate::{bus::EventBus, lock};

/// Read-only view of the sequencer, mostly for tests and the terminal UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerSnapshot {
    pub order: Vec<usize>,
    pub index: Option<usize>,
    pub endless: bool,
    pub shuffled: bool,
}

#[derive(Default)]
struct SequencerState {
    deck: Option<Arc<Deck>>,
    /// Active order as canonical slide ids.
    order: Vec<usize>,
    index: Option<usize>,
    endless: bool,
    shuffled: bool,
}

impl SequencerState {
    fn view(&self) -> Option<SlideView> {
        let deck = self.deck.as_ref()?;
        let position = self.index?;
        let slide_id = *self.order.get(position)?;
        Some(SlideView {
            slide_id,
            position,
            total: self.order.len(),
            slide: deck.slides.get(slide_id)?.clone(),
        })
    }
}

/// Owns the active slide order and the current position within it.
pub struct SlideSequencer {
    bus: Arc<EventBus>,
    state: Mutex<SequencerState>,
    rng: Mutex<StdRng>,
}

impl SlideSequencer {
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Self::with_rng(bus, StdRng::from_entropy())
    }

    pub fn with_rng(bus: Arc<EventBus>, rng: StdRng) -> Arc<Self> {
        Arc::new(Self {
            bus,
            state: Mutex::new(SequencerState::default()),
            rng: Mutex::new(rng),
        })
    }

    pub fn attach(self: &Arc<Self>) {
        self.bus
            .subscribe_weak(Channel::DeckChanged, self, |this, value| {
                if let ChannelValue::Deck(deck) = value {
                    this.load_deck(deck.clone());
                }
            });
        self.bus.subscribe_weak(Channel::Navigate, self, |this, value| {
            if let ChannelValue::Delta(delta) = value {
                this.navigate(*delta);
            }
        });
        self.bus
            .subscribe_weak(Channel::ShuffleToggled, self, |this, value| {
                if let ChannelValue::Flag(on) = value {
                    this.set_shuffle(*on);
                }
            });
        self.bus
            .subscribe_weak(Channel::EndlessToggled, self, |this, value| {
                if let ChannelValue::Flag(on) = value {
                    this.set_endless(*on);
                }
            });
    }

    /// Resets to the deck's canonical order and shows its first slide.
    pub fn load_deck(&self, deck: Option<Arc<Deck>>) {
        let view = {
            let mut state = lock(&self.state);
            let len = deck.as_ref().map_or(0, |deck| deck.len());
            state.order = (0..len).collect();
            state.index = (len > 0).then_some(0);
            state.shuffled = false;
            state.deck = deck;
            state.view()
        };
        self.bus.publish(Channel::SlideShown, ChannelValue::Slide(view));
    }

    /// Moves by `delta`, wrapping in endless mode and clamping otherwise.
    /// Publishes only when the position actually changes.
    pub fn navigate(&self, delta: i64) {
        let view = {
            let mut state = lock(&self.state);
            let len = state.order.len();
            let Some(index) = state.index else {
                return;
            };
            if delta == 0 || len == 0 {
                return;
            }
            let next = step_index(index, delta, len, state.endless);
            if next == index {
                return;
            }
            state.index = Some(next);
            state.view()
        };
        self.bus.publish(Channel::SlideShown, ChannelValue::Slide(view));
    }

    /// Switches between a fresh random permutation and canonical order. The
    /// positional index is kept, so the slide shown usually changes.
    pub fn set_shuffle(&self, on: bool) {
        let view = {
            let mut state = lock(&self.state);
            let Some(deck) = state.deck.clone() else {
                return;
            };
            state.order = if on {
                shuffled_order(deck.len(), &mut *lock(&self.rng))
            } else {
                (0..deck.len()).collect()
            };
            state.shuffled = on;
            debug!(deck = %deck.name, shuffled = on, "slide order changed");
            state.view()
        };
        self.bus.publish(Channel::SlideShown, ChannelValue::Slide(view));
    }

    pub fn set_endless(&self, on: bool) {
        lock(&self.state).endless = on;
    }

    pub fn current(&self) -> Option<SlideView> {
        lock(&self.state).view()
    }

    pub fn snapshot(&self) -> SequencerSnapshot {
        let state = lock(&self.state);
        SequencerSnapshot {
            order: state.order.clone(),
            index: state.index,
            endless: state.endless,
            shuffled: state.shuffled,
        }
    }
}

/// Target index after moving `delta` steps through `len` slides.
///
/// `len` must be non-zero.
pub fn step_index(index: usize, delta: i64, len: usize, endless: bool) -> usize {
    let len = len as i64;
    let target = (index as i64).saturating_add(delta);
    if endless {
        target.rem_euclid(len) as usize
    } else {
        target.clamp(0, len - 1) as usize
    }
}

/// Uniform Fisher-Yates permutation of `0..len`.
pub fn shuffled_order<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for end in (1..len).rev() {
        let pick = rng.gen_range(0..=end);
        order.swap(end, pick);
    }
    order
}

#[cfg(test)]
#[path = "tests/sequencer_tests.rs"]
mod tests;
