use std::sync::{Arc, Mutex};

use render::{RenderOptions, Renderer};
use shared::protocol::{Channel, ChannelValue, RevealedAnswer, SlideView};
use tracing::debug;

use crate::{bus::EventBus, lock};

/// Handle for a deferred reveal. Only the most recently issued ticket can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevealTicket(u64);

struct PendingReveal {
    ticket: RevealTicket,
    view: SlideView,
}

#[derive(Default)]
struct RevealState {
    flipped: bool,
    transition_active: bool,
    pending: Option<PendingReveal>,
    issued: u64,
    revealed: Option<RevealedAnswer>,
}

impl RevealState {
    fn issue(&mut self) -> RevealTicket {
        self.issued += 1;
        RevealTicket(self.issued)
    }

    /// Hides the answer for a new slide; unflipping animates when enabled.
    fn unflip(&mut self, animations: bool) {
        if self.flipped && animations {
            self.transition_active = true;
        }
        self.flipped = false;
        if let Some(stale) = self.pending.take() {
            debug!(ticket = stale.ticket.0, "superseded pending reveal");
        }
    }
}

/// Flip state of the card and the answer content placed behind it.
pub struct AnswerReveal {
    bus: Arc<EventBus>,
    renderer: Arc<dyn Renderer>,
    options: RenderOptions,
    animations: bool,
    state: Mutex<RevealState>,
}

impl AnswerReveal {
    pub fn new(
        bus: Arc<EventBus>,
        renderer: Arc<dyn Renderer>,
        untrusted: bool,
        animations: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            renderer,
            options: RenderOptions::block().untrusted(untrusted),
            animations,
            state: Mutex::new(RevealState::default()),
        })
    }

    pub fn attach(self: &Arc<Self>) {
        self.bus
            .subscribe_weak(Channel::DeckChanged, self, |this, value| {
                if let ChannelValue::Deck(_) = value {
                    lock(&this.state).unflip(this.animations);
                }
            });
        self.bus.subscribe_weak(Channel::SlideShown, self, |this, value| {
            if let ChannelValue::Slide(view) = value {
                this.show(view.clone());
            }
        });
        self.bus.subscribe_weak(Channel::FlipToggled, self, |this, value| {
            if let ChannelValue::Flag(flipped) = value {
                this.flip(*flipped);
            }
        });
        self.bus
            .subscribe_weak(Channel::TransitionEnded, self, |this, value| {
                if let ChannelValue::Signal = value {
                    this.transition_finished();
                }
            });
    }

    pub fn flip(&self, flipped: bool) {
        let mut state = lock(&self.state);
        if state.flipped == flipped {
            return;
        }
        state.flipped = flipped;
        if self.animations {
            state.transition_active = true;
        }
    }

    /// Places the answer for `view`, deferring it while a transition runs.
    /// A deferred reveal clears the current answer until it is released.
    pub fn show(&self, view: Option<SlideView>) {
        let answer = {
            let mut state = lock(&self.state);
            state.unflip(self.animations);
            match view {
                None => {
                    state.revealed = None;
                    None
                }
                Some(view) if state.transition_active => {
                    let ticket = state.issue();
                    debug!(ticket = ticket.0, slide_id = view.slide_id, "deferring reveal");
                    state.pending = Some(PendingReveal { ticket, view });
                    // The previous slide's answer must not outlive its slide.
                    state.revealed = None;
                    None
                }
                Some(view) => {
                    let answer = self.render(&view);
                    state.revealed = Some(answer.clone());
                    Some(answer)
                }
            }
        };
        self.bus
            .publish(Channel::AnswerRevealed, ChannelValue::Answer(answer));
    }

    /// Completion signal of the running transition; releases the pending reveal.
    pub fn transition_finished(&self) {
        let answer = {
            let mut state = lock(&self.state);
            state.transition_active = false;
            let Some(pending) = state.pending.take() else {
                return;
            };
            debug!(ticket = pending.ticket.0, "releasing deferred reveal");
            let answer = self.render(&pending.view);
            state.revealed = Some(answer.clone());
            answer
        };
        self.bus
            .publish(Channel::AnswerRevealed, ChannelValue::Answer(Some(answer)));
    }

    pub fn is_flipped(&self) -> bool {
        lock(&self.state).flipped
    }

    pub fn transition_in_progress(&self) -> bool {
        lock(&self.state).transition_active
    }

    pub fn pending_ticket(&self) -> Option<RevealTicket> {
        lock(&self.state).pending.as_ref().map(|pending| pending.ticket)
    }

    pub fn revealed(&self) -> Option<RevealedAnswer> {
        lock(&self.state).revealed.clone()
    }

    fn render(&self, view: &SlideView) -> RevealedAnswer {
        RevealedAnswer {
            slide_id: view.slide_id,
            html: self.renderer.render(&view.slide.answer, &self.options),
        }
    }
}

#[cfg(test)]
#[path = "tests/reveal_tests.rs"]
mod tests;
