use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex},
};

use shared::{
    domain::RawFile,
    protocol::{Channel, ChannelValue},
};
use tracing::debug;

use crate::{bus::EventBus, error::SetupError, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Prev,
    Next,
    Flip,
    Correct,
    Shuffle,
    Endless,
    Import,
    Remove,
}

impl ControlId {
    pub const ALL: [ControlId; 8] = [
        ControlId::Prev,
        ControlId::Next,
        ControlId::Flip,
        ControlId::Correct,
        ControlId::Shuffle,
        ControlId::Endless,
        ControlId::Import,
        ControlId::Remove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlId::Prev => "prev",
            ControlId::Next => "next",
            ControlId::Flip => "flip",
            ControlId::Correct => "correct",
            ControlId::Shuffle => "shuffle",
            ControlId::Endless => "endless",
            ControlId::Import => "import",
            ControlId::Remove => "remove",
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls a front end actually provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLayout {
    available: HashSet<ControlId>,
}

impl ControlLayout {
    pub fn full() -> Self {
        Self::from_ids(ControlId::ALL)
    }

    pub fn from_ids(ids: impl IntoIterator<Item = ControlId>) -> Self {
        Self {
            available: ids.into_iter().collect(),
        }
    }

    pub fn without(mut self, id: ControlId) -> Self {
        self.available.remove(&id);
        self
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.available.contains(&id)
    }

    /// Every control is required.
    pub fn verify(&self) -> Result<(), SetupError> {
        match ControlId::ALL.into_iter().find(|id| !self.contains(*id)) {
            Some(missing) => Err(SetupError::ElementMissing(missing)),
            None => Ok(()),
        }
    }
}

impl Default for ControlLayout {
    fn default() -> Self {
        Self::full()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Space,
    Enter,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }

    /// The control this key combination triggers, if any.
    pub fn control(self) -> Option<ControlId> {
        match (self.key, self.shift) {
            (Key::ArrowLeft, _) => Some(ControlId::Prev),
            (Key::ArrowRight, _) => Some(ControlId::Next),
            (Key::Space, true) => Some(ControlId::Flip),
            (Key::Enter, true) => Some(ControlId::Correct),
            (Key::Char(c), true) if c.eq_ignore_ascii_case(&'s') => Some(ControlId::Shuffle),
            (Key::Char(c), true) if c.eq_ignore_ascii_case(&'l') => Some(ControlId::Endless),
            _ => None,
        }
    }
}

/// Enabled/disabled flags derived from the latest bus state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlStates {
    pub prev: bool,
    pub next: bool,
    pub flip: bool,
    pub correct: bool,
    pub shuffle: bool,
    pub endless: bool,
    pub import: bool,
    pub remove: bool,
}

impl ControlStates {
    pub fn is_enabled(&self, id: ControlId) -> bool {
        match id {
            ControlId::Prev => self.prev,
            ControlId::Next => self.next,
            ControlId::Flip => self.flip,
            ControlId::Correct => self.correct,
            ControlId::Shuffle => self.shuffle,
            ControlId::Endless => self.endless,
            ControlId::Import => self.import,
            ControlId::Remove => self.remove,
        }
    }
}

#[derive(Debug, Default)]
struct BinderState {
    selected: Option<String>,
    position: Option<usize>,
    total: usize,
    endless: bool,
    shuffled: bool,
    flipped: bool,
    current_correct: bool,
}

impl BinderState {
    fn states(&self) -> ControlStates {
        let has_slide = self.position.is_some();
        let at_start = self.position.map_or(true, |position| position == 0);
        let at_end = self
            .position
            .map_or(true, |position| position + 1 >= self.total);
        ControlStates {
            prev: has_slide && (self.endless || !at_start),
            next: has_slide && (self.endless || !at_end),
            flip: has_slide,
            correct: has_slide,
            shuffle: self.total >= 2,
            endless: self.total >= 2,
            import: true,
            remove: self.selected.is_some(),
        }
    }
}

/// Translates user input into bus events and mirrors the state needed to
/// enable or disable each control.
pub struct ControlBinder {
    bus: Arc<EventBus>,
    state: Mutex<BinderState>,
}

impl ControlBinder {
    pub fn bind(bus: Arc<EventBus>, layout: &ControlLayout) -> Result<Arc<Self>, SetupError> {
        layout.verify()?;
        let binder = Arc::new(Self {
            bus,
            state: Mutex::new(BinderState::default()),
        });
        binder.attach();
        Ok(binder)
    }

    fn attach(self: &Arc<Self>) {
        let bus = &self.bus;
        bus.subscribe_weak(Channel::DeckChanged, self, |this, value| {
            if let ChannelValue::Deck(deck) = value {
                let mut state = lock(&this.state);
                state.selected = deck.as_ref().map(|deck| deck.name.clone());
                state.shuffled = false;
            }
        });
        bus.subscribe_weak(Channel::SlideShown, self, |this, value| {
            if let ChannelValue::Slide(view) = value {
                let mut state = lock(&this.state);
                state.position = view.as_ref().map(|view| view.position);
                state.total = view.as_ref().map_or(0, |view| view.total);
                state.flipped = false;
            }
        });
        bus.subscribe_weak(Channel::ProgressChanged, self, |this, value| {
            if let ChannelValue::Progress(progress) = value {
                lock(&this.state).current_correct = progress.current_correct;
            }
        });
        bus.subscribe_weak(Channel::EndlessToggled, self, |this, value| {
            if let ChannelValue::Flag(on) = value {
                lock(&this.state).endless = *on;
            }
        });
        bus.subscribe_weak(Channel::ShuffleToggled, self, |this, value| {
            if let ChannelValue::Flag(on) = value {
                lock(&this.state).shuffled = *on;
            }
        });
        bus.subscribe_weak(Channel::FlipToggled, self, |this, value| {
            if let ChannelValue::Flag(flipped) = value {
                lock(&this.state).flipped = *flipped;
            }
        });
    }

    pub fn states(&self) -> ControlStates {
        lock(&self.state).states()
    }

    /// Activates `id` as a click would. Returns `false` when the control is
    /// disabled or needs input (import takes files, see [`Self::import`]).
    pub fn activate(&self, id: ControlId) -> bool {
        let (channel, value) = {
            let state = lock(&self.state);
            if !state.states().is_enabled(id) {
                debug!(control = %id, "ignoring disabled control");
                return false;
            }
            match id {
                ControlId::Prev => (Channel::Navigate, ChannelValue::Delta(-1)),
                ControlId::Next => (Channel::Navigate, ChannelValue::Delta(1)),
                ControlId::Flip => (Channel::FlipToggled, ChannelValue::Flag(!state.flipped)),
                ControlId::Correct => (
                    Channel::CorrectnessMarked,
                    ChannelValue::Flag(!state.current_correct),
                ),
                ControlId::Shuffle => {
                    (Channel::ShuffleToggled, ChannelValue::Flag(!state.shuffled))
                }
                ControlId::Endless => {
                    (Channel::EndlessToggled, ChannelValue::Flag(!state.endless))
                }
                ControlId::Remove => match &state.selected {
                    Some(name) => (Channel::RemoveRequested, ChannelValue::DeckName(name.clone())),
                    None => return false,
                },
                ControlId::Import => return false,
            }
        };
        self.bus.publish(channel, value);
        true
    }

    /// Handles a key press; returns the control it triggered.
    pub fn key(&self, press: KeyPress) -> Option<ControlId> {
        let id = press.control()?;
        self.activate(id).then_some(id)
    }

    pub fn import(&self, files: Vec<RawFile>) {
        if files.is_empty() {
            return;
        }
        self.bus
            .publish(Channel::ImportRequested, ChannelValue::Files(files));
    }
}

#[cfg(test)]
#[path = "tests/binder_tests.rs"]
mod tests;
