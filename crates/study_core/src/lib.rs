use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::{rngs::StdRng, SeedableRng};
use render::Renderer;
use storage::DeckStore;
use tracing::info;

pub mod binder;
pub mod bus;
pub mod error;
pub mod progress;
pub mod reveal;
pub mod selection;
pub mod sequencer;

pub use binder::{ControlBinder, ControlId, ControlLayout, ControlStates, Key, KeyPress};
pub use bus::EventBus;
pub use error::{SelectionError, SetupError};
pub use progress::ProgressTracker;
pub use reveal::{AnswerReveal, RevealTicket};
pub use selection::{
    DeckRequest, DeckRequests, DeckSelection, FixedPrompt, ImportReport, MemorySelectionMarker,
    Prompt, SelectionMarker, UrlSelectionMarker, UserPrompt,
};
pub use sequencer::SlideSequencer;

/// Handlers never leave state half-updated, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Card flips animate; answers wait for the transition to finish.
    pub animations: bool,
    /// Render answers as untrusted markdown.
    pub untrusted_content: bool,
    /// Fixed seed for shuffles, for reproducible sessions.
    pub shuffle_seed: Option<u64>,
}

/// External collaborators a session is built from.
pub struct SessionDeps {
    pub store: Arc<dyn DeckStore>,
    pub prompt: Arc<dyn UserPrompt>,
    pub marker: Arc<dyn SelectionMarker>,
    pub renderer: Arc<dyn Renderer>,
}

/// All study components wired to one bus.
pub struct StudySession {
    pub bus: Arc<EventBus>,
    pub sequencer: Arc<SlideSequencer>,
    pub progress: Arc<ProgressTracker>,
    pub reveal: Arc<AnswerReveal>,
    pub controls: Arc<ControlBinder>,
    pub selection: Arc<DeckSelection>,
    requests: DeckRequests,
}

impl StudySession {
    pub fn new(
        deps: SessionDeps,
        config: SessionConfig,
        layout: &ControlLayout,
    ) -> Result<Self, SetupError> {
        let bus = EventBus::new();

        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let sequencer = SlideSequencer::with_rng(bus.clone(), rng);
        sequencer.attach();

        let progress = ProgressTracker::new(bus.clone());
        progress.attach();

        let reveal = AnswerReveal::new(
            bus.clone(),
            deps.renderer,
            config.untrusted_content,
            config.animations,
        );
        reveal.attach();

        let controls = ControlBinder::bind(bus.clone(), layout)?;

        let selection = DeckSelection::new(bus.clone(), deps.store, deps.prompt, deps.marker);
        let requests = selection.attach();

        info!(
            animations = config.animations,
            untrusted = config.untrusted_content,
            "study session ready"
        );
        Ok(Self {
            bus,
            sequencer,
            progress,
            reveal,
            controls,
            selection,
            requests,
        })
    }

    /// Handles every request the bus has queued so far. Returns how many ran.
    pub async fn process_requests(&mut self) -> Result<usize, SelectionError> {
        let mut handled = 0;
        while let Ok(request) = self.requests.try_recv() {
            self.selection.handle(request).await?;
            handled += 1;
        }
        Ok(handled)
    }
}
