use std::sync::{Arc, Mutex};

use shared::{
    deck_csv::parse_from_file,
    domain::{Deck, RawFile},
    protocol::{Channel, ChannelValue},
};
use storage::{DeckStore, PutMode, PutOutcome};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

use crate::{bus::EventBus, error::SelectionError, lock};

const DECK_QUERY_KEY: &str = "deck";

/// Questions the user must answer before a destructive change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Overwrite { deck: String },
    Remove { deck: String },
}

impl Prompt {
    pub fn message(&self) -> String {
        match self {
            Prompt::Overwrite { deck } => {
                format!("A deck named \"{deck}\" already exists. Overwrite it?")
            }
            Prompt::Remove { deck } => format!("Remove deck \"{deck}\"?"),
        }
    }
}

pub trait UserPrompt: Send + Sync {
    fn confirm(&self, prompt: &Prompt) -> bool;
    fn alert(&self, message: &str);
}

/// Answers every prompt the same way and drops alerts.
pub struct FixedPrompt(pub bool);

impl UserPrompt for FixedPrompt {
    fn confirm(&self, _prompt: &Prompt) -> bool {
        self.0
    }

    fn alert(&self, _message: &str) {}
}

/// Remembers which deck is selected so a later session can restore it.
pub trait SelectionMarker: Send + Sync {
    fn current(&self) -> Option<String>;
    fn set(&self, deck: Option<&str>);
}

/// Keeps the selection in a `?deck=` query parameter.
pub struct UrlSelectionMarker {
    url: Mutex<Url>,
}

impl UrlSelectionMarker {
    pub fn new(url: Url) -> Self {
        Self {
            url: Mutex::new(url),
        }
    }

    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        Url::parse(location).map(Self::new)
    }

    pub fn url(&self) -> Url {
        lock(&self.url).clone()
    }
}

impl SelectionMarker for UrlSelectionMarker {
    fn current(&self) -> Option<String> {
        lock(&self.url)
            .query_pairs()
            .find(|(key, _)| key == DECK_QUERY_KEY)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    fn set(&self, deck: Option<&str>) {
        let mut url = lock(&self.url);
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != DECK_QUERY_KEY)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.set_query(None);
        if retained.is_empty() && deck.is_none() {
            return;
        }
        let mut query = url.query_pairs_mut();
        query.extend_pairs(retained.iter());
        if let Some(deck) = deck {
            query.append_pair(DECK_QUERY_KEY, deck);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySelectionMarker {
    current: Mutex<Option<String>>,
}

impl MemorySelectionMarker {
    pub fn new(initial: Option<&str>) -> Self {
        Self {
            current: Mutex::new(initial.map(str::to_string)),
        }
    }
}

impl SelectionMarker for MemorySelectionMarker {
    fn current(&self) -> Option<String> {
        lock(&self.current).clone()
    }

    fn set(&self, deck: Option<&str>) {
        *lock(&self.current) = deck.map(str::to_string);
    }
}

/// Bus requests that need storage, queued for async processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckRequest {
    Select(String),
    Import(Vec<RawFile>),
    Remove(String),
}

pub type DeckRequests = mpsc::UnboundedReceiver<DeckRequest>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// File names that did not parse.
    pub rejected: Vec<String>,
    /// Decks whose overwrite the user declined.
    pub skipped: Vec<String>,
    pub selected: Option<String>,
}

#[derive(Default)]
struct SelectionState {
    names: Vec<String>,
    selected: Option<String>,
}

impl SelectionState {
    fn add_name(&mut self, name: &str) {
        if let Err(at) = self.names.binary_search_by(|known| known.as_str().cmp(name)) {
            self.names.insert(at, name.to_string());
        }
    }
}

/// Picks, imports and removes decks, and announces the selected one.
pub struct DeckSelection {
    bus: Arc<EventBus>,
    store: Arc<dyn DeckStore>,
    prompt: Arc<dyn UserPrompt>,
    marker: Arc<dyn SelectionMarker>,
    state: Mutex<SelectionState>,
}

impl DeckSelection {
    pub fn new(
        bus: Arc<EventBus>,
        store: Arc<dyn DeckStore>,
        prompt: Arc<dyn UserPrompt>,
        marker: Arc<dyn SelectionMarker>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            store,
            prompt,
            marker,
            state: Mutex::new(SelectionState::default()),
        })
    }

    /// Forwards import and remove requests from the bus to the returned queue.
    pub fn attach(&self) -> DeckRequests {
        let (sender, receiver) = mpsc::unbounded_channel();
        let imports = sender.clone();
        self.bus.subscribe(Channel::ImportRequested, move |value| {
            if let ChannelValue::Files(files) = value {
                let _ = imports.send(DeckRequest::Import(files.clone()));
            }
        });
        self.bus.subscribe(Channel::RemoveRequested, move |value| {
            if let ChannelValue::DeckName(name) = value {
                let _ = sender.send(DeckRequest::Remove(name.clone()));
            }
        });
        receiver
    }

    pub fn deck_names(&self) -> Vec<String> {
        lock(&self.state).names.clone()
    }

    pub fn selected(&self) -> Option<String> {
        lock(&self.state).selected.clone()
    }

    /// Loads the known deck names and reselects the remembered deck, if it
    /// still exists.
    pub async fn restore(&self) -> Result<Option<Arc<Deck>>, SelectionError> {
        let names = self.store.list().await.inspect_err(|err| {
            error!(error = %err, "failed to list decks");
        })?;
        lock(&self.state).names = names;

        let Some(name) = self.marker.current() else {
            return Ok(None);
        };
        match self.load(&name).await? {
            Some(deck) => {
                info!(deck = %deck.name, "restored deck selection");
                self.announce(Some(deck.clone()));
                Ok(Some(deck))
            }
            None => {
                warn!(deck = %name, "remembered deck no longer exists");
                self.marker.set(None);
                Ok(None)
            }
        }
    }

    /// Selects `name`, or clears the selection when it is empty or unknown.
    pub async fn select_deck(&self, name: &str) -> Result<Option<Arc<Deck>>, SelectionError> {
        let deck = if name.is_empty() {
            None
        } else {
            self.load(name).await?
        };
        if deck.is_none() && !name.is_empty() {
            warn!(deck = %name, "selected deck not found");
        }
        self.announce(deck.clone());
        Ok(deck)
    }

    /// Parses and stores each file in order. The first deck stored becomes
    /// the selection; files that fail to parse are reported and skipped.
    pub async fn import_files(&self, files: Vec<RawFile>) -> Result<ImportReport, SelectionError> {
        let mut report = ImportReport::default();
        for file in files {
            let Some(deck) = parse_from_file(&file) else {
                self.prompt
                    .alert(&format!("\"{}\" is not a valid deck file.", file.name));
                report.rejected.push(file.name);
                continue;
            };

            if !self.store_deck(&deck).await? {
                info!(deck = %deck.name, "overwrite declined");
                report.skipped.push(deck.name);
                continue;
            }

            info!(deck = %deck.name, slides = deck.len(), file = %file.name, "imported deck");
            lock(&self.state).add_name(&deck.name);
            report.imported.push(deck.name.clone());
            if report.selected.is_none() {
                report.selected = Some(deck.name.clone());
                self.announce(Some(Arc::new(deck)));
            }
        }
        Ok(report)
    }

    /// Deletes `name` after confirmation. Returns whether the user went ahead.
    pub async fn remove_deck(&self, name: &str) -> Result<bool, SelectionError> {
        if !self.prompt.confirm(&Prompt::Remove {
            deck: name.to_string(),
        }) {
            return Ok(false);
        }
        let removed = self.store.delete(name).await.inspect_err(|err| {
            error!(deck = %name, error = %err, "failed to delete deck");
        })?;
        if removed {
            info!(deck = %name, "removed deck");
        }
        lock(&self.state).names.retain(|known| known != name);
        self.announce(None);
        Ok(true)
    }

    pub async fn handle(&self, request: DeckRequest) -> Result<(), SelectionError> {
        match request {
            DeckRequest::Select(name) => self.select_deck(&name).await.map(|_| ()),
            DeckRequest::Import(files) => self.import_files(files).await.map(|_| ()),
            DeckRequest::Remove(name) => self.remove_deck(&name).await.map(|_| ()),
        }
    }

    /// Processes queued requests until every sender is gone.
    pub async fn run(self: Arc<Self>, mut requests: DeckRequests) {
        while let Some(request) = requests.recv().await {
            if let Err(err) = self.handle(request).await {
                error!(error = %err, "deck request failed");
            }
        }
    }

    async fn load(&self, name: &str) -> Result<Option<Arc<Deck>>, SelectionError> {
        let deck = self.store.get(name).await.inspect_err(|err| {
            error!(deck = %name, error = %err, "failed to load deck");
        })?;
        Ok(deck.map(Arc::new))
    }

    /// Inserts `deck`, asking before replacing an existing one. Returns
    /// whether the deck was written.
    async fn store_deck(&self, deck: &Deck) -> Result<bool, SelectionError> {
        let outcome = self
            .store
            .put(deck, PutMode::InsertOnly)
            .await
            .inspect_err(|err| error!(deck = %deck.name, error = %err, "failed to store deck"))?;
        if outcome != PutOutcome::Conflict {
            return Ok(true);
        }
        let prompt = Prompt::Overwrite {
            deck: deck.name.clone(),
        };
        if !self.prompt.confirm(&prompt) {
            return Ok(false);
        }
        self.store
            .put(deck, PutMode::Overwrite)
            .await
            .inspect_err(|err| error!(deck = %deck.name, error = %err, "failed to overwrite deck"))?;
        Ok(true)
    }

    fn announce(&self, deck: Option<Arc<Deck>>) {
        let name = deck.as_ref().map(|deck| deck.name.clone());
        self.marker.set(name.as_deref());
        lock(&self.state).selected = name;
        self.bus.publish(Channel::DeckChanged, ChannelValue::Deck(deck));
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
