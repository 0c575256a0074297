use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::comments::CommentLedger;
use crate::data::SearchService;
use crate::events::{Event, EventBus};
use crate::favorites::Favorites;
use crate::search::SearchController;
use crate::storage::Store;
use crate::unsplash::Photo;

/// Application state: one store shared by the favorites registry, the
/// per-photo comment ledgers, and the search controller.
pub struct Gallery {
    store: Arc<Store>,
    events: EventBus,
    favorites: Favorites,
    search: SearchController,
    ledgers: HashMap<String, CommentLedger>,
}

impl Gallery {
    pub fn new(store: Arc<Store>, service: Arc<dyn SearchService>, keywords: Vec<String>) -> Self {
        let events = EventBus::new();
        Self {
            favorites: Favorites::new(store.clone(), events.clone()),
            search: SearchController::new(service, keywords, events.clone()),
            ledgers: HashMap::new(),
            store,
            events,
        }
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.events.subscribe()
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut SearchController {
        &mut self.search
    }

    /// Ledger for one photo. Created on first use and kept so edit mode
    /// survives between calls.
    pub fn ledger(&mut self, item_id: &str) -> &mut CommentLedger {
        let store = &self.store;
        let events = &self.events;
        self.ledgers
            .entry(item_id.to_string())
            .or_insert_with(|| CommentLedger::new(store.clone(), events.clone(), item_id))
    }

    /// Current results, optionally narrowed to favorites. Membership is read
    /// from the store at call time.
    pub fn visible_photos(&self, only_favorites: bool) -> Vec<Photo> {
        let results = &self.search.state().results;
        if !only_favorites {
            return results.clone();
        }
        let favorites = self.favorites.list();
        results
            .iter()
            .filter(|photo| favorites.iter().any(|id| id == &photo.id))
            .cloned()
            .collect()
    }
}
