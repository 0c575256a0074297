use std::sync::Arc;

use anyhow::Result;

use crate::events::{Event, EventBus};
use crate::storage::{Store, FAVORITES_KEY};

/// Set of favorited photo ids. Holds no copy of its own: every call goes to
/// the store, so two registries over one store never disagree.
#[derive(Debug, Clone)]
pub struct Favorites {
    store: Arc<Store>,
    events: EventBus,
}

impl Favorites {
    pub fn new(store: Arc<Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub fn is_favorite(&self, item_id: &str) -> bool {
        self.store
            .read::<String>(FAVORITES_KEY)
            .iter()
            .any(|id| id == item_id)
    }

    /// Flips membership and returns the new state.
    pub fn toggle(&self, item_id: &str) -> Result<bool> {
        let favorite = self.store.update::<String, _, _>(FAVORITES_KEY, |ids| {
            let before = ids.len();
            ids.retain(|id| id != item_id);
            if ids.len() == before {
                ids.push(item_id.to_string());
                (true, true)
            } else {
                (true, false)
            }
        })?;
        tracing::debug!(item_id, favorite, "favorites: toggled");
        self.events.publish(Event::FavoriteToggled {
            item_id: item_id.to_string(),
            favorite,
        });
        Ok(favorite)
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids = self.store.read::<String>(FAVORITES_KEY);
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        ids
    }
}
