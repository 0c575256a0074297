use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::search::FetchStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FavoriteToggled { item_id: String, favorite: bool },
    CommentsChanged { item_id: String, count: usize },
    SearchStateChanged { status: FetchStatus, query: String },
}

/// Fan-out of state changes to any number of subscribers. Subscribers whose
/// receiver was dropped are pruned on the next publish.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
