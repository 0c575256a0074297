use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::SearchService;
use crate::events::{Event, EventBus};
use crate::unsplash::Photo;

/// Queries used when the user searches for nothing.
pub const DEFAULT_KEYWORDS: [&str; 8] = [
    "nature",
    "city",
    "technology",
    "space",
    "animals",
    "travel",
    "food",
    "art",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Idle => "idle",
            FetchStatus::Loading => "loading",
            FetchStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub status: FetchStatus,
    pub results: Vec<Photo>,
    pub last_query: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub request_id: u64,
    pub query: String,
}

struct PendingSearch {
    request_id: u64,
    query: String,
}

struct SearchResponse {
    request_id: u64,
    result: Result<Vec<Photo>>,
}

/// A non-blank query is used as typed; otherwise a random candidate keyword.
pub fn resolve_query<R: Rng + ?Sized>(query: Option<&str>, keywords: &[String], rng: &mut R) -> String {
    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        return query.to_string();
    }
    match keywords.choose(rng) {
        Some(keyword) => keyword.clone(),
        None => DEFAULT_KEYWORDS
            .choose(rng)
            .copied()
            .unwrap_or("nature")
            .to_string(),
    }
}

/// Idle/loading/failed lifecycle around one authoritative search.
///
/// Each start takes a fresh request id. A completion carrying any other id
/// is dropped, so a slow earlier search can never overwrite a newer one.
pub struct SearchController {
    service: Arc<dyn SearchService>,
    keywords: Vec<String>,
    state: SearchState,
    events: EventBus,
    next_request_id: u64,
    pending: Option<PendingSearch>,
    response_tx: Sender<SearchResponse>,
    response_rx: Receiver<SearchResponse>,
}

impl SearchController {
    pub fn new(service: Arc<dyn SearchService>, keywords: Vec<String>, events: EventBus) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            service,
            keywords,
            state: SearchState::default(),
            events,
            next_request_id: 1,
            pending: None,
            response_tx,
            response_rx,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn status(&self) -> FetchStatus {
        self.state.status
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Moves to `loading` and records the effective query. The caller runs
    /// the fetch and reports back through [`SearchController::complete`].
    pub fn begin(&mut self, query: Option<&str>) -> SearchTicket {
        let query = resolve_query(query, &self.keywords, &mut rand::thread_rng());
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        if let Some(previous) = self.pending.take() {
            tracing::debug!(
                request_id = previous.request_id,
                query = %previous.query,
                "search: superseded in-flight request"
            );
        }
        self.pending = Some(PendingSearch {
            request_id,
            query: query.clone(),
        });
        self.state.status = FetchStatus::Loading;
        self.state.last_query = query.clone();
        tracing::info!(request_id, query = %query, "search: started");
        self.publish();

        SearchTicket { request_id, query }
    }

    /// Applies a finished fetch. Returns false when the response is stale.
    pub fn complete(&mut self, request_id: u64, result: Result<Vec<Photo>>) -> bool {
        let Some(pending) = &self.pending else {
            tracing::debug!(request_id, "search: response with nothing in flight");
            return false;
        };
        if pending.request_id != request_id {
            tracing::debug!(
                request_id,
                current = pending.request_id,
                "search: dropped stale response"
            );
            return false;
        }
        let query = pending.query.clone();
        self.pending = None;

        match result {
            Ok(photos) => {
                tracing::info!(request_id, count = photos.len(), "search: finished");
                self.state.status = FetchStatus::Idle;
                self.state.results = photos;
                self.state.last_query = query;
                self.state.last_error = None;
            }
            Err(err) => {
                tracing::warn!(request_id, error = %format!("{err:#}"), "search: failed");
                self.state.status = FetchStatus::Failed;
                self.state.last_error = Some(format!("{err:#}"));
            }
        }
        self.publish();
        true
    }

    /// Runs a search to completion on the calling thread.
    pub fn search(&mut self, query: Option<&str>) -> &SearchState {
        let ticket = self.begin(query);
        let result = self.service.search_photos(&ticket.query);
        self.complete(ticket.request_id, result);
        &self.state
    }

    /// Searches again without a user query, as after a failure.
    pub fn retry(&mut self) -> &SearchState {
        self.search(None)
    }

    /// Starts a search on a worker thread. Results are applied by
    /// [`SearchController::poll`] or [`SearchController::poll_timeout`].
    pub fn spawn(&mut self, query: Option<&str>) -> SearchTicket {
        let ticket = self.begin(query);
        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let request_id = ticket.request_id;
        let query = ticket.query.clone();
        thread::spawn(move || {
            let result = service.search_photos(&query);
            let _ = tx.send(SearchResponse { request_id, result });
        });
        ticket
    }

    /// Applies every response that has already arrived.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            changed |= self.complete(response.request_id, response.result);
        }
        changed
    }

    /// Waits up to `timeout` for one response, then drains the rest.
    pub fn poll_timeout(&mut self, timeout: Duration) -> bool {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => {
                let applied = self.complete(response.request_id, response.result);
                self.poll() || applied
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn publish(&self) {
        self.events.publish(Event::SearchStateChanged {
            status: self.state.status,
            query: self.state.last_query.clone(),
        });
    }
}
