use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{Event, EventBus};
use crate::ordering::{self, SortOrder, TIMESTAMP_FORMAT};
use crate::storage::{comments_key, Store};

/// A stored comment. Edit mode is view state and lives in [`CommentLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    #[serde(default)]
    pub likes: u64,
}

/// Comments attached to one photo, persisted under `comments_<item_id>`.
pub struct CommentLedger {
    item_id: String,
    key: String,
    store: Arc<Store>,
    events: EventBus,
    // comment id -> edit buffer; presence means the comment is in edit mode
    edits: HashMap<i64, String>,
}

impl CommentLedger {
    pub fn new(store: Arc<Store>, events: EventBus, item_id: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            key: comments_key(item_id),
            store,
            events,
            edits: HashMap::new(),
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn list(&self) -> Vec<Comment> {
        self.store.read(&self.key)
    }

    pub fn sorted(&self, mode: SortOrder) -> Vec<Comment> {
        ordering::order(&self.list(), mode)
    }

    /// Appends a comment. Blank text is ignored and yields `None`.
    pub fn add(&mut self, text: &str) -> Result<Option<Comment>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let item_id = &self.item_id;
        let (comment, count) = self.store.update::<Comment, _, _>(&self.key, |comments| {
            let Some(id) = next_id(comments) else {
                return (false, Err(anyhow!("comments: no free comment id on {item_id}")));
            };
            let comment = Comment {
                id,
                text: text.to_string(),
                timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
                likes: 0,
            };
            comments.push(comment.clone());
            (true, Ok((comment, comments.len())))
        })??;
        tracing::debug!(item_id = %self.item_id, comment_id = comment.id, "comments: added");
        self.notify(count);
        Ok(Some(comment))
    }

    pub fn delete(&mut self, comment_id: i64) -> Result<Vec<Comment>> {
        self.edits.remove(&comment_id);
        self.mutate(comment_id, |comments| {
            let before = comments.len();
            comments.retain(|c| c.id != comment_id);
            comments.len() != before
        })
    }

    pub fn like(&mut self, comment_id: i64) -> Result<Vec<Comment>> {
        self.mutate(comment_id, |comments| {
            match comments.iter_mut().find(|c| c.id == comment_id) {
                Some(comment) => {
                    comment.likes = comment.likes.saturating_add(1);
                    true
                }
                None => false,
            }
        })
    }

    /// Enters edit mode, seeding the buffer with the current text. Returns
    /// false when no such comment exists.
    pub fn begin_edit(&mut self, comment_id: i64) -> bool {
        let Some(comment) = self.list().into_iter().find(|c| c.id == comment_id) else {
            return false;
        };
        self.edits.insert(comment_id, comment.text);
        true
    }

    pub fn is_editing(&self, comment_id: i64) -> bool {
        self.edits.contains_key(&comment_id)
    }

    pub fn edit_buffer(&self, comment_id: i64) -> Option<&str> {
        self.edits.get(&comment_id).map(String::as_str)
    }

    pub fn set_edit_buffer(&mut self, comment_id: i64, text: &str) {
        if let Some(buffer) = self.edits.get_mut(&comment_id) {
            *buffer = text.to_string();
        }
    }

    /// Replaces the text and leaves edit mode. Blank text is ignored and the
    /// comment stays in edit mode.
    pub fn commit_edit(&mut self, comment_id: i64, new_text: &str) -> Result<Vec<Comment>> {
        if new_text.trim().is_empty() {
            return Ok(self.list());
        }
        self.edits.remove(&comment_id);
        self.mutate(comment_id, |comments| {
            match comments.iter_mut().find(|c| c.id == comment_id) {
                Some(comment) => {
                    comment.text = new_text.to_string();
                    true
                }
                None => false,
            }
        })
    }

    pub fn commit_buffered_edit(&mut self, comment_id: i64) -> Result<Vec<Comment>> {
        match self.edits.get(&comment_id).cloned() {
            Some(text) => self.commit_edit(comment_id, &text),
            None => Ok(self.list()),
        }
    }

    pub fn cancel_edit(&mut self, comment_id: i64) {
        self.edits.remove(&comment_id);
    }

    fn mutate<F>(&mut self, comment_id: i64, f: F) -> Result<Vec<Comment>>
    where
        F: FnOnce(&mut Vec<Comment>) -> bool,
    {
        let (changed, comments) = self.store.update::<Comment, _, _>(&self.key, |comments| {
            let changed = f(comments);
            (changed, (changed, comments.clone()))
        })?;
        if changed {
            self.notify(comments.len());
        } else {
            tracing::debug!(item_id = %self.item_id, comment_id, "comments: no such comment");
        }
        Ok(comments)
    }

    fn notify(&self, count: usize) {
        self.events.publish(Event::CommentsChanged {
            item_id: self.item_id.clone(),
            count,
        });
    }
}

/// Time-derived id, bumped past every existing id so two comments added in
/// the same millisecond still differ. `None` once `i64::MAX` is taken.
fn next_id(existing: &[Comment]) -> Option<i64> {
    let now = Utc::now().timestamp_millis();
    match existing.iter().map(|c| c.id).max() {
        Some(max) if max >= now => max.checked_add(1),
        _ => Some(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(item_id: &str) -> (Arc<Store>, CommentLedger) {
        let store = Arc::new(Store::in_memory());
        let ledger = CommentLedger::new(store.clone(), EventBus::new(), item_id);
        (store, ledger)
    }

    #[test]
    fn fresh_ledger_is_empty() {
        let (_, ledger) = ledger("any");
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn blank_text_is_ignored() {
        let (store, mut ledger) = ledger("p1");
        assert!(ledger.add("").unwrap().is_none());
        assert!(ledger.add("   \n\t").unwrap().is_none());
        assert!(ledger.list().is_empty());
        assert!(store.raw(&comments_key("p1")).is_none());
    }

    #[test]
    fn length_tracks_adds_minus_deletes() {
        let (_, mut ledger) = ledger("p1");
        let first = ledger.add("one").unwrap().unwrap();
        ledger.add(" ").unwrap();
        ledger.add("two").unwrap();
        ledger.add("three").unwrap();
        ledger.delete(first.id).unwrap();
        ledger.delete(424242).unwrap();
        assert_eq!(ledger.list().len(), 2);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let (_, mut ledger) = ledger("p1");
        for text in ["a", "b", "c", "d"] {
            ledger.add(text).unwrap();
        }
        let ids: Vec<i64> = ledger.list().iter().map(|c| c.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids: {ids:?}");
    }

    #[test]
    fn add_fails_cleanly_when_ids_are_exhausted() {
        let (store, mut ledger) = ledger("p1");
        let seeded = Comment {
            id: i64::MAX,
            text: "x".into(),
            timestamp: "2024-01-01 00:00:00".into(),
            likes: 0,
        };
        store.write(&comments_key("p1"), &[seeded.clone()]).unwrap();
        let before = store.raw(&comments_key("p1"));

        let err = ledger.add("y").unwrap_err();
        assert!(err.to_string().contains("no free comment id"), "{err}");
        assert_eq!(ledger.list(), vec![seeded]);
        assert_eq!(store.raw(&comments_key("p1")), before);
    }

    #[test]
    fn new_comment_starts_with_zero_likes_and_parseable_timestamp() {
        let (_, mut ledger) = ledger("p1");
        let comment = ledger.add("hello").unwrap().unwrap();
        assert_eq!(comment.likes, 0);
        assert_eq!(comment.text, "hello");
        assert!(ordering::parse_timestamp(&comment.timestamp).is_some());
    }

    #[test]
    fn like_increments_only_target() {
        let (_, mut ledger) = ledger("p1");
        let a = ledger.add("a").unwrap().unwrap();
        let b = ledger.add("b").unwrap().unwrap();
        let after = ledger.like(b.id).unwrap();
        assert_eq!(after[0], a);
        assert_eq!(after[1].likes, 1);
        assert_eq!(after[1].text, "b");
    }

    #[test]
    fn like_unknown_id_leaves_bytes_untouched() {
        let (store, mut ledger) = ledger("p1");
        ledger.add("a").unwrap();
        let before = store.raw(&comments_key("p1"));
        ledger.like(-1).unwrap();
        assert_eq!(store.raw(&comments_key("p1")), before);
    }

    #[test]
    fn operations_on_unknown_ids_never_create_comments() {
        let (store, mut ledger) = ledger("p1");
        assert!(!ledger.begin_edit(7));
        ledger.commit_edit(7, "text").unwrap();
        ledger.like(7).unwrap();
        ledger.delete(7).unwrap();
        ledger.cancel_edit(7);
        assert!(ledger.list().is_empty());
        assert!(store.raw(&comments_key("p1")).is_none());
    }

    #[test]
    fn edit_lifecycle() {
        let (_, mut ledger) = ledger("p1");
        let comment = ledger.add("first draft").unwrap().unwrap();

        assert!(ledger.begin_edit(comment.id));
        assert!(ledger.is_editing(comment.id));
        assert_eq!(ledger.edit_buffer(comment.id), Some("first draft"));

        ledger.set_edit_buffer(comment.id, "final");
        let after = ledger.commit_buffered_edit(comment.id).unwrap();
        assert_eq!(after[0].text, "final");
        assert_eq!(after[0].id, comment.id);
        assert!(!ledger.is_editing(comment.id));
    }

    #[test]
    fn cancel_edit_keeps_stored_text() {
        let (_, mut ledger) = ledger("p1");
        let comment = ledger.add("keep me").unwrap().unwrap();
        ledger.begin_edit(comment.id);
        ledger.set_edit_buffer(comment.id, "discard me");
        ledger.cancel_edit(comment.id);
        assert!(!ledger.is_editing(comment.id));
        assert_eq!(ledger.edit_buffer(comment.id), None);
        assert_eq!(ledger.list()[0].text, "keep me");
    }

    #[test]
    fn blank_commit_stays_in_edit_mode() {
        let (_, mut ledger) = ledger("p1");
        let comment = ledger.add("text").unwrap().unwrap();
        ledger.begin_edit(comment.id);
        ledger.commit_edit(comment.id, "  ").unwrap();
        assert!(ledger.is_editing(comment.id));
        assert_eq!(ledger.list()[0].text, "text");
    }

    #[test]
    fn edit_mode_is_not_persisted() {
        let (store, mut ledger) = ledger("p1");
        let comment = ledger.add("text").unwrap().unwrap();
        ledger.begin_edit(comment.id);
        let raw = store.raw(&comments_key("p1")).unwrap();
        assert!(!raw.contains("edit"), "raw: {raw}");

        let reloaded = CommentLedger::new(store, EventBus::new(), "p1");
        assert!(!reloaded.is_editing(comment.id));
    }

    #[test]
    fn legacy_records_with_editing_flag_still_load() {
        let (store, ledger) = ledger("p1");
        store
            .write(
                &comments_key("p1"),
                &[serde_json::json!({
                    "id": 1700000000000_i64,
                    "text": "old",
                    "timestamp": "1/2/2024, 3:04:05 PM",
                    "likes": 3,
                    "isEditing": true
                })],
            )
            .unwrap();
        let comments = ledger.list();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].likes, 3);
        assert!(!ledger.is_editing(1700000000000));
    }

    #[test]
    fn ledgers_are_scoped_per_item() {
        let store = Arc::new(Store::in_memory());
        let mut a = CommentLedger::new(store.clone(), EventBus::new(), "a");
        let b = CommentLedger::new(store, EventBus::new(), "b");
        a.add("only on a").unwrap();
        assert_eq!(a.list().len(), 1);
        assert!(b.list().is_empty());
    }

    #[test]
    fn mutations_publish_counts() {
        let store = Arc::new(Store::in_memory());
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut ledger = CommentLedger::new(store, bus, "p1");
        let comment = ledger.add("hi").unwrap().unwrap();
        ledger.like(999).unwrap();
        ledger.delete(comment.id).unwrap();

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                Event::CommentsChanged {
                    item_id: "p1".into(),
                    count: 1
                },
                Event::CommentsChanged {
                    item_id: "p1".into(),
                    count: 0
                },
            ]
        );
    }
}
