//! In-process adapters backed by plain collections.
//!
//! These are real adapters, not stubs: a bot wired to them works end to end
//! inside one process, which is exactly what tests and local development
//! need. Nothing here touches the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{MessageAdapter, NluAdapter, StorageAdapter};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::message::Message;
use crate::nlu::NluResults;

/// A message adapter that records every dispatched envelope.
#[derive(Debug, Default)]
pub struct MemoryMessenger {
    dispatched: Mutex<Vec<Envelope>>,
}

impl MemoryMessenger {
    /// Create an empty messenger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every envelope dispatched so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recently dispatched envelope.
    #[must_use]
    pub fn last(&self) -> Option<Envelope> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Every string sent so far, flattened in dispatch order.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .flat_map(|envelope| envelope.strings)
            .collect()
    }
}

#[async_trait]
impl MessageAdapter for MemoryMessenger {
    fn name(&self) -> &'static str {
        "memory-messenger"
    }

    async fn dispatch(&self, envelope: &Envelope) -> Result<()> {
        tracing::debug!(envelope = %envelope.id, method = %envelope.method, "dispatching");
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());
        Ok(())
    }
}

/// A storage adapter over in-process maps.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    memory: Mutex<Value>,
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of one collection, for assertions.
    #[must_use]
    pub fn collection(&self, name: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

/// Object criteria match records containing every given field with an equal
/// value; anything else requires whole-record equality.
fn matches(record: &Value, criteria: &Value) -> bool {
    match criteria {
        Value::Object(fields) => fields
            .iter()
            .all(|(key, expected)| record.get(key) == Some(expected)),
        other => record == other,
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory-storage"
    }

    async fn save_memory(&self, memory: Value) -> Result<()> {
        *self.memory.lock().unwrap_or_else(PoisonError::into_inner) = memory;
        Ok(())
    }

    async fn load_memory(&self) -> Result<Value> {
        Ok(self
            .memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn keep(&self, collection: &str, value: Value) -> Result<()> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_default()
            .push(value);
        Ok(())
    }

    async fn find(&self, collection: &str, criteria: &Value) -> Result<Option<Vec<Value>>> {
        let found: Vec<Value> = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| matches(record, criteria))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(if found.is_empty() { None } else { Some(found) })
    }

    async fn find_one(&self, collection: &str, criteria: &Value) -> Result<Option<Value>> {
        Ok(self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .and_then(|records| records.iter().find(|record| matches(record, criteria)))
            .cloned())
    }

    async fn lose(&self, collection: &str, criteria: &Value) -> Result<()> {
        if let Some(records) = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(collection)
        {
            records.retain(|record| !matches(record, criteria));
        }
        Ok(())
    }
}

/// An NLU adapter that returns the same results for every message and
/// counts how often it was asked.
#[derive(Debug, Default)]
pub struct CannedNlu {
    results: NluResults,
    calls: AtomicUsize,
}

impl CannedNlu {
    /// Create an adapter that always returns these results.
    #[must_use]
    pub fn new(results: NluResults) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many messages were processed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NluAdapter for CannedNlu {
    fn name(&self) -> &'static str {
        "canned-nlu"
    }

    async fn process(&self, _message: &Message) -> Result<Option<NluResults>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.results.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::user::User;

    #[tokio::test]
    async fn messenger_records_dispatches_in_order() {
        let messenger = MemoryMessenger::new();
        let first = Envelope::new().write("one");
        let second = Envelope::new().write("two");

        messenger.dispatch(&first).await.unwrap();
        messenger.dispatch(&second).await.unwrap();

        assert_eq!(messenger.texts(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(messenger.last().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn storage_finds_by_field_subset() {
        let storage = MemoryStorage::new();
        storage
            .keep("users", json!({"id": "u1", "name": "ana"}))
            .await
            .unwrap();
        storage
            .keep("users", json!({"id": "u2", "name": "bo"}))
            .await
            .unwrap();

        let found = storage
            .find("users", &json!({"name": "ana"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], json!("u1"));

        let missing = storage.find("users", &json!({"name": "cy"})).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn storage_loses_matching_records() {
        let storage = MemoryStorage::new();
        storage.keep("rooms", json!({"id": "r1"})).await.unwrap();
        storage.keep("rooms", json!({"id": "r2"})).await.unwrap();

        storage.lose("rooms", &json!({"id": "r1"})).await.unwrap();
        assert_eq!(storage.collection("rooms").len(), 1);

        let left = storage
            .find_one("rooms", &json!({"id": "r2"}))
            .await
            .unwrap();
        assert!(left.is_some());
    }

    #[tokio::test]
    async fn storage_round_trips_memory() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load_memory().await.unwrap(), Value::Null);

        storage.save_memory(json!({"mood": "chipper"})).await.unwrap();
        assert_eq!(
            storage.load_memory().await.unwrap(),
            json!({"mood": "chipper"})
        );
    }

    #[tokio::test]
    async fn canned_nlu_counts_calls() {
        let nlu = CannedNlu::default();
        let message = Message::text(User::new("u1"), "hi");

        nlu.process(&message).await.unwrap();
        nlu.process(&message).await.unwrap();
        assert_eq!(nlu.calls(), 2);
    }
}
