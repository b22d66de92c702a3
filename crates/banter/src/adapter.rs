//! Adapter seams: the bot's only contact with the outside world.
//!
//! Three concerns, three traits. A message adapter carries envelopes to a
//! chat platform, a storage adapter persists state and collections, an NLU
//! adapter turns raw text into keyed result sets. The engine owns `Arc`s to
//! whichever are configured and degrades gracefully when one is absent:
//! respond and remember stages simply skip.

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::Result;
use crate::message::Message;
use crate::nlu::NluResults;

pub mod memory;

/// Delivers envelopes to a chat platform.
#[async_trait]
pub trait MessageAdapter: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &'static str;

    /// Connect or otherwise get ready to dispatch.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Disconnect and release resources.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Deliver one envelope via its requested method.
    async fn dispatch(&self, envelope: &Envelope) -> Result<()>;
}

/// Persists bot state and keyed collections.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &'static str;

    /// Connect or otherwise get ready to persist.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and release resources.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Persist the full memory snapshot.
    async fn save_memory(&self, memory: Value) -> Result<()>;

    /// Load the previously saved memory snapshot.
    async fn load_memory(&self) -> Result<Value>;

    /// Append a record to a named collection.
    async fn keep(&self, collection: &str, value: Value) -> Result<()>;

    /// All records in a collection matching the criteria, if any.
    ///
    /// Object criteria match records containing every given field with an
    /// equal value; any other criteria value requires whole-record equality.
    async fn find(&self, collection: &str, criteria: &Value) -> Result<Option<Vec<Value>>>;

    /// The first matching record, if any.
    async fn find_one(&self, collection: &str, criteria: &Value) -> Result<Option<Value>>;

    /// Remove every matching record.
    async fn lose(&self, collection: &str, criteria: &Value) -> Result<()>;
}

/// Turns message text into keyed NLU result sets.
#[async_trait]
pub trait NluAdapter: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &'static str;

    /// Connect or otherwise get ready to process.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Disconnect and release resources.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Analyze a message, returning `None` when it has nothing to offer.
    async fn process(&self, message: &Message) -> Result<Option<NluResults>>;
}
