//! Bits: named, reusable chunks of behavior.
//!
//! A bit bundles response strings and an optional callback under an id, so
//! the same behavior can hang off any number of branches without repeating
//! the closure. Branches refer to bits by id; running an id nobody set up
//! is reported and logged, but the surrounding pipeline carries on.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BanterError, Result};
use crate::middleware::{callback, Callback};
use crate::state::SharedState;

/// A named piece of behavior: strings to send, a callback to run, or both.
#[derive(Clone, Default)]
pub struct Bit {
    id: String,
    strings: Vec<String>,
    method: Option<String>,
    action: Option<Callback>,
}

impl Bit {
    /// Create a bit with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Add one response string.
    #[must_use]
    pub fn string(mut self, text: impl Into<String>) -> Self {
        self.strings.push(text.into());
        self
    }

    /// Add several response strings.
    #[must_use]
    pub fn strings<I, S>(mut self, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strings.extend(strings.into_iter().map(Into::into));
        self
    }

    /// Send the strings through a specific adapter method.
    #[must_use]
    pub fn via(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Run a callback when the bit fires.
    #[must_use]
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.action = Some(callback(f));
        self
    }

    /// The bit's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bit")
            .field("id", &self.id)
            .field("strings", &self.strings.len())
            .field("method", &self.method)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// The bit registry. Cheap to share; runs bits by id.
#[derive(Debug, Default)]
pub struct Bits {
    bits: Mutex<HashMap<String, Bit>>,
}

impl Bits {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a bit, replacing any previous bit with the same id.
    pub fn setup(&self, bit: Bit) -> String {
        let id = bit.id.clone();
        self.lock().insert(id.clone(), bit);
        id
    }

    /// Whether a bit with this id is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of registered bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run a bit by id: queue its strings, then run its callback.
    pub async fn run(&self, id: &str, state: &SharedState) -> Result<()> {
        let bit = self.lock().get(id).cloned();
        let Some(bit) = bit else {
            tracing::warn!(bit = %id, "bit not found");
            return Err(BanterError::unknown_bit(id));
        };
        if !bit.strings.is_empty() {
            let mut locked = state.lock().await;
            match &bit.method {
                Some(method) => locked.respond_via(method, bit.strings.clone()),
                None => locked.respond(bit.strings.clone()),
            }
        }
        if let Some(action) = &bit.action {
            action(Arc::clone(state)).await?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bit>> {
        self.bits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::message::Message;
    use crate::state::State;
    use crate::user::User;

    #[tokio::test]
    async fn running_a_bit_queues_its_strings() {
        let bits = Bits::new();
        bits.setup(Bit::new("hello").string("hi there").via("emote"));

        let state = State::with_message(Message::text(User::new("u1"), "hi")).shared();
        bits.run("hello", &state).await.unwrap();

        let locked = state.lock().await;
        let envelope = &locked.envelopes()[0];
        assert_eq!(envelope.strings, vec!["hi there".to_string()]);
        assert_eq!(envelope.method, "emote");
    }

    #[tokio::test]
    async fn bit_actions_run_after_strings() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let bits = Bits::new();
        bits.setup(Bit::new("count").action(move |_state| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let state = State::new().shared();
        bits.run("count", &state).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_reported() {
        let bits = Bits::new();
        let state = State::new().shared();
        let error = bits.run("ghost", &state).await.unwrap_err();
        assert!(error.to_string().contains("ghost"));
    }

    #[test]
    fn setup_replaces_by_id() {
        let bits = Bits::new();
        bits.setup(Bit::new("hello").string("one"));
        bits.setup(Bit::new("hello").string("two"));
        assert_eq!(bits.len(), 1);
    }
}
