//! The bot: adapters, registries and the receive/dispatch entry points.
//!
//! A bot owns one global path, the middleware and bit registries, the
//! dialogue registry and up to three adapters. Inbound messages route to an
//! engaged dialogue's path when one claims the sender, otherwise to the
//! global path, and then run the full thought process. Outbound envelopes
//! run the shorter dispatch process.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::adapter::{MessageAdapter, NluAdapter, StorageAdapter};
use crate::bit::{Bit, Bits};
use crate::config::{BotConfig, Identity};
use crate::dialogue::{Audience, Dialogue, Dialogues};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::message::Message;
use crate::middleware::{piece, Flow, Middleware, Middlewares};
use crate::path::Path;
use crate::state::{SharedState, State};
use crate::thought::{Stage, Thoughts};

/// Builds a [`Bot`] from configuration and adapters.
#[derive(Default)]
pub struct BotBuilder {
    config: BotConfig,
    messenger: Option<Arc<dyn MessageAdapter>>,
    storage: Option<Arc<dyn StorageAdapter>>,
    nlu: Option<Arc<dyn NluAdapter>>,
}

impl BotBuilder {
    /// Start from default configuration and no adapters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration.
    #[must_use]
    pub fn config(mut self, config: BotConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bot's name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the bot's alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.config.alias = Some(alias.into());
        self
    }

    /// Deliver envelopes through this adapter.
    #[must_use]
    pub fn messenger(mut self, adapter: Arc<dyn MessageAdapter>) -> Self {
        self.messenger = Some(adapter);
        self
    }

    /// Persist state through this adapter.
    #[must_use]
    pub fn storage(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(adapter);
        self
    }

    /// Analyze message text through this adapter.
    #[must_use]
    pub fn nlu(mut self, adapter: Arc<dyn NluAdapter>) -> Self {
        self.nlu = Some(adapter);
        self
    }

    /// Assemble the bot.
    #[must_use]
    pub fn build(self) -> Arc<Bot> {
        let identity = self.config.identity();
        Arc::new(Bot {
            config: self.config,
            identity,
            global: Mutex::new(Path::new()),
            middlewares: Mutex::new(Middlewares::new()),
            bits: Bits::new(),
            dialogues: Dialogues::new(),
            messenger: self.messenger,
            storage: self.storage,
            nlu: self.nlu,
            started: AtomicBool::new(false),
        })
    }
}

/// Mutable access to the global path, for registering branches.
pub struct GlobalPath<'a> {
    guard: MutexGuard<'a, Path>,
}

impl Deref for GlobalPath<'_> {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.guard
    }
}

impl DerefMut for GlobalPath<'_> {
    fn deref_mut(&mut self) -> &mut Path {
        &mut self.guard
    }
}

/// A conversational engine wired to its adapters.
pub struct Bot {
    config: BotConfig,
    identity: Identity,
    global: Mutex<Path>,
    middlewares: Mutex<Middlewares>,
    bits: Bits,
    dialogues: Dialogues,
    messenger: Option<Arc<dyn MessageAdapter>>,
    storage: Option<Arc<dyn StorageAdapter>>,
    nlu: Option<Arc<dyn NluAdapter>>,
    started: AtomicBool,
}

impl Bot {
    /// Start building a bot.
    #[must_use]
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    /// The bot's configuration.
    #[must_use]
    pub const fn config(&self) -> &BotConfig {
        &self.config
    }

    /// The identity direct-address branches match against.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The bit registry.
    #[must_use]
    pub const fn bits(&self) -> &Bits {
        &self.bits
    }

    /// The dialogue registry.
    #[must_use]
    pub const fn dialogues(&self) -> &Dialogues {
        &self.dialogues
    }

    /// The message adapter, when configured.
    #[must_use]
    pub const fn messenger(&self) -> Option<&Arc<dyn MessageAdapter>> {
        self.messenger.as_ref()
    }

    /// The storage adapter, when configured.
    #[must_use]
    pub const fn storage(&self) -> Option<&Arc<dyn StorageAdapter>> {
        self.storage.as_ref()
    }

    /// The NLU adapter, when configured.
    #[must_use]
    pub const fn nlu(&self) -> Option<&Arc<dyn NluAdapter>> {
        self.nlu.as_ref()
    }

    /// The global path, for registering branches.
    pub fn path(&self) -> GlobalPath<'_> {
        GlobalPath {
            guard: self.global.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Store a bit for branches to refer to by id.
    pub fn setup_bit(&self, bit: Bit) -> String {
        self.bits.setup(bit)
    }

    /// Register a middleware piece for a stage.
    pub fn register_middleware<F, Fut>(&self, stage: Stage, middleware: F)
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow>> + Send + 'static,
    {
        self.middlewares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(stage, piece(middleware));
    }

    /// The middleware pipeline for a stage.
    #[must_use]
    pub fn middleware(&self, stage: Stage) -> Middleware {
        self.middlewares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stage(stage)
    }

    /// Start the configured adapters: storage, then NLU, then messenger.
    ///
    /// Startup failures propagate; a bot that cannot reach its adapters
    /// should not pretend to run.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("already started");
            return Ok(());
        }
        tracing::info!(name = %self.config.name, "starting");
        if let Some(storage) = &self.storage {
            storage.start().await?;
            tracing::info!(adapter = %storage.name(), "storage adapter started");
        }
        if let Some(nlu) = &self.nlu {
            nlu.start().await?;
            tracing::info!(adapter = %nlu.name(), "NLU adapter started");
        }
        if let Some(messenger) = &self.messenger {
            messenger.start().await?;
            tracing::info!(adapter = %messenger.name(), "message adapter started");
        }
        Ok(())
    }

    /// Close every dialogue, then shut adapters down in reverse order.
    /// Best effort: failures are logged, not propagated.
    pub async fn shutdown(&self) {
        tracing::info!(name = %self.config.name, "shutting down");
        for dialogue in self.dialogues.drain() {
            dialogue.close().await;
        }
        if let Some(messenger) = &self.messenger {
            if let Err(error) = messenger.shutdown().await {
                tracing::warn!(adapter = %messenger.name(), %error, "shutdown failed");
            }
        }
        if let Some(nlu) = &self.nlu {
            if let Err(error) = nlu.shutdown().await {
                tracing::warn!(adapter = %nlu.name(), %error, "shutdown failed");
            }
        }
        if let Some(storage) = &self.storage {
            if let Err(error) = storage.shutdown().await {
                tracing::warn!(adapter = %storage.name(), %error, "shutdown failed");
            }
        }
        self.started.store(false, Ordering::SeqCst);
    }

    /// Run an inbound message through the thought process.
    ///
    /// Messages from an engaged audience route to that dialogue's current
    /// path and re-arm its clock; everything else uses the global path.
    pub async fn receive(self: &Arc<Self>, message: Message) -> SharedState {
        tracing::debug!(message = %message, "received");
        let user = message.user().clone();
        let state = State::with_message(message).shared();
        let path = match self.dialogues.engaged_for(&user) {
            Some(dialogue) => {
                tracing::debug!(dialogue = %dialogue.id(), user = %user.id, "routing to dialogue");
                state.lock().await.set_dialogue(&dialogue);
                dialogue.working_path()
            }
            None => self
                .global
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        };
        Thoughts::new(self, Arc::clone(&state), path).receive().await
    }

    /// Run an outbound envelope through the dispatch process.
    pub async fn dispatch(self: &Arc<Self>, envelope: Envelope) -> SharedState {
        tracing::debug!(envelope = %envelope.id, "dispatching");
        let state = State::with_envelope(envelope).shared();
        Thoughts::new(self, Arc::clone(&state), Path::new())
            .dispatch()
            .await
    }

    /// Reply to a message's sender with the given strings.
    pub async fn respond_to<I, S>(self: &Arc<Self>, message: &Message, strings: I) -> SharedState
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(Envelope::reply_to(message).compose(strings))
            .await
    }

    /// A dialogue preconfigured with this bot's timeout defaults.
    #[must_use]
    pub fn dialogue(&self, audience: Audience) -> Dialogue {
        Dialogue::new(audience)
            .timeout(self.config.dialogue.timeout)
            .timeout_text(self.config.dialogue.timeout_text.clone())
            .timeout_method(self.config.dialogue.timeout_method.clone())
    }

    /// Open a dialogue against a state's audience.
    ///
    /// The returned handle reports [`Dialogue::is_open`] as false when the
    /// state had no user to engage.
    pub async fn enter(self: &Arc<Self>, state: &SharedState, dialogue: Dialogue) -> Arc<Dialogue> {
        let dialogue = Arc::new(dialogue);
        dialogue.open(self, Arc::clone(state)).await;
        dialogue
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.config.name)
            .field("messenger", &self.messenger.as_ref().map(|a| a.name()))
            .field("storage", &self.storage.as_ref().map(|a| a.name()))
            .field("nlu", &self.nlu.as_ref().map(|a| a.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::{MemoryMessenger, MemoryStorage};
    use crate::branch::Action;
    use crate::path::BranchOptions;
    use crate::user::{Room, User};

    fn message(text: &str) -> Message {
        Message::text(User::new("u1").room(Room::new("r1")), text)
    }

    #[tokio::test]
    async fn a_matching_branch_replies_through_the_messenger() {
        let messenger = Arc::new(MemoryMessenger::new());
        let bot = Bot::builder()
            .name("brains")
            .messenger(messenger.clone())
            .build();
        bot.path()
            .text(
                "ping",
                Action::func(|state| async move {
                    state.lock().await.respond(["pong"]);
                    Ok(())
                }),
                BranchOptions::new(),
            )
            .unwrap();

        let state = bot.receive(message("ping")).await;

        assert!(state.lock().await.matched());
        assert_eq!(messenger.texts(), vec!["pong".to_string()]);
    }

    #[tokio::test]
    async fn engaged_dialogues_take_over_routing() {
        let messenger = Arc::new(MemoryMessenger::new());
        let bot = Bot::builder().messenger(messenger.clone()).build();
        bot.path()
            .text(
                "yes",
                Action::func(|state| async move {
                    state.lock().await.respond(["global heard you"]);
                    Ok(())
                }),
                BranchOptions::new(),
            )
            .unwrap();

        let state = bot.receive(message("start")).await;
        let dialogue = bot.enter(&state, bot.dialogue(Audience::Direct)).await;
        assert!(dialogue.is_open());
        dialogue
            .path()
            .text(
                "yes",
                Action::func(|state| async move {
                    state.lock().await.respond(["dialogue heard you"]);
                    Ok(())
                }),
                BranchOptions::new(),
            )
            .unwrap();

        bot.receive(message("yes")).await;
        assert_eq!(messenger.texts(), vec!["dialogue heard you".to_string()]);

        // a different audience still hits the global path
        let other = Message::text(User::new("u2").room(Room::new("r2")), "yes");
        bot.receive(other).await;
        assert_eq!(messenger.texts().last().unwrap(), "global heard you");
    }

    #[tokio::test]
    async fn closing_disengages_the_audience() {
        let bot = Bot::builder().build();
        let state = bot.receive(message("start")).await;
        let dialogue = bot.enter(&state, bot.dialogue(Audience::Direct)).await;
        assert_eq!(bot.dialogues().count(), 1);

        assert!(dialogue.close().await);
        assert_eq!(bot.dialogues().count(), 0);
        assert!(!dialogue.close().await);
    }

    #[tokio::test]
    async fn shutdown_closes_dialogues_and_stops_clocks() {
        let bot = Bot::builder()
            .config(BotConfig::new("brains").dialogue_timeout(std::time::Duration::from_secs(60)))
            .build();
        let state = bot.receive(message("start")).await;
        let dialogue = bot.enter(&state, bot.dialogue(Audience::Direct)).await;
        assert!(dialogue.has_clock());

        bot.shutdown().await;
        assert!(!dialogue.is_open());
        assert!(!dialogue.has_clock());
        assert_eq!(bot.dialogues().count(), 0);
    }

    #[tokio::test]
    async fn respond_to_dispatches_and_remembers() {
        let messenger = Arc::new(MemoryMessenger::new());
        let storage = Arc::new(MemoryStorage::new());
        let bot = Bot::builder()
            .messenger(messenger.clone())
            .storage(storage.clone())
            .build();

        let inbound = message("hello there");
        bot.respond_to(&inbound, ["hi"]).await;

        assert_eq!(messenger.texts(), vec!["hi".to_string()]);
        assert_eq!(storage.collection("states").len(), 1);
    }
}
