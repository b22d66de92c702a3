//! Dialogues: isolated paths scoped to an audience, with a timeout clock.
//!
//! Opening a dialogue engages an audience key in the bot's registry, so
//! later messages from that audience route to the dialogue's own path stack
//! instead of the global path. A non-zero timeout arms a clock; each routed
//! message re-arms it, and when it runs out the timeout handler fires and
//! the dialogue closes itself. Opening a second dialogue for the same key
//! supersedes the first: its clock stops, but its close hooks stay untouched
//! so whoever still holds it can close it deliberately.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::bot::Bot;
use crate::config::{DEFAULT_DIALOGUE_TIMEOUT_METHOD, DEFAULT_DIALOGUE_TIMEOUT_TEXT};
use crate::envelope::Envelope;
use crate::error::BanterError;
use crate::middleware::{callback, Callback};
use crate::path::Path;
use crate::state::SharedState;
use crate::user::User;

fn next_dialogue_id() -> String {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    format!("dialogue_{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Who a dialogue is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// One user in one room.
    Direct,
    /// One user, wherever they speak.
    User,
    /// Everyone in one room.
    Room,
}

impl Audience {
    /// The engagement key for a user under this scope.
    ///
    /// Room scope needs the user to actually be in a room.
    #[must_use]
    pub fn key(self, user: &User) -> Option<String> {
        match self {
            Self::Direct => Some(format!("{}_{}", user.id, user.room_id())),
            Self::User => Some(user.id.clone()),
            Self::Room => {
                let room = user.room_id();
                if room.is_empty() {
                    None
                } else {
                    Some(room.to_string())
                }
            }
        }
    }
}

/// The dialogue's path stack: a base path plus pushed overlays.
#[derive(Debug, Default)]
struct PathStack {
    base: Path,
    overlays: Vec<Path>,
}

impl PathStack {
    fn top(&self) -> &Path {
        self.overlays.last().unwrap_or(&self.base)
    }

    fn top_mut(&mut self) -> &mut Path {
        match self.overlays.last_mut() {
            Some(path) => path,
            None => &mut self.base,
        }
    }
}

/// Mutable access to the dialogue's current path, for registration.
pub struct PathGuard<'a> {
    guard: MutexGuard<'a, PathStack>,
}

impl Deref for PathGuard<'_> {
    type Target = Path;

    fn deref(&self) -> &Path {
        self.guard.top()
    }
}

impl DerefMut for PathGuard<'_> {
    fn deref_mut(&mut self) -> &mut Path {
        self.guard.top_mut()
    }
}

/// An isolated conversation with an audience.
pub struct Dialogue {
    id: String,
    audience: Audience,
    timeout: Duration,
    timeout_text: String,
    timeout_method: String,
    on_open: Option<Callback>,
    on_close: Option<Callback>,
    on_timeout: Option<Callback>,
    paths: Mutex<PathStack>,
    clock: Mutex<Option<JoinHandle<()>>>,
    clock_generation: AtomicU64,
    opened: AtomicBool,
    state: Mutex<Option<SharedState>>,
    bot: Mutex<Weak<Bot>>,
    engaged_key: Mutex<Option<String>>,
}

impl Dialogue {
    /// Create a dialogue for an audience scope, with no timeout.
    #[must_use]
    pub fn new(audience: Audience) -> Self {
        Self {
            id: next_dialogue_id(),
            audience,
            timeout: Duration::ZERO,
            timeout_text: DEFAULT_DIALOGUE_TIMEOUT_TEXT.to_string(),
            timeout_method: DEFAULT_DIALOGUE_TIMEOUT_METHOD.to_string(),
            on_open: None,
            on_close: None,
            on_timeout: None,
            paths: Mutex::new(PathStack::default()),
            clock: Mutex::new(None),
            clock_generation: AtomicU64::new(0),
            opened: AtomicBool::new(false),
            state: Mutex::new(None),
            bot: Mutex::new(Weak::new()),
            engaged_key: Mutex::new(None),
        }
    }

    /// Close the dialogue when no message arrives for this long.
    /// Zero disables the clock.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Text the default timeout handler sends.
    #[must_use]
    pub fn timeout_text(mut self, text: impl Into<String>) -> Self {
        self.timeout_text = text.into();
        self
    }

    /// Envelope method the default timeout handler uses.
    #[must_use]
    pub fn timeout_method(mut self, method: impl Into<String>) -> Self {
        self.timeout_method = method.into();
        self
    }

    /// Run a callback when the dialogue opens.
    #[must_use]
    pub fn on_open<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
    {
        self.on_open = Some(callback(f));
        self
    }

    /// Run a callback when the dialogue closes.
    #[must_use]
    pub fn on_close<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
    {
        self.on_close = Some(callback(f));
        self
    }

    /// Replace the default timeout handler.
    #[must_use]
    pub fn on_timeout<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
    {
        self.on_timeout = Some(callback(f));
        self
    }

    /// The dialogue's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The audience scope.
    #[must_use]
    pub const fn audience(&self) -> Audience {
        self.audience
    }

    /// True between a successful open and a close.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// True while a timeout clock is armed.
    #[must_use]
    pub fn has_clock(&self) -> bool {
        self.clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current path, for registering dialogue-scoped branches.
    pub fn path(&self) -> PathGuard<'_> {
        PathGuard {
            guard: self.paths.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Push a fresh path onto the stack; registration now targets it.
    pub fn push_path(&self) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .overlays
            .push(Path::new());
    }

    /// Pop the top overlay path, reverting to the one beneath.
    /// The base path stays; returns whether anything was popped.
    pub fn pop_path(&self) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .overlays
            .pop()
            .is_some()
    }

    /// A working copy of the current path, re-arming the clock on the way.
    pub(crate) fn working_path(self: &Arc<Self>) -> Path {
        if self.is_open() && !self.timeout.is_zero() {
            self.start_clock(None);
        }
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .top()
            .clone()
    }

    /// Engage the state's audience and start the clock.
    ///
    /// Reports false when the state has no message user to derive a key
    /// from, or the audience scope cannot produce one. Opening over an
    /// already-engaged key supersedes the previous dialogue: its clock
    /// stops, its hooks do not run.
    pub async fn open(self: &Arc<Self>, bot: &Arc<Bot>, state: SharedState) -> bool {
        let user = { state.lock().await.message().map(|message| message.user().clone()) };
        let Some(user) = user else {
            tracing::warn!(dialogue = %self.id, "no message user to engage");
            return false;
        };
        let Some(key) = self.audience.key(&user) else {
            tracing::warn!(
                dialogue = %self.id,
                audience = ?self.audience,
                user = %user.id,
                "audience key unavailable",
            );
            return false;
        };

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&state));
        *self.bot.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(bot);
        *self
            .engaged_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(key.clone());

        if let Some(hook) = &self.on_open {
            if let Err(error) = hook(Arc::clone(&state)).await {
                let error = BanterError::hook("on_open", error.to_string());
                tracing::warn!(dialogue = %self.id, %error, "open hook failed");
            }
        }

        if let Some(previous) = bot.dialogues().engage(&key, Arc::clone(self)) {
            tracing::warn!(
                dialogue = %previous.id,
                replacement = %self.id,
                key = %key,
                "dialogue superseded",
            );
            previous.stop_clock();
        }
        self.opened.store(true, Ordering::SeqCst);
        tracing::info!(dialogue = %self.id, key = %key, "dialogue opened");

        if !self.timeout.is_zero() {
            self.start_clock(None);
        }
        true
    }

    /// Close the dialogue: stop the clock, run the close hook, disengage.
    ///
    /// Closing a dialogue that never opened (or already closed) is reported
    /// as false and does nothing else.
    pub async fn close(&self) -> bool {
        if !self.opened.swap(false, Ordering::SeqCst) {
            tracing::debug!(dialogue = %self.id, "close without open");
            return false;
        }
        self.stop_clock();

        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let (Some(hook), Some(state)) = (&self.on_close, state) {
            if let Err(error) = hook(state).await {
                let error = BanterError::hook("on_close", error.to_string());
                tracing::warn!(dialogue = %self.id, %error, "close hook failed");
            }
        }

        let bot = self
            .bot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade();
        let key = self
            .engaged_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let (Some(bot), Some(key)) = (bot, key) {
            bot.dialogues().disengage(&key, &self.id);
        }
        tracing::info!(dialogue = %self.id, "dialogue closed");
        true
    }

    /// Arm the timeout clock, replacing any running one.
    ///
    /// When the clock runs out it clears itself, fires the timeout handler
    /// and closes the dialogue. Pass `None` to use the dialogue's timeout.
    pub fn start_clock(self: &Arc<Self>, timeout: Option<Duration>) {
        let wait = timeout.unwrap_or(self.timeout);
        if wait.is_zero() {
            return;
        }
        let generation = self.clock_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.stop_clock();

        let dialogue = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // a replacement clock may have been armed while we slept
            if dialogue.clock_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if !dialogue.is_open() {
                return;
            }
            *dialogue
                .clock
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
            dialogue.fire_timeout().await;
            dialogue.close().await;
        });
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Abort the timeout clock, if armed.
    pub fn stop_clock(&self) {
        if let Some(handle) = self
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    async fn fire_timeout(&self) {
        tracing::info!(dialogue = %self.id, "dialogue timed out");
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(state) = state else { return };
        match &self.on_timeout {
            Some(hook) => {
                if let Err(error) = hook(state).await {
                    let error = BanterError::hook("on_timeout", error.to_string());
                    tracing::warn!(dialogue = %self.id, %error, "timeout hook failed");
                }
            }
            None => self.default_timeout(state).await,
        }
    }

    /// The default timeout handler: tell the audience time ran out.
    async fn default_timeout(&self, state: SharedState) {
        let bot = self
            .bot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade();
        let Some(bot) = bot else { return };
        let message = { state.lock().await.message().cloned() };
        let Some(message) = message else { return };
        let envelope = Envelope::reply_to(&message)
            .write(self.timeout_text.clone())
            .via(self.timeout_method.clone());
        bot.dispatch(envelope).await;
    }
}

impl fmt::Debug for Dialogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialogue")
            .field("id", &self.id)
            .field("audience", &self.audience)
            .field("timeout", &self.timeout)
            .field("opened", &self.opened)
            .finish()
    }
}

/// The registry of engaged audiences.
#[derive(Debug, Default)]
pub struct Dialogues {
    engaged: Mutex<HashMap<String, Arc<Dialogue>>>,
}

impl Dialogues {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage a key, returning any dialogue this one supersedes.
    pub(crate) fn engage(&self, key: &str, dialogue: Arc<Dialogue>) -> Option<Arc<Dialogue>> {
        self.lock().insert(key.to_string(), dialogue)
    }

    /// Release a key, but only while the given dialogue still holds it.
    pub(crate) fn disengage(&self, key: &str, id: &str) {
        let mut engaged = self.lock();
        if engaged.get(key).is_some_and(|dialogue| dialogue.id() == id) {
            engaged.remove(key);
        }
    }

    /// The dialogue a user's message should route to, if any.
    ///
    /// Direct engagements win over user-wide ones, which win over
    /// room-wide ones.
    #[must_use]
    pub fn engaged_for(&self, user: &User) -> Option<Arc<Dialogue>> {
        let engaged = self.lock();
        let direct = format!("{}_{}", user.id, user.room_id());
        if let Some(dialogue) = engaged.get(&direct) {
            return Some(Arc::clone(dialogue));
        }
        if let Some(dialogue) = engaged.get(&user.id) {
            return Some(Arc::clone(dialogue));
        }
        let room = user.room_id();
        if room.is_empty() {
            return None;
        }
        engaged.get(room).map(Arc::clone)
    }

    /// Number of engaged audiences.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Take every engaged dialogue out of the registry.
    pub fn drain(&self) -> Vec<Arc<Dialogue>> {
        self.lock().drain().map(|(_, dialogue)| dialogue).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Dialogue>>> {
        self.engaged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
