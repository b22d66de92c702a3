//! Configuration types for banter.
//!
//! [`BotConfig`] carries the bot identity and dialogue defaults. Values can
//! be layered from three sources, lowest to highest precedence: built-in
//! defaults, a config file ([`file`]), and `BANTER_*` environment variables
//! ([`env`]).

pub mod env;
pub mod file;

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::Result;

use self::env::EnvConfig;
use self::file::FileConfig;

/// Default bot name.
pub const DEFAULT_NAME: &str = "bot";

/// Default dialogue timeout (zero disables the clock).
pub const DEFAULT_DIALOGUE_TIMEOUT: Duration = Duration::ZERO;

/// Default text dispatched when a dialogue times out.
pub const DEFAULT_DIALOGUE_TIMEOUT_TEXT: &str =
    "Sorry, the time limit for a response was reached. Please start again.";

/// Default envelope method for dialogue timeout messages.
pub const DEFAULT_DIALOGUE_TIMEOUT_METHOD: &str = "send";

/// Configuration for a bot.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// The bot's name, matched by direct-address branches.
    pub name: String,

    /// Optional short alias, also matched by direct-address branches.
    pub alias: Option<String>,

    /// Dialogue defaults.
    pub dialogue: DialogueConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            alias: None,
            dialogue: DialogueConfig::default(),
        }
    }
}

impl BotConfig {
    /// Create a new bot configuration with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the bot alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the default dialogue timeout.
    #[must_use]
    pub const fn dialogue_timeout(mut self, timeout: Duration) -> Self {
        self.dialogue.timeout = timeout;
        self
    }

    /// Set the text dispatched when a dialogue times out.
    #[must_use]
    pub fn dialogue_timeout_text(mut self, text: impl Into<String>) -> Self {
        self.dialogue.timeout_text = text.into();
        self
    }

    /// Set the envelope method used for dialogue timeout messages.
    #[must_use]
    pub fn dialogue_timeout_method(mut self, method: impl Into<String>) -> Self {
        self.dialogue.timeout_method = method.into();
        self
    }

    /// Load configuration from a file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = FileConfig::load(path.as_ref())?;
        Ok(Self::default().merge_file(&file).merge_env(&EnvConfig::default()))
    }

    /// Build configuration from defaults plus environment overrides only.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().merge_env(&EnvConfig::default())
    }

    /// Overlay values from a parsed config file.
    #[must_use]
    pub fn merge_file(mut self, file: &FileConfig) -> Self {
        if let Some(name) = &file.name {
            self.name.clone_from(name);
        }
        if let Some(alias) = &file.alias {
            self.alias = Some(alias.clone());
        }
        if let Some(dialogue) = &file.dialogue {
            if let Some(ms) = dialogue.timeout_ms {
                self.dialogue.timeout = Duration::from_millis(ms);
            }
            if let Some(text) = &dialogue.timeout_text {
                self.dialogue.timeout_text.clone_from(text);
            }
            if let Some(method) = &dialogue.timeout_method {
                self.dialogue.timeout_method.clone_from(method);
            }
        }
        self
    }

    /// The bot identity derived from this configuration.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.name.clone(), self.alias.clone())
    }

    /// Overlay values from environment variables.
    #[must_use]
    pub fn merge_env(mut self, env: &EnvConfig) -> Self {
        if let Some(name) = env.get("NAME") {
            self.name = name;
        }
        if let Some(alias) = env.get("ALIAS") {
            self.alias = Some(alias);
        }
        if let Some(timeout) = env.duration_millis("DIALOGUE_TIMEOUT_MS") {
            self.dialogue.timeout = timeout;
        }
        if let Some(text) = env.get("DIALOGUE_TIMEOUT_TEXT") {
            self.dialogue.timeout_text = text;
        }
        if let Some(method) = env.get("DIALOGUE_TIMEOUT_METHOD") {
            self.dialogue.timeout_method = method;
        }
        self
    }
}

/// The bot's own identity, as checked by direct-address branches.
///
/// A message addresses the bot directly when it opens with the alias or
/// name, optionally prefixed with `@` and followed by `:` or `,`. The
/// prefix pattern compiles lazily on first use.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    name: String,
    alias: Option<String>,
    prefix: OnceLock<Option<Regex>>,
}

impl Identity {
    /// Create an identity from a name and optional alias.
    #[must_use]
    pub fn new(name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            name: name.into(),
            alias,
            prefix: OnceLock::new(),
        }
    }

    /// The bot's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bot's alias, if configured.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Strip the bot-address prefix from a text, if present.
    ///
    /// Returns the remainder after the prefix, or `None` when the text does
    /// not open by addressing the bot.
    #[must_use]
    pub fn strip_prefix<'t>(&self, text: &'t str) -> Option<&'t str> {
        let regex = self.prefix_regex()?;
        let found = regex.find(text)?;
        Some(&text[found.end()..])
    }

    fn prefix_regex(&self) -> Option<&Regex> {
        self.prefix
            .get_or_init(|| {
                let mut names = Vec::new();
                if let Some(alias) = &self.alias {
                    names.push(regex::escape(alias));
                }
                names.push(regex::escape(&self.name));
                Regex::new(&format!(r"(?i)^\s*@?(?:{})[:,]?\s*", names.join("|"))).ok()
            })
            .as_ref()
    }
}

/// Default behavior for dialogues opened without explicit settings.
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// How long an engaged dialogue waits for the next message.
    pub timeout: Duration,

    /// Text dispatched by the default timeout handler.
    pub timeout_text: String,

    /// Envelope method used by the default timeout handler.
    pub timeout_method: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DIALOGUE_TIMEOUT,
            timeout_text: DEFAULT_DIALOGUE_TIMEOUT_TEXT.to_string(),
            timeout_method: DEFAULT_DIALOGUE_TIMEOUT_METHOD.to_string(),
        }
    }
}

impl DialogueConfig {
    /// Create a new dialogue configuration with the given timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the timeout text.
    #[must_use]
    pub fn timeout_text(mut self, text: impl Into<String>) -> Self {
        self.timeout_text = text.into();
        self
    }

    /// Set the timeout envelope method.
    #[must_use]
    pub fn timeout_method(mut self, method: impl Into<String>) -> Self {
        self.timeout_method = method.into();
        self
    }
}
