//! Error types for banter.
//!
//! Two families of errors exist. [`CompileError`] is returned synchronously
//! from branch and condition registration when an expression cannot be turned
//! into a pattern, so script authors see bad conditions at setup time.
//! [`BanterError`] covers everything that can go wrong while a message is in
//! flight; the engine logs and recovers from most of these locally (a failing
//! matcher is an unmatched branch, a failing middleware piece fails its stage)
//! rather than letting one branch take down the pipeline.

use thiserror::Error;

/// The main error type for banter operations.
#[derive(Debug, Error)]
pub enum BanterError {
    /// A condition or expression failed to compile at registration time.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// A custom matcher returned an error while testing a branch.
    #[error("matcher failed for branch '{branch}': {reason}")]
    Matcher {
        /// The id of the branch whose matcher failed.
        branch: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A middleware piece or terminal step failed.
    #[error("middleware failed in stage '{stage}': {reason}")]
    Middleware {
        /// The stage whose pipeline failed.
        stage: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A branch referenced a bit id that was never set up.
    #[error("unknown bit '{id}'")]
    UnknownBit {
        /// The bit id that could not be resolved.
        id: String,
    },

    /// A dialogue hook (open, close or timeout) failed.
    #[error("dialogue hook '{hook}' failed: {reason}")]
    Hook {
        /// Which hook failed.
        hook: String,
        /// The reason for the failure.
        reason: String,
    },

    /// An adapter operation failed.
    #[error("adapter '{adapter}' failed: {reason}")]
    Adapter {
        /// The adapter that failed.
        adapter: String,
        /// The reason for the failure.
        reason: String,
    },

    /// An operation required an adapter that is not configured.
    #[error("no {kind} adapter configured")]
    NoAdapter {
        /// The kind of adapter that was missing.
        kind: String,
    },

    /// An I/O error occurred (config file loading).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// State serialization failed while persisting to storage.
    #[error("state serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while compiling conditions into patterns.
///
/// These surface synchronously from registration APIs, never mid-dispatch.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A string regex literal (`/pattern/flags`) could not be converted.
    #[error("cannot convert '{input}' to a pattern: {reason}")]
    Conversion {
        /// The input that failed to convert.
        input: String,
        /// The reason it failed.
        reason: String,
    },

    /// A criteria map used an operator key the compiler does not know.
    #[error("unknown condition operator '{key}'")]
    UnknownOperator {
        /// The operator key that was not recognized.
        key: String,
    },

    /// An operator was given no values to match.
    #[error("condition operator '{key}' has no values")]
    EmptyValue {
        /// The operator key with the empty value list.
        key: String,
    },

    /// A range operator value was not of the form `N-M`.
    #[error("invalid range '{input}': {reason}")]
    Range {
        /// The range string that failed to parse.
        input: String,
        /// The reason it failed.
        reason: String,
    },

    /// The merged pattern was rejected by the regex engine.
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for banter operations.
pub type Result<T> = std::result::Result<T, BanterError>;

impl BanterError {
    /// Create a matcher error for the given branch.
    pub fn matcher(branch: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Matcher {
            branch: branch.into(),
            reason: reason.into(),
        }
    }

    /// Create a middleware error for the given stage.
    pub fn middleware(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Middleware {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown bit error.
    pub fn unknown_bit(id: impl Into<String>) -> Self {
        Self::UnknownBit { id: id.into() }
    }

    /// Create a dialogue hook error.
    pub fn hook(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            reason: reason.into(),
        }
    }

    /// Create an adapter error.
    pub fn adapter(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Adapter {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing adapter error.
    pub fn no_adapter(kind: impl Into<String>) -> Self {
        Self::NoAdapter { kind: kind.into() }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable mid-dispatch.
    ///
    /// Matcher, middleware, bit and hook failures are logged and absorbed by
    /// the stage that saw them; everything else propagates to the caller.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Matcher { .. }
                | Self::Middleware { .. }
                | Self::UnknownBit { .. }
                | Self::Hook { .. }
        )
    }
}

impl CompileError {
    /// Create a conversion error.
    pub fn conversion(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown operator error.
    pub fn unknown_operator(key: impl Into<String>) -> Self {
        Self::UnknownOperator { key: key.into() }
    }

    /// Create an empty value error.
    pub fn empty_value(key: impl Into<String>) -> Self {
        Self::EmptyValue { key: key.into() }
    }

    /// Create a range error.
    pub fn range(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Range {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
