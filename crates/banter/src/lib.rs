//! banter: a conversational dispatch engine
//!
//! This crate routes chat messages through an ordered thought process:
//! compiled text conditions, NLU criteria, server payload criteria and
//! catch-all rules, each paired with a callback and wrapped in per-stage
//! middleware. Dialogues engage an audience for isolated follow-ups with a
//! timeout clock, and adapters connect the engine to chat platforms,
//! storage and NLU providers.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime
//! - **Expression compiler** turning keyed criteria into anchored regex
//! - **Branch variants** for text, NLU, server payloads and catch-alls
//! - **Per-stage middleware** that can interrupt or enrich processing
//! - **Dialogues** scoping follow-ups to a user, a room, or one user in
//!   one room
//! - **Adapter seams** for messaging, storage and NLU providers
//!
//! # Example
//!
//! ```ignore
//! use banter::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bot = Bot::builder().name("brains").build();
//!     bot.path().text(
//!         Criteria::new().contains("pizza"),
//!         Action::func(|state| async move {
//!             state.lock().await.respond(["pizza! now we're talking"]);
//!             Ok(())
//!         }),
//!         BranchOptions::new(),
//!     )?;
//!     bot.receive(Message::text(User::new("u1"), "one pizza please")).await;
//!     Ok(())
//! }
//! ```

// Core types
pub mod condition;
pub mod config;
pub mod envelope;
pub mod error;
pub mod message;
pub mod nlu;
pub mod prelude;
pub mod user;

// Engine modules
pub mod bit;
pub mod bot;
pub mod branch;
pub mod dialogue;
pub mod middleware;
pub mod path;
pub mod state;
pub mod thought;

// Adapter seams
pub mod adapter;

pub use adapter::{MessageAdapter, NluAdapter, StorageAdapter};
pub use bit::{Bit, Bits};
pub use bot::{Bot, BotBuilder};
pub use branch::{
    Action, Branch, BranchMatch, BranchMatcher, CustomMatcher, ServerCriteria, custom_matcher,
};
pub use condition::{
    Captured, CompileOptions, Condition, ConditionMatch, ConditionSet, Criteria, Expression,
    Operator, TextMatch, escape, range_pattern,
};
pub use config::{BotConfig, DialogueConfig, Identity};
pub use dialogue::{Audience, Dialogue, Dialogues};
pub use envelope::{Envelope, Payload};
pub use error::{BanterError, CompileError, Result};
pub use message::Message;
pub use middleware::{Callback, Completion, Flow, Middleware, Middlewares, Piece, callback, piece};
pub use nlu::{NluCriteriaSet, NluCriterion, NluOperator, NluResult, NluResultSet, NluResults};
pub use path::{BranchOptions, Path};
pub use state::{MatchedBranch, SharedState, State};
pub use thought::{STATES_COLLECTION, Stage, Thoughts};
pub use user::{Room, User};
