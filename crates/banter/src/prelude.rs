//! Convenient re-exports for common banter usage.
//!
//! This module provides a single import to access the most commonly used
//! types from banter.
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
//!         "hello",
//!         Action::func(|state| async move {
//!             state.lock().await.respond(["hi!"]);
//!             Ok(())
//!         }),
//!         BranchOptions::new(),
//!     )?;
//!     bot.receive(Message::text(User::new("u1"), "hello")).await;
//!     Ok(())
//! }
//! ```

// The bot facade
pub use crate::bot::{Bot, BotBuilder};

// Error handling
pub use crate::error::{BanterError, CompileError, Result};

// Messages and addressing
pub use crate::envelope::{Envelope, Payload};
pub use crate::message::Message;
pub use crate::user::{Room, User};

// Conditions and branches
pub use crate::branch::{Action, BranchMatch, ServerCriteria};
pub use crate::condition::{Captured, ConditionMatch, ConditionSet, Criteria};
pub use crate::path::{BranchOptions, Path};

// NLU criteria and results
pub use crate::nlu::{NluCriteriaSet, NluCriterion, NluOperator, NluResult, NluResults};

// Middleware, state and stages
pub use crate::middleware::Flow;
pub use crate::state::{SharedState, State};
pub use crate::thought::Stage;

// Dialogues
pub use crate::dialogue::{Audience, Dialogue};

// Bits
pub use crate::bit::Bit;

// Adapter seams and in-process adapters
pub use crate::adapter::memory::{CannedNlu, MemoryMessenger, MemoryStorage};
pub use crate::adapter::{MessageAdapter, NluAdapter, StorageAdapter};

// Configuration
pub use crate::config::BotConfig;
