//! Stage middleware pipelines.
//!
//! Every pipeline stage owns a chain of interceptor pieces. A piece sees the
//! shared state and returns [`Flow::Continue`] to pass control on or
//! [`Flow::Stop`] to end the stage without running its terminal action. The
//! two exits stay distinct in the result: [`Completion::Completed`] means
//! the terminal ran, [`Completion::Stopped`] means a piece cut it off.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{BanterError, Result};
use crate::state::SharedState;
use crate::thought::Stage;

/// A stored middleware piece.
pub type Piece = Arc<dyn Fn(SharedState) -> BoxFuture<'static, Result<Flow>> + Send + Sync>;

/// A stored callback, as held by branches, bits and dialogue hooks.
pub type Callback = Arc<dyn Fn(SharedState) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Box an async closure into a [`Piece`].
pub fn piece<F, Fut>(f: F) -> Piece
where
    F: Fn(SharedState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow>> + Send + 'static,
{
    Arc::new(move |state| Box::pin(f(state)))
}

/// Box an async closure into a [`Callback`].
pub fn callback<F, Fut>(f: F) -> Callback
where
    F: Fn(SharedState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |state| Box::pin(f(state)))
}

/// A middleware piece's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Pass control to the next piece, or the terminal action.
    Continue,
    /// End the stage here; the terminal action does not run.
    Stop,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every piece continued and the terminal action ran.
    Completed,
    /// A piece stopped the pipeline before the terminal action.
    Stopped,
}

/// One stage's ordered chain of pieces.
#[derive(Clone)]
pub struct Middleware {
    stage: Stage,
    pieces: Vec<Piece>,
}

impl Middleware {
    /// Create an empty pipeline for a stage.
    #[must_use]
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            pieces: Vec::new(),
        }
    }

    /// The stage this pipeline belongs to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Append a piece to the chain.
    pub fn register(&mut self, piece: Piece) -> &mut Self {
        self.pieces.push(piece);
        self
    }

    /// Number of registered pieces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// True when no pieces are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Run the chain, then the terminal action if every piece continued.
    ///
    /// A piece or terminal error aborts the stage and is reported with the
    /// stage name attached; [`Flow::Stop`] is not an error.
    pub async fn execute<F, Fut>(&self, state: &SharedState, terminal: F) -> Result<Completion>
    where
        F: FnOnce(SharedState) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        for piece in &self.pieces {
            match piece(Arc::clone(state)).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(Completion::Stopped),
                Err(error) => {
                    return Err(BanterError::middleware(self.stage.key(), error.to_string()));
                }
            }
        }
        terminal(Arc::clone(state))
            .await
            .map_err(|error| BanterError::middleware(self.stage.key(), error.to_string()))?;
        Ok(Completion::Completed)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("stage", &self.stage)
            .field("pieces", &self.pieces.len())
            .finish()
    }
}

/// Per-stage middleware registry.
#[derive(Debug, Clone, Default)]
pub struct Middlewares {
    stages: HashMap<Stage, Middleware>,
}

impl Middlewares {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a piece to a stage's pipeline.
    pub fn register(&mut self, stage: Stage, piece: Piece) -> &mut Self {
        self.stages
            .entry(stage)
            .or_insert_with(|| Middleware::new(stage))
            .register(piece);
        self
    }

    /// The pipeline for a stage; empty if nothing was registered.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Middleware {
        self.stages
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| Middleware::new(stage))
    }
}
