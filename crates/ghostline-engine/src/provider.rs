//! Model provider abstraction
//!
//! A [`ModelProvider`] turns a rendered prompt into a stream of text
//! deltas. The engine never talks to a transport directly; everything
//! downstream of the coordinator goes through this trait, which also makes
//! scripted providers trivial to write in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::prompt::CompletionPrompt;

/// One incremental chunk of model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDelta {
    pub text: String,
}

impl StreamDelta {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Stream of deltas produced by a provider
pub type DeltaStream = BoxStream<'static, Result<StreamDelta, EngineError>>;

/// Per-stream generation settings
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub max_output_tokens: usize,
    pub stop_sequences: Vec<String>,
}

/// A completion backend capable of streaming deltas
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable identifier for registry lookup and logging
    fn id(&self) -> &str;

    /// Open a delta stream for the prompt
    ///
    /// The provider should stop producing promptly once `cancel` fires;
    /// the coordinator stops consuming either way.
    async fn stream_completion(
        &self,
        prompt: CompletionPrompt,
        options: &StreamOptions,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, EngineError>;

    /// Token count used for output budget enforcement
    fn count_tokens(&self, content: &str) -> usize {
        content.len().div_ceil(4).max(1)
    }
}

impl std::fmt::Debug for dyn ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("id", &self.id())
            .finish()
    }
}

type ProviderConstructor = Arc<dyn Fn() -> Arc<dyn ModelProvider> + Send + Sync>;

/// Registry of provider constructors keyed by identifier
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn ModelProvider> + Send + Sync + 'static,
    {
        self.constructors.insert(id.into(), Arc::new(constructor));
    }

    pub fn build(&self, id: &str) -> Result<Arc<dyn ModelProvider>, EngineError> {
        self.constructors
            .get(id)
            .map(|constructor| constructor())
            .ok_or_else(|| EngineError::ProviderNotFound(id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constructors.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
