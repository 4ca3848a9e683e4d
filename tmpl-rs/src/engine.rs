//! The evaluation engine: configuration plus a shared expression cache.

use std::sync::Arc;

use crate::bindings::Bindings;
use crate::config::Config;
use crate::error::Result;
use crate::eval::FromValue;
use crate::script::{EvalContext, ExpressionCache, Value};
use crate::template::Template;

/// Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
    cache: Arc<ExpressionCache>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(Config::default())
    }
}

impl Engine {
    /// An engine that compiles through the process-wide cache.
    pub fn new(config: Config) -> Self {
        Self::with_cache(config, ExpressionCache::global())
    }

    /// An engine with its own cache.
    pub fn with_cache(config: Config, cache: Arc<ExpressionCache>) -> Self {
        Engine { config, cache }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ExpressionCache> {
        &self.cache
    }

    /// An evaluation context over `bindings` honouring this engine's config.
    pub fn context<'a>(&'a self, bindings: &'a Bindings) -> EvalContext<'a> {
        let cache = self.config.cache_expressions.then(|| &*self.cache);
        EvalContext::new(bindings, cache, self.config.max_depth)
    }

    /// Evaluate one tag's worth of text.
    pub fn evaluate(&self, text: &str, bindings: &Bindings) -> Result<Value> {
        self.context(bindings).evaluate_tag(text)
    }

    /// Evaluate and convert to `T`.
    pub fn eval<T: FromValue>(&self, text: &str, bindings: &Bindings) -> Result<T> {
        T::from_value(self.evaluate(text, bindings)?)
    }

    /// Compile `text` with this engine's delimiters.
    pub fn compile(&self, text: impl Into<String>) -> Result<Template> {
        Template::with_engine(text, self.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
