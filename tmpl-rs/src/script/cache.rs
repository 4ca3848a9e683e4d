//! Compiled-expression cache.
//!
//! Maps raw expression text to its postfix token sequence.  Entries are never
//! evicted, so the cache grows with the number of distinct expressions seen.
//! Lookups take the shared lock; inserts take the exclusive lock.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::Result;

use super::expr::to_postfix;
use super::lexer::{tokenize, Token};

/// Postfix tokens ready for evaluation.
pub type Compiled = Arc<[Token]>;

#[derive(Default)]
pub struct ExpressionCache {
    entries: RwLock<FxHashMap<String, Compiled>>,
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("len", &self.len())
            .finish()
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by every default [`Engine`](crate::Engine).
    pub fn global() -> Arc<ExpressionCache> {
        static GLOBAL: OnceLock<Arc<ExpressionCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ExpressionCache::new())))
    }

    pub fn get(&self, text: &str) -> Option<Compiled> {
        self.entries.read().get(text).cloned()
    }

    /// Return the compiled form of `text`, compiling and inserting it on a
    /// miss.  Compile errors are not cached.
    pub fn get_or_compile(&self, text: &str) -> Result<Compiled> {
        if let Some(hit) = self.get(text) {
            tracing::trace!(expr = text, "expression cache hit");
            return Ok(hit);
        }
        let compiled = compile(text)?;
        let mut entries = self.entries.write();
        // Another thread may have raced us here; keep whichever landed first.
        let entry = entries
            .entry(text.to_owned())
            .or_insert_with(|| Arc::clone(&compiled));
        tracing::debug!(expr = text, tokens = entry.len(), "expression cached");
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tokenize and reorder `text` without touching any cache.
pub fn compile(text: &str) -> Result<Compiled> {
    Ok(to_postfix(tokenize(text)?)?.into())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
