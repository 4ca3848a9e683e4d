//! Stack growth for recursive evaluation.
//!
//! Nested calls and sub-expressions recurse through the parser and the
//! evaluator.  The depth ceiling in [`Config`](crate::Config) bounds the
//! recursion; this keeps each level from running out of native stack first.

/// Stay this far from the end of the current stack segment.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, switching to a fresh stack segment if the current one is low.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
