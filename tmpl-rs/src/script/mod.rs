//! The tag-content language.
//!
//! A tag is classified ([`classify`]) and then resolved along one of three
//! paths:
//!
//! - **call**: parsed into a [`Call`] tree and run by [`dispatch::execute`]
//! - **expression**: tokenized, reordered to postfix (cached in an
//!   [`ExpressionCache`]) and run on a value stack
//! - **variable**: looked up by exact name
//!
//! # Quick start
//!
//! ```rust
//! use tmpl::script::EvalContext;
//! use tmpl::{Bindings, Value};
//!
//! let bindings = Bindings::new().with("x", 6);
//! let ctx = EvalContext::new(&bindings, None, 64);
//! assert_eq!(ctx.evaluate_tag("x * 7").unwrap(), Value::Float(42.0));
//! ```

pub mod cache;
pub mod call;
pub mod classify;
pub mod dispatch;
pub mod expr;
pub mod function;
pub mod lexer;
pub mod value;

pub use cache::ExpressionCache;
pub use call::{parse_call, Argument, Call};
pub use classify::{classify, TagKind};
pub use function::{Arity, Function, ParamKind};
pub use value::Value;

use crate::bindings::Bindings;
use crate::error::{Error, Result};
use crate::stack::ensure_sufficient_stack;

use classify::is_variable_shaped;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Everything a single evaluation needs: the bindings to read, the cache to
/// compile through (`None` compiles every time), and the nesting ceiling.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub bindings: &'a Bindings,
    pub cache: Option<&'a ExpressionCache>,
    pub max_depth: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(bindings: &'a Bindings, cache: Option<&'a ExpressionCache>, max_depth: usize) -> Self {
        EvalContext {
            bindings,
            cache,
            max_depth,
        }
    }

    /// Step one level deeper, failing past the ceiling.
    pub(crate) fn descend(&self, depth: usize) -> Result<usize> {
        if depth >= self.max_depth {
            Err(Error::RecursionLimit(self.max_depth))
        } else {
            Ok(depth + 1)
        }
    }

    /// Resolve a whole tag: classify, then run the matching path.
    ///
    /// Plain variable tags use the untrimmed text and always fail on a miss.
    pub fn evaluate_tag(&self, tag: &str) -> Result<Value> {
        self.evaluate_as(tag, classify(tag))
    }

    /// Resolve a tag already classified as `kind`.
    pub fn evaluate_as(&self, tag: &str, kind: TagKind) -> Result<Value> {
        match kind {
            TagKind::Call => self.evaluate_call(tag, 0),
            TagKind::Expression => self.evaluate_expression(tag.trim(), 0),
            TagKind::Variable => self
                .bindings
                .value(tag)
                .cloned()
                .ok_or_else(|| Error::VariableNotFound(tag.to_owned())),
        }
    }

    /// Parse and run call text.
    pub fn evaluate_call(&self, text: &str, depth: usize) -> Result<Value> {
        let call = parse_call(text, self.max_depth.saturating_sub(depth))?;
        ensure_sufficient_stack(|| dispatch::execute(&call, self, depth))
    }

    /// Compile (through the cache when present) and run expression text.
    pub fn evaluate_expression(&self, text: &str, depth: usize) -> Result<Value> {
        let depth = self.descend(depth)?;
        let postfix = match self.cache {
            Some(cache) => cache.get_or_compile(text)?,
            None => cache::compile(text)?,
        };
        expr::eval_postfix(&postfix, self, depth)
    }

    /// Look up a bareword or identifier.
    ///
    /// A miss is an error only for variable-shaped names; anything else
    /// stands for its own text.
    pub fn lookup(&self, name: &str) -> Result<Value> {
        match self.bindings.value(name) {
            Some(v) => Ok(v.clone()),
            None if is_variable_shaped(name) => Err(Error::VariableNotFound(name.to_owned())),
            None => Ok(Value::Text(name.to_owned())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
