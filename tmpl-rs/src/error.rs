//! Error types shared by the tag language and the render engine.
//!
//! Every failure the engine can produce is a variant of [`Error`].  Faults
//! raised while a bound function runs are wrapped in
//! [`Error::FunctionFailed`] so callers can tell them apart from problems in
//! the tag text itself.

use std::fmt;

use thiserror::Error;

use crate::script::function::{Arity, ParamKind};

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while compiling, evaluating or rendering.
#[derive(Debug, Error)]
pub enum Error {
    // ── Resolution ───────────────────────────────────────────────────────────
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("{0} is not a function")]
    NotAFunction(String),

    #[error("invalid function call {text:?}: {reason}")]
    InvalidFunctionSyntax { text: String, reason: String },

    #[error("invalid argument count for function {name:?}: expected {expected}, got {got}")]
    InvalidArgumentCount {
        name: String,
        expected: Arity,
        got: usize,
    },

    #[error("{name}: {fault}")]
    FunctionFailed { name: String, fault: Fault },

    // ── Template structure ───────────────────────────────────────────────────
    #[error("cannot find end tag {end_tag:?} after offset {offset}")]
    UnterminatedTag { end_tag: String, offset: usize },

    #[error("{0} tag cannot be empty")]
    EmptyDelimiter(&'static str),

    // ── Expression syntax ────────────────────────────────────────────────────
    #[error("mismatched parentheses")]
    MismatchedParentheses,

    #[error("unclosed function call")]
    UnclosedFunctionCall,

    #[error("unterminated string")]
    UnterminatedString,

    #[error("invalid number format: {0}")]
    InvalidNumberFormat(String),

    #[error("unexpected character: {ch} at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },

    // ── Evaluation ───────────────────────────────────────────────────────────
    #[error("not enough operands for operator {0}")]
    NotEnoughOperands(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("operator {op} requires numeric operands")]
    NonNumericOperand { op: &'static str },

    #[error("operator {op} cannot take a function as an operand")]
    FunctionOperand { op: &'static str },

    #[error("exponent must be a non-negative integer, got {0}")]
    InvalidExponent(String),

    #[error("invalid expression: expected 1 result, got {0}")]
    InvalidExpressionResult(usize),

    #[error("cannot convert {from} to {to}")]
    TypeConversion { from: String, to: &'static str },

    #[error("nesting exceeds the maximum depth of {0}")]
    RecursionLimit(usize),

    // ── Output ───────────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidFunctionSyntax`].
    pub(crate) fn syntax(text: &str, reason: impl Into<String>) -> Self {
        Error::InvalidFunctionSyntax {
            text: text.to_owned(),
            reason: reason.into(),
        }
    }

    /// `true` for a plain variable miss; strict rendering lets these through.
    pub fn is_variable_not_found(&self) -> bool {
        matches!(self, Error::VariableNotFound(_))
    }
}

/// Why a bound function did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The callee unwound; the payload message is kept.
    Panicked(String),
    /// The callee returned an error value.
    Returned(String),
    /// An argument could not be adapted to the declared parameter kind.
    InvalidArgumentType {
        index: usize,
        expected: ParamKind,
        found: &'static str,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Panicked(msg) => write!(f, "panicked: {msg}"),
            Fault::Returned(msg) => f.write_str(msg),
            Fault::InvalidArgumentType {
                index,
                expected,
                found,
            } => write!(
                f,
                "invalid argument type: argument {} expects {expected}, got {found}",
                index + 1
            ),
        }
    }
}

/// A strict render that stopped early.
///
/// `output` holds everything rendered before the failing tag.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct RenderError {
    pub output: String,
    #[source]
    pub source: Error,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
