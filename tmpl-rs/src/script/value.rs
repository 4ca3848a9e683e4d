//! Runtime value type for the tag language.
//!
//! Values are a closed set of scalars plus the invocable variant used for
//! bound functions.  Operators never inspect a value directly; they go
//! through the coercions defined here ([`Value::is_numeric`],
//! [`Value::to_number`], [`Value::to_text`], [`Value::is_truthy`]).

use std::borrow::Cow;
use std::fmt;

use super::function::Function;

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Bytes(Vec<u8>),
    #[default]
    Absent,
    Func(Function),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Absent, Value::Absent) => true,
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Absent => Ok(()),
            Value::Func(_) => f.write_str("<function>"),
        }
    }
}

impl Value {
    /// Only integers and floats count as numbers; numeric-looking text does not.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Coerce to `f64`.  Text parses if it can, booleans map to 0/1, anything
    /// else is 0.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(x) => *x,
            Value::Text(s) => s.parse().unwrap_or(0.0),
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Bytes(_) | Value::Absent | Value::Func(_) => 0.0,
        }
    }

    /// Default text form, borrowing when the value already is text.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Text(s) => Cow::Borrowed(s),
            Value::Bytes(b) => String::from_utf8_lossy(b),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Truthiness: booleans are themselves, numbers are true when nonzero,
    /// text is true unless empty, `"0"` or `"false"`.  Everything else is false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Text(s) => !s.is_empty() && s != "0" && s != "false",
            Value::Bytes(_) | Value::Absent | Value::Func(_) => false,
        }
    }

    /// Bytes to write when this value fills a tag.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Value::Bytes(b) => Cow::Borrowed(b),
            Value::Text(s) => Cow::Borrowed(s.as_bytes()),
            Value::Absent => Cow::Borrowed(&[]),
            other => Cow::Owned(other.to_string().into_bytes()),
        }
    }

    /// Name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Bytes(_) => "bytes",
            Value::Absent => "absent",
            Value::Func(_) => "function",
        }
    }
}

/// Format a float the way a tag renders it: the shortest digits that
/// round-trip, with exponent form once the decimal exponent is below -4 or
/// at least 6 (`1e+06`, `1.5e-07`).  Integral values drop the fraction.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "+Inf".into() } else { "-Inf".into() };
    }
    if x == 0.0 {
        return format!("{x}");
    }
    // `{:e}` yields the shortest mantissa, e.g. "1e6" / "1.5e-7".
    let sci = format!("{x:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        return format!("{x}");
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

// ── Conversions ──────────────────────────────────────────────────────────────

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Func(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Absent, Into::into)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
