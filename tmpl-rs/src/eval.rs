//! Typed single-expression evaluation.
//!
//! [`eval`] classifies, parses and evaluates one string against a set of
//! bindings, then converts the result with [`FromValue`]:
//!
//! ```rust
//! use tmpl::{eval, Bindings};
//!
//! let b = Bindings::new().with("age", 70).with("has_id", true);
//! assert!(eval::<bool>("age >= 18 && has_id", &b).unwrap());
//! assert_eq!(eval::<i64>("7 % 4", &b).unwrap(), 3);
//! ```

use crate::bindings::Bindings;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::script::value::Value;

/// Evaluate `text` with the default engine and convert the result to `T`.
pub fn eval<T: FromValue>(text: &str, bindings: &Bindings) -> Result<T> {
    Engine::default().eval(text, bindings)
}

// ── Conversion ────────────────────────────────────────────────────────────────

/// Conversion from an evaluation result.
///
/// Floats truncate toward zero when an integer is wanted, text parses as
/// base-10, booleans become 0 or 1.  A `bool` target uses truthiness and
/// never fails.  Anything else is [`Error::TypeConversion`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn conversion_error(value: &Value, to: &'static str) -> Error {
    let from = match value {
        Value::Text(s) => format!("text {s:?}"),
        Value::Int(n) => format!("integer {n}"),
        Value::Float(x) => format!("float {}", crate::script::value::format_float(*x)),
        other => other.type_name().to_owned(),
    };
    Error::TypeConversion { from, to }
}

fn to_i64(value: &Value, to: &'static str) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        // `as` saturates; reject anything that would be clamped.
        Value::Float(x) if x.is_finite() && *x >= i64::MIN as f64 && *x < i64::MAX as f64 => {
            Ok(*x as i64)
        }
        Value::Text(s) => s.parse::<i64>().map_err(|_| conversion_error(value, to)),
        Value::Bool(b) => Ok(i64::from(*b)),
        _ => Err(conversion_error(value, to)),
    }
}

fn to_f64(value: &Value, to: &'static str) -> Result<f64> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(x) => Ok(*x),
        Value::Text(s) => s.parse::<f64>().map_err(|_| conversion_error(value, to)),
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        _ => Err(conversion_error(value, to)),
    }
}

macro_rules! int_from_value {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: Value) -> Result<Self> {
                let n = to_i64(&value, stringify!($t))?;
                <$t>::try_from(n).map_err(|_| conversion_error(&value, stringify!($t)))
            }
        }
    )*};
}

int_from_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        to_f64(&value, "f64")
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        to_f64(&value, "f32").map(|x| x as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value.is_truthy())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Func(_) => Err(conversion_error(&value, "String")),
            other => Ok(other.to_text().into_owned()),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
