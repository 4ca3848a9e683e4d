//! Bound functions (invocables).
//!
//! A [`Function`] carries its declared parameter kinds, an optional variadic
//! tail kind, and a body that receives already-adapted [`Value`]s.  Callers
//! normally build one from an ordinary Rust closure:
//!
//! ```rust
//! use tmpl::Function;
//!
//! let add = Function::from_fn(|a: i64, b: i64| a + b);
//! let join = Function::variadic(|sep: String, parts: Vec<String>| parts.join(&sep));
//! let parse = Function::from_fn(|s: String| s.parse::<i64>().map_err(|e| e.to_string()));
//! # let _ = (add, join, parse);
//! ```
//!
//! Return shapes map onto results the same way everywhere: `()` yields
//! [`Value::Absent`], a scalar yields itself, and `Result<T, E>` yields either
//! `T` or a [`Fault::Returned`] carrying `E`'s display text.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{Error, Fault};

use super::value::Value;

// ── Parameter shapes ─────────────────────────────────────────────────────────

/// The kind of value a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Text,
    Bool,
    Bytes,
    Any,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamKind::Int => "integer",
            ParamKind::Float => "float",
            ParamKind::Text => "text",
            ParamKind::Bool => "boolean",
            ParamKind::Bytes => "bytes",
            ParamKind::Any => "any value",
        })
    }
}

impl ParamKind {
    /// Convert `value` into the shape this parameter expects.
    ///
    /// Integers widen to floats, integral floats narrow to integers, text and
    /// UTF-8 bytes interchange.  Nothing else is converted.
    pub fn adapt(self, value: Value, index: usize) -> Result<Value, Fault> {
        let mismatch = |v: &Value| Fault::InvalidArgumentType {
            index,
            expected: self,
            found: v.type_name(),
        };
        match (self, value) {
            (ParamKind::Any, v) => Ok(v),
            (ParamKind::Int, Value::Int(n)) => Ok(Value::Int(n)),
            (ParamKind::Int, Value::Float(x))
                if x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 =>
            {
                Ok(Value::Int(x as i64))
            }
            (ParamKind::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
            (ParamKind::Float, Value::Float(x)) => Ok(Value::Float(x)),
            (ParamKind::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (ParamKind::Text, Value::Bytes(b)) => match String::from_utf8(b) {
                Ok(s) => Ok(Value::Text(s)),
                Err(e) => Err(mismatch(&Value::Bytes(e.into_bytes()))),
            },
            (ParamKind::Bytes, Value::Bytes(b)) => Ok(Value::Bytes(b)),
            (ParamKind::Bytes, Value::Text(s)) => Ok(Value::Bytes(s.into_bytes())),
            (ParamKind::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (_, other) => Err(mismatch(&other)),
        }
    }
}

/// How many arguments a function takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

// ── Function ─────────────────────────────────────────────────────────────────

type Body = dyn Fn(Vec<Value>) -> Result<Value, Fault> + Send + Sync;

struct Inner {
    params: Vec<ParamKind>,
    variadic: Option<ParamKind>,
    body: Box<Body>,
}

/// A caller-bound function.  Cloning shares the body.
#[derive(Clone)]
pub struct Function {
    inner: Arc<Inner>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.inner.params)
            .field("variadic", &self.inner.variadic)
            .finish()
    }
}

impl Function {
    /// Build a function from a raw body.  Arguments reach `body` already
    /// adapted to `params` (and `variadic` for the tail).
    pub fn new<F, R>(params: Vec<ParamKind>, variadic: Option<ParamKind>, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> R + Send + Sync + 'static,
        R: IntoReturn,
    {
        Self::from_body(params, variadic, move |args| {
            body(args).into_return().map_err(Fault::Returned)
        })
    }

    /// Build a fixed-arity function from a typed closure.
    pub fn from_fn<Args, F: IntoFunction<Args>>(f: F) -> Self {
        f.into_function()
    }

    /// Build a variadic function from a typed closure whose last parameter
    /// is a `Vec<T>`.
    pub fn variadic<Args, F: IntoVariadic<Args>>(f: F) -> Self {
        f.into_variadic()
    }

    fn from_body<F>(params: Vec<ParamKind>, variadic: Option<ParamKind>, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Function {
            inner: Arc::new(Inner {
                params,
                variadic,
                body: Box::new(body),
            }),
        }
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.inner.params
    }

    pub fn variadic_kind(&self) -> Option<ParamKind> {
        self.inner.variadic
    }

    pub fn arity(&self) -> Arity {
        match self.inner.variadic {
            Some(_) => Arity::AtLeast(self.inner.params.len()),
            None => Arity::Fixed(self.inner.params.len()),
        }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Adapt `args` and run the body inside an unwind boundary.
    ///
    /// The arity must already have been checked.  Any panic, argument
    /// mismatch, or returned error comes back as [`Error::FunctionFailed`].
    pub(crate) fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let inner = &self.inner;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let adapted = args
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    let kind = inner
                        .params
                        .get(i)
                        .copied()
                        .or(inner.variadic)
                        .unwrap_or(ParamKind::Any);
                    kind.adapt(v, i)
                })
                .collect::<Result<Vec<_>, _>>()?;
            (inner.body)(adapted)
        }));
        let fault = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(fault)) => fault,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::warn!(function = name, message = %msg, "contained panic in bound function");
                Fault::Panicked(msg)
            }
        };
        Err(Error::FunctionFailed {
            name: name.to_owned(),
            fault,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

// ── Argument extraction ──────────────────────────────────────────────────────

/// A Rust type a bound closure can take as a parameter.
pub trait FromArg: Sized {
    const KIND: ParamKind;

    fn from_arg(value: Value, index: usize) -> Result<Self, Fault>;
}

fn wrong_type(index: usize, expected: ParamKind, value: &Value) -> Fault {
    Fault::InvalidArgumentType {
        index,
        expected,
        found: value.type_name(),
    }
}

macro_rules! int_from_arg {
    ($($t:ty),*) => {$(
        impl FromArg for $t {
            const KIND: ParamKind = ParamKind::Int;

            fn from_arg(value: Value, index: usize) -> Result<Self, Fault> {
                match value {
                    Value::Int(n) => <$t>::try_from(n).map_err(|_| Fault::InvalidArgumentType {
                        index,
                        expected: ParamKind::Int,
                        found: "out-of-range integer",
                    }),
                    other => Err(wrong_type(index, ParamKind::Int, &other)),
                }
            }
        }
    )*};
}

int_from_arg!(i64, i32, u32, u64, usize);

impl FromArg for f64 {
    const KIND: ParamKind = ParamKind::Float;

    fn from_arg(value: Value, index: usize) -> Result<Self, Fault> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(n) => Ok(n as f64),
            other => Err(wrong_type(index, ParamKind::Float, &other)),
        }
    }
}

impl FromArg for String {
    const KIND: ParamKind = ParamKind::Text;

    fn from_arg(value: Value, index: usize) -> Result<Self, Fault> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(wrong_type(index, ParamKind::Text, &other)),
        }
    }
}

impl FromArg for bool {
    const KIND: ParamKind = ParamKind::Bool;

    fn from_arg(value: Value, index: usize) -> Result<Self, Fault> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(wrong_type(index, ParamKind::Bool, &other)),
        }
    }
}

impl FromArg for Vec<u8> {
    const KIND: ParamKind = ParamKind::Bytes;

    fn from_arg(value: Value, index: usize) -> Result<Self, Fault> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(wrong_type(index, ParamKind::Bytes, &other)),
        }
    }
}

impl FromArg for Value {
    const KIND: ParamKind = ParamKind::Any;

    fn from_arg(value: Value, _index: usize) -> Result<Self, Fault> {
        Ok(value)
    }
}

fn next_arg<T: FromArg>(
    args: &mut impl Iterator<Item = (usize, Value)>,
    index: usize,
) -> Result<T, Fault> {
    match args.next() {
        Some((i, v)) => T::from_arg(v, i),
        None => Err(Fault::InvalidArgumentType {
            index,
            expected: T::KIND,
            found: "nothing",
        }),
    }
}

// ── Return shapes ────────────────────────────────────────────────────────────

/// A Rust type a bound closure can return.
pub trait IntoReturn {
    fn into_return(self) -> Result<Value, String>;
}

impl IntoReturn for () {
    fn into_return(self) -> Result<Value, String> {
        Ok(Value::Absent)
    }
}

macro_rules! scalar_return {
    ($($t:ty),*) => {$(
        impl IntoReturn for $t {
            fn into_return(self) -> Result<Value, String> {
                Ok(Value::from(self))
            }
        }
    )*};
}

scalar_return!(i64, i32, u32, usize, f64, f32, String, &str, bool, Vec<u8>, Value);

impl<T: Into<Value>> IntoReturn for Option<T> {
    fn into_return(self) -> Result<Value, String> {
        Ok(Value::from(self))
    }
}

impl<T: IntoReturn, E: fmt::Display> IntoReturn for Result<T, E> {
    fn into_return(self) -> Result<Value, String> {
        match self {
            Ok(v) => v.into_return(),
            Err(e) => Err(e.to_string()),
        }
    }
}

// ── Closure adapters ─────────────────────────────────────────────────────────

/// Closures usable with [`Function::from_fn`].
pub trait IntoFunction<Args> {
    fn into_function(self) -> Function;
}

/// Closures usable with [`Function::variadic`].
pub trait IntoVariadic<Args> {
    fn into_variadic(self) -> Function;
}

macro_rules! impl_into_function {
    ($($arg:ident),*) => {
        impl<Func, Ret, $($arg,)*> IntoFunction<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: IntoReturn,
            $($arg: FromArg,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn into_function(self) -> Function {
                Function::from_body(vec![$($arg::KIND),*], None, move |args: Vec<Value>| {
                    let mut args = args.into_iter().enumerate();
                    let mut index = 0usize;
                    $(
                        let $arg: $arg = next_arg(&mut args, index)?;
                        index += 1;
                    )*
                    (self)($($arg),*).into_return().map_err(Fault::Returned)
                })
            }
        }

        impl<Func, Ret, Rest, $($arg,)*> IntoVariadic<($($arg,)* Vec<Rest>,)> for Func
        where
            Func: Fn($($arg,)* Vec<Rest>) -> Ret + Send + Sync + 'static,
            Ret: IntoReturn,
            Rest: FromArg,
            $($arg: FromArg,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn into_variadic(self) -> Function {
                Function::from_body(vec![$($arg::KIND),*], Some(Rest::KIND), move |args: Vec<Value>| {
                    let mut args = args.into_iter().enumerate();
                    let mut index = 0usize;
                    $(
                        let $arg: $arg = next_arg(&mut args, index)?;
                        index += 1;
                    )*
                    let rest = args
                        .map(|(i, v)| Rest::from_arg(v, i))
                        .collect::<Result<Vec<Rest>, Fault>>()?;
                    (self)($($arg,)* rest).into_return().map_err(Fault::Returned)
                })
            }
        }
    };
}

impl_into_function!();
impl_into_function!(A);
impl_into_function!(A, B);
impl_into_function!(A, B, C);
impl_into_function!(A, B, C, D);
impl_into_function!(A, B, C, D, E);

// ── Tests ─────────────────────────────────────────────────────────────────────
