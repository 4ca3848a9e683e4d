//! Tag substitution templates.
//!
//! Replaces delimited tags in a template with values drawn from a
//! caller-supplied [`Bindings`] map.  A tag may be a plain variable, a
//! function call, or an arithmetic / comparison / logical expression:
//!
//! ```rust
//! use tmpl::{eval, render_string, Bindings, Function};
//!
//! let b = Bindings::new()
//!     .with("name", "World")
//!     .with("age", 70)
//!     .with("add", Function::from_fn(|a: i64, b: i64| a + b));
//!
//! assert_eq!(render_string("Hello, {{name}}!", "{{", "}}", &b).unwrap(), "Hello, World!");
//! assert_eq!(render_string("{{add(2, 3)}}", "{{", "}}", &b).unwrap(), "5");
//! assert!(eval::<bool>("age >= 18", &b).unwrap());
//! ```
//!
//! Module map:
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`script`] | tag classifier, tokenizer, parsers, evaluator, dispatcher |
//! | [`template`] | compiled templates and one-shot rendering |
//! | [`engine`] | configuration plus a shared expression cache |
//! | [`config`] | settings and the settings-file loader |

pub mod bindings;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod script;
pub mod stack;
pub mod template;

pub use bindings::{Binding, Bindings, TagWriter};
pub use config::{Config, ConfigError};
pub use engine::Engine;
pub use error::{Error, Fault, RenderError, Result};
pub use eval::{eval, FromValue};
pub use script::{Arity, ExpressionCache, Function, ParamKind, Value};
pub use template::{render, render_string, render_string_tolerant, render_tolerant, validate, Template};
