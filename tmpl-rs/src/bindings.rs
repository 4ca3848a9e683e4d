//! Name → value bindings supplied per render.
//!
//! The engine only ever reads a [`Bindings`] map.  Besides plain values and
//! functions a name may be bound to a [`TagWriter`], which writes straight to
//! the output sink when a plain tag names it exactly.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::script::value::Value;

/// Direct-write callback: receives the sink and the tag text, returns the
/// number of bytes written.
pub type TagWriter = Arc<dyn Fn(&mut dyn Write, &str) -> io::Result<usize> + Send + Sync>;

/// What a name is bound to.
#[derive(Clone)]
pub enum Binding {
    Value(Value),
    TagWriter(TagWriter),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::TagWriter(_) => f.write_str("TagWriter(..)"),
        }
    }
}

static ABSENT: Value = Value::Absent;

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: FxHashMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder form of [`insert_tag_writer`](Self::insert_tag_writer).
    pub fn with_tag_writer<F>(mut self, name: impl Into<String>, writer: F) -> Self
    where
        F: Fn(&mut dyn Write, &str) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.insert_tag_writer(name, writer);
        self
    }

    /// Bind `name`, replacing any previous binding.  Functions are values too:
    /// pass a [`Function`](crate::Function).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries
            .insert(name.into(), Binding::Value(value.into()));
    }

    pub fn insert_tag_writer<F>(&mut self, name: impl Into<String>, writer: F)
    where
        F: Fn(&mut dyn Write, &str) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.entries
            .insert(name.into(), Binding::TagWriter(Arc::new(writer)));
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    /// The value bound to `name`.  Tag writers read as [`Value::Absent`].
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.entries.get(name)? {
            Binding::Value(v) => Some(v),
            Binding::TagWriter(_) => Some(&ABSENT),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// `true` when `name` is bound to a function.
    pub fn is_function(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Binding::Value(Value::Func(_))))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        bindings.extend(iter);
        bindings
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Bindings {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Function;

    #[test]
    fn insert_and_read() {
        let b = Bindings::new().with("name", "World").with("age", 30);
        assert_eq!(b.value("name"), Some(&Value::Text("World".into())));
        assert_eq!(b.value("age"), Some(&Value::Int(30)));
        assert_eq!(b.value("missing"), None);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn later_insert_replaces() {
        let mut b = Bindings::new();
        b.insert("x", 1);
        b.insert("x", "one");
        assert_eq!(b.value("x"), Some(&Value::Text("one".into())));
    }

    #[test]
    fn tag_writer_reads_as_absent() {
        let b = Bindings::new().with_tag_writer("w", |out, tag| out.write(tag.as_bytes()));
        assert!(b.contains("w"));
        assert_eq!(b.value("w"), Some(&Value::Absent));
        assert!(!b.is_function("w"));
    }

    #[test]
    fn function_detection() {
        let b = Bindings::new()
            .with("f", Function::from_fn(|| 1i64))
            .with("v", 1);
        assert!(b.is_function("f"));
        assert!(!b.is_function("v"));
        assert!(!b.is_function("nope"));
    }

    #[test]
    fn from_iterator() {
        let b: Bindings = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(b.value("b"), Some(&Value::Int(2)));
    }
}
