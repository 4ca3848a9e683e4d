//! Engine configuration.
//!
//! A [`Config`] can be built in code or loaded from a small settings file:
//!
//! | Key | Value | Default |
//! |-----|-------|---------|
//! | `start_tag` | opening delimiter | `{{` |
//! | `end_tag` | closing delimiter | `}}` |
//! | `max_depth` | nesting ceiling for calls and sub-expressions | `128` |
//! | `cache_expressions` | `true`/`false`, share compiled expressions | `true` |
//!
//! One `key = value` per line.  Lines starting with `#` or `;` are comments.
//! Values may be double-quoted (with `\"` escapes) to keep surrounding
//! whitespace.

use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_START_TAG: &str = "{{";
pub const DEFAULT_END_TAG: &str = "}}";
pub const DEFAULT_MAX_DEPTH: usize = 128;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub start_tag: String,
    pub end_tag: String,
    pub max_depth: usize,
    pub cache_expressions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            start_tag: DEFAULT_START_TAG.to_owned(),
            end_tag: DEFAULT_END_TAG.to_owned(),
            max_depth: DEFAULT_MAX_DEPTH,
            cache_expressions: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, start_tag: impl Into<String>, end_tag: impl Into<String>) -> Self {
        self.start_tag = start_tag.into();
        self.end_tag = end_tag.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_cache(mut self, cache_expressions: bool) -> Self {
        self.cache_expressions = cache_expressions;
        self
    }

    /// Both delimiters must be non-empty.
    pub fn validate(&self) -> Result<()> {
        check_delimiters(&self.start_tag, &self.end_tag)
    }

    /// Parse settings text.
    ///
    /// Bad lines are reported and skipped; the rest of the file still
    /// applies.  Returns the config and the list of per-line errors.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected key = value, got {line:?}"),
                });
                continue;
            };

            if let Err(message) = config.apply(key.trim(), &unquote_value(value.trim())) {
                errors.push(ConfigError {
                    line: lineno,
                    message,
                });
            }
        }

        (config, errors)
    }

    /// Read and parse a settings file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "start_tag" | "end_tag" if value.is_empty() => Err(format!("{key} cannot be empty")),
            "start_tag" => {
                self.start_tag = value.to_owned();
                Ok(())
            }
            "end_tag" => {
                self.end_tag = value.to_owned();
                Ok(())
            }
            "max_depth" => match value.parse::<usize>() {
                Ok(n) if n > 0 => {
                    self.max_depth = n;
                    Ok(())
                }
                _ => Err(format!("max_depth must be a positive integer, got {value:?}")),
            },
            "cache_expressions" => match value {
                "true" | "on" | "1" => {
                    self.cache_expressions = true;
                    Ok(())
                }
                "false" | "off" | "0" => {
                    self.cache_expressions = false;
                    Ok(())
                }
                _ => Err(format!("cache_expressions must be true or false, got {value:?}")),
            },
            _ => Err(format!("unknown setting {key:?}")),
        }
    }
}

pub(crate) fn check_delimiters(start_tag: &str, end_tag: &str) -> Result<()> {
    if start_tag.is_empty() {
        return Err(Error::EmptyDelimiter("start"));
    }
    if end_tag.is_empty() {
        return Err(Error::EmptyDelimiter("end"));
    }
    Ok(())
}

/// Strip one layer of double quotes, honouring `\"` and `\\` inside them.
fn unquote_value(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return s.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            c => out.push(c),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
