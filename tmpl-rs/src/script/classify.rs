//! Tag classification.
//!
//! A tag is one of three shapes, checked in order:
//!
//! | Shape | Rule |
//! |-------|------|
//! | call | `word(...)` ending in `)`, with no operator after the paren opened by `word` closes |
//! | expression | an operator character appears outside quotes |
//! | variable | anything else; looked up by exact name |
//!
//! Classification is a pure function of the text.

// ── Public API ────────────────────────────────────────────────────────────────

/// How a tag's content is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Call,
    Expression,
    Variable,
}

/// Characters that make a tag an expression when they appear outside quotes.
pub const OPERATOR_CHARS: &[u8] = b"+-*/=<>!&|%";

pub fn is_operator_char(c: u8) -> bool {
    OPERATOR_CHARS.contains(&c)
}

/// Classify tag content.  Surrounding whitespace is ignored.
pub fn classify(tag: &str) -> TagKind {
    let tag = tag.trim();
    if is_call_shape(tag) {
        TagKind::Call
    } else if has_operator(tag) {
        TagKind::Expression
    } else {
        TagKind::Variable
    }
}

/// `true` when `text` reads as a single `name(...)` call.
///
/// The text before the first `(` must be one word (no whitespace, quotes or
/// operator characters) and the text must end in `)`.  When the opening paren
/// closes early and an operator follows (`f(a) + g(b)`) this is not a call.
/// Anything else after an early close (`f(1))`), or an opening paren that
/// never balances, still counts, so the call parser can report the malformed
/// call.
pub fn is_call_shape(text: &str) -> bool {
    let text = text.trim();
    let Some(open) = text.find('(') else {
        return false;
    };
    if !text.ends_with(')') {
        return false;
    }
    let name = text[..open].trim_end();
    if name.is_empty()
        || name
            .bytes()
            .any(|b| b.is_ascii_whitespace() || b == b'"' || b == b'\'' || is_operator_char(b))
    {
        return false;
    }
    match matching_paren(text.as_bytes(), open) {
        Some(close) => !has_operator(&text[close + 1..]),
        None => true,
    }
}

/// `true` when an operator character appears outside single or double quotes.
pub fn has_operator(text: &str) -> bool {
    let mut quote: Option<u8> = None;
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        match quote {
            Some(q) => {
                if b == b'\\' {
                    bytes.next();
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b if is_operator_char(b) => return true,
                _ => {}
            },
        }
    }
    false
}

/// A bareword that should name a binding.
///
/// Unquoted, not digit-led, not `true`/`false`, and free of whitespace and
/// operator characters.  Only these produce a not-found error on a miss;
/// any other bareword stands for its own text.
pub fn is_variable_shaped(text: &str) -> bool {
    let Some(&first) = text.as_bytes().first() else {
        return false;
    };
    if first == b'"' || first == b'\'' || first.is_ascii_digit() {
        return false;
    }
    if text == "true" || text == "false" {
        return false;
    }
    !text
        .bytes()
        .any(|b| b.is_ascii_whitespace() || is_operator_char(b))
}

/// Index of the `)` matching the `(` at `open`, skipping quoted substrings
/// (backslash-escape aware).  `None` when it never balances.
pub(crate) fn matching_paren(src: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < src.len() {
        let b = src[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
