//! Function-call parser.
//!
//! Parses `name(arg, arg, ...)` into a [`Call`] tree.  Each argument is
//! classified once at parse time:
//!
//! | Argument text | Classified as |
//! |---------------|---------------|
//! | `'text'` / `"text"` | [`Argument::Quoted`] |
//! | `f(...)` | [`Argument::Nested`] (or [`Argument::Literal`] if it fails to parse) |
//! | `42`, `2.5` | [`Argument::Int`], [`Argument::Float`] |
//! | `true`, `false` | [`Argument::Bool`] |
//! | anything with an operator outside quotes | [`Argument::SubExpression`] |
//! | anything else | [`Argument::Bareword`] |

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

use super::classify::{has_operator, is_call_shape};
use super::expr::unquote;

// ── Call tree ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Never resolved against bindings.
    Quoted(String),
    /// Looked up by name; falls back to its own text when not variable-shaped.
    Bareword(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nested(Call),
    /// Evaluated when the call runs.
    SubExpression(String),
    /// Call-shaped text that did not parse; passed through as text.
    Literal(String),
}

fn identifier() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse call text.  `max_depth` bounds how deeply calls may nest inside
/// arguments.
pub fn parse_call(text: &str, max_depth: usize) -> Result<Call> {
    parse_at(text.trim(), 0, max_depth)
}

fn parse_at(text: &str, depth: usize, max_depth: usize) -> Result<Call> {
    if depth > max_depth {
        return Err(Error::RecursionLimit(max_depth));
    }
    let open = match text.find('(') {
        Some(i) if i > 0 => i,
        _ => return Err(Error::syntax(text, "expected name(...)")),
    };
    let name = text[..open].trim();
    if !identifier().is_match(name) {
        return Err(Error::syntax(text, format!("invalid function name {name:?}")));
    }
    let Some(inner) = text[open + 1..].strip_suffix(')') else {
        return Err(Error::syntax(text, "missing closing parenthesis"));
    };

    let args = split_args(inner)
        .map_err(|reason| Error::syntax(text, reason))?
        .into_iter()
        .map(|arg| classify_arg(arg, depth, max_depth))
        .collect::<Result<Vec<_>>>()?;

    Ok(Call {
        name: name.to_owned(),
        args,
    })
}

/// Split on commas at paren depth 0 outside quotes.  Empty pieces are
/// dropped.
fn split_args(s: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let src = s.as_bytes();
    let mut pieces = Vec::new();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

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
                    if depth < 0 {
                        return Err("unbalanced parentheses in arguments");
                    }
                }
                b',' if depth == 0 => {
                    pieces.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }

    if quote.is_some() {
        return Err("unterminated quote in arguments");
    }
    if depth != 0 {
        return Err("unbalanced parentheses in arguments");
    }
    pieces.push(&s[start..]);

    Ok(pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect())
}

fn classify_arg(arg: &str, depth: usize, max_depth: usize) -> Result<Argument> {
    if is_single_quoted(arg) {
        return Ok(Argument::Quoted(unquote(arg)));
    }
    if is_call_shape(arg) {
        return match parse_at(arg, depth + 1, max_depth) {
            Ok(call) => Ok(Argument::Nested(call)),
            Err(e @ Error::RecursionLimit(_)) => Err(e),
            Err(e) => {
                tracing::debug!(arg, error = %e, "nested call did not parse; using literal text");
                Ok(Argument::Literal(arg.to_owned()))
            }
        };
    }
    if arg.as_bytes()[0].is_ascii_digit() {
        if let Ok(n) = arg.parse::<i64>() {
            return Ok(Argument::Int(n));
        }
        if let Ok(x) = arg.parse::<f64>() {
            return Ok(Argument::Float(x));
        }
    }
    match arg {
        "true" => return Ok(Argument::Bool(true)),
        "false" => return Ok(Argument::Bool(false)),
        _ => {}
    }
    if has_operator(arg) {
        return Ok(Argument::SubExpression(arg.to_owned()));
    }
    Ok(Argument::Bareword(arg.to_owned()))
}

/// The whole argument is one quoted string.
fn is_single_quoted(arg: &str) -> bool {
    let src = arg.as_bytes();
    let q = match src.first() {
        Some(&q) if q == b'"' || q == b'\'' => q,
        _ => return false,
    };
    let mut i = 1;
    while i < src.len() {
        match src[i] {
            b'\\' => i += 2,
            b if b == q => return i == src.len() - 1,
            _ => i += 1,
        }
    }
    false
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Result<Call> {
        parse_call(text, 32)
    }

    #[test]
    fn simple_call() {
        assert_eq!(
            parse("add(2, 3)").unwrap(),
            Call {
                name: "add".into(),
                args: vec![Argument::Int(2), Argument::Int(3)],
            }
        );
    }

    #[test]
    fn no_arguments() {
        assert_eq!(parse("now()").unwrap().args, vec![]);
        assert_eq!(parse("now(  )").unwrap().args, vec![]);
    }

    #[test]
    fn argument_kinds() {
        let call = parse(r#"f('q, x', "d", 2.5, true, name, a + 1, hello world)"#).unwrap();
        assert_eq!(
            call.args,
            vec![
                Argument::Quoted("q, x".into()),
                Argument::Quoted("d".into()),
                Argument::Float(2.5),
                Argument::Bool(true),
                Argument::Bareword("name".into()),
                Argument::SubExpression("a + 1".into()),
                Argument::Bareword("hello world".into()),
            ]
        );
    }

    #[test]
    fn quoted_argument_unescapes() {
        let call = parse(r#"f('it\'s')"#).unwrap();
        assert_eq!(call.args, vec![Argument::Quoted("it's".into())]);
    }

    #[test]
    fn two_strings_joined_is_an_expression() {
        let call = parse("f('a' + 'b')").unwrap();
        assert_eq!(call.args, vec![Argument::SubExpression("'a' + 'b'".into())]);
    }

    #[test]
    fn nested_calls() {
        let call = parse("outer(inner(1, 'x'), 2)").unwrap();
        assert_eq!(
            call.args,
            vec![
                Argument::Nested(Call {
                    name: "inner".into(),
                    args: vec![Argument::Int(1), Argument::Quoted("x".into())],
                }),
                Argument::Int(2),
            ]
        );
    }

    #[test]
    fn nested_failure_degrades_to_literal() {
        let call = parse("f(9bad(1))").unwrap();
        assert_eq!(call.args, vec![Argument::Literal("9bad(1)".into())]);
    }

    #[test]
    fn empty_arguments_are_skipped() {
        let call = parse("f(1,,2, )").unwrap();
        assert_eq!(call.args, vec![Argument::Int(1), Argument::Int(2)]);
    }

    #[test]
    fn invalid_name() {
        assert!(matches!(
            parse("1abc(2)"),
            Err(Error::InvalidFunctionSyntax { .. })
        ));
        assert!(matches!(
            parse("(2)"),
            Err(Error::InvalidFunctionSyntax { .. })
        ));
    }

    #[test]
    fn unbalanced_arguments() {
        assert!(matches!(
            parse("f('abc)"),
            Err(Error::InvalidFunctionSyntax { .. })
        ));
        assert!(matches!(
            parse("f(g(1)"),
            Err(Error::InvalidFunctionSyntax { .. })
        ));
    }

    #[test]
    fn depth_limit_propagates() {
        let deep = format!("{}1{}", "f(".repeat(10), ")".repeat(10));
        assert!(parse_call(&deep, 16).is_ok());
        assert!(matches!(
            parse_call(&deep, 4),
            Err(Error::RecursionLimit(4))
        ));
    }

    #[test]
    fn digit_led_non_number_is_bareword() {
        let call = parse("f(3rd)").unwrap();
        assert_eq!(call.args, vec![Argument::Bareword("3rd".into())]);
    }
}
