//! Templates and the render engine.
//!
//! A template is literal text with tags between a start and an end
//! delimiter.  Delimiters may be any non-empty strings, including the same
//! string twice; there is no escape for a delimiter inside literal text.
//!
//! Two render policies:
//!
//! - **strict** ([`Template::render`]): stops at the first tag that fails and
//!   returns the error.  A plain variable tag with no binding is the one
//!   exception: it renders as nothing.
//! - **tolerant** ([`Template::render_tolerant`]): never fails on a tag.  A
//!   tag that cannot be resolved is written back verbatim, delimiters
//!   included.
//!
//! ```rust
//! use tmpl::{Bindings, Function, Template};
//!
//! let t = Template::new("{{greet(name)}} x{{n * 2}}", "{{", "}}").unwrap();
//! let b = Bindings::new()
//!     .with("name", "Ann")
//!     .with("n", 21)
//!     .with("greet", Function::from_fn(|s: String| format!("hi {s}")));
//! assert_eq!(t.render_string(&b).unwrap(), "hi Ann x42");
//! ```

use std::io::{self, Write};
use std::ops::Range;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};

use crate::bindings::{Binding, Bindings};
use crate::config::check_delimiters;
use crate::engine::Engine;
use crate::error::{Error, RenderError, Result};
use crate::script::call::parse_call;
use crate::script::value::Value;
use crate::script::{classify, EvalContext, TagKind};

// ── Delimiter scanning ────────────────────────────────────────────────────────

struct Delimiters {
    start: AhoCorasick,
    end: AhoCorasick,
}

/// One step of a left-to-right scan.
enum Scan {
    /// Literal text `text`, then a tag at `tag`; the scan resumes at `resume`.
    Tag {
        text: Range<usize>,
        tag: Range<usize>,
        resume: usize,
    },
    /// A start delimiter ending at `after_start` with no end delimiter after it.
    Unterminated { text: Range<usize>, after_start: usize },
    /// No further start delimiter; the rest is literal.
    Done,
}

impl Delimiters {
    fn new(start_tag: &str, end_tag: &str) -> Result<Self> {
        check_delimiters(start_tag, end_tag)?;
        Ok(Delimiters {
            start: AhoCorasickBuilder::new().build([start_tag]),
            end: AhoCorasickBuilder::new().build([end_tag]),
        })
    }

    fn next(&self, src: &str, from: usize) -> Scan {
        let Some(open) = self.start.find(&src[from..]) else {
            return Scan::Done;
        };
        let text = from..from + open.start();
        let after_start = from + open.end();
        match self.end.find(&src[after_start..]) {
            Some(close) => Scan::Tag {
                text,
                tag: after_start..after_start + close.start(),
                resume: after_start + close.end(),
            },
            None => Scan::Unterminated { text, after_start },
        }
    }
}

// ── Tag resolution ────────────────────────────────────────────────────────────

fn write_bytes(w: &mut dyn Write, bytes: &[u8]) -> io::Result<usize> {
    w.write_all(bytes)?;
    Ok(bytes.len())
}

fn write_value(w: &mut dyn Write, value: &Value) -> io::Result<usize> {
    write_bytes(w, &value.as_bytes())
}

struct Renderer<'a> {
    ctx: EvalContext<'a>,
    start_tag: &'a str,
    end_tag: &'a str,
}

impl<'a> Renderer<'a> {
    fn new(engine: &'a Engine, bindings: &'a Bindings, start_tag: &'a str, end_tag: &'a str) -> Self {
        Renderer {
            ctx: engine.context(bindings),
            start_tag,
            end_tag,
        }
    }

    fn strict(&self, w: &mut dyn Write, tag: &str) -> Result<usize> {
        match classify(tag) {
            TagKind::Variable => Ok(match self.ctx.bindings.get(tag) {
                Some(Binding::TagWriter(f)) => f(&mut *w, tag)?,
                Some(Binding::Value(v)) => write_value(w, v)?,
                None => 0,
            }),
            kind => {
                let value = self.ctx.evaluate_as(tag, kind)?;
                Ok(write_value(w, &value)?)
            }
        }
    }

    fn tolerant(&self, w: &mut dyn Write, tag: &str) -> io::Result<usize> {
        let kind = classify(tag);
        if kind == TagKind::Variable {
            match self.ctx.bindings.get(tag) {
                Some(Binding::TagWriter(f)) => return f(&mut *w, tag),
                Some(Binding::Value(v)) => return write_value(w, v),
                None => {}
            }
        } else {
            match self.ctx.evaluate_as(tag, kind) {
                Ok(value) => return write_value(w, &value),
                Err(e) => tracing::debug!(tag, error = %e, "keeping unresolved tag"),
            }
        }
        let mut n = write_bytes(w, self.start_tag.as_bytes())?;
        n += write_bytes(w, tag.as_bytes())?;
        n += write_bytes(w, self.end_tag.as_bytes())?;
        Ok(n)
    }
}

fn validate_tags<'t>(tags: impl Iterator<Item = &'t str>, bindings: &Bindings, max_depth: usize) -> Result<()> {
    for tag in tags {
        match classify(tag) {
            TagKind::Call => {
                let call = parse_call(tag, max_depth)?;
                if !bindings.is_function(&call.name) {
                    return Err(if bindings.contains(&call.name) {
                        Error::NotAFunction(call.name)
                    } else {
                        Error::FunctionNotFound(call.name)
                    });
                }
            }
            // Operands are only known at render time.
            TagKind::Expression => {}
            TagKind::Variable => {
                if !bindings.contains(tag) {
                    return Err(Error::VariableNotFound(tag.to_owned()));
                }
            }
        }
    }
    Ok(())
}

fn into_string(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

// ── Template ──────────────────────────────────────────────────────────────────

/// A compiled template.
///
/// Render methods only read the compiled slices, so one template can be
/// rendered from many threads at once.  [`reset`](Self::reset) needs
/// `&mut self`.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    start_tag: String,
    end_tag: String,
    /// Always one more than `tags`.
    texts: Vec<Range<usize>>,
    tags: Vec<Range<usize>>,
    engine: Engine,
}

impl Template {
    /// Compile `source` with the default engine.
    pub fn new(source: impl Into<String>, start_tag: &str, end_tag: &str) -> Result<Self> {
        let engine = Engine::default();
        let mut t = Template::empty(engine);
        t.reset(source, start_tag, end_tag)?;
        Ok(t)
    }

    /// Compile `source` with `engine`'s delimiters, depth ceiling and cache.
    pub fn with_engine(source: impl Into<String>, engine: Engine) -> Result<Self> {
        let (start, end) = (engine.config().start_tag.clone(), engine.config().end_tag.clone());
        let mut t = Template::empty(engine);
        t.reset(source, &start, &end)?;
        Ok(t)
    }

    fn empty(engine: Engine) -> Self {
        Template {
            source: String::new(),
            start_tag: String::new(),
            end_tag: String::new(),
            texts: vec![0..0],
            tags: Vec::new(),
            engine,
        }
    }

    /// Recompile in place.  On error the template is left unchanged.
    pub fn reset(&mut self, source: impl Into<String>, start_tag: &str, end_tag: &str) -> Result<()> {
        let source = source.into();
        let delims = Delimiters::new(start_tag, end_tag)?;
        let mut texts = Vec::new();
        let mut tags = Vec::new();
        let mut pos = 0;

        loop {
            match delims.next(&source, pos) {
                Scan::Tag { text, tag, resume } => {
                    texts.push(text);
                    tags.push(tag);
                    pos = resume;
                }
                Scan::Unterminated { after_start, .. } => {
                    return Err(Error::UnterminatedTag {
                        end_tag: end_tag.to_owned(),
                        offset: after_start,
                    });
                }
                Scan::Done => {
                    texts.push(pos..source.len());
                    break;
                }
            }
        }

        tracing::debug!(tags = tags.len(), bytes = source.len(), "template compiled");
        self.source = source;
        self.start_tag = start_tag.to_owned();
        self.end_tag = end_tag.to_owned();
        self.texts = texts;
        self.tags = tags;
        Ok(())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn start_tag(&self) -> &str {
        &self.start_tag
    }

    pub fn end_tag(&self) -> &str {
        &self.end_tag
    }

    /// Tag contents in order of appearance, delimiters excluded.
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.tags.iter().map(|r| &self.source[r.clone()])
    }

    fn segments(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.texts.iter().enumerate().map(|(i, text)| {
            (
                &self.source[text.clone()],
                self.tags.get(i).map(|r| &self.source[r.clone()]),
            )
        })
    }

    fn renderer<'a>(&'a self, bindings: &'a Bindings) -> Renderer<'a> {
        Renderer::new(&self.engine, bindings, &self.start_tag, &self.end_tag)
    }

    /// Strict render into `w`.  Returns the number of bytes written.
    ///
    /// On error, everything before the failing tag has already been written.
    pub fn render<W: Write>(&self, w: &mut W, bindings: &Bindings) -> Result<usize> {
        let w: &mut dyn Write = w;
        let r = self.renderer(bindings);
        let mut n = 0;
        for (text, tag) in self.segments() {
            n += write_bytes(w, text.as_bytes())?;
            if let Some(tag) = tag {
                n += r.strict(w, tag)?;
            }
        }
        Ok(n)
    }

    /// Tolerant render into `w`.  Only sink errors are reported.
    pub fn render_tolerant<W: Write>(&self, w: &mut W, bindings: &Bindings) -> io::Result<usize> {
        let w: &mut dyn Write = w;
        let r = self.renderer(bindings);
        let mut n = 0;
        for (text, tag) in self.segments() {
            n += write_bytes(w, text.as_bytes())?;
            if let Some(tag) = tag {
                n += r.tolerant(w, tag)?;
            }
        }
        Ok(n)
    }

    /// Strict render to a string.  On error the partial output travels with
    /// the error.
    pub fn render_string(&self, bindings: &Bindings) -> std::result::Result<String, RenderError> {
        let mut buf = Vec::with_capacity(self.source.len());
        match self.render(&mut buf, bindings) {
            Ok(_) => Ok(into_string(buf)),
            Err(source) => Err(RenderError {
                output: into_string(buf),
                source,
            }),
        }
    }

    /// Tolerant render to a string.
    pub fn render_string_tolerant(&self, bindings: &Bindings) -> String {
        let mut buf = Vec::with_capacity(self.source.len());
        // Writing to a Vec cannot fail; tag writers may, and their output up
        // to that point is kept.
        if let Err(e) = self.render_tolerant(&mut buf, bindings) {
            tracing::debug!(error = %e, "tag writer failed during tolerant render");
        }
        into_string(buf)
    }

    /// Check that every plain tag is bound and every call tag names a bound
    /// function.  Expression tags are not inspected.
    pub fn validate(&self, bindings: &Bindings) -> Result<()> {
        validate_tags(self.tags(), bindings, self.engine.config().max_depth)
    }
}

// ── One-shot rendering ────────────────────────────────────────────────────────

/// Scan and render in a single pass without compiling.
///
/// A start delimiter with no matching end delimiter is not an error here: it
/// and the rest of the text are written out unchanged.
fn render_once<F>(source: &str, start_tag: &str, end_tag: &str, w: &mut dyn Write, mut on_tag: F) -> Result<usize>
where
    F: FnMut(&mut dyn Write, &str) -> Result<usize>,
{
    let delims = Delimiters::new(start_tag, end_tag)?;
    let mut n = 0;
    let mut pos = 0;
    loop {
        match delims.next(source, pos) {
            Scan::Tag { text, tag, resume } => {
                n += write_bytes(w, source[text].as_bytes())?;
                n += on_tag(&mut *w, &source[tag])?;
                pos = resume;
            }
            Scan::Unterminated { text, after_start } => {
                n += write_bytes(w, source[text].as_bytes())?;
                n += write_bytes(w, start_tag.as_bytes())?;
                pos = after_start;
                break;
            }
            Scan::Done => break,
        }
    }
    n += write_bytes(w, source[pos..].as_bytes())?;
    Ok(n)
}

/// Strict one-shot render of `source` into `w`.
pub fn render<W: Write>(
    source: &str,
    start_tag: &str,
    end_tag: &str,
    w: &mut W,
    bindings: &Bindings,
) -> Result<usize> {
    let engine = Engine::default();
    let r = Renderer::new(&engine, bindings, start_tag, end_tag);
    render_once(source, start_tag, end_tag, w, |w, tag| r.strict(w, tag))
}

/// Tolerant one-shot render of `source` into `w`.
///
/// Fails only on empty delimiters or sink errors.
pub fn render_tolerant<W: Write>(
    source: &str,
    start_tag: &str,
    end_tag: &str,
    w: &mut W,
    bindings: &Bindings,
) -> Result<usize> {
    let engine = Engine::default();
    let r = Renderer::new(&engine, bindings, start_tag, end_tag);
    render_once(source, start_tag, end_tag, w, |w, tag| Ok(r.tolerant(w, tag)?))
}

/// Strict one-shot render to a string.
pub fn render_string(
    source: &str,
    start_tag: &str,
    end_tag: &str,
    bindings: &Bindings,
) -> std::result::Result<String, RenderError> {
    let mut buf = Vec::with_capacity(source.len());
    match render(source, start_tag, end_tag, &mut buf, bindings) {
        Ok(_) => Ok(into_string(buf)),
        Err(e) => Err(RenderError {
            output: into_string(buf),
            source: e,
        }),
    }
}

/// Tolerant one-shot render to a string.  Fails only on empty delimiters.
pub fn render_string_tolerant(
    source: &str,
    start_tag: &str,
    end_tag: &str,
    bindings: &Bindings,
) -> Result<String> {
    let mut buf = Vec::with_capacity(source.len());
    match render_tolerant(source, start_tag, end_tag, &mut buf, bindings) {
        Ok(_) | Err(Error::Io(_)) => Ok(into_string(buf)),
        Err(e) => Err(e),
    }
}

/// Compile `source` and [`validate`](Template::validate) it.
pub fn validate(source: &str, start_tag: &str, end_tag: &str, bindings: &Bindings) -> Result<()> {
    Template::new(source, start_tag, end_tag)?.validate(bindings)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Function;
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> Template {
        Template::new(src, "{{", "}}").unwrap()
    }

    #[test]
    fn splits_texts_and_tags() {
        let t = compile("a{{x}}b{{ y }}c");
        assert_eq!(t.tags().collect::<Vec<_>>(), vec!["x", " y "]);
        let texts: Vec<&str> = t.segments().map(|(text, _)| text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn no_tags() {
        let t = compile("plain text");
        assert_eq!(t.tags().count(), 0);
        assert_eq!(t.render_string(&Bindings::new()).unwrap(), "plain text");
    }

    #[test]
    fn unterminated_tag_is_compile_error() {
        match Template::new("a {{b", "{{", "}}") {
            Err(Error::UnterminatedTag { end_tag, offset }) => {
                assert_eq!(end_tag, "}}");
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_delimiters_rejected() {
        assert!(matches!(
            Template::new("x", "", "}}"),
            Err(Error::EmptyDelimiter("start"))
        ));
        assert!(matches!(
            Template::new("x", "{{", ""),
            Err(Error::EmptyDelimiter("end"))
        ));
    }

    #[test]
    fn identical_delimiters_alternate() {
        let t = Template::new("a|x|b|y|c", "|", "|").unwrap();
        assert_eq!(t.tags().collect::<Vec<_>>(), vec!["x", "y"]);
        let b = Bindings::new().with("x", 1).with("y", 2);
        assert_eq!(t.render_string(&b).unwrap(), "a1b2c");
    }

    #[test]
    fn reset_failure_leaves_template_intact() {
        let mut t = compile("hi {{name}}");
        assert!(t.reset("broken {{", "{{", "}}").is_err());
        assert_eq!(t.source(), "hi {{name}}");
        t.reset("<x>", "<", ">").unwrap();
        assert_eq!(t.render_string(&Bindings::new().with("x", "ok")).unwrap(), "ok");
    }

    #[test]
    fn strict_skips_missing_plain_variable() {
        let t = compile("[{{missing}}]");
        assert_eq!(t.render_string(&Bindings::new()).unwrap(), "[]");
    }

    #[test]
    fn strict_stops_on_expression_miss() {
        let t = compile("a{{missing + 1}}b");
        let err = t.render_string(&Bindings::new()).unwrap_err();
        assert!(matches!(err.source, Error::VariableNotFound(_)));
        assert_eq!(err.output, "a");
    }

    #[test]
    fn tolerant_keeps_unresolved_tags() {
        let t = compile("{{missing}} {{ nope(1) }} {{ 1 / 0 }} {{ok}}");
        let b = Bindings::new().with("ok", "yes");
        assert_eq!(
            t.render_string_tolerant(&b),
            "{{missing}} {{ nope(1) }} {{ 1 / 0 }} yes"
        );
    }

    #[test]
    fn values_render_in_text_form() {
        let t = compile("{{i}} {{f}} {{b}} {{raw}} [{{none}}]");
        let b = Bindings::new()
            .with("i", 7)
            .with("f", 2.5)
            .with("b", false)
            .with("raw", b"bytes".to_vec())
            .with("none", None::<i64>);
        assert_eq!(t.render_string(&b).unwrap(), "7 2.5 false bytes []");
    }

    #[test]
    fn tag_writer_writes_directly() {
        let t = compile("<{{stamp}}>");
        let b = Bindings::new().with_tag_writer("stamp", |w, tag| {
            let s = format!("writer:{tag}");
            w.write_all(s.as_bytes())?;
            Ok(s.len())
        });
        assert_eq!(t.render_string(&b).unwrap(), "<writer:stamp>");
        assert_eq!(t.render_string_tolerant(&b), "<writer:stamp>");
    }

    #[test]
    fn tag_writer_is_absent_in_expressions() {
        let t = compile("{{stamp + 'x'}}");
        let b = Bindings::new().with_tag_writer("stamp", |w, _| w.write(b"no"));
        assert_eq!(t.render_string(&b).unwrap(), "x");
    }

    #[test]
    fn byte_counts() {
        let t = compile("ab{{x}}");
        let mut out = Vec::new();
        let n = t.render(&mut out, &Bindings::new().with("x", "cde")).unwrap();
        assert_eq!(n, 5);
        let mut out = Vec::new();
        let n = t.render_tolerant(&mut out, &Bindings::new()).unwrap();
        assert_eq!(n, 7);
        assert_eq!(out, b"ab{{x}}");
    }

    #[test]
    fn validate_checks_plain_and_call_tags() {
        let b = Bindings::new()
            .with("name", "x")
            .with("f", Function::from_fn(|| 1i64));
        assert!(compile("{{name}} {{f()}} {{a + b}}").validate(&b).is_ok());
        assert!(matches!(
            compile("{{other}}").validate(&b),
            Err(Error::VariableNotFound(n)) if n == "other"
        ));
        assert!(matches!(
            compile("{{g(1)}}").validate(&b),
            Err(Error::FunctionNotFound(n)) if n == "g"
        ));
        assert!(matches!(
            compile("{{name(1)}}").validate(&b),
            Err(Error::NotAFunction(n)) if n == "name"
        ));
        assert!(matches!(
            compile("{{9f(1)}}").validate(&b),
            Err(Error::InvalidFunctionSyntax { .. })
        ));
    }

    #[test]
    fn one_shot_unterminated_is_written_verbatim() {
        let b = Bindings::new().with("x", 1);
        assert_eq!(
            render_string("a{{x}}b{{tail", "{{", "}}", &b).unwrap(),
            "a1b{{tail"
        );
        assert_eq!(
            render_string_tolerant("{{y}} {{z", "{{", "}}", &b).unwrap(),
            "{{y}} {{z"
        );
    }

    #[test]
    fn one_shot_strict_partial_output() {
        let err = render_string("ok {{nope(1)}} never", "{{", "}}", &Bindings::new()).unwrap_err();
        assert_eq!(err.output, "ok ");
        assert!(matches!(err.source, Error::FunctionNotFound(_)));
    }

    #[test]
    fn one_shot_validate() {
        assert!(validate("{{a}}", "{{", "}}", &Bindings::new().with("a", 1)).is_ok());
        assert!(matches!(
            validate("{{a", "{{", "}}", &Bindings::new()),
            Err(Error::UnterminatedTag { .. })
        ));
    }

    #[test]
    fn template_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Template>();
    }
}
