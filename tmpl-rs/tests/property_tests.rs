use proptest::prelude::*;
use tmpl::script::lexer::tokenize;
use tmpl::script::{classify, parse_call};
use tmpl::{eval, render_string, render_string_tolerant, Bindings, Template};

proptest! {
    /// Text without a start delimiter passes through untouched.
    #[test]
    fn text_without_tags_is_unchanged(s in "\\PC*") {
        prop_assume!(!s.contains("{{"));
        let b = Bindings::new();
        prop_assert_eq!(render_string(&s, "{{", "}}", &b).unwrap(), s.clone());
        prop_assert_eq!(Template::new(s.as_str(), "{{", "}}").unwrap().render_string(&b).unwrap(), s);
    }
}

proptest! {
    /// Classification ignores surrounding whitespace and is deterministic.
    #[test]
    fn classify_is_stable(s in "\\PC*") {
        let kind = classify(&s);
        prop_assert_eq!(kind, classify(&s));
        prop_assert_eq!(kind, classify(&format!("  {s}\t")));
    }
}

proptest! {
    /// Tokenizer and call parser return Ok or Err but never panic.
    #[test]
    fn parsers_do_not_panic(s in "\\PC*") {
        let _ = tokenize(&s);
        let _ = parse_call(&s, 32);
    }
}

proptest! {
    /// Rendering arbitrary tag content never panics in either mode.
    #[test]
    fn render_does_not_panic(s in "\\PC*") {
        let src = format!("a{{{{{s}}}}}b");
        let b = Bindings::new().with("x", 1);
        let _ = render_string(&src, "{{", "}}", &b);
        let _ = render_string_tolerant(&src, "{{", "}}", &b);
    }
}

proptest! {
    /// `*` binds tighter than `+`.
    #[test]
    fn multiplication_before_addition(a in 0i64..10_000, b in 0i64..10_000, c in 0i64..10_000) {
        let got = eval::<f64>(&format!("{a} + {b} * {c}"), &Bindings::new()).unwrap();
        prop_assert_eq!(got, (a + b * c) as f64);
        let grouped = eval::<f64>(&format!("({a} + {b}) * {c}"), &Bindings::new()).unwrap();
        prop_assert_eq!(grouped, ((a + b) * c) as f64);
    }
}

proptest! {
    /// `%` stays integral and matches Rust's remainder.
    #[test]
    fn remainder_matches_integer_rem(a in 0i64..1_000_000, b in 1i64..1_000) {
        let got = eval::<i64>(&format!("{a} % {b}"), &Bindings::new()).unwrap();
        prop_assert_eq!(got, a % b);
    }
}

proptest! {
    /// An unbound variable-shaped tag is written back verbatim in tolerant mode.
    #[test]
    fn unbound_tag_round_trips_when_tolerant(name in "[a-z_][a-z0-9_]{0,12}") {
        let src = format!("<{{{{{name}}}}}>");
        let out = render_string_tolerant(&src, "{{", "}}", &Bindings::new()).unwrap();
        prop_assert_eq!(out, src);
    }
}
