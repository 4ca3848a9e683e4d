//! Function dispatch.
//!
//! Resolves a parsed [`Call`] against the bindings, materializes its
//! arguments, checks arity and invokes the bound [`Function`].

use crate::bindings::Binding;
use crate::error::{Error, Result};
use crate::stack::ensure_sufficient_stack;

use super::call::{Argument, Call};
use super::function::Function;
use super::value::Value;
use super::EvalContext;

/// Run `call`.  Argument errors propagate immediately; the callee is never
/// invoked with the wrong number of arguments.
#[tracing::instrument(level = "trace", skip(ctx), fields(name = %call.name))]
pub fn execute(call: &Call, ctx: &EvalContext<'_>, depth: usize) -> Result<Value> {
    let depth = ctx.descend(depth)?;
    let func = resolve(&call.name, ctx)?;

    let args = call
        .args
        .iter()
        .map(|arg| materialize(arg, ctx, depth))
        .collect::<Result<Vec<_>>>()?;

    let arity = func.arity();
    if !arity.accepts(args.len()) {
        return Err(Error::InvalidArgumentCount {
            name: call.name.clone(),
            expected: arity,
            got: args.len(),
        });
    }

    func.invoke(&call.name, args)
}

/// Find the invocable bound to `name`.
pub fn resolve<'b>(name: &str, ctx: &EvalContext<'b>) -> Result<&'b Function> {
    match ctx.bindings.get(name) {
        None => Err(Error::FunctionNotFound(name.to_owned())),
        Some(Binding::Value(Value::Func(f))) => Ok(f),
        Some(_) => Err(Error::NotAFunction(name.to_owned())),
    }
}

fn materialize(arg: &Argument, ctx: &EvalContext<'_>, depth: usize) -> Result<Value> {
    Ok(match arg {
        Argument::Quoted(s) | Argument::Literal(s) => Value::Text(s.clone()),
        Argument::Bareword(name) => ctx.lookup(name)?,
        Argument::Int(n) => Value::Int(*n),
        Argument::Float(x) => Value::Float(*x),
        Argument::Bool(b) => Value::Bool(*b),
        Argument::Nested(inner) => ensure_sufficient_stack(|| execute(inner, ctx, depth))?,
        Argument::SubExpression(text) => {
            ensure_sufficient_stack(|| ctx.evaluate_expression(text, depth))?
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::bindings::Bindings;
    use crate::error::Fault;
    use crate::script::call::parse_call;
    use crate::script::function::Arity;

    fn run(text: &str, bindings: &Bindings) -> Result<Value> {
        let ctx = EvalContext::new(bindings, None, 32);
        execute(&parse_call(text, 32)?, &ctx, 0)
    }

    fn math() -> Bindings {
        Bindings::new()
            .with("add", Function::from_fn(|a: i64, b: i64| a + b))
            .with("upper", Function::from_fn(|s: String| s.to_uppercase()))
            .with(
                "join",
                Function::variadic(|sep: String, parts: Vec<String>| parts.join(&sep)),
            )
            .with("name", "ann")
            .with("n", 4)
    }

    #[test]
    fn calls_bound_function() {
        assert_eq!(run("add(2, 3)", &math()).unwrap(), Value::Int(5));
    }

    #[test]
    fn barewords_resolve() {
        assert_eq!(run("upper(name)", &math()).unwrap(), Value::Text("ANN".into()));
        assert_eq!(run("add(n, n)", &math()).unwrap(), Value::Int(8));
    }

    #[test]
    fn unbound_variable_shaped_bareword_fails() {
        assert!(matches!(
            run("upper(nobody)", &math()),
            Err(Error::VariableNotFound(n)) if n == "nobody"
        ));
    }

    #[test]
    fn non_variable_bareword_is_literal() {
        assert_eq!(
            run("upper(hello world)", &math()).unwrap(),
            Value::Text("HELLO WORLD".into())
        );
    }

    #[test]
    fn nested_and_sub_expression_arguments() {
        assert_eq!(run("add(add(1, 2), n * 2)", &math()).unwrap(), Value::Int(11));
    }

    #[test]
    fn variadic_arguments() {
        assert_eq!(
            run("join('-', 'a', name, upper('b'))", &math()).unwrap(),
            Value::Text("a-ann-B".into())
        );
        assert_eq!(run("join(',')", &math()).unwrap(), Value::Text(String::new()));
    }

    #[test]
    fn unknown_function() {
        assert!(matches!(
            run("nope(1)", &math()),
            Err(Error::FunctionNotFound(n)) if n == "nope"
        ));
    }

    #[test]
    fn not_a_function() {
        assert!(matches!(
            run("name(1)", &math()),
            Err(Error::NotAFunction(n)) if n == "name"
        ));
    }

    #[test]
    fn arity_checked_before_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let b = Bindings::new().with(
            "pair",
            Function::from_fn(move |a: i64, b: i64| {
                seen.fetch_add(1, Ordering::SeqCst);
                a + b
            }),
        );
        match run("pair(1)", &b) {
            Err(Error::InvalidArgumentCount { name, expected, got }) => {
                assert_eq!(name, "pair");
                assert_eq!(expected, Arity::Fixed(2));
                assert_eq!(got, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            run("join()", &math()),
            Err(Error::InvalidArgumentCount { expected: Arity::AtLeast(1), got: 0, .. })
        ));
    }

    #[test]
    fn inner_error_propagates() {
        let b = math().with(
            "fail",
            Function::from_fn(|| -> std::result::Result<i64, String> { Err("nope".into()) }),
        );
        match run("add(fail(), 1)", &b) {
            Err(Error::FunctionFailed { name, fault }) => {
                assert_eq!(name, "fail");
                assert_eq!(fault, Fault::Returned("nope".into()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn wrong_argument_type_is_a_fault() {
        assert!(matches!(
            run("add('x', 1)", &math()),
            Err(Error::FunctionFailed {
                fault: Fault::InvalidArgumentType { index: 0, .. },
                ..
            })
        ));
    }

    #[test]
    fn depth_ceiling() {
        let b = Bindings::new().with("id", Function::from_fn(|n: i64| n));
        let deep = format!("{}1{}", "id(".repeat(6), ")".repeat(6));
        let ctx = EvalContext::new(&b, None, 3);
        let call = parse_call(&deep, 64).unwrap();
        assert!(matches!(execute(&call, &ctx, 0), Err(Error::RecursionLimit(3))));
    }
}
