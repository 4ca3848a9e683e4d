//! Shunting-yard parser and postfix evaluator.
//!
//! Operator precedence (lowest → highest), all left-associative:
//!   `||`  →  `&&`  →  `==` `!=`  →  `>` `>=` `<` `<=`  →  `+` `-`  →
//!   `*` `/` `%`  →  `**`
//!
//! Arithmetic is carried out in floating point.  `%` is the exception: both
//! operands are truncated and the result is an integer.

use std::cmp::Ordering;

use crate::error::{Error, Result};

use super::lexer::{BinOp, Token};
use super::value::{format_float, Value};
use super::EvalContext;

// ── Parser ────────────────────────────────────────────────────────────────────

/// Reorder infix tokens into postfix.
pub fn to_postfix(infix: Vec<Token>) -> Result<Vec<Token>> {
    let mut output = Vec::with_capacity(infix.len());
    let mut stack: Vec<Token> = Vec::with_capacity(infix.len() / 2);

    for tok in infix {
        match tok {
            Token::Number(_) | Token::Str(_) | Token::Ident(_) | Token::Call(_) => {
                output.push(tok)
            }
            Token::LParen => stack.push(tok),
            Token::RParen => loop {
                match stack.pop() {
                    Some(Token::LParen) => break,
                    Some(t) => output.push(t),
                    None => return Err(Error::MismatchedParentheses),
                }
            },
            Token::Op(op) => {
                while let Some(Token::Op(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Op(*top));
                    stack.pop();
                }
                stack.push(Token::Op(op));
            }
        }
    }

    while let Some(tok) = stack.pop() {
        if tok == Token::LParen {
            return Err(Error::MismatchedParentheses);
        }
        output.push(tok);
    }
    Ok(output)
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Run a postfix token sequence.  `depth` is the nesting level of the
/// expression being evaluated; call spans run one level deeper.
pub fn eval_postfix(postfix: &[Token], ctx: &EvalContext<'_>, depth: usize) -> Result<Value> {
    let mut stack: Vec<Value> = Vec::with_capacity((postfix.len() / 2).max(4));

    for tok in postfix {
        let value = match tok {
            Token::Number(raw) => parse_number(raw)?,
            Token::Str(raw) => Value::Text(unquote(raw)),
            Token::Ident(name) => ctx.lookup(name)?,
            Token::Call(span) => ctx.evaluate_call(span, depth)?,
            Token::Op(op) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    return Err(Error::NotEnoughOperands(op.symbol()));
                };
                apply_operator(*op, a, b)?
            }
            Token::LParen | Token::RParen => return Err(Error::MismatchedParentheses),
        };
        stack.push(value);
    }

    match stack.len() {
        1 => Ok(stack.pop().unwrap_or_default()),
        n => Err(Error::InvalidExpressionResult(n)),
    }
}

/// Integer when the literal has no `.`, float otherwise.
pub fn parse_number(raw: &str) -> Result<Value> {
    let parsed = if raw.contains('.') {
        raw.parse::<f64>().ok().map(Value::Float)
    } else {
        raw.parse::<i64>().ok().map(Value::Int)
    };
    parsed.ok_or_else(|| Error::InvalidNumberFormat(raw.to_owned()))
}

/// Strip the surrounding quotes; `\"` and `\'` become bare quotes.
pub fn unquote(raw: &str) -> String {
    let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { raw };
    if inner.contains('\\') {
        inner.replace("\\\"", "\"").replace("\\'", "'")
    } else {
        inner.to_owned()
    }
}

/// Apply a binary operator.  `a` is the left operand.
///
/// A bound function is never an operand; it must be called with `name(...)`.
pub fn apply_operator(op: BinOp, a: Value, b: Value) -> Result<Value> {
    if matches!(a, Value::Func(_)) || matches!(b, Value::Func(_)) {
        return Err(Error::FunctionOperand { op: op.symbol() });
    }
    let numeric = a.is_numeric() && b.is_numeric();
    let arith = || {
        if numeric {
            Ok((a.to_number(), b.to_number()))
        } else {
            Err(Error::NonNumericOperand { op: op.symbol() })
        }
    };

    Ok(match op {
        BinOp::Add if numeric => Value::Float(a.to_number() + b.to_number()),
        BinOp::Add => {
            let mut s = a.to_text().into_owned();
            s.push_str(&b.to_text());
            Value::Text(s)
        }
        BinOp::Sub => {
            let (x, y) = arith()?;
            Value::Float(x - y)
        }
        BinOp::Mul => {
            let (x, y) = arith()?;
            Value::Float(x * y)
        }
        BinOp::Div => {
            let (x, y) = arith()?;
            if y == 0.0 {
                return Err(Error::DivisionByZero);
            }
            Value::Float(x / y)
        }
        BinOp::Rem => {
            let (x, y) = arith()?;
            let (x, y) = (x as i64, y as i64);
            if y == 0 {
                return Err(Error::DivisionByZero);
            }
            Value::Int(x.wrapping_rem(y))
        }
        BinOp::Pow => {
            let (x, y) = arith()?;
            Value::Float(power(x, y)?)
        }
        BinOp::Gt => Value::Bool(compare(&a, &b, numeric) == Some(Ordering::Greater)),
        BinOp::Lt => Value::Bool(compare(&a, &b, numeric) == Some(Ordering::Less)),
        BinOp::Ge => Value::Bool(matches!(
            compare(&a, &b, numeric),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinOp::Le => Value::Bool(matches!(
            compare(&a, &b, numeric),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinOp::Eq => Value::Bool(equal(&a, &b, numeric)),
        BinOp::Ne => Value::Bool(!equal(&a, &b, numeric)),
        // Both sides were already evaluated by the time we get here.
        BinOp::And => Value::Bool(a.is_truthy() && b.is_truthy()),
        BinOp::Or => Value::Bool(a.is_truthy() || b.is_truthy()),
    })
}

/// Repeated multiplication by a non-negative integral exponent.
fn power(base: f64, exp: f64) -> Result<f64> {
    if !exp.is_finite() || exp < 0.0 || exp.fract() != 0.0 {
        return Err(Error::InvalidExponent(format_float(exp)));
    }
    Ok(match i32::try_from(exp as i64) {
        Ok(n) => base.powi(n),
        Err(_) => base.powf(exp),
    })
}

fn compare(a: &Value, b: &Value, numeric: bool) -> Option<Ordering> {
    if numeric {
        a.to_number().partial_cmp(&b.to_number())
    } else {
        Some(a.to_text().cmp(&b.to_text()))
    }
}

fn equal(a: &Value, b: &Value, numeric: bool) -> bool {
    if numeric {
        a.to_number() == b.to_number()
    } else {
        a.to_text() == b.to_text()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Bindings;
    use crate::script::lexer::tokenize;

    fn postfix(src: &str) -> Vec<String> {
        to_postfix(tokenize(src).unwrap())
            .unwrap()
            .into_iter()
            .map(|t| match t {
                Token::Number(s) | Token::Str(s) | Token::Ident(s) | Token::Call(s) => s,
                Token::Op(op) => op.symbol().to_owned(),
                Token::LParen => "(".into(),
                Token::RParen => ")".into(),
            })
            .collect()
    }

    fn eval_with(src: &str, bindings: &Bindings) -> Result<Value> {
        let ctx = EvalContext::new(bindings, None, 64);
        eval_postfix(&to_postfix(tokenize(src)?)?, &ctx, 0)
    }

    fn eval(src: &str) -> Result<Value> {
        eval_with(src, &Bindings::new())
    }

    #[test]
    fn postfix_order() {
        assert_eq!(postfix("1 + 2 * 3"), ["1", "2", "3", "*", "+"]);
        assert_eq!(postfix("(1 + 2) * 3"), ["1", "2", "+", "3", "*"]);
        assert_eq!(postfix("a - b - c"), ["a", "b", "-", "c", "-"]);
    }

    #[test]
    fn power_is_left_associative() {
        assert_eq!(postfix("2 ** 3 ** 2"), ["2", "3", "**", "2", "**"]);
        assert_eq!(eval("2 ** 3 ** 2").unwrap(), Value::Float(64.0));
    }

    #[test]
    fn mismatched_parentheses() {
        assert!(matches!(
            to_postfix(tokenize("(1 + 2").unwrap()),
            Err(Error::MismatchedParentheses)
        ));
        assert!(matches!(
            to_postfix(tokenize("1 + 2)").unwrap()),
            Err(Error::MismatchedParentheses)
        ));
    }

    #[test]
    fn arithmetic_is_float() {
        assert_eq!(eval("1 + 2").unwrap(), Value::Float(3.0));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("2 * 3 - 1").unwrap(), Value::Float(5.0));
    }

    #[test]
    fn remainder_is_integer() {
        assert_eq!(eval("7 % 3").unwrap(), Value::Int(1));
        assert_eq!(eval("7.9 % 3").unwrap(), Value::Int(1));
    }

    #[test]
    fn division_by_zero() {
        assert!(matches!(eval("1 / 0"), Err(Error::DivisionByZero)));
        assert!(matches!(eval("1 % 0"), Err(Error::DivisionByZero)));
        assert!(matches!(eval("1 % 0.5"), Err(Error::DivisionByZero)));
    }

    #[test]
    fn exponent_must_be_non_negative_integer() {
        assert_eq!(eval("2 ** 10").unwrap(), Value::Float(1024.0));
        assert_eq!(eval("5 ** 0").unwrap(), Value::Float(1.0));
        assert!(matches!(eval("2 ** 0.5"), Err(Error::InvalidExponent(_))));
        assert!(matches!(eval("2 ** (0 - 1)"), Err(Error::InvalidExponent(_))));
    }

    #[test]
    fn concatenation() {
        assert_eq!(eval("'a' + 'b'").unwrap(), Value::Text("ab".into()));
        assert_eq!(eval("'n=' + 3").unwrap(), Value::Text("n=3".into()));
        assert_eq!(eval("'x' + 1.5").unwrap(), Value::Text("x1.5".into()));
    }

    #[test]
    fn non_numeric_operands() {
        assert!(matches!(
            eval("'a' - 1"),
            Err(Error::NonNumericOperand { op: "-" })
        ));
        // Numeric-looking text is still text.
        assert!(matches!(eval("'2' * 3"), Err(Error::NonNumericOperand { .. })));
    }

    #[test]
    fn functions_are_not_operands() {
        let b = Bindings::new()
            .with("name", "ann")
            .with("upper", crate::script::Function::from_fn(|s: String| s.to_uppercase()));
        // No implicit application: text followed by a function stays an error.
        for src in ["'x' + upper", "name + upper", "upper + name", "upper == upper", "upper && 1"] {
            assert!(
                matches!(eval_with(src, &b), Err(Error::FunctionOperand { .. })),
                "{src}"
            );
        }
        assert!(matches!(
            eval_with("upper * 2", &b),
            Err(Error::FunctionOperand { op: "*" })
        ));
        assert_eq!(
            eval_with("'x' + upper(name)", &b).unwrap(),
            Value::Text("xANN".into())
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("2 > 1").unwrap(), Value::Bool(true));
        assert_eq!(eval("2 <= 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("2 == 2.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("'b' > 'a'").unwrap(), Value::Bool(true));
        // Mixed operands compare as text.
        assert_eq!(eval("'10' < 9").unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' != 'abc'").unwrap(), Value::Bool(false));
    }

    #[test]
    fn logic_uses_truthiness() {
        assert_eq!(eval("1 && 'yes'").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 || ''").unwrap(), Value::Bool(false));
        assert_eq!(eval("'false' || 'x'").unwrap(), Value::Bool(true));
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        assert_eq!(
            eval(r#"'it\'s' + " \"ok\"""#).unwrap(),
            Value::Text("it's \"ok\"".into())
        );
    }

    #[test]
    fn identifiers() {
        let b = Bindings::new().with("age", 70).with("name", "Ann");
        assert_eq!(
            eval_with("age >= 18", &b).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            eval_with("missing + 1", &b),
            Err(Error::VariableNotFound(n)) if n == "missing"
        ));
        // `true` is not variable-shaped and falls back to its text.
        assert_eq!(eval_with("true && 1", &b).unwrap(), Value::Bool(true));
    }

    #[test]
    fn stack_underflow_and_leftovers() {
        assert!(matches!(eval("1 +"), Err(Error::NotEnoughOperands("+"))));
        assert!(matches!(eval("- 1"), Err(Error::NotEnoughOperands("-"))));
        assert!(matches!(eval("1 2"), Err(Error::InvalidExpressionResult(2))));
    }

    #[test]
    fn number_literals() {
        assert_eq!(parse_number("42").unwrap(), Value::Int(42));
        assert_eq!(parse_number("4.5").unwrap(), Value::Float(4.5));
        assert!(matches!(
            parse_number("99999999999999999999"),
            Err(Error::InvalidNumberFormat(_))
        ));
    }
}
