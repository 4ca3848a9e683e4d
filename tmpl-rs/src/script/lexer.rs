//! Expression tokenizer.
//!
//! Turns expression text into a flat token stream.  Every token keeps its raw
//! source text: numbers are parsed, strings unquoted and call spans parsed
//! only when the evaluator reaches them.

use std::fmt;

use crate::error::{Error, Result};

// ── Token ─────────────────────────────────────────────────────────────────────

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
        }
    }

    /// Binding strength; every operator is left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
            BinOp::Pow => 7,
        }
    }

    fn two_char(a: u8, b: u8) -> Option<BinOp> {
        Some(match (a, b) {
            (b'|', b'|') => BinOp::Or,
            (b'&', b'&') => BinOp::And,
            (b'=', b'=') => BinOp::Eq,
            (b'!', b'=') => BinOp::Ne,
            (b'>', b'=') => BinOp::Ge,
            (b'<', b'=') => BinOp::Le,
            (b'*', b'*') => BinOp::Pow,
            _ => return None,
        })
    }

    fn one_char(c: u8) -> Option<BinOp> {
        Some(match c {
            b'+' => BinOp::Add,
            b'-' => BinOp::Sub,
            b'*' => BinOp::Mul,
            b'/' => BinOp::Div,
            b'%' => BinOp::Rem,
            b'>' => BinOp::Gt,
            b'<' => BinOp::Lt,
            _ => return None,
        })
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Digit-led run with at most one `.`.
    Number(String),
    /// Quoted string, quotes included.
    Str(String),
    Ident(String),
    Op(BinOp),
    LParen,
    RParen,
    /// A whole `name(...)` span, parens balanced.
    Call(String),
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer {
            text,
            src: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn slice(&self, start: usize) -> String {
        self.text[start..self.pos].to_owned()
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' if seen_dot => {
                    return Err(Error::InvalidNumberFormat(format!(
                        "multiple decimal points in {:?}",
                        &self.text[start..=self.pos]
                    )));
                }
                b'.' => seen_dot = true,
                _ => break,
            }
            self.pos += 1;
        }
        Ok(Token::Number(self.slice(start)))
    }

    fn read_word(&mut self) -> Result<Token> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        if self.peek() != Some(b'(') {
            return Ok(Token::Ident(self.slice(start)));
        }
        match super::classify::matching_paren(self.src, self.pos) {
            Some(close) => {
                self.pos = close + 1;
                Ok(Token::Call(self.slice(start)))
            }
            None => Err(Error::UnclosedFunctionCall),
        }
    }

    fn read_string(&mut self, quote: u8) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(Error::UnterminatedString),
                Some(b'\\') => self.pos += 2,
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(Token::Str(self.slice(start)));
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn read_operator(&mut self) -> Result<Token> {
        let c = self.src[self.pos];
        if let Some(&next) = self.src.get(self.pos + 1) {
            if let Some(op) = BinOp::two_char(c, next) {
                self.pos += 2;
                return Ok(Token::Op(op));
            }
        }
        match BinOp::one_char(c) {
            Some(op) => {
                self.pos += 1;
                Ok(Token::Op(op))
            }
            None => Err(Error::UnexpectedCharacter {
                ch: self.text[self.pos..].chars().next().unwrap_or('\u{FFFD}'),
                pos: self.pos,
            }),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::with_capacity(16);
        while let Some(b) = self.peek() {
            let tok = match b {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.pos += 1;
                    continue;
                }
                b'0'..=b'9' => self.read_number()?,
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.read_word()?,
                b'"' | b'\'' => self.read_string(b)?,
                b'(' => {
                    self.pos += 1;
                    Token::LParen
                }
                b')' => {
                    self.pos += 1;
                    Token::RParen
                }
                _ => self.read_operator()?,
            };
            tokens.push(tok);
        }
        Ok(tokens)
    }
}

/// Tokenize expression text.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    Lexer::new(text).tokenize()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
