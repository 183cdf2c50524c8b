//! # Step Guard Module / 步骤守卫模块
//!
//! Parses and evaluates the small boolean language used in a step's `when`
//! field. It accepts the shell-test style found in CI files:
//!
//! 解析并求值步骤 `when` 字段中使用的小型布尔语言，接受 CI 文件中常见的 shell 测试风格：
//!
//! ```text
//! SKIP_TESTS != true
//! [[ $BUILD_DOCS == true && $CI_BRANCH == master && $CI_PULL_REQUEST == false ]]
//! !(COVERALLS || "${NUMPY_VERSION}" == '1.10')
//! ```
//!
//! A bare word is a variable on the left of a comparison and a literal on the
//! right. A lone operand tests truthiness (`true`, `1`, `yes`, `on`). Unset
//! variables compare as the empty string.

use anyhow::{Result, bail};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::environment::JobEnv;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Var(String),
    Literal(String),
}

impl Operand {
    fn resolve<'a>(&'a self, env: &'a JobEnv) -> &'a str {
        match self {
            Operand::Var(name) => env.get(name).unwrap_or(""),
            Operand::Literal(value) => value,
        }
    }

    /// Writes the operand so that parsing it again in the same position gives
    /// the same operand. `bare_identifier` tells whether a bare identifier
    /// reads back as a literal in that position (only the right of a comparison).
    fn write(&self, f: &mut fmt::Formatter<'_>, bare_identifier: bool) -> fmt::Result {
        let value = match self {
            Operand::Var(name) => return write!(f, "${}", name),
            Operand::Literal(value) => value,
        };
        let bare = !value.is_empty()
            && value.chars().all(is_word_char)
            && (bare_identifier || !crate::core::config::is_identifier(value));
        if bare {
            f.write_str(value)
        } else if value.contains('\'') {
            write!(f, "\"{}\"", value)
        } else {
            write!(f, "'{}'", value)
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// A parsed guard expression.
/// 已解析的守卫表达式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Truthy(Operand),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Parses a guard expression.
    ///
    /// 解析守卫表达式。
    pub fn parse(input: &str) -> Result<Condition> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            bail!("empty condition");
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            input_len: input.len(),
        };
        let condition = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            bail!(
                "unexpected token '{}' at offset {}",
                token.kind,
                token.offset
            );
        }
        Ok(condition)
    }

    /// Evaluates the guard against a job environment.
    ///
    /// 针对作业环境对守卫求值。
    pub fn evaluate(&self, env: &JobEnv) -> bool {
        match self {
            Condition::Truthy(operand) => is_truthy(operand.resolve(env)),
            Condition::Compare { left, op, right } => {
                let equal = left.resolve(env) == right.resolve(env);
                match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                }
            }
            Condition::Not(inner) => !inner.evaluate(env),
            Condition::And(a, b) => a.evaluate(env) && b.evaluate(env),
            Condition::Or(a, b) => a.evaluate(env) || b.evaluate(env),
        }
    }

    /// Every variable the guard reads.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        fn add(vars: &mut BTreeSet<String>, operand: &Operand) {
            if let Operand::Var(name) = operand {
                vars.insert(name.clone());
            }
        }
        match self {
            Condition::Truthy(operand) => add(vars, operand),
            Condition::Compare { left, right, .. } => {
                add(vars, left);
                add(vars, right);
            }
            Condition::Not(inner) => inner.collect_variables(vars),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Truthy(operand) => {
                // A lone `true` or `false` already reads back as a literal.
                let constant = matches!(operand, Operand::Literal(v) if v == "true" || v == "false");
                operand.write(f, constant)
            }
            Condition::Compare { left, op, right } => {
                let op = match op {
                    CompareOp::Eq => "==",
                    CompareOp::Ne => "!=",
                };
                left.write(f, false)?;
                write!(f, " {} ", op)?;
                right.write(f, true)
            }
            Condition::Not(inner) => match inner.as_ref() {
                Condition::Truthy(_) | Condition::Not(_) => write!(f, "!{}", inner),
                _ => write!(f, "!({})", inner),
            },
            Condition::And(a, b) => {
                write_grouped(f, a, true)?;
                f.write_str(" && ")?;
                write_grouped(f, b, true)
            }
            Condition::Or(a, b) => {
                write_grouped(f, a, false)?;
                f.write_str(" || ")?;
                write_grouped(f, b, false)
            }
        }
    }
}

fn write_grouped(f: &mut fmt::Formatter<'_>, c: &Condition, inside_and: bool) -> fmt::Result {
    if inside_and && matches!(c, Condition::Or(..)) {
        write!(f, "({})", c)
    } else {
        write!(f, "{}", c)
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !"()!=&|\"'$[]".contains(c)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Open,
    Close,
    OpenTest,
    CloseTest,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Var(String),
    Word(String),
    Quoted(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Open => f.write_str("("),
            TokenKind::Close => f.write_str(")"),
            TokenKind::OpenTest => f.write_str("[["),
            TokenKind::CloseTest => f.write_str("]]"),
            TokenKind::And => f.write_str("&&"),
            TokenKind::Or => f.write_str("||"),
            TokenKind::Not => f.write_str("!"),
            TokenKind::Eq => f.write_str("=="),
            TokenKind::Ne => f.write_str("!="),
            TokenKind::Var(name) => write!(f, "${}", name),
            TokenKind::Word(word) => f.write_str(word),
            TokenKind::Quoted(text) => write!(f, "'{}'", text),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let two = if i + 1 < bytes.len() {
            Some((c, bytes[i + 1]))
        } else {
            None
        };

        let kind = match (c, two) {
            (b' ' | b'\t' | b'\n' | b'\r', _) => {
                i += 1;
                continue;
            }
            (_, Some((b'&', b'&'))) => {
                i += 2;
                TokenKind::And
            }
            (_, Some((b'|', b'|'))) => {
                i += 2;
                TokenKind::Or
            }
            (_, Some((b'=', b'='))) => {
                i += 2;
                TokenKind::Eq
            }
            (_, Some((b'!', b'='))) => {
                i += 2;
                TokenKind::Ne
            }
            (_, Some((b'[', b'['))) => {
                i += 2;
                TokenKind::OpenTest
            }
            (_, Some((b']', b']'))) => {
                i += 2;
                TokenKind::CloseTest
            }
            (b'=', _) => {
                i += 1;
                TokenKind::Eq
            }
            (b'!', _) => {
                i += 1;
                TokenKind::Not
            }
            (b'(', _) => {
                i += 1;
                TokenKind::Open
            }
            (b')', _) => {
                i += 1;
                TokenKind::Close
            }
            (b'$', _) => {
                let (name, end) = read_variable(input, i)?;
                i = end;
                TokenKind::Var(name)
            }
            (b'"' | b'\'', _) => {
                let quote = c as char;
                let body_start = i + 1;
                match input[body_start..].find(quote) {
                    Some(len) => {
                        i = body_start + len + 1;
                        let body = &input[body_start..body_start + len];
                        // A double-quoted lone variable ("$X" or "${X}") stays a variable.
                        if quote == '"' && body.starts_with('$') {
                            match read_variable(body, 0) {
                                Ok((name, end)) if end == body.len() => TokenKind::Var(name),
                                _ => TokenKind::Quoted(body.to_string()),
                            }
                        } else {
                            TokenKind::Quoted(body.to_string())
                        }
                    }
                    None => bail!("unterminated string starting at offset {}", start),
                }
            }
            _ => {
                let rest = &input[i..];
                let len = rest
                    .char_indices()
                    .find(|(_, ch)| !is_word_char(*ch))
                    .map(|(idx, _)| idx)
                    .unwrap_or(rest.len());
                if len == 0 {
                    let ch = rest.chars().next().unwrap_or('?');
                    bail!("unexpected character '{}' at offset {}", ch, start);
                }
                i += len;
                TokenKind::Word(rest[..len].to_string())
            }
        };
        tokens.push(Token {
            kind,
            offset: start,
        });
    }
    Ok(tokens)
}

/// Reads `$NAME` or `${NAME}` starting at `start` (which points at `$`).
fn read_variable(input: &str, start: usize) -> Result<(String, usize)> {
    let rest = &input[start + 1..];
    if let Some(inner) = rest.strip_prefix('{') {
        match inner.find('}') {
            Some(len) if crate::core::config::is_identifier(&inner[..len]) => {
                Ok((inner[..len].to_string(), start + 2 + len + 1))
            }
            _ => bail!("malformed variable reference at offset {}", start),
        }
    } else {
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let name = &rest[..len];
        if !crate::core::config::is_identifier(name) {
            bail!("malformed variable reference at offset {}", start);
        }
        Ok((name.to_string(), start + 1 + len))
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    input_len: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Condition> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition> {
        let mut left = self.parse_unary()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Condition> {
        if self.eat(&TokenKind::Not) {
            let inner = self.parse_unary()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition> {
        let close = if self.eat(&TokenKind::Open) {
            Some(TokenKind::Close)
        } else if self.eat(&TokenKind::OpenTest) {
            Some(TokenKind::CloseTest)
        } else {
            None
        };
        if let Some(close) = close {
            let inner = self.parse_or()?;
            match self.next() {
                Some(token) if token.kind == close => return Ok(inner),
                Some(token) => bail!(
                    "expected '{}' but found '{}' at offset {}",
                    close,
                    token.kind,
                    token.offset
                ),
                None => bail!("missing '{}' at end of condition", close),
            }
        }

        let left = self.parse_operand(true)?;
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Eq) => CompareOp::Eq,
            Some(TokenKind::Ne) => CompareOp::Ne,
            _ => return Ok(Condition::Truthy(lone_operand(left))),
        };
        self.pos += 1;
        let right = self.parse_operand(false)?;
        Ok(Condition::Compare { left, op, right })
    }

    fn parse_operand(&mut self, left_side: bool) -> Result<Operand> {
        let input_len = self.input_len;
        match self.next() {
            Some(Token {
                kind: TokenKind::Var(name),
                ..
            }) => Ok(Operand::Var(name.clone())),
            Some(Token {
                kind: TokenKind::Quoted(text),
                ..
            }) => Ok(Operand::Literal(text.clone())),
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) => {
                if left_side && crate::core::config::is_identifier(word) {
                    Ok(Operand::Var(word.clone()))
                } else {
                    Ok(Operand::Literal(word.clone()))
                }
            }
            Some(token) => bail!(
                "expected a variable or value but found '{}' at offset {}",
                token.kind,
                token.offset
            ),
            None => bail!(
                "expected a variable or value at offset {}",
                input_len
            ),
        }
    }
}

/// `true` and `false` on their own are constants, not variable names.
fn lone_operand(operand: Operand) -> Operand {
    match operand {
        Operand::Var(name) if name == "true" || name == "false" => Operand::Literal(name),
        other => other,
    }
}
