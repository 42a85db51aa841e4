//! Boolean conditions for managed files
//!
//! A managed file's `condition` is a small expression over the rendering
//! context, e.g. `variant == 'laptop' and system.os in ['linux', 'darwin']`.
//! The grammar is closed: literals, dotted variable paths, comparisons,
//! `in`/`not in`, `and`/`or`/`not` (with `&&`/`||`/`!` aliases), list
//! literals and parentheses. Nothing else is evaluated.

use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Errors that can occur during condition parsing or evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    /// The condition expression could not be parsed
    #[error("Failed to parse condition expression '{expression}': {details}")]
    ParseError {
        /// Source text of the condition
        expression: String,
        /// Why parsing stopped
        details: String,
    },

    /// The condition evaluation failed
    #[error("Failed to evaluate condition '{expression}': {details}")]
    EvaluationError {
        /// Source text of the condition
        expression: String,
        /// Why evaluation failed
        details: String,
    },
}

/// AST nodes for condition expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionAst {
    /// `'str'`, `1.5`, `True`, `None`, ...
    Literal(JsonValue),
    /// `system.os`
    Path(Vec<String>),
    /// `['a', 'b']`
    List(Vec<ConditionAst>),
    /// `not expr`
    Not(Box<ConditionAst>),
    /// `left and right`, `left or right`
    Logical {
        /// Left operand
        left: Box<ConditionAst>,
        /// Operator
        operator: LogicalOp,
        /// Right operand
        right: Box<ConditionAst>,
    },
    /// `left == right`, `left in right`, ...
    Comparison {
        /// Left operand
        left: Box<ConditionAst>,
        /// Operator
        operator: ComparisonOp,
        /// Right operand
        right: Box<ConditionAst>,
    },
}

/// Comparison operators supported in condition expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// Logical operators supported in condition expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `and`
    And,
    /// `or`
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(serde_json::Number),
    Compare(ComparisonOp),
    And,
    Or,
    Not,
    In,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            _ if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Compare(ComparisonOp::Equal));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Compare(ComparisonOp::NotEqual));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let eq = next == Some('=');
                let op = match (c, eq) {
                    ('<', false) => ComparisonOp::Less,
                    ('<', true) => ComparisonOp::LessEq,
                    ('>', false) => ComparisonOp::Greater,
                    _ => ComparisonOp::GreaterEq,
                };
                tokens.push(Token::Compare(op));
                i += if eq { 2 } else { 1 };
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            _ if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = if text.contains('.') {
                    text.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                } else {
                    text.parse::<i64>().ok().map(serde_json::Number::from)
                };
                tokens.push(Token::Number(
                    number.ok_or_else(|| format!("invalid number '{text}'"))?,
                ));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(format!("unexpected character '{c}'")),
        }
    }

    Ok(tokens)
}

/// Parser for condition expressions
pub struct ConditionParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ConditionParser {
    /// Parse a condition expression string into an AST
    pub fn parse(expression: &str) -> Result<ConditionAst, ConditionError> {
        let parse_error = |details: String| ConditionError::ParseError {
            expression: expression.to_string(),
            details,
        };

        let tokens = tokenize(expression).map_err(parse_error)?;
        if tokens.is_empty() {
            return Err(parse_error("empty expression".to_string()));
        }

        let mut parser = Self { tokens, pos: 0 };
        let ast = parser.parse_or().map_err(parse_error)?;
        if let Some(token) = parser.peek() {
            return Err(parse_error(format!("unexpected trailing {token:?}")));
        }
        Ok(ast)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(format!("expected {expected:?}, found {other:?}")),
        }
    }

    fn parse_or(&mut self) -> Result<ConditionAst, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = ConditionAst::Logical {
                left: Box::new(left),
                operator: LogicalOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ConditionAst, String> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = ConditionAst::Logical {
                left: Box::new(left),
                operator: LogicalOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<ConditionAst, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(ConditionAst::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<ConditionAst, String> {
        let left = self.parse_primary()?;

        let operator = match (self.peek(), self.tokens.get(self.pos + 1)) {
            (Some(Token::Compare(op)), _) => {
                let op = *op;
                self.pos += 1;
                op
            }
            (Some(Token::In), _) => {
                self.pos += 1;
                ComparisonOp::In
            }
            (Some(Token::Not), Some(Token::In)) => {
                self.pos += 2;
                ComparisonOp::NotIn
            }
            _ => return Ok(left),
        };

        let right = self.parse_primary()?;
        Ok(ConditionAst::Comparison {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<ConditionAst, String> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.peek() == Some(&Token::RBracket) {
                    self.pos += 1;
                    return Ok(ConditionAst::List(items));
                }
                loop {
                    items.push(self.parse_or()?);
                    match self.advance() {
                        Some(Token::Comma) => {}
                        Some(Token::RBracket) => break,
                        other => return Err(format!("expected ',' or ']', found {other:?}")),
                    }
                }
                Ok(ConditionAst::List(items))
            }
            Some(Token::Str(s)) => Ok(ConditionAst::Literal(JsonValue::String(s))),
            Some(Token::Number(n)) => Ok(ConditionAst::Literal(JsonValue::Number(n))),
            Some(Token::Ident(word)) => Ok(match word.as_str() {
                "True" | "true" => ConditionAst::Literal(JsonValue::Bool(true)),
                "False" | "false" => ConditionAst::Literal(JsonValue::Bool(false)),
                "None" | "null" => ConditionAst::Literal(JsonValue::Null),
                _ => {
                    let mut segments = vec![word];
                    while self.peek() == Some(&Token::Dot) {
                        self.pos += 1;
                        match self.advance() {
                            Some(Token::Ident(segment)) => segments.push(segment),
                            Some(Token::Number(n)) => segments.push(n.to_string()),
                            other => return Err(format!("expected name after '.', found {other:?}")),
                        }
                    }
                    ConditionAst::Path(segments)
                }
            }),
            other => Err(format!("unexpected {other:?}")),
        }
    }
}

/// Evaluates condition expressions against a JSON context
pub struct ConditionEvaluator<'a> {
    context: &'a JsonValue,
}

impl<'a> ConditionEvaluator<'a> {
    /// Evaluate against `context`
    pub fn new(context: &'a JsonValue) -> Self {
        Self { context }
    }

    /// Parse and evaluate `expression`, returning its truthiness
    pub fn evaluate(&self, expression: &str) -> Result<bool, ConditionError> {
        let ast = ConditionParser::parse(expression)?;
        self.evaluate_ast(&ast)
            .map(|value| truthy(&value))
            .map_err(|details| ConditionError::EvaluationError {
                expression: expression.to_string(),
                details,
            })
    }

    /// Evaluate a parsed expression to a value
    pub fn evaluate_ast(&self, ast: &ConditionAst) -> Result<JsonValue, String> {
        match ast {
            ConditionAst::Literal(value) => Ok(value.clone()),
            ConditionAst::Path(segments) => Ok(self.lookup(segments)),
            ConditionAst::List(items) => items
                .iter()
                .map(|item| self.evaluate_ast(item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            ConditionAst::Not(inner) => Ok(JsonValue::Bool(!truthy(&self.evaluate_ast(inner)?))),
            ConditionAst::Logical {
                left,
                operator,
                right,
            } => {
                let left = truthy(&self.evaluate_ast(left)?);
                let result = match operator {
                    LogicalOp::And => left && truthy(&self.evaluate_ast(right)?),
                    LogicalOp::Or => left || truthy(&self.evaluate_ast(right)?),
                };
                Ok(JsonValue::Bool(result))
            }
            ConditionAst::Comparison {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_ast(left)?;
                let right = self.evaluate_ast(right)?;
                compare(&left, *operator, &right).map(JsonValue::Bool)
            }
        }
    }

    fn lookup(&self, segments: &[String]) -> JsonValue {
        let mut current = self.context;
        for segment in segments {
            let next = match current {
                JsonValue::Object(map) => map.get(segment),
                JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return JsonValue::Null,
            }
        }
        current.clone()
    }
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

fn equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &JsonValue, operator: ComparisonOp, right: &JsonValue) -> Result<bool, String> {
    match operator {
        ComparisonOp::Equal => Ok(equal(left, right)),
        ComparisonOp::NotEqual => Ok(!equal(left, right)),
        ComparisonOp::In => contains(right, left),
        ComparisonOp::NotIn => contains(right, left).map(|found| !found),
        ComparisonOp::Less | ComparisonOp::LessEq | ComparisonOp::Greater | ComparisonOp::GreaterEq => {
            let ordering = order(left, right)?;
            Ok(match operator {
                ComparisonOp::Less => ordering == Ordering::Less,
                ComparisonOp::LessEq => ordering != Ordering::Greater,
                ComparisonOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn order(left: &JsonValue, right: &JsonValue) -> Result<Ordering, String> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b)
                .ok_or_else(|| "cannot order these numbers".to_string())
        }
        (JsonValue::String(a), JsonValue::String(b)) => Ok(a.cmp(b)),
        _ => Err(format!("cannot order {left} and {right}")),
    }
}

fn contains(container: &JsonValue, item: &JsonValue) -> Result<bool, String> {
    match (container, item) {
        (JsonValue::Array(items), _) => Ok(items.iter().any(|candidate| equal(candidate, item))),
        (JsonValue::String(haystack), JsonValue::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (JsonValue::Object(map), JsonValue::String(key)) => Ok(map.contains_key(key)),
        (JsonValue::Null, _) => Ok(false),
        _ => Err(format!("'in' is not supported for {item} and {container}")),
    }
}
