//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Boolean row-filter expressions used by `FILTER ... WHERE` clauses.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! or        := and ( OR and )*
//! and       := unary ( AND unary )*
//! unary     := NOT unary | predicate
//! predicate := operand [ cmp operand
//!                      | [NOT] LIKE operand
//!                      | [NOT] IN '(' operand ( ',' operand )* ')'
//!                      | IS [NOT] NULL ]
//! operand   := column | '[' column ']' | 'text' | number | TRUE | FALSE | NULL | '(' or ')'
//! cmp       := = | <> | != | < | <= | > | >=
//! ```
use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::dataset::{DataTable, RowView, Value};
use crate::error::{AdapterError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Column(String),
    Text(String),
    Number(f64, bool),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
enum Expr {
    Column(String),
    Literal(Value),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    Like {
        operand: Box<Expr>,
        pattern: Regex,
        negated: bool,
    },
    In {
        operand: Box<Expr>,
        items: Vec<Expr>,
        negated: bool,
    },
    IsNull(Box<Expr>, bool),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Parsed filter ready for evaluation.
#[derive(Debug)]
pub(crate) struct Predicate {
    root: Expr,
}

/// Parse a boolean filter expression.
pub(crate) fn parse(text: &str) -> Result<Predicate> {
    let tokens = tokenize(text).map_err(|reason| invalid(text, reason))?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let root = parser.parse_or().map_err(|reason| invalid(text, reason))?;
    if parser.position < parser.tokens.len() {
        return Err(invalid(
            text,
            format!("unexpected token {:?}", parser.tokens[parser.position]),
        ));
    }
    Ok(Predicate { root })
}

fn invalid(expression: &str, reason: impl Into<String>) -> AdapterError {
    AdapterError::InvalidFilterExpression {
        expression: expression.to_owned(),
        reason: reason.into(),
    }
}

impl Predicate {
    /// Fail when the expression references a column the table does not define.
    pub(crate) fn validate_columns(&self, table: &DataTable, text: &str) -> Result<()> {
        let mut columns = Vec::new();
        self.root.columns(&mut columns);
        for column in columns {
            if table.column_index(column).is_none() {
                return Err(invalid(
                    text,
                    format!("column \"{}\" does not exist in table \"{}\"", column, table.name),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn matches(&self, row: &RowView<'_>) -> bool {
        matches!(self.root.eval(row), Value::Bool(true))
    }
}

impl Expr {
    fn columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => out.push(name),
            Expr::Literal(_) => {}
            Expr::Compare(left, _, right) | Expr::And(left, right) | Expr::Or(left, right) => {
                left.columns(out);
                right.columns(out);
            }
            Expr::Like { operand, .. } | Expr::IsNull(operand, _) | Expr::Not(operand) => {
                operand.columns(out)
            }
            Expr::In { operand, items, .. } => {
                operand.columns(out);
                for item in items {
                    item.columns(out);
                }
            }
        }
    }

    fn eval(&self, row: &RowView<'_>) -> Value {
        match self {
            Expr::Column(name) => row.get(name).cloned().unwrap_or(Value::Null),
            Expr::Literal(value) => value.clone(),
            Expr::Compare(left, op, right) => {
                let (left, right) = (left.eval(row), right.eval(row));
                if left.is_null() || right.is_null() {
                    return Value::Null;
                }
                let result = match op {
                    CmpOp::Eq => left.loosely_equals(&right),
                    CmpOp::Ne => !left.loosely_equals(&right),
                    CmpOp::Lt => left.compare(&right) == Ordering::Less,
                    CmpOp::Le => left.compare(&right) != Ordering::Greater,
                    CmpOp::Gt => left.compare(&right) == Ordering::Greater,
                    CmpOp::Ge => left.compare(&right) != Ordering::Less,
                };
                Value::Bool(result)
            }
            Expr::Like {
                operand,
                pattern,
                negated,
            } => match operand.eval(row).as_text() {
                Some(text) => Value::Bool(pattern.is_match(&text) != *negated),
                None => Value::Null,
            },
            Expr::In {
                operand,
                items,
                negated,
            } => {
                let value = operand.eval(row);
                if value.is_null() {
                    return Value::Null;
                }
                let found = items.iter().any(|item| value.loosely_equals(&item.eval(row)));
                Value::Bool(found != *negated)
            }
            Expr::IsNull(operand, negated) => Value::Bool(operand.eval(row).is_null() != *negated),
            Expr::And(left, right) => match (truth(&left.eval(row)), truth(&right.eval(row))) {
                (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                (Some(true), Some(true)) => Value::Bool(true),
                _ => Value::Null,
            },
            Expr::Or(left, right) => match (truth(&left.eval(row)), truth(&right.eval(row))) {
                (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                (Some(false), Some(false)) => Value::Bool(false),
                _ => Value::Null,
            },
            Expr::Not(operand) => match truth(&operand.eval(row)) {
                Some(value) => Value::Bool(!value),
                None => Value::Null,
            },
        }
    }
}

fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        other => other.as_bool(),
    }
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        match ch {
            c if c.is_whitespace() => index += 1,
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                index += 1;
            }
            '\'' => {
                let mut literal = String::new();
                index += 1;
                loop {
                    match chars.get(index) {
                        None => return Err("unterminated string literal".to_owned()),
                        // '' escapes a quote inside a literal
                        Some('\'') if chars.get(index + 1) == Some(&'\'') => {
                            literal.push('\'');
                            index += 2;
                        }
                        Some('\'') => {
                            index += 1;
                            break;
                        }
                        Some(c) => {
                            literal.push(*c);
                            index += 1;
                        }
                    }
                }
                tokens.push(Token::Text(literal));
            }
            '[' => {
                let end = chars[index..]
                    .iter()
                    .position(|c| *c == ']')
                    .ok_or_else(|| "unterminated column reference".to_owned())?;
                let name: String = chars[index + 1..index + end].iter().collect();
                tokens.push(Token::Column(name.trim().to_owned()));
                index += end + 1;
            }
            '=' => {
                tokens.push(Token::Op("="));
                index += 1;
            }
            '<' | '>' | '!' => {
                let next = chars.get(index + 1).copied();
                let op = match (ch, next) {
                    ('<', Some('>')) => "<>",
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('!', Some('=')) => "!=",
                    ('<', _) => "<",
                    ('>', _) => ">",
                    _ => return Err(format!("unexpected character '{}'", ch)),
                };
                tokens.push(Token::Op(op));
                index += op.len();
            }
            c if c.is_ascii_digit()
                || c == '.'
                || (c == '-' && starts_operand(&tokens) && next_is_digit(&chars, index)) =>
            {
                let start = index;
                index += 1;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
                    index += 1;
                }
                let literal: String = chars[start..index].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number \"{}\"", literal))?;
                tokens.push(Token::Number(value, !literal.contains('.')));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = index;
                while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                    index += 1;
                }
                tokens.push(Token::Word(chars[start..index].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

fn starts_operand(tokens: &[Token]) -> bool {
    !matches!(
        tokens.last(),
        Some(Token::Word(_) | Token::Column(_) | Token::Text(_) | Token::Number(..) | Token::RParen)
    ) || matches!(tokens.last(), Some(Token::Word(word)) if is_keyword(word))
}

fn next_is_digit(chars: &[char], index: usize) -> bool {
    chars.get(index + 1).is_some_and(|c| c.is_ascii_digit() || *c == '.')
}

fn is_keyword(word: &str) -> bool {
    ["AND", "OR", "NOT", "LIKE", "IN", "IS"]
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {:?} but found {:?}", expected, token)),
            None => Err(format!("expected {:?} but reached end of expression", expected)),
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("AND") {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> ParseResult<Expr> {
        let operand = self.parse_operand()?;

        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.position += 1;
            let op = match op {
                "=" => CmpOp::Eq,
                "<>" | "!=" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                _ => CmpOp::Ge,
            };
            let right = self.parse_operand()?;
            return Ok(Expr::Compare(Box::new(operand), op, Box::new(right)));
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            if !self.eat_keyword("NULL") {
                return Err("expected NULL after IS".to_owned());
            }
            return Ok(Expr::IsNull(Box::new(operand), negated));
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("LIKE") {
            let pattern = match self.next() {
                Some(Token::Text(pattern)) => like_pattern(&pattern)?,
                other => return Err(format!("LIKE expects a string pattern, found {:?}", other)),
            };
            return Ok(Expr::Like {
                operand: Box::new(operand),
                pattern,
                negated,
            });
        }
        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut items = vec![self.parse_operand()?];
            while matches!(self.peek(), Some(Token::Comma)) {
                self.position += 1;
                items.push(self.parse_operand()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Expr::In {
                operand: Box::new(operand),
                items,
                negated,
            });
        }
        if negated {
            return Err("expected LIKE or IN after NOT".to_owned());
        }
        Ok(operand)
    }

    fn parse_operand(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Text(text)) => Ok(Expr::Literal(Value::Text(text))),
            Some(Token::Number(value, integral)) => Ok(Expr::Literal(if integral {
                Value::Integer(value as i64)
            } else {
                Value::Float(value)
            })),
            Some(Token::Column(name)) => Ok(Expr::Column(name)),
            Some(Token::Word(word)) => {
                if word.eq_ignore_ascii_case("TRUE") {
                    Ok(Expr::Literal(Value::Bool(true)))
                } else if word.eq_ignore_ascii_case("FALSE") {
                    Ok(Expr::Literal(Value::Bool(false)))
                } else if word.eq_ignore_ascii_case("NULL") {
                    Ok(Expr::Literal(Value::Null))
                } else if is_keyword(&word) {
                    Err(format!("unexpected keyword {}", word))
                } else {
                    Ok(Expr::Column(word))
                }
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".to_owned()),
        }
    }
}

fn like_pattern(pattern: &str) -> ParseResult<Regex> {
    let mut source = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' | '*' => source.push_str(".*"),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|err| err.to_string())
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortKey {
    pub(crate) column: String,
    descending: bool,
}

impl SortKey {
    pub(crate) fn parse_list(text: &str) -> Result<Vec<SortKey>> {
        let mut keys = Vec::new();
        for term in text.split(',') {
            let mut parts = term.split_whitespace();
            let Some(column) = parts.next() else {
                return Err(invalid(text, "empty sort term"));
            };
            let column = column.trim_start_matches('[').trim_end_matches(']');
            let descending = match parts.next() {
                None => false,
                Some(direction) if direction.eq_ignore_ascii_case("ASC") => false,
                Some(direction) if direction.eq_ignore_ascii_case("DESC") => true,
                Some(other) => return Err(invalid(text, format!("unknown sort direction {}", other))),
            };
            if parts.next().is_some() {
                return Err(invalid(text, "unexpected text after sort direction"));
            }
            keys.push(SortKey {
                column: column.to_owned(),
                descending,
            });
        }
        Ok(keys)
    }

    pub(crate) fn compare(&self, a: &RowView<'_>, b: &RowView<'_>) -> Ordering {
        let null = Value::Null;
        let left = a.get(&self.column).unwrap_or(&null);
        let right = b.get(&self.column).unwrap_or(&null);
        let ordering = left.compare(right);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}
