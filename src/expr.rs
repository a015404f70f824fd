//! Computed columns: arithmetic expressions over other columns, and regex
//! extraction from one column.
//!
//! An expression is parsed and bound to column handles once, when the column
//! is created. Cells evaluate the bound tree; the source text is kept only
//! for display on the columns sheet.
//!
//! Grammar, lowest precedence first:
//!   comparison := additive (('<' | '>' | '<=' | '>=' | '==' | '!=') additive)*
//!   additive   := term (('+' | '-') term)*
//!   term       := unary (('*' | '/' | '%') unary)*
//!   unary      := '-' unary | primary
//!   primary    := number | string | name | `quoted name` | '(' comparison ')'

use color_eyre::eyre::eyre;
use color_eyre::Result;
use regex::Regex;

use crate::column::Column;
use crate::config::DisplayConfig;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Integer(i64),
    Text(String),
    ColumnRef(String),
    Neg(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Integer(i64),
    StringLit(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(format!("unexpected {:?}", tokens[pos]));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => { tokens.push(Token::LtEq); chars.next(); }
                    Some('>') => { tokens.push(Token::NotEq); chars.next(); }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err("expected '=' after '!'".to_string());
                }
                tokens.push(Token::NotEq);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(ch) => s.push(ch),
                            None => return Err("unterminated string literal".to_string()),
                        },
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(ch) => name.push(ch),
                        None => return Err("unterminated column name".to_string()),
                    }
                }
                tokens.push(Token::Ident(name));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    let exponent_sign = (d == '+' || d == '-') && num.ends_with(['e', 'E']);
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Ok(i) = num.parse::<i64>() {
                    tokens.push(Token::Integer(i));
                } else {
                    let n = num
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number {num:?}"))?;
                    tokens.push(Token::Number(n));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }
    Ok(tokens)
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            Token::Percent => Op::Mod,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        Some(Token::Minus) => {
            let (inner, pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Neg(Box::new(inner)), pos))
        }
        Some(Token::Plus) => parse_unary(tokens, pos + 1),
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::Integer(i) => Ok((Expr::Integer(*i), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::Ident(name) => Ok((Expr::ColumnRef(name.clone()), pos + 1)),
        Token::LParen => {
            let (inner, pos) = parse_comparison(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((inner, pos + 1)),
                _ => Err("missing closing parenthesis".to_string()),
            }
        }
        other => Err(format!("unexpected {other:?}")),
    }
}

/// An expression with its column names resolved.
enum Bound {
    Const(Value),
    Column(Column),
    Neg(Box<Bound>),
    Binary(Op, Box<Bound>, Box<Bound>),
}

fn bind(expr: &Expr, columns: &[Column]) -> Result<Bound> {
    Ok(match expr {
        Expr::Number(n) => Bound::Const(Value::Real(*n)),
        Expr::Integer(i) => Bound::Const(Value::Int(*i)),
        Expr::Text(s) => Bound::Const(Value::Str(s.clone())),
        Expr::ColumnRef(name) => Bound::Column(
            columns
                .iter()
                .find(|c| c.name() == *name)
                .cloned()
                .ok_or_else(|| eyre!("no column named {name:?}"))?,
        ),
        Expr::Neg(inner) => Bound::Neg(Box::new(bind(inner, columns)?)),
        Expr::BinaryOp { op, left, right } => Bound::Binary(
            *op,
            Box::new(bind(left, columns)?),
            Box::new(bind(right, columns)?),
        ),
    })
}

/// Numeric view of an operand; strings that parse as numbers count.
fn number(v: &Value) -> Option<Value> {
    match v {
        Value::Int(_) | Value::Real(_) => Some(v.clone()),
        Value::Date(_) => v.as_f64().map(Value::Real),
        Value::Str(s) => {
            let t = s.trim();
            t.parse::<i64>()
                .map(Value::Int)
                .ok()
                .or_else(|| t.parse::<f64>().ok().map(Value::Real))
        }
        Value::None => None,
    }
}

fn arithmetic(op: Op, a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = match (number(a), number(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(eyre!("cannot apply {:?} to {:?} and {:?}", op, a.to_string(), b.to_string())),
    };
    if let (Value::Int(i), Value::Int(j)) = (&x, &y) {
        let r = match op {
            Op::Add => i.checked_add(*j),
            Op::Sub => i.checked_sub(*j),
            Op::Mul => i.checked_mul(*j),
            Op::Mod if *j == 0 => return Err(eyre!("modulo by zero")),
            Op::Mod => Some(i.rem_euclid(*j)),
            _ => None,
        };
        if let Some(r) = r {
            return Ok(Value::Int(r));
        }
    }
    let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
    match op {
        Op::Div | Op::Mod if y == 0.0 => Err(eyre!("division by zero")),
        Op::Add => Ok(Value::Real(x + y)),
        Op::Sub => Ok(Value::Real(x - y)),
        Op::Mul => Ok(Value::Real(x * y)),
        Op::Div => Ok(Value::Real(x / y)),
        Op::Mod => Ok(Value::Real(x.rem_euclid(y))),
        _ => Err(eyre!("{op:?} is not arithmetic")),
    }
}

/// Comparisons yield 1 or 0.
fn comparison(op: Op, a: &Value, b: &Value) -> Value {
    let ord = match (number(a), number(b)) {
        (Some(x), Some(y)) if !matches!((a, b), (Value::Str(_), Value::Str(_))) => x.compare(&y),
        _ => a.compare(b),
    };
    let truth = match op {
        Op::Lt => ord.is_lt(),
        Op::Gt => ord.is_gt(),
        Op::Eq => ord.is_eq(),
        Op::LtEq => ord.is_le(),
        Op::GtEq => ord.is_ge(),
        _ => ord.is_ne(),
    };
    Value::Int(truth as i64)
}

impl Bound {
    fn eval(&self, row: &crate::row::Row) -> Result<Value> {
        match self {
            Bound::Const(v) => Ok(v.clone()),
            Bound::Column(c) => Ok(c.get_typed(row)?),
            Bound::Neg(inner) => match inner.eval(row)? {
                Value::None => Ok(Value::None),
                v => arithmetic(Op::Sub, &Value::Int(0), &v),
            },
            Bound::Binary(op, left, right) => {
                let a = left.eval(row)?;
                let b = right.eval(row)?;
                match op {
                    Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => Ok(comparison(*op, &a, &b)),
                    _ if a.is_none() || b.is_none() => Ok(Value::None),
                    Op::Add => match (&a, &b) {
                        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
                        _ => arithmetic(Op::Add, &a, &b),
                    },
                    _ => arithmetic(*op, &a, &b),
                }
            }
        }
    }
}

/// A column computing `source` over the other columns of a sheet.
pub fn expr_column(source: &str, columns: &[Column]) -> Result<Column> {
    let parsed = parse(source).map_err(|e| eyre!("{e} in expression {source:?}"))?;
    let bound = bind(&parsed, columns)?;
    Ok(Column::new(source, move |row| bound.eval(row)).with_expr(source))
}

/// A column holding the first capture group (or the whole match) of
/// `regex` in `source`'s displayed value. Rows without a match are empty.
pub fn regex_column(source: &Column, regex: Regex, display: &DisplayConfig) -> Column {
    let src = source.clone();
    let display = display.clone();
    let name = format!("{}_re", source.name());
    let expr = regex.as_str().to_string();
    Column::new(name, move |row| {
        let text = src.get_display_value(row, &display);
        Ok(regex
            .captures(&text)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| Value::Str(m.as_str().to_string()))
            .unwrap_or(Value::None))
    })
    .with_expr(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use crate::value::ValueType;

    fn columns() -> Vec<Column> {
        vec![
            Column::field("a", 0).with_type(ValueType::Int),
            Column::field("b", 1).with_type(ValueType::Real),
            Column::field("first name", 2),
        ]
    }

    fn row() -> Row {
        Row::fields(vec![Value::from("6"), Value::from("1.5"), Value::from("Ada")])
    }

    fn eval(src: &str) -> Value {
        expr_column(src, &columns()).unwrap().get_raw(&row()).unwrap()
    }

    #[test]
    fn test_parse_precedence() {
        let e = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            binary(
                Op::Add,
                Expr::Integer(1),
                binary(Op::Mul, Expr::Integer(2), Expr::Integer(3))
            )
        );
        assert!(parse("(1 + 2").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_eval_arithmetic() {
        assert_eq!(eval("a * 2"), Value::Int(12));
        assert_eq!(eval("a / 4"), Value::Real(1.5));
        assert_eq!(eval("a + b"), Value::Real(7.5));
        assert_eq!(eval("-a % 4"), Value::Int(2));
        assert_eq!(eval("a > b"), Value::Int(1));
    }

    #[test]
    fn test_eval_strings_and_quoted_names() {
        assert_eq!(eval("`first name` + \"!\""), Value::Str("Ada!".into()));
    }

    #[test]
    fn test_unknown_column_fails_at_creation() {
        assert!(expr_column("nope + 1", &columns()).is_err());
    }

    #[test]
    fn test_division_by_zero_is_a_cell_failure() {
        let col = expr_column("a / 0", &columns()).unwrap();
        assert!(matches!(col.get_value(&row()), crate::value::CellValue::Failed(_)));
    }

    #[test]
    fn test_regex_column() {
        let rows = Row::fields(vec![Value::from("id-42")]);
        let src = Column::field("code", 0);
        let re = Regex::new(r"-(\d+)").unwrap();
        let col = regex_column(&src, re, &DisplayConfig::default());
        assert_eq!(col.get_raw(&rows).unwrap(), Value::Str("42".into()));
        assert_eq!(col.name(), "code_re");
    }
}
