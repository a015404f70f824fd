//! Cell values, column types, and the coercion rules between them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt::{self, Write as _};

/// A computed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Str(String),
    Int(i64),
    Real(f64),
    Date(NaiveDateTime),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Date(d) => Some(d.and_utc().timestamp() as f64),
            _ => None,
        }
    }

    /// Converts into `ty`. `None` passes through every type unchanged.
    pub fn coerce(&self, ty: ValueType) -> Option<Value> {
        if self.is_none() {
            return Some(Value::None);
        }
        match ty {
            ValueType::Any => Some(self.clone()),
            ValueType::Str => Some(Value::Str(self.to_string())),
            ValueType::Int => match self {
                Value::Int(i) => Some(Value::Int(*i)),
                Value::Real(f) if f.is_finite() => Some(Value::Int(f.trunc() as i64)),
                Value::Real(_) => None,
                Value::Date(d) => Some(Value::Int(d.and_utc().timestamp())),
                Value::Str(s) => blank_or(s, |t| t.parse::<i64>().ok().map(Value::Int)),
                Value::None => Some(Value::None),
            },
            ValueType::Real => match self {
                Value::Real(f) => Some(Value::Real(*f)),
                Value::Str(s) => blank_or(s, |t| t.parse::<f64>().ok().map(Value::Real)),
                other => other.as_f64().map(Value::Real),
            },
            ValueType::Date => match self {
                Value::Date(d) => Some(Value::Date(*d)),
                Value::Int(i) => DateTime::from_timestamp(*i, 0).map(|d| Value::Date(d.naive_utc())),
                Value::Real(f) if f.is_finite() => {
                    let secs = f.trunc() as i64;
                    let nanos = ((f - f.trunc()) * 1e9).round() as u32;
                    DateTime::from_timestamp(secs, nanos).map(|d| Value::Date(d.naive_utc()))
                }
                Value::Real(_) => None,
                Value::Str(s) => blank_or(s, |t| parse_date(t).map(Value::Date)),
                Value::None => Some(Value::None),
            },
        }
    }

    /// Total order used by sorting: numbers and dates compare numerically,
    /// everything else by its string form.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::None, Value::None) => Ordering::Equal,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.to_string().cmp(&b.to_string()),
            },
        }
    }
}

fn blank_or(s: &str, parse: impl Fn(&str) -> Option<Value>) -> Option<Value> {
    let t = s.trim();
    if t.is_empty() {
        Some(Value::None)
    } else {
        parse(t)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(x) => write!(f, "{x:?}"),
            Value::Date(d) if d.time() == NaiveTime::MIN => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// Untyped: values are shown as the getter produced them.
    #[default]
    Any,
    Str,
    Int,
    Real,
    Date,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Any => "",
            ValueType::Str => "str",
            ValueType::Int => "int",
            ValueType::Real => "float",
            ValueType::Date => "date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "" | "any" | "anytype" => Some(ValueType::Any),
            "str" | "string" | "text" => Some(ValueType::Str),
            "int" | "integer" => Some(ValueType::Int),
            "float" | "real" | "decimal" => Some(ValueType::Real),
            "date" | "datetime" => Some(ValueType::Date),
            _ => None,
        }
    }

}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of evaluating one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Ok(Value),
    /// The raw value could not be converted to the column type.
    WrongType(String),
    /// The getter failed; holds the error message.
    Failed(String),
}

impl CellValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            CellValue::Ok(v) => Some(v),
            _ => None,
        }
    }

    /// Sort rank: valued cells, then empty, then wrong-type, then failures.
    pub fn rank(&self) -> u8 {
        match self {
            CellValue::Ok(Value::None) => 1,
            CellValue::Ok(_) => 0,
            CellValue::WrongType(_) => 2,
            CellValue::Failed(_) => 3,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Ok(v) => v.fmt(f),
            CellValue::WrongType(raw) => f.write_str(raw),
            CellValue::Failed(msg) => f.write_str(msg),
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Parses the date spellings commonly found in exported data.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.len() < 6 {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// `[+-]?(0|[1-9][0-9]*)`
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !(digits.len() > 1 && digits.starts_with('0'))
}

/// Decimal literal with optional fraction and exponent; the integer part
/// follows the same no-leading-zero rule as integers.
fn is_real_literal(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    if int_part.is_empty() && frac_part.is_none_or(str::is_empty) {
        return false;
    }
    let int_ok = int_part.is_empty() || is_integer_literal(int_part);
    let frac_ok = frac_part.is_none_or(|f| f.bytes().all(|b| b.is_ascii_digit()));
    let exp_ok = exponent.is_none_or(|e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit())
    });
    int_ok && frac_ok && exp_ok && (frac_part.is_some() || exponent.is_some())
}

/// Picks the narrowest type that parses `raw`: integer, then real, then date,
/// falling back to string.
pub fn detect_type(raw: &str) -> ValueType {
    let s = raw.trim();
    if is_integer_literal(s) && s.parse::<i64>().is_ok() {
        ValueType::Int
    } else if is_real_literal(s) && s.parse::<f64>().is_ok() {
        ValueType::Real
    } else if parse_date(s).is_some() {
        ValueType::Date
    } else {
        ValueType::Str
    }
}

/// Applies a printf-style (`%.2f`, `%d`, `%e`) or strftime format. Returns
/// `None` when the format does not apply to the value.
pub fn format_value(value: &Value, fmt: &str) -> Option<String> {
    match value {
        Value::Date(d) => {
            let mut out = String::new();
            write!(out, "{}", d.format(fmt)).ok()?;
            Some(out)
        }
        Value::Int(_) | Value::Real(_) => {
            let x = value.as_f64()?;
            let spec = fmt.strip_prefix('%')?;
            match spec {
                "d" | "i" => Some(format!("{}", x.trunc() as i64)),
                "f" => Some(format!("{x:.6}")),
                "e" => Some(format!("{x:e}")),
                "s" => Some(value.to_string()),
                _ => {
                    let precision: usize = spec
                        .strip_prefix('.')?
                        .strip_suffix('f')?
                        .parse()
                        .ok()?;
                    Some(format!("{x:.precision$}"))
                }
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_type_basic() {
        assert_eq!(detect_type("42"), ValueType::Int);
        assert_eq!(detect_type("-7"), ValueType::Int);
        assert_eq!(detect_type("3.14"), ValueType::Real);
        assert_eq!(detect_type("1e10"), ValueType::Real);
        assert_eq!(detect_type("2021-01-01"), ValueType::Date);
        assert_eq!(detect_type("hello"), ValueType::Str);
        assert_eq!(detect_type(""), ValueType::Str);
    }

    #[test]
    fn test_detect_type_leading_zeros_are_strings() {
        assert_eq!(detect_type("007"), ValueType::Str);
        assert_eq!(detect_type("00.5"), ValueType::Str);
        assert_eq!(detect_type("0"), ValueType::Int);
        assert_eq!(detect_type("0.5"), ValueType::Real);
    }

    #[test]
    fn test_detect_type_rejects_special_floats() {
        assert_eq!(detect_type("nan"), ValueType::Str);
        assert_eq!(detect_type("inf"), ValueType::Str);
        assert_eq!(detect_type("."), ValueType::Str);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::from(" 12 ").coerce(ValueType::Int), Some(Value::Int(12)));
        assert_eq!(Value::from("x").coerce(ValueType::Int), None);
        assert_eq!(Value::from("").coerce(ValueType::Real), Some(Value::None));
        assert_eq!(Value::Real(2.9).coerce(ValueType::Int), Some(Value::Int(2)));
        assert_eq!(Value::Int(3).coerce(ValueType::Str), Some(Value::from("3")));
        assert_eq!(Value::None.coerce(ValueType::Date), Some(Value::None));
        let d = Value::from("2021-03-04").coerce(ValueType::Date);
        assert_eq!(d.map(|v| v.to_string()), Some("2021-03-04".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
        assert_eq!(Value::Int(-5).to_string(), "-5");
        assert_eq!(Value::None.to_string(), "");
        let dt = parse_date("2020-01-02 03:04:05").map(Value::Date);
        assert_eq!(dt.map(|v| v.to_string()), Some("2020-01-02 03:04:05".into()));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Real(3.14159), "%.2f"), Some("3.14".into()));
        assert_eq!(format_value(&Value::Int(7), "%.1f"), Some("7.0".into()));
        assert_eq!(format_value(&Value::Real(9.9), "%d"), Some("9".into()));
        assert_eq!(format_value(&Value::from("x"), "%d"), None);
        let d = parse_date("2021-06-01").map(Value::Date).unwrap_or(Value::None);
        assert_eq!(format_value(&d, "%d/%m/%Y"), Some("01/06/2021".into()));
    }

    #[test]
    fn test_cell_rank_orders_sentinels_last() {
        let mut cells = [
            CellValue::Failed("boom".into()),
            CellValue::Ok(Value::None),
            CellValue::WrongType("x".into()),
            CellValue::Ok(Value::Int(1)),
        ];
        cells.sort_by_key(CellValue::rank);
        assert_eq!(cells[0], CellValue::Ok(Value::Int(1)));
        assert_eq!(cells[3], CellValue::Failed("boom".into()));
    }
}
