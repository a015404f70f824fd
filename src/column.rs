//! Typed column accessors.
//!
//! A [`Column`] is a shared handle: the columns sheet, subset sheets and the
//! source sheet all see the same name, width and type. Cell values are
//! computed on demand by the getter; nothing is cached per cell.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::config::DisplayConfig;
use crate::error::SheetError;
use crate::row::Row;
use crate::value::{format_value, CellValue, Value, ValueType};

pub type Getter = Rc<dyn Fn(&Row) -> Result<Value>>;
pub type Setter = Rc<dyn Fn(&Row, Value) -> Result<()>>;

struct ColumnInner {
    name: String,
    value_type: ValueType,
    getter: Getter,
    setter: Option<Setter>,
    /// `None` sizes to content; `Some(0)` hides the column.
    width: Option<usize>,
    fmt: Option<String>,
    expr: Option<String>,
}

#[derive(Clone)]
pub struct Column(Rc<RefCell<ColumnInner>>);

impl Column {
    pub fn new(name: impl Into<String>, getter: impl Fn(&Row) -> Result<Value> + 'static) -> Self {
        Self::from_getter(name, Rc::new(getter))
    }

    pub fn from_getter(name: impl Into<String>, getter: Getter) -> Self {
        Column(Rc::new(RefCell::new(ColumnInner {
            name: name.into(),
            value_type: ValueType::Any,
            getter,
            setter: None,
            width: None,
            fmt: None,
            expr: None,
        })))
    }

    /// Reads (and writes) position `index` of a field-array row.
    pub fn field(name: impl Into<String>, index: usize) -> Self {
        Column::new(name, move |row| {
            let fields = row
                .as_fields()
                .ok_or_else(|| eyre!("row has no fields"))?;
            Ok(fields.borrow().get(index).cloned().unwrap_or(Value::None))
        })
        .with_setter(move |row, value| {
            let fields = row
                .as_fields()
                .ok_or_else(|| eyre!("row has no fields"))?;
            let mut fields = fields.borrow_mut();
            if fields.len() <= index {
                fields.resize(index + 1, Value::None);
            }
            fields[index] = value;
            Ok(())
        })
    }

    pub fn with_type(self, value_type: ValueType) -> Self {
        self.0.borrow_mut().value_type = value_type;
        self
    }

    pub fn with_setter(self, setter: impl Fn(&Row, Value) -> Result<()> + 'static) -> Self {
        self.0.borrow_mut().setter = Some(Rc::new(setter));
        self
    }

    pub fn with_width(self, width: Option<usize>) -> Self {
        self.0.borrow_mut().width = width;
        self
    }

    pub fn with_fmt(self, fmt: Option<String>) -> Self {
        self.0.borrow_mut().fmt = fmt;
        self
    }

    pub fn with_expr(self, expr: impl Into<String>) -> Self {
        self.0.borrow_mut().expr = Some(expr.into());
        self
    }

    /// An independent copy: later changes to one do not affect the other.
    pub fn duplicate(&self) -> Column {
        let inner = self.0.borrow();
        Column(Rc::new(RefCell::new(ColumnInner {
            name: inner.name.clone(),
            value_type: inner.value_type,
            getter: inner.getter.clone(),
            setter: inner.setter.clone(),
            width: inner.width,
            fmt: inner.fmt.clone(),
            expr: inner.expr.clone(),
        })))
    }

    pub fn ptr_eq(&self, other: &Column) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.0.borrow_mut().name = name.into();
    }

    pub fn value_type(&self) -> ValueType {
        self.0.borrow().value_type
    }

    pub fn set_type(&self, value_type: ValueType) {
        self.0.borrow_mut().value_type = value_type;
    }

    pub fn width(&self) -> Option<usize> {
        self.0.borrow().width
    }

    pub fn set_width(&self, width: Option<usize>) {
        self.0.borrow_mut().width = width;
    }

    pub fn is_hidden(&self) -> bool {
        self.width() == Some(0)
    }

    pub fn fmt(&self) -> Option<String> {
        self.0.borrow().fmt.clone()
    }

    pub fn set_fmt(&self, fmt: Option<String>) {
        self.0.borrow_mut().fmt = fmt.filter(|f| !f.is_empty());
    }

    pub fn expr(&self) -> Option<String> {
        self.0.borrow().expr.clone()
    }

    pub fn getter(&self) -> Getter {
        self.0.borrow().getter.clone()
    }

    pub fn setter(&self) -> Option<Setter> {
        self.0.borrow().setter.clone()
    }

    pub fn has_setter(&self) -> bool {
        self.0.borrow().setter.is_some()
    }

    /// The getter's value before type conversion.
    pub fn get_raw(&self, row: &Row) -> Result<Value> {
        let getter = self.getter();
        getter(row)
    }

    /// Computes the cell. A failing getter or a failed conversion becomes a
    /// sentinel; neither is returned as an error.
    pub fn get_value(&self, row: &Row) -> CellValue {
        let raw = match self.get_raw(row) {
            Ok(v) => v,
            Err(e) => return CellValue::Failed(format!("{e:#}")),
        };
        match raw.coerce(self.value_type()) {
            Some(v) => CellValue::Ok(v),
            None => CellValue::WrongType(raw.to_string()),
        }
    }

    /// Typed value, or the typed error explaining why there is none.
    pub fn get_typed(&self, row: &Row) -> std::result::Result<Value, SheetError> {
        match self.get_value(row) {
            CellValue::Ok(v) => Ok(v),
            CellValue::WrongType(raw) => Err(SheetError::TypeCoercion {
                raw,
                type_name: self.value_type().name(),
            }),
            CellValue::Failed(msg) => Err(SheetError::Computation(msg)),
        }
    }

    /// Text of a computed cell, with glyphs substituted for empty and
    /// failed cells and unprintable characters replaced.
    pub fn display_cell(&self, cell: &CellValue, display: &DisplayConfig) -> String {
        match cell {
            CellValue::Ok(Value::None) => display.visible_none.clone(),
            CellValue::Ok(v) => {
                let text = self
                    .fmt()
                    .and_then(|f| format_value(v, &f))
                    .unwrap_or_else(|| v.to_string());
                sanitize(&text, display)
            }
            CellValue::WrongType(raw) => sanitize(raw, display),
            CellValue::Failed(_) => display.function_error.clone(),
        }
    }

    pub fn get_display_value(&self, row: &Row, display: &DisplayConfig) -> String {
        self.display_cell(&self.get_value(row), display)
    }

    /// Writes through the setter.
    pub fn set_value(&self, row: &Row, value: Value, readonly: bool) -> Result<()> {
        if readonly {
            return Err(SheetError::readonly_mode().into());
        }
        let setter = self.setter().ok_or_else(SheetError::no_setter)?;
        let value = match self.value_type() {
            ValueType::Any | ValueType::Str => value,
            ty => value.coerce(ty).ok_or_else(|| SheetError::TypeCoercion {
                raw: value.to_string(),
                type_name: ty.name(),
            })?,
        };
        setter(row, value)
    }

    /// Widest rendering among `rows`, counting the header.
    pub fn get_max_width(&self, rows: &[Row], display: &DisplayConfig) -> usize {
        rows.iter()
            .map(|r| self.get_display_value(r, display).chars().count())
            .chain(std::iter::once(self.name().chars().count()))
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Column")
            .field("name", &inner.name)
            .field("type", &inner.value_type)
            .field("width", &inner.width)
            .finish()
    }
}

fn sanitize(text: &str, display: &DisplayConfig) -> String {
    if !text.chars().any(char::is_control) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str(&display.newline),
            c if c.is_control() => out.push_str(&display.unprintable),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> DisplayConfig {
        DisplayConfig::default()
    }

    #[test]
    fn test_field_column_get_and_set() {
        let row = Row::fields(vec![Value::from("1"), Value::from("a")]);
        let col = Column::field("val", 1);
        assert_eq!(col.get_value(&row), CellValue::Ok(Value::from("a")));
        col.set_value(&row, Value::from("z"), false).unwrap();
        assert_eq!(col.get_display_value(&row, &display()), "z");
        let far = Column::field("far", 4);
        far.set_value(&row, Value::Int(9), false).unwrap();
        assert_eq!(far.get_value(&row), CellValue::Ok(Value::Int(9)));
    }

    #[test]
    fn test_failed_getter_is_contained() {
        let row = Row::new(());
        let col = Column::new("boom", |_| Err(eyre!("division by zero")));
        assert!(matches!(col.get_value(&row), CellValue::Failed(_)));
        assert_eq!(col.get_display_value(&row, &display()), "¿");
        assert!(matches!(col.get_typed(&row), Err(SheetError::Computation(_))));
    }

    #[test]
    fn test_wrong_type_keeps_raw_text() {
        let row = Row::fields(vec![Value::from("abc")]);
        let col = Column::field("n", 0).with_type(ValueType::Int);
        assert_eq!(col.get_value(&row), CellValue::WrongType("abc".into()));
        assert_eq!(col.get_display_value(&row, &display()), "abc");
    }

    #[test]
    fn test_set_value_readonly() {
        let row = Row::fields(vec![Value::from("x")]);
        let col = Column::field("a", 0);
        let err = col.set_value(&row, Value::from("y"), true).unwrap_err();
        assert_eq!(err.downcast_ref::<SheetError>(), Some(&SheetError::readonly_mode()));
        let computed = Column::new("c", |_| Ok(Value::Int(1)));
        let err = computed.set_value(&row, Value::Int(2), false).unwrap_err();
        assert_eq!(err.downcast_ref::<SheetError>(), Some(&SheetError::no_setter()));
    }

    #[test]
    fn test_display_format_and_sanitize() {
        let row = Row::fields(vec![Value::from("3.14159"), Value::from("a\nb\tc")]);
        let pi = Column::field("pi", 0)
            .with_type(ValueType::Real)
            .with_fmt(Some("%.2f".into()));
        assert_eq!(pi.get_display_value(&row, &display()), "3.14");
        let text = Column::field("t", 1);
        assert_eq!(text.get_display_value(&row, &display()), "a\\nb.c");
    }

    #[test]
    fn test_max_width_counts_header() {
        let rows = vec![
            Row::fields(vec![Value::from("ab")]),
            Row::fields(vec![Value::from("abcdef")]),
        ];
        assert_eq!(Column::field("x", 0).get_max_width(&rows, &display()), 6);
        assert_eq!(Column::field("a_long_name", 0).get_max_width(&rows, &display()), 11);
    }

    #[test]
    fn test_shared_handle_vs_duplicate() {
        let col = Column::field("a", 0);
        let shared = col.clone();
        let copy = col.duplicate();
        shared.set_width(Some(0));
        assert!(col.is_hidden());
        assert!(!copy.is_hidden());
        assert!(col.ptr_eq(&shared));
        assert!(!col.ptr_eq(&copy));
    }
}
