//! JSON documents browsed as nested sheets.
//!
//! The parsed document is shared by every sheet opened from it. Rows point
//! into the document by JSON pointer, so edits made through one sheet show
//! up in the others.

use std::cell::RefCell;
use std::rc::Rc;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use crossterm::event::KeyCode;
use serde_json::Value as Json;

use crate::column::Column;
use crate::commands::{Command, CommandTable};
use crate::keys::Keystroke;
use crate::row::Row;
use crate::sheet::{Sheet, SheetSource};
use crate::value::Value;

/// A location inside a shared JSON document.
#[derive(Clone, Debug)]
pub struct JsonNode {
    pub root: Rc<RefCell<Json>>,
    /// RFC 6901 pointer; empty for the root.
    pub pointer: String,
}

impl JsonNode {
    pub fn new(doc: Json) -> Self {
        Self {
            root: Rc::new(RefCell::new(doc)),
            pointer: String::new(),
        }
    }

    pub fn child(&self, key: &str) -> JsonNode {
        let escaped = key.replace('~', "~0").replace('/', "~1");
        JsonNode {
            root: self.root.clone(),
            pointer: format!("{}/{}", self.pointer, escaped),
        }
    }

    pub fn get(&self) -> Option<Json> {
        self.root.borrow().pointer(&self.pointer).cloned()
    }

    pub fn set(&self, value: Json) -> Result<()> {
        let mut root = self.root.borrow_mut();
        let slot = root
            .pointer_mut(&self.pointer)
            .ok_or_else(|| eyre!("{} no longer exists", self.pointer))?;
        *slot = value;
        Ok(())
    }

    /// Last pointer segment, unescaped.
    pub fn label(&self) -> String {
        self.pointer
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .replace("~1", "/")
            .replace("~0", "~")
    }
}

/// Containers show their size instead of their contents.
pub fn json_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Str(b.to_string()),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Real).unwrap_or_else(|| Value::Str(n.to_string())),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(a) => Value::Str(format!("[{}]", a.len())),
        Json::Object(o) => Value::Str(format!("{{{}}}", o.len())),
    }
}

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::None => Json::Null,
        Value::Str(s) => Json::String(s.clone()),
        Value::Int(i) => Json::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Date(_) => Json::String(value.to_string()),
    }
}

fn is_container(json: &Json) -> bool {
    matches!(json, Json::Array(_) | Json::Object(_))
}

fn node_of(row: &Row) -> Result<&JsonNode> {
    row.get::<JsonNode>()
}

/// A column reading `key` of each row's object, writable.
fn field_column(key: String) -> Column {
    let read_key = key.clone();
    let write_key = key.clone();
    Column::new(key, move |row| {
        let node = node_of(row)?.child(&read_key);
        Ok(node.get().as_ref().map(json_value).unwrap_or(Value::None))
    })
    .with_setter(move |row, value| {
        let node = node_of(row)?;
        let mut root = node.root.borrow_mut();
        let target = root
            .pointer_mut(&node.pointer)
            .and_then(Json::as_object_mut)
            .ok_or_else(|| eyre!("row is not an object"))?;
        target.insert(write_key.clone(), to_json(&value));
        Ok(())
    })
}

/// The row's own value, writable.
fn value_column() -> Column {
    Column::new("value", |row| {
        Ok(node_of(row)?.get().as_ref().map(json_value).unwrap_or(Value::None))
    })
    .with_setter(|row, value| node_of(row)?.set(to_json(&value)))
}

pub fn json_commands() -> Result<CommandTable> {
    CommandTable::new()
        .command(Keystroke::code(KeyCode::Enter), Command::Dive, "dive into this value")
        .build()
}

/// The sheet for one node: a list of objects gets a column per key, any
/// other list a single `value` column, an object a `key`/`value` listing.
pub fn node_sheet(node: &JsonNode, name: impl Into<String>) -> Result<Sheet> {
    let json = node
        .get()
        .ok_or_else(|| eyre!("{} no longer exists", node.pointer))?;
    let (rows, columns): (Vec<Row>, Vec<Column>) = match &json {
        Json::Array(items) => {
            let rows = (0..items.len()).map(|i| Row::new(node.child(&i.to_string()))).collect();
            let mut keys: Vec<String> = Vec::new();
            for item in items {
                if let Json::Object(obj) = item {
                    for k in obj.keys() {
                        if !keys.contains(k) {
                            keys.push(k.clone());
                        }
                    }
                }
            }
            let columns = if keys.is_empty() {
                vec![value_column()]
            } else {
                keys.into_iter().map(field_column).collect()
            };
            (rows, columns)
        }
        Json::Object(obj) => {
            let rows = obj.keys().map(|k| Row::new(node.child(k))).collect();
            let key = Column::new("key", |row| Ok(Value::Str(node_of(row)?.label())));
            (rows, vec![key, value_column()])
        }
        _ => (vec![Row::new(node.clone())], vec![value_column()]),
    };
    Ok(Sheet::new(name, SheetSource::Json(node.clone()))
        .with_rows(rows)
        .with_columns(columns)
        .with_keys(1)
        .with_commands(json_commands()?))
}

/// Parses a document (or one value per line) and opens its root.
pub fn open_json(text: &str, lines: bool, name: String) -> Result<Sheet> {
    let doc = if lines {
        let values = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| serde_json::from_str(l).wrap_err_with(|| format!("line {}", i + 1)))
            .collect::<Result<Vec<Json>>>()?;
        Json::Array(values)
    } else {
        serde_json::from_str(text).wrap_err("parsing JSON")?
    };
    node_sheet(&JsonNode::new(doc), name)
}

/// Where `Enter` leads from `row` with `column` under the cursor: the cell
/// when it holds a container, else the row itself when it is one.
pub fn dive_target(row: &Row, column: &str) -> Result<JsonNode> {
    let node = node_of(row)?;
    let json = node.get().unwrap_or(Json::Null);
    if let Json::Object(obj) = &json {
        if obj.get(column).is_some_and(is_container) {
            return Ok(node.child(column));
        }
    }
    if is_container(&json) {
        Ok(node.clone())
    } else {
        Err(eyre!("nothing to dive into"))
    }
}
