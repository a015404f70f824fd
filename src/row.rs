//! Opaque row handles.
//!
//! A sheet never looks inside a row; only its columns know how to read one.
//! Rows are reference counted so that derived sheets (joins, frequency
//! buckets, subsets) share the source's rows, and selection is keyed by the
//! allocation rather than by content.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::value::Value;

/// Identity of a row allocation. Two rows with equal contents have
/// different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(usize);

#[derive(Clone)]
pub struct Row(Rc<dyn Any>);

impl Row {
    pub fn new<T: Any>(payload: T) -> Self {
        Row(Rc::new(payload))
    }

    /// A row of positional fields, as produced by the delimited-text and
    /// spreadsheet loaders.
    pub fn fields(values: Vec<Value>) -> Self {
        Row::new(RefCell::new(values))
    }

    pub fn id(&self) -> RowId {
        RowId(Rc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn try_get<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn get<T: Any>(&self) -> Result<&T> {
        self.try_get::<T>()
            .ok_or_else(|| eyre!("row is not a {}", std::any::type_name::<T>()))
    }

    pub fn as_fields(&self) -> Option<&RefCell<Vec<Value>>> {
        self.try_get::<RefCell<Vec<Value>>>()
    }

    pub fn ptr_eq(&self, other: &Row) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_fields() {
            Some(fields) => f.debug_tuple("Row").field(&fields.borrow()).finish(),
            None => write!(f, "Row({:?})", self.id()),
        }
    }
}
