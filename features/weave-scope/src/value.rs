//! Model values observed by watches
//!
//! Arrays and objects are shared references: cloning a [`Value`] clones the handle, so a clone is
//! *identical* to the original and sees in-place mutations. Use [`Value::deep_copy`] for an
//! independent copy.

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use indexmap::IndexMap;

pub type Array = Rc<RefCell<Vec<Value>>>;
pub type Object = Rc<RefCell<IndexMap<String, Value>>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Object),
}

impl Value {
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::Array(Rc::new(RefCell::new(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Element count of an array or object, `None` for scalars
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.borrow().len()),
            Value::Object(entries) => Some(entries.borrow().len()),
            _ => None,
        }
    }

    /// Appends to an array in place. Does nothing for other values.
    pub fn push(&self, item: impl Into<Value>) {
        if let Value::Array(items) = self {
            items.borrow_mut().push(item.into());
        }
    }

    /// Reads an object entry or an array index (given as a decimal string)
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(entries) => entries.borrow().get(key).cloned().unwrap_or_default(),
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.borrow().get(i).cloned())
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Writes an object entry in place. Does nothing for other values.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Object(entries) = self {
            entries.borrow_mut().insert(key.into(), value.into());
        }
    }

    /// Removes an object entry in place, keeping the order of the remaining entries
    pub fn remove(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(entries) => entries.borrow_mut().shift_remove(key),
            _ => None,
        }
    }

    /// Reference equality: containers must be the same allocation. `NaN` is identical to `NaN`.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality. `NaN` equals `NaN`, object key order is ignored.
    ///
    /// Self-referencing containers are supported: a pair of containers already under comparison
    /// is assumed equal.
    pub fn deep_eq(&self, other: &Value) -> bool {
        self.deep_eq_in(other, &mut Vec::new())
    }

    fn deep_eq_in(&self, other: &Value, comparing: &mut Vec<(*const (), *const ())>) -> bool {
        let (Some(a), Some(b)) = (self.container_ptr(), other.container_ptr()) else {
            return self.identical(other);
        };
        if a == b || comparing.contains(&(a, b)) {
            return true;
        }

        comparing.push((a, b));
        let equal = match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq_in(y, comparing))
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.deep_eq_in(y, comparing)))
            }
            _ => false,
        };
        comparing.pop();
        equal
    }

    /// Recursively copies arrays and objects into fresh containers
    ///
    /// Shared and self-referencing containers keep their shape in the copy.
    pub fn deep_copy(&self) -> Value {
        self.deep_copy_in(&mut HashMap::new())
    }

    fn deep_copy_in(&self, copies: &mut HashMap<*const (), Value>) -> Value {
        let Some(ptr) = self.container_ptr() else {
            return self.clone();
        };
        if let Some(copy) = copies.get(&ptr) {
            return copy.clone();
        }

        match self {
            Value::Array(items) => {
                let copy: Array = Rc::new(RefCell::new(Vec::new()));
                copies.insert(ptr, Value::Array(copy.clone()));
                let copied: Vec<Value> =
                    items.borrow().iter().map(|item| item.deep_copy_in(copies)).collect();
                *copy.borrow_mut() = copied;
                Value::Array(copy)
            }
            Value::Object(entries) => {
                let copy: Object = Rc::new(RefCell::new(IndexMap::new()));
                copies.insert(ptr, Value::Object(copy.clone()));
                let copied: IndexMap<String, Value> = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_copy_in(copies)))
                    .collect();
                *copy.borrow_mut() = copied;
                Value::Object(copy)
            }
            other => other.clone(),
        }
    }

    fn container_ptr(&self) -> Option<*const ()> {
        match self {
            Value::Array(items) => Some(Rc::as_ptr(items).cast()),
            Value::Object(entries) => Some(Rc::as_ptr(entries).cast()),
            _ => None,
        }
    }

    /// Copies the top level container only; elements stay shared
    pub fn shallow_copy(&self) -> Value {
        match self {
            Value::Array(items) => Value::array(items.borrow().iter().cloned()),
            Value::Object(entries) => Value::object(
                entries.borrow().iter().map(|(k, v)| (k.clone(), v.clone())),
            ),
            other => other.clone(),
        }
    }
}

/// Structural, see [`Value::deep_eq`]
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Tracked {
            value: self,
            open: &RefCell::new(Vec::new()),
        }
        .fmt(f)
    }
}

/// Formats a value, printing `[Circular]` for a container nested in itself
struct Tracked<'a> {
    value: &'a Value,
    open: &'a RefCell<Vec<*const ()>>,
}

impl Tracked<'_> {
    fn nested<'b>(&'b self, value: &'b Value) -> Tracked<'b> {
        Tracked {
            value,
            open: self.open,
        }
    }
}

impl fmt::Debug for Tracked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(ptr) = self.value.container_ptr() else {
            return match self.value {
                Value::Undefined => f.write_str("undefined"),
                Value::Null => f.write_str("null"),
                Value::Bool(b) => write!(f, "{b}"),
                Value::Number(n) => write!(f, "{n}"),
                Value::String(s) => write!(f, "{s:?}"),
                Value::Array(_) | Value::Object(_) => Ok(()),
            };
        };
        if self.open.borrow().contains(&ptr) {
            return f.write_str("[Circular]");
        }

        self.open.borrow_mut().push(ptr);
        let result = match self.value {
            Value::Array(items) => f
                .debug_list()
                .entries(items.borrow().iter().map(|item| self.nested(item)))
                .finish(),
            Value::Object(entries) => f
                .debug_map()
                .entries(
                    entries
                        .borrow()
                        .iter()
                        .map(|(key, value)| (key, self.nested(value))),
                )
                .finish(),
            _ => Ok(()),
        };
        self.open.borrow_mut().pop();
        result
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}
