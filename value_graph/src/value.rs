//! In-context payload values with observable identity

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// A payload value
///
/// Scalars are carried by value. Lists and maps are shared cells: cloning
/// a `Value::List` clones the handle, not the contents, so two positions
/// in one message can denote the identical logical object.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent / empty value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float (must be finite to cross the boundary)
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Binary blob, distinct from text
    Bytes(Vec<u8>),
    /// Ordered sequence cell
    List(ListRef),
    /// String-keyed mapping cell
    Map(MapRef),
    /// Live host resource; never serializable
    Foreign(ForeignHandle),
}

impl Value {
    /// Creates a text value
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// Creates a bytes value
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    /// Creates a list value from items
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(ListRef::from_vec(items))
    }

    /// Creates an empty map value
    pub fn map() -> Self {
        Value::Map(MapRef::new())
    }

    /// Returns a short name for the value kind (for diagnostics)
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Foreign(_) => "foreign",
        }
    }

    /// Checks whether two values are the identical cell
    ///
    /// Only lists and maps carry identity; scalars always compare false.
    pub fn ptr_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::List(x), Value::List(y)) => x.ptr_eq(y),
            (Value::Map(x), Value::Map(y)) => x.ptr_eq(y),
            _ => false,
        }
    }
}

/// An ordered sequence cell shared by reference
#[derive(Clone, Default)]
pub struct ListRef(Rc<RefCell<Vec<Value>>>);

impl ListRef {
    /// Creates an empty list cell
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    /// Creates a list cell from items
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Appends a value
    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    /// Returns a clone of the value at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Replaces the value at `index`; false if out of range
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut items = self.0.borrow_mut();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns the number of items
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns a snapshot of the items
    ///
    /// The snapshot clones handles, not cell contents, so no borrow is
    /// held while the caller walks a possibly self-referential graph.
    pub fn items(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Checks whether two handles denote the same cell
    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable key for identity bookkeeping during encoding
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for ListRef {
    // Shallow on purpose: a cyclic cell must not recurse in Debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListRef(len={}, cell={:p})", self.len(), Rc::as_ptr(&self.0))
    }
}

/// A string-keyed mapping cell shared by reference
#[derive(Clone, Default)]
pub struct MapRef(Rc<RefCell<BTreeMap<String, Value>>>);

impl MapRef {
    /// Creates an empty map cell
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(BTreeMap::new())))
    }

    /// Inserts a key/value pair, returning the previous value if any
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value)
    }

    /// Returns a clone of the value under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns a snapshot of the entries in key order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Checks whether two handles denote the same cell
    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable key for identity bookkeeping during encoding
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for MapRef {
    // Shallow on purpose: a cyclic cell must not recurse in Debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapRef(len={}, cell={:p})", self.len(), Rc::as_ptr(&self.0))
    }
}

/// A live host resource that must not cross the context boundary
///
/// Stand-in for things like open sockets or window handles: meaningful
/// only inside the owning context. Encoding one is a `SerializationError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignHandle {
    kind: String,
}

impl ForeignHandle {
    /// Creates a handle with a descriptive kind (e.g. "socket")
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// Returns the descriptive kind
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Structural equality over value graphs
///
/// Follows aliases and tolerates cycles: a pair of cells already being
/// compared higher up the walk is taken as equal, which is the standard
/// coinductive reading for cyclic structures.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    let mut visiting = HashSet::new();
    eq_inner(a, b, &mut visiting)
}

fn eq_inner(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Text(x), Value::Text(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Foreign(x), Value::Foreign(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            if !visiting.insert((x.key(), y.key())) {
                return true;
            }
            let xs = x.items();
            let ys = y.items();
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(xv, yv)| eq_inner(xv, yv, visiting))
        }
        (Value::Map(x), Value::Map(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            if !visiting.insert((x.key(), y.key())) {
                return true;
            }
            let xs = x.entries();
            let ys = y.entries();
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|((xk, xv), (yk, yv))| xk == yk && eq_inner(xv, yv, visiting))
        }
        _ => false,
    }
}
