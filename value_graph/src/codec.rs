//! Graph codec: flatten value graphs into an indexed node table

use crate::value::{ListRef, MapRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while moving a payload across the boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    /// Payload contains a value that cannot leave its context
    #[error("value of kind '{0}' cannot cross the context boundary")]
    Unsupported(String),

    /// Byte-level encoding failed
    #[error("payload encoding failed: {0}")]
    Encode(String),

    /// Byte-level decoding failed
    #[error("payload decoding failed: {0}")]
    Decode(String),

    /// Node table references a node that does not exist
    #[error("back-reference {index} outside node table of length {len}")]
    BackReference { index: u32, len: usize },
}

/// One position inside a node or argument list
///
/// Scalars are stored inline; composite values become indices into the
/// graph's node table, which is how aliasing survives the flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Node(u32),
}

/// A flattened composite cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    List(Vec<Slot>),
    Map(Vec<(String, Slot)>),
}

/// Serializable form of an argument graph
///
/// `roots` holds one slot per argument position; `nodes` holds every
/// composite cell reachable from the roots, each exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgsGraph {
    nodes: Vec<Node>,
    roots: Vec<Slot>,
}

impl ArgsGraph {
    /// Returns the number of composite cells in the graph
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of argument positions
    pub fn arity(&self) -> usize {
        self.roots.len()
    }
}

/// Flattens an argument sequence into a serializable graph
///
/// Aliased cells are visited once and referenced thereafter, so cycles
/// terminate: a cell re-entered during its own encoding hits the memo
/// table before any further descent.
pub fn encode_args(args: &[Value]) -> Result<ArgsGraph, SerializationError> {
    let mut encoder = Encoder {
        nodes: Vec::new(),
        memo: HashMap::new(),
    };
    let roots = args
        .iter()
        .map(|value| encoder.slot(value))
        .collect::<Result<Vec<_>, _>>()?;
    let nodes = encoder
        .nodes
        .into_iter()
        .map(|node| match node {
            Some(node) => Ok(node),
            // Every reserved index is filled before the walk returns.
            None => Err(SerializationError::Encode(
                "node table left incomplete".to_string(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ArgsGraph { nodes, roots })
}

struct Encoder {
    nodes: Vec<Option<Node>>,
    memo: HashMap<usize, u32>,
}

impl Encoder {
    fn slot(&mut self, value: &Value) -> Result<Slot, SerializationError> {
        match value {
            Value::Null => Ok(Slot::Null),
            Value::Bool(v) => Ok(Slot::Bool(*v)),
            Value::Int(v) => Ok(Slot::Int(*v)),
            Value::Float(v) => {
                if v.is_finite() {
                    Ok(Slot::Float(*v))
                } else {
                    Err(SerializationError::Unsupported("non-finite float".to_string()))
                }
            }
            Value::Text(v) => Ok(Slot::Text(v.clone())),
            Value::Bytes(v) => Ok(Slot::Bytes(v.clone())),
            Value::List(cell) => self.list_node(cell),
            Value::Map(cell) => self.map_node(cell),
            Value::Foreign(handle) => {
                Err(SerializationError::Unsupported(handle.kind().to_string()))
            }
        }
    }

    fn list_node(&mut self, cell: &ListRef) -> Result<Slot, SerializationError> {
        if let Some(&index) = self.memo.get(&cell.key()) {
            return Ok(Slot::Node(index));
        }
        let index = self.reserve(cell.key())?;
        let slots = cell
            .items()
            .iter()
            .map(|item| self.slot(item))
            .collect::<Result<Vec<_>, _>>()?;
        self.nodes[index as usize] = Some(Node::List(slots));
        Ok(Slot::Node(index))
    }

    fn map_node(&mut self, cell: &MapRef) -> Result<Slot, SerializationError> {
        if let Some(&index) = self.memo.get(&cell.key()) {
            return Ok(Slot::Node(index));
        }
        let index = self.reserve(cell.key())?;
        let entries = cell
            .entries()
            .iter()
            .map(|(key, item)| Ok((key.clone(), self.slot(item)?)))
            .collect::<Result<Vec<_>, SerializationError>>()?;
        self.nodes[index as usize] = Some(Node::Map(entries));
        Ok(Slot::Node(index))
    }

    fn reserve(&mut self, key: usize) -> Result<u32, SerializationError> {
        let index = u32::try_from(self.nodes.len())
            .map_err(|_| SerializationError::Encode("node table overflow".to_string()))?;
        self.nodes.push(None);
        self.memo.insert(key, index);
        Ok(index)
    }
}

/// Rebuilds an argument sequence from its flattened graph
///
/// Reserve-then-fill: one empty cell is created per node up front, then
/// every node is filled in a single pass over the table. Back-references
/// resolve to the pre-created cells, so aliasing and self-reference come
/// back as pointer identity and the fill never recurses.
pub fn decode_args(graph: &ArgsGraph) -> Result<Vec<Value>, SerializationError> {
    let cells: Vec<Value> = graph
        .nodes
        .iter()
        .map(|node| match node {
            Node::List(_) => Value::List(ListRef::new()),
            Node::Map(_) => Value::Map(MapRef::new()),
        })
        .collect();

    for (index, node) in graph.nodes.iter().enumerate() {
        match (node, &cells[index]) {
            (Node::List(slots), Value::List(cell)) => {
                for slot in slots {
                    cell.push(resolve(slot, &cells)?);
                }
            }
            (Node::Map(entries), Value::Map(cell)) => {
                for (key, slot) in entries {
                    cell.insert(key.clone(), resolve(slot, &cells)?);
                }
            }
            // cells was built from the same table, variant by variant
            _ => {
                return Err(SerializationError::Decode(
                    "node table shape mismatch".to_string(),
                ))
            }
        }
    }

    graph
        .roots
        .iter()
        .map(|slot| resolve(slot, &cells))
        .collect()
}

fn resolve(slot: &Slot, cells: &[Value]) -> Result<Value, SerializationError> {
    match slot {
        Slot::Null => Ok(Value::Null),
        Slot::Bool(v) => Ok(Value::Bool(*v)),
        Slot::Int(v) => Ok(Value::Int(*v)),
        Slot::Float(v) => Ok(Value::Float(*v)),
        Slot::Text(v) => Ok(Value::Text(v.clone())),
        Slot::Bytes(v) => Ok(Value::Bytes(v.clone())),
        Slot::Node(index) => cells
            .get(*index as usize)
            .cloned()
            .ok_or(SerializationError::BackReference {
                index: *index,
                len: cells.len(),
            }),
    }
}
