//! Runtime values and heap object shapes.

use serde::{Deserialize, Serialize};

use super::heap::Heap;

/// Index of a [`Traceable`] in the [`Heap`] arena.
pub type HeapRef = u32;

/// A stack value. Word-sized where possible; everything bigger lives
/// behind a [`HeapRef`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Fraction(f64),
    Bool(bool),
    Unit,
    Ref(HeapRef),
}

impl Default for Value {
    fn default() -> Self {
        Value::Unit
    }
}

/// A procedure index paired with its captured cells, in capture order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub procedure_index: usize,
    pub captured_cells: Vec<HeapRef>,
}

/// Interior-mutable slot backing a captured variable.
///
/// While the defining frame is live the cell refers to its stack slot
/// (`is_on_heap == false`, `stack_slot` is an absolute value-stack
/// index). Promotion copies the value into `heap_value` and flips the
/// flag; all later reads and writes go through the heap copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub stack_slot: usize,
    pub heap_value: Value,
    pub is_on_heap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionValue {
    pub tag: u8,
    pub values: Vec<Value>,
}

/// A heap object subject to garbage collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Traceable {
    Text(String),
    Array(Vec<Value>),
    Closure(Closure),
    Cell(Cell),
    Struct(Vec<Value>),
    Union(UnionValue),
    /// Named symbol in the foreign library, resolved at call time.
    ForeignFunction(String),
}

impl Traceable {
    /// Bytes this object contributes to heap accounting: the enum
    /// footprint plus owned payload storage.
    pub fn heap_size(&self) -> usize {
        let base = std::mem::size_of::<Traceable>();
        base + match self {
            Traceable::Text(text) => text.len(),
            Traceable::Array(values) | Traceable::Struct(values) => {
                values.len() * std::mem::size_of::<Value>()
            }
            Traceable::Closure(closure) => {
                closure.captured_cells.len() * std::mem::size_of::<HeapRef>()
            }
            Traceable::Cell(_) => 0,
            Traceable::Union(union_value) => {
                union_value.values.len() * std::mem::size_of::<Value>()
            }
            Traceable::ForeignFunction(name) => name.len(),
        }
    }
}

impl Value {
    /// Human-readable rendering; nested text is quoted.
    pub fn display(&self, heap: &Heap) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Fraction(f) => format_fraction(*f),
            Value::Bool(b) => b.to_string(),
            Value::Unit => "()".to_string(),
            Value::Ref(r) => heap.get(*r).display(heap),
        }
    }

    /// Rendering used by `CAST_TO_TEXT`: the same as [`display`] except
    /// top-level text keeps its raw content.
    pub fn cast_text(&self, heap: &Heap) -> String {
        match self {
            Value::Ref(r) => match heap.get(*r) {
                Traceable::Text(text) => text.clone(),
                other => other.display(heap),
            },
            other => other.display(heap),
        }
    }
}

impl Traceable {
    pub fn display(&self, heap: &Heap) -> String {
        match self {
            Traceable::Text(text) => quote_text(text),
            Traceable::Array(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.display(heap)).collect();
                format!("[{}]", rendered.join(","))
            }
            Traceable::Closure(closure) => {
                format!("<closure {}>", closure.procedure_index)
            }
            Traceable::Cell(cell) => {
                if cell.is_on_heap {
                    format!("Cell({})", cell.heap_value.display(heap))
                } else {
                    format!("Cell(&{})", cell.stack_slot)
                }
            }
            Traceable::Struct(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.display(heap)).collect();
                format!("Struct{{{}}}", rendered.join(", "))
            }
            Traceable::Union(union_value) => {
                let rendered: Vec<String> =
                    union_value.values.iter().map(|v| v.display(heap)).collect();
                format!("Union{{{}}}", rendered.join(", "))
            }
            Traceable::ForeignFunction(name) => format!("<foreign {}>", name),
        }
    }
}

fn quote_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 2);
    result.push('"');
    for c in text.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            other => result.push(other),
        }
    }
    result.push('"');
    result
}

/// Fixed-precision rendering with trailing zeros trimmed, so `2.5`
/// prints as `2.5` rather than `2.500000`.
fn format_fraction(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let mut s = format!("{:.6}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s
}
