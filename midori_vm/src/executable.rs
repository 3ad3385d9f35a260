//! The compiled artifact: constant pool, global name table, procedures,
//! and the compile-time heap holding constant-pool traceables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bytecode::BytecodeStream;
use crate::vm::heap::Heap;
use crate::vm::value::{HeapRef, Traceable, Value};

/// Dedup key for pool constants; fractions compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Integer(i64),
    Fraction(u64),
    Text(String),
    ForeignFunction(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Executable {
    constants: Vec<Value>,
    globals: Vec<String>,
    /// Index 0 is the top-level procedure.
    procedures: Vec<BytecodeStream>,
    procedure_names: Vec<String>,
    constant_roots: Vec<HeapRef>,
    heap: Heap,
    #[serde(skip)]
    constant_index: HashMap<ConstantKey, usize>,
}

impl Executable {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Constants ====================

    pub fn add_integer_constant(&mut self, value: i64) -> usize {
        self.add_constant(ConstantKey::Integer(value), Value::Integer(value))
    }

    pub fn add_fraction_constant(&mut self, value: f64) -> usize {
        self.add_constant(ConstantKey::Fraction(value.to_bits()), Value::Fraction(value))
    }

    /// Intern a text constant: one heap object per distinct content,
    /// rooted for the whole run.
    pub fn add_text_constant(&mut self, text: &str) -> usize {
        if let Some(existing) = self.constant_index.get(&ConstantKey::Text(text.to_string())) {
            return *existing;
        }
        let r = self.heap.allocate_static(Traceable::Text(text.to_string()));
        self.constant_roots.push(r);
        self.add_constant(ConstantKey::Text(text.to_string()), Value::Ref(r))
    }

    pub fn add_foreign_function_constant(&mut self, name: &str) -> usize {
        let key = ConstantKey::ForeignFunction(name.to_string());
        if let Some(existing) = self.constant_index.get(&key) {
            return *existing;
        }
        let r = self
            .heap
            .allocate_static(Traceable::ForeignFunction(name.to_string()));
        self.constant_roots.push(r);
        self.add_constant(key, Value::Ref(r))
    }

    fn add_constant(&mut self, key: ConstantKey, value: Value) -> usize {
        if let Some(existing) = self.constant_index.get(&key) {
            return *existing;
        }
        let index = self.constants.len();
        self.constants.push(value);
        self.constant_index.insert(key, index);
        index
    }

    pub fn constant(&self, index: usize) -> Value {
        self.constants[index]
    }

    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    // ==================== Globals ====================

    pub fn add_global(&mut self, name: String) -> usize {
        self.globals.push(name);
        self.globals.len() - 1
    }

    pub fn global_name(&self, index: usize) -> &str {
        &self.globals[index]
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    // ==================== Procedures ====================

    pub fn attach_procedures(&mut self, procedures: Vec<BytecodeStream>, names: Vec<String>) {
        self.procedures = procedures;
        self.procedure_names = names;
    }

    pub fn procedure(&self, index: usize) -> &BytecodeStream {
        &self.procedures[index]
    }

    pub fn procedure_name(&self, index: usize) -> &str {
        &self.procedure_names[index]
    }

    pub fn procedure_count(&self) -> usize {
        self.procedures.len()
    }

    pub fn line(&self, procedure_index: usize, offset: usize) -> u32 {
        self.procedures[procedure_index].line_at(offset)
    }

    // ==================== Heap & roots ====================

    pub fn constant_roots(&self) -> &[HeapRef] {
        &self.constant_roots
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Move the compile-time heap out (into the VM), leaving the
    /// executable's bytecode, pool, and root list intact.
    pub fn take_heap(&mut self) -> Heap {
        std::mem::take(&mut self.heap)
    }

    pub(crate) fn restore_after_load(&mut self) {
        self.heap.rebuild_marks();
    }
}
