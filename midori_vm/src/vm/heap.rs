//! Heap arena and mark-and-sweep collection.
//!
//! Traceables live in an index arena; a [`HeapRef`] is a slot index and
//! stays valid until the slot is swept. Accounting tracks total live
//! bytes and the subset owned by the constant pool ("static" bytes);
//! the collector triggers on the difference.

use serde::{Deserialize, Serialize};

use super::value::{HeapRef, Traceable, Value};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Heap {
    slots: Vec<Option<Traceable>>,
    #[serde(skip)]
    marks: Vec<bool>,
    free: Vec<HeapRef>,
    total_bytes: usize,
    static_bytes: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, traceable: Traceable) -> HeapRef {
        self.total_bytes += traceable.heap_size();
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(traceable);
                slot
            }
            None => {
                self.slots.push(Some(traceable));
                self.marks.push(false);
                (self.slots.len() - 1) as HeapRef
            }
        }
    }

    /// Allocate a constant-pool object; its bytes never count toward
    /// the collection trigger.
    pub fn allocate_static(&mut self, traceable: Traceable) -> HeapRef {
        self.static_bytes += traceable.heap_size();
        self.allocate(traceable)
    }

    pub fn get(&self, r: HeapRef) -> &Traceable {
        self.slots[r as usize]
            .as_ref()
            .expect("access to swept heap slot")
    }

    pub fn get_mut(&mut self, r: HeapRef) -> &mut Traceable {
        self.slots[r as usize]
            .as_mut()
            .expect("access to swept heap slot")
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn static_bytes(&self) -> usize {
        self.static_bytes
    }

    /// Bytes subject to collection: everything the constant pool does
    /// not own.
    pub fn dynamic_bytes(&self) -> usize {
        self.total_bytes - self.static_bytes
    }

    pub fn live_objects(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Mark everything reachable from `roots`, then sweep. Unreachable
    /// slots go back on the free list and leave the byte accounting.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = HeapRef>) {
        self.mark(roots);
        self.sweep();
    }

    fn mark(&mut self, roots: impl IntoIterator<Item = HeapRef>) {
        let mut worklist: Vec<HeapRef> = roots.into_iter().collect();
        while let Some(r) = worklist.pop() {
            let idx = r as usize;
            if self.marks[idx] {
                continue;
            }
            self.marks[idx] = true;

            let Some(traceable) = &self.slots[idx] else {
                continue;
            };
            match traceable {
                Traceable::Text(_) | Traceable::ForeignFunction(_) => {}
                Traceable::Array(values)
                | Traceable::Struct(values) => {
                    push_value_refs(&mut worklist, values);
                }
                Traceable::Union(union_value) => {
                    push_value_refs(&mut worklist, &union_value.values);
                }
                Traceable::Closure(closure) => {
                    worklist.extend(closure.captured_cells.iter().copied());
                }
                Traceable::Cell(cell) => {
                    // A stack-backed cell owns nothing yet: while its
                    // defining frame is live the value-stack window
                    // roots the slot.
                    if cell.is_on_heap {
                        if let Value::Ref(r) = cell.heap_value {
                            worklist.push(r);
                        }
                    }
                }
            }
        }
    }

    fn sweep(&mut self) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if self.marks[idx] {
                self.marks[idx] = false;
                continue;
            }
            if let Some(traceable) = slot.take() {
                self.total_bytes -= traceable.heap_size();
                self.free.push(idx as HeapRef);
            }
        }
    }

    /// Drop every remaining traceable regardless of reachability.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.marks.clear();
        self.free.clear();
        self.total_bytes = 0;
        self.static_bytes = 0;
    }

    /// Restore the mark vector after deserialization.
    pub(crate) fn rebuild_marks(&mut self) {
        self.marks = vec![false; self.slots.len()];
    }
}

fn push_value_refs(worklist: &mut Vec<HeapRef>, values: &[Value]) {
    for value in values {
        if let Value::Ref(r) = value {
            worklist.push(*r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::value::{Cell, Closure, UnionValue};

    #[test]
    fn test_unreachable_objects_swept() {
        let mut heap = Heap::new();
        let kept = heap.allocate(Traceable::Text("kept".to_string()));
        let _lost = heap.allocate(Traceable::Text("lost".to_string()));
        heap.collect([kept]);
        assert_eq!(heap.live_objects(), 1);
        assert!(matches!(heap.get(kept), Traceable::Text(t) if t == "kept"));
    }

    #[test]
    fn test_bytes_leave_accounting_on_sweep() {
        let mut heap = Heap::new();
        let _lost = heap.allocate(Traceable::Text("x".repeat(100)));
        let before = heap.total_bytes();
        heap.collect([]);
        assert!(heap.total_bytes() < before);
        assert_eq!(heap.total_bytes(), 0);
    }

    #[test]
    fn test_swept_slots_are_reused() {
        let mut heap = Heap::new();
        let lost = heap.allocate(Traceable::Text("lost".to_string()));
        heap.collect([]);
        let reused = heap.allocate(Traceable::Text("new".to_string()));
        assert_eq!(lost, reused);
    }

    #[test]
    fn test_array_elements_traced() {
        let mut heap = Heap::new();
        let inner = heap.allocate(Traceable::Text("inner".to_string()));
        let array = heap.allocate(Traceable::Array(vec![Value::Ref(inner)]));
        heap.collect([array]);
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_closure_traces_cells_and_promoted_values() {
        let mut heap = Heap::new();
        let payload = heap.allocate(Traceable::Text("payload".to_string()));
        let cell = heap.allocate(Traceable::Cell(Cell {
            stack_slot: 0,
            heap_value: Value::Ref(payload),
            is_on_heap: true,
        }));
        let closure = heap.allocate(Traceable::Closure(Closure {
            procedure_index: 1,
            captured_cells: vec![cell],
        }));
        heap.collect([closure]);
        assert_eq!(heap.live_objects(), 3);
    }

    #[test]
    fn test_stack_backed_cell_traces_nothing() {
        let mut heap = Heap::new();
        let orphan = heap.allocate(Traceable::Text("orphan".to_string()));
        let cell = heap.allocate(Traceable::Cell(Cell {
            stack_slot: 3,
            heap_value: Value::Ref(orphan),
            is_on_heap: false,
        }));
        heap.collect([cell]);
        // The stale heap_value of an unpromoted cell is not a reference.
        assert_eq!(heap.live_objects(), 1);
    }

    #[test]
    fn test_union_payload_traced() {
        let mut heap = Heap::new();
        let payload = heap.allocate(Traceable::Text("p".to_string()));
        let union_ref = heap.allocate(Traceable::Union(UnionValue {
            tag: 1,
            values: vec![Value::Ref(payload)],
        }));
        heap.collect([union_ref]);
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_cycle_collected_once_unrooted() {
        let mut heap = Heap::new();
        let a = heap.allocate(Traceable::Array(vec![]));
        let b = heap.allocate(Traceable::Array(vec![Value::Ref(a)]));
        if let Traceable::Array(values) = heap.get_mut(a) {
            values.push(Value::Ref(b));
        }
        heap.collect([a]);
        assert_eq!(heap.live_objects(), 2);
        heap.collect([]);
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_static_bytes_excluded_from_dynamic() {
        let mut heap = Heap::new();
        heap.allocate_static(Traceable::Text("constant".to_string()));
        heap.allocate(Traceable::Text("dynamic!".to_string()));
        assert!(heap.dynamic_bytes() < heap.total_bytes());
        assert!(heap.dynamic_bytes() > 0);
    }
}
