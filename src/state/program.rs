use super::value::{render_values, Address, Location, Value};
use crate::parser::StackFrame;
use std::collections::BTreeMap;
use tracing::trace;

pub type ValueId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub name: String,
    /// Position in the call stack, outermost frame first.
    pub index: usize,
    values: Vec<ValueId>,
}

impl Frame {
    pub fn value_ids(&self) -> &[ValueId] {
        &self.values
    }
}

/// The observed stack and heap of the target program.
///
/// Values live for the whole session. Popping a frame retires its locals: they stay in the arena
/// but no longer own their addresses, so the next call reusing that stack memory starts fresh.
#[derive(Debug, Clone, Default)]
pub struct ProgramState {
    frames: Vec<Frame>,
    values: Vec<Value>,
    by_address: BTreeMap<Address, ValueId>,
    heap: BTreeMap<Address, ValueId>,
    /// Heap blocks: start → length in bytes.
    allocations: BTreeMap<Address, u64>,
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, name: impl Into<String>) -> usize {
        let index = self.frames.len();
        self.frames.push(Frame {
            name: name.into(),
            index,
            values: Vec::new(),
        });
        index
    }

    pub fn pop_frame(&mut self) {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return,
        };
        for id in frame.values {
            if let Some(address) = self.values[id].address {
                if self.by_address.get(&address) == Some(&id) {
                    self.by_address.remove(&address);
                }
            }
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame_values(&self, frame: usize) -> Vec<&Value> {
        self.frames
            .get(frame)
            .map(|f| f.values.iter().filter_map(|&id| self.values.get(id)).collect())
            .unwrap_or_default()
    }

    /// Make the stack match a backtrace (innermost first): frames above the first difference
    /// are popped, the rest of the backtrace is pushed.
    pub fn sync_frames(&mut self, backtrace: &[StackFrame]) {
        let outermost_first: Vec<&str> = backtrace
            .iter()
            .rev()
            .map(|f| f.function_name.as_str())
            .collect();

        let common = self
            .frames
            .iter()
            .zip(&outermost_first)
            .take_while(|(frame, name)| frame.name == **name)
            .count();

        while self.frames.len() > common {
            trace!(function = %self.frames[self.frames.len() - 1].name, "frame left");
            self.pop_frame();
        }
        for name in &outermost_first[common..] {
            trace!(function = %name, "frame entered");
            self.push_frame(*name);
        }
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn value_at(&self, address: Address) -> Option<&Value> {
        self.by_address.get(&address).and_then(|&id| self.values.get(id))
    }

    pub fn id_at(&self, address: Address) -> Option<ValueId> {
        self.by_address.get(&address).copied()
    }

    pub fn value_at_mut(&mut self, address: Address) -> Option<&mut Value> {
        let id = *self.by_address.get(&address)?;
        self.values.get_mut(id)
    }

    pub fn heap_values(&self) -> impl Iterator<Item = &Value> {
        self.heap.values().filter_map(|&id| self.values.get(id))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Insert a value. A value already at the same address is replaced, not merged.
    pub fn record_value(&mut self, value: Value) -> ValueId {
        let existing = value.address.and_then(|a| self.by_address.get(&a).copied());
        let id = match existing {
            Some(id) => {
                self.values[id] = value;
                id
            }
            None => {
                let id = self.values.len();
                if let Some(address) = value.address {
                    self.by_address.insert(address, id);
                }
                self.values.push(value);
                id
            }
        };
        self.attach(id);
        id
    }

    /// Record a value seen at a stop. If it is already known (same address, or same frame and
    /// name when the address is unknown) its data is assigned instead, so history accumulates.
    /// A different variable at a known address replaces the old one.
    pub fn observe(&mut self, value: Value) -> ValueId {
        let id = match self.find_existing(&value) {
            Some(id) => id,
            None => return self.record_value(value),
        };

        let existing = &mut self.values[id];
        if existing.name != value.name || existing.location != value.location {
            return self.record_value(value);
        }
        if existing.data() != value.data() {
            existing.assign(value.data().clone());
        }
        if existing.type_name.is_empty() {
            existing.type_name = value.type_name;
        }
        self.attach(id);
        id
    }

    fn find_existing(&self, value: &Value) -> Option<ValueId> {
        if let Some(address) = value.address {
            return self.by_address.get(&address).copied();
        }
        let frame = match value.location {
            Location::Stack { frame } => self.frames.get(frame)?,
            Location::Heap => return None,
        };
        frame
            .values
            .iter()
            .copied()
            .find(|&id| self.values[id].name == value.name && self.values[id].array.is_none())
    }

    /// Keep the heap map and frame lists consistent with the value's location.
    fn attach(&mut self, id: ValueId) {
        let (address, location) = (self.values[id].address, self.values[id].location);

        if let Some(address) = address {
            match location {
                Location::Heap => {
                    self.heap.insert(address, id);
                }
                Location::Stack { .. } => {
                    self.heap.remove(&address);
                }
            }
        }

        let owner = match location {
            Location::Stack { frame } => Some(frame),
            Location::Heap => None,
        };
        for frame in &mut self.frames {
            if Some(frame.index) == owner {
                if !frame.values.contains(&id) {
                    frame.values.push(id);
                }
            } else {
                frame.values.retain(|&other| other != id);
            }
        }
    }

    pub fn record_allocation(&mut self, start: Address, len: u64) {
        self.allocations.insert(start, len);
    }

    pub fn allocation_len(&self, start: Address) -> Option<u64> {
        self.allocations.get(&start).copied()
    }

    /// Start of the heap block containing `address`.
    pub fn allocation_containing(&self, address: Address) -> Option<Address> {
        let (&start, &len) = self.allocations.range(..=address).next_back()?;
        (address < start.saturating_add(len)).then_some(start)
    }

    /// Undo the most recent assignment at `address`.
    pub fn rollback_at(&mut self, address: Address) -> Option<&Value> {
        let value = self.value_at_mut(address)?;
        value.rollback();
        Some(value)
    }

    pub fn describe(&self) -> String {
        let rule = "=".repeat(72);
        let mut out = format!("{rule}\nSTACK:\n{rule}\n");
        for frame in &self.frames {
            out.push_str(&format!("\nStack Frame ({}): {}\n", frame.index, frame.name));
            render_values(&self.frame_values(frame.index), 1, &mut out);
        }
        out.push_str(&format!("\n{rule}\nHEAP:\n{rule}\n"));
        let heap: Vec<&Value> = self.heap_values().collect();
        render_values(&heap, 0, &mut out);
        out
    }
}
