use std::collections::HashSet;

pub type Address = u64;

/// Rendered in place of a value that was never assigned.
pub const GARBAGE: &str = "<garbage>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Index into the call stack, outermost frame first.
    Stack { frame: usize },
    Heap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    Uninitialized,
    Scalar(String),
    Pointer(Address),
    /// Struct fields, owned by the struct.
    Fields(Vec<Value>),
}

/// Membership in a contiguous array; independent of what the element holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySlot {
    pub start: Address,
    pub index: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub name: String,
    pub type_name: String,
    pub address: Option<Address>,
    pub size_bytes: Option<usize>,
    pub location: Location,
    pub array: Option<ArraySlot>,
    data: ValueData,
    history: Vec<ValueData>,
}

impl Value {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            address: None,
            size_bytes: None,
            location,
            array: None,
            data: ValueData::Uninitialized,
            history: Vec::new(),
        }
    }

    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn sized(mut self, size_bytes: usize) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn in_array(mut self, slot: ArraySlot) -> Self {
        self.array = Some(slot);
        self
    }

    pub fn with_data(mut self, data: ValueData) -> Self {
        self.assign(data);
        self
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn is_uninitialized(&self) -> bool {
        self.data == ValueData::Uninitialized
    }

    pub fn fields(&self) -> &[Value] {
        match &self.data {
            ValueData::Fields(fields) => fields,
            _ => &[],
        }
    }

    /// Number of earlier values `rollback` can restore.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn assign(&mut self, data: ValueData) {
        let previous = std::mem::replace(&mut self.data, data);
        self.history.push(previous);
    }

    /// Restore the value before the most recent `assign`. Does nothing without history.
    pub fn rollback(&mut self) -> &ValueData {
        if let Some(previous) = self.history.pop() {
            self.data = previous;
        }
        &self.data
    }

    pub fn describe(&self) -> String {
        let mut out = String::new();
        render_value(self, 0, &mut out);
        out
    }

    fn label(&self) -> String {
        if self.type_name.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.type_name)
        }
    }
}

fn render_data(data: &ValueData) -> String {
    match data {
        ValueData::Uninitialized => GARBAGE.to_string(),
        ValueData::Scalar(text) => text.clone(),
        ValueData::Pointer(address) => format!("{:#x}", address),
        ValueData::Fields(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|f| format!("{} = {}", f.name, render_data(&f.data)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn render_value(value: &Value, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match &value.data {
        ValueData::Fields(fields) => {
            out.push_str(&format!("{}{}:\n{}{{\n", indent, value.label(), indent));
            let fields: Vec<&Value> = fields.iter().collect();
            render_values(&fields, depth + 1, out);
            out.push_str(&format!("{}}}\n", indent));
        }
        data => out.push_str(&format!("{}{}: {}\n", indent, value.label(), render_data(data))),
    }
}

/// Render a list of values, collapsing each array into one bracketed line labelled by its
/// first element.
pub fn render_values(values: &[&Value], depth: usize, out: &mut String) {
    let mut emitted: HashSet<Address> = HashSet::new();
    for value in values {
        let slot = match value.array {
            Some(slot) => slot,
            None => {
                render_value(value, depth, out);
                continue;
            }
        };
        if !emitted.insert(slot.start) {
            continue;
        }

        let mut members: Vec<&Value> = values
            .iter()
            .copied()
            .filter(|m| m.array.map_or(false, |s| s.start == slot.start))
            .collect();
        members.sort_by_key(|m| m.array.map_or(0, |s| s.index));

        let items: Vec<String> = members.iter().map(|m| render_data(&m.data)).collect();
        let head = members[0];
        out.push_str(&format!(
            "{}{}: [{}]\n",
            "  ".repeat(depth),
            head.label(),
            items.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str) -> Value {
        Value::new(name, "int", Location::Stack { frame: 0 })
    }

    #[test]
    fn assign_then_rollback() {
        let mut v = int("x");
        v.assign(ValueData::Scalar("5".into()));
        v.assign(ValueData::Scalar("9".into()));
        assert_eq!(v.rollback(), &ValueData::Scalar("5".into()));
        assert_eq!(v.rollback(), &ValueData::Uninitialized);
        assert_eq!(v.rollback(), &ValueData::Uninitialized);
    }

    #[test]
    fn fresh_value_rolls_back_to_garbage() {
        let mut v = int("x");
        assert_eq!(v.rollback(), &ValueData::Uninitialized);
        assert!(v.is_uninitialized());
        assert_eq!(v.describe(), "x (int): <garbage>\n");
    }

    #[test]
    fn zero_is_not_garbage() {
        let v = int("x").with_data(ValueData::Scalar("0".into()));
        assert_eq!(v.describe(), "x (int): 0\n");
        let p = Value::new("p", "char *", Location::Heap).with_data(ValueData::Pointer(0));
        assert_eq!(p.describe(), "p (char *): 0x0\n");
    }

    #[test]
    fn struct_renders_nested() {
        let frame = Location::Stack { frame: 1 };
        let name: Vec<Value> = ["B", "o", "b"]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Value::new("name", "char", frame)
                    .at(0x115 + i as u64)
                    .in_array(ArraySlot {
                        start: 0x115,
                        index: i,
                        len: 3,
                    })
                    .with_data(ValueData::Scalar(c.to_string()))
            })
            .collect();
        let mut fields = name;
        fields.push(Value::new("age", "int", frame).with_data(ValueData::Scalar("23".into())));
        fields.push(Value::new("alive", "int", frame));

        let person = Value::new("person", "struct person", frame)
            .at(0x110)
            .with_data(ValueData::Fields(fields));
        assert_eq!(
            person.describe(),
            "person (struct person):\n{\n  name (char): [B, o, b]\n  age (int): 23\n  alive (int): <garbage>\n}\n"
        );
        assert_eq!(person.fields().len(), 5);
    }
}
