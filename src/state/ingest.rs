use super::value::{Address, ArraySlot, Location, Value, ValueData};
use crate::parser::Literal;

/// A local or argument as reported at one stop.
#[derive(Debug, Clone)]
pub struct Observed {
    pub name: String,
    pub type_name: String,
    pub address: Option<Address>,
    pub size_bytes: Option<usize>,
    pub frame: usize,
    pub literal: Literal,
}

impl Observed {
    /// Arrays with a known address and size become one value per printed element; anything
    /// else is a single value. The element stride comes from the declared length, so a
    /// truncated print still lands each element at its real address.
    pub fn into_values(self) -> Vec<Value> {
        let location = Location::Stack { frame: self.frame };

        if let (Literal::Elements(elements), Some(start), Some(size)) =
            (&self.literal, self.address, self.size_bytes)
        {
            let printed = elements.len();
            let (element_type, len) = match split_array_type(&self.type_name) {
                Some((element_type, declared)) if declared >= printed => (element_type, declared),
                _ => (self.type_name.clone(), printed),
            };
            if len > 0 && size % len == 0 {
                let stride = size / len;
                return elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        Value::new(self.name.clone(), element_type.clone(), location)
                            .at(start + (index * stride) as Address)
                            .sized(stride)
                            .in_array(ArraySlot { start, index, len })
                            .with_data(data_from_literal(element, location))
                    })
                    .collect();
            }
        }

        let mut value = Value::new(self.name, self.type_name, location);
        if let Some(address) = self.address {
            value = value.at(address);
        }
        if let Some(size) = self.size_bytes {
            value = value.sized(size);
        }
        vec![value.with_data(data_from_literal(&self.literal, location))]
    }
}

/// `int [3]` → (`int`, 3); `char [4][2]` → (`char [2]`, 4).
fn split_array_type(array_type: &str) -> Option<(String, usize)> {
    let open = array_type.find('[')?;
    let close = open + array_type[open..].find(']')?;
    let len = array_type[open + 1..close].trim().parse().ok()?;

    let head = array_type[..open].trim_end();
    let rest = &array_type[close + 1..];
    let element = if rest.is_empty() {
        head.to_string()
    } else if rest.starts_with('[') {
        format!("{} {}", head, rest)
    } else {
        format!("{}{}", head, rest)
    };
    Some((element, len))
}

fn data_from_literal(literal: &Literal, location: Location) -> ValueData {
    match literal {
        Literal::Scalar(text) => ValueData::Scalar(text.clone()),
        Literal::Pointer(address) => ValueData::Pointer(*address),
        Literal::Fields(fields) => ValueData::Fields(
            fields
                .iter()
                .map(|(name, field)| {
                    Value::new(name.clone(), "", location).with_data(data_from_literal(field, location))
                })
                .collect(),
        ),
        // Nested arrays have no address of their own to group by.
        Literal::Elements(_) => ValueData::Scalar(literal_text(literal)),
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Scalar(text) => text.clone(),
        Literal::Pointer(address) => format!("{:#x}", address),
        Literal::Fields(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|(name, field)| format!("{} = {}", name, literal_text(field)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Literal::Elements(elements) => {
            let inner: Vec<String> = elements.iter().map(literal_text).collect();
            format!("[{}]", inner.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_literal;

    fn observed(literal: &str, type_name: &str, size: Option<usize>) -> Observed {
        Observed {
            name: "v".to_string(),
            type_name: type_name.to_string(),
            address: Some(0x100),
            size_bytes: size,
            frame: 0,
            literal: parse_literal(literal),
        }
    }

    #[test]
    fn arrays_split_into_elements() {
        let values = observed("{8, 21, 10}", "int [3]", Some(12)).into_values();
        let addresses: Vec<_> = values.iter().map(|v| v.address).collect();
        assert_eq!(addresses, vec![Some(0x100), Some(0x104), Some(0x108)]);
        assert!(values.iter().all(|v| v.type_name == "int"));
        assert_eq!(values[2].array.map(|s| s.index), Some(2));
        assert_eq!(values[1].data(), &ValueData::Scalar("21".into()));
    }

    #[test]
    fn array_without_size_stays_whole() {
        let values = observed("{1, 2}", "int [2]", None).into_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].data(), &ValueData::Scalar("[1, 2]".into()));
    }

    #[test]
    fn structs_become_fields() {
        let values = observed("{x = 1, next = 0x0}", "struct node", Some(16)).into_values();
        assert_eq!(values.len(), 1);
        let fields = values[0].fields();
        assert_eq!(fields[0].name, "x");
        assert_eq!(fields[1].data(), &ValueData::Pointer(0));
    }

    #[test]
    fn truncated_print_keeps_declared_layout() {
        let printed: Vec<String> = (0..200).map(|n| n.to_string()).collect();
        let literal = format!("{{{}...}}", printed.join(", "));
        let values = observed(&literal, "int [1000]", Some(4000)).into_values();

        assert_eq!(values.len(), 200);
        assert_eq!(values[1].address, Some(0x104));
        assert_eq!(values[199].address, Some(0x100 + 199 * 4));
        assert_eq!(values[199].data(), &ValueData::Scalar("199".into()));
        assert_eq!(values[0].size_bytes, Some(4));
        assert_eq!(values[0].array.map(|s| s.len), Some(1000));
        assert_eq!(values[0].type_name, "int");
    }

    #[test]
    fn element_types() {
        assert_eq!(split_array_type("int [3]"), Some(("int".to_string(), 3)));
        assert_eq!(split_array_type("char [4][2]"), Some(("char [2]".to_string(), 4)));
        assert_eq!(split_array_type("long"), None);
    }
}
