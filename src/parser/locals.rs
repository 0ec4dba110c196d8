use super::types::{Literal, Local, ParseSkipped};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ASSIGNMENT: Regex = Regex::new(r"^([A-Za-z_]\w*) = (.*)$").unwrap();
    static ref ADDRESS_OF: Regex =
        Regex::new(r"^\$\d+ = \((.+)\)\s*0x([0-9a-fA-F]+)").unwrap();
    static ref PRINTED_INTEGER: Regex = Regex::new(r"^\$\d+ = (\d+)\s*$").unwrap();
    static ref POINTER: Regex =
        Regex::new(r"^(?:\([^)]*\*\)\s*)?0x([0-9a-fA-F]+)\b").unwrap();
    static ref REPEATS: Regex = Regex::new(r"^(.*?)\s*<repeats (\d+) times>$").unwrap();
}

/// Most array elements one literal expands to. `<repeats N times>` runs stop here.
pub const ELEMENT_LIMIT: usize = 10_000;

/// Parse `info locals` / `info args` output.
///
/// A value spanning several lines (pretty-printed aggregates) is joined back into one.
pub fn parse_locals(text: &str) -> Result<Vec<Local>, ParseSkipped> {
    let mut locals: Vec<Local> = Vec::new();
    let mut open_braces = 0i32;

    for line in text.lines() {
        if open_braces > 0 {
            if let Some(last) = locals.last_mut() {
                last.value.push(' ');
                last.value.push_str(line.trim());
                open_braces += brace_delta(line);
            }
            continue;
        }

        if let Some(caps) = ASSIGNMENT.captures(line.trim_end()) {
            let value = caps[2].trim().to_string();
            open_braces = brace_delta(&value);
            locals.push(Local {
                name: caps[1].to_string(),
                value,
            });
        }
    }

    if locals.is_empty() {
        Err(ParseSkipped { what: "locals" })
    } else {
        Ok(locals)
    }
}

fn brace_delta(text: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '{') => delta += 1,
            (None, '}') => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// `print &name` → (pointee type, address).
pub fn parse_address_of(text: &str) -> Option<(String, u64)> {
    text.lines().find_map(|line| {
        let caps = ADDRESS_OF.captures(line.trim())?;
        let address = u64::from_str_radix(&caps[2], 16).ok()?;
        Some((pointee_type(&caps[1]), address))
    })
}

fn pointee_type(pointer_type: &str) -> String {
    let t = pointer_type.trim();
    let pointee = match t.strip_suffix('*') {
        Some(inner) => inner.to_string(),
        // `int (*)[3]`
        None => t.replacen("(*)", "", 1),
    };
    pointee.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `print sizeof(name)` → size.
pub fn parse_print_integer(text: &str) -> Option<u64> {
    text.lines().find_map(|line| {
        let caps = PRINTED_INTEGER.captures(line.trim())?;
        caps[1].parse().ok()
    })
}

/// Interpret a printed value.
pub fn parse_literal(text: &str) -> Literal {
    let text = text.trim();

    if let Some(inner) = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let items = split_top_level(inner);
        let is_struct = items
            .first()
            .map_or(false, |item| ASSIGNMENT.is_match(item));

        if is_struct {
            let fields = items
                .iter()
                .filter_map(|item| {
                    let caps = ASSIGNMENT.captures(item)?;
                    Some((caps[1].to_string(), parse_literal(&caps[2])))
                })
                .collect();
            return Literal::Fields(fields);
        }

        let mut elements = Vec::new();
        let last = items.len().saturating_sub(1);
        for (position, item) in items.iter().enumerate() {
            // `{0, 1, ..., 199...}`: the print limit cut the array short.
            let item = match item.strip_suffix("...") {
                Some(printed) if position == last => printed.trim_end(),
                _ => item.as_str(),
            };
            let room = ELEMENT_LIMIT - elements.len();
            match REPEATS.captures(item) {
                Some(caps) => {
                    let count: usize = caps[2].parse().unwrap_or(1);
                    let element = parse_literal(&caps[1]);
                    elements.extend(std::iter::repeat(element).take(count.min(room)));
                }
                None => elements.push(parse_literal(item)),
            }
            if elements.len() >= ELEMENT_LIMIT {
                break;
            }
        }
        return Literal::Elements(elements);
    }

    if let Some(caps) = POINTER.captures(text) {
        if let Ok(address) = u64::from_str_radix(&caps[1], 16) {
            return Literal::Pointer(address);
        }
    }

    Literal::Scalar(text.to_string())
}

/// Split on commas that are not nested inside braces, parens, brackets or quotes.
fn split_top_level(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in text.chars() {
        if escaped {
            escaped = false;
            current.push(ch);
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '{' | '(' | '[') => depth += 1,
            (None, '}' | ')' | ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}
