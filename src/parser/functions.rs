use super::types::{FunctionCatalogue, ParseSkipped};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // `12:	static int *make_array(int);`
    static ref DEFINITION: Regex = Regex::new(r"^\s*\d+:\s+([^(]+?)\s*\(").unwrap();
}

/// Build the catalogue from an `info functions` response.
///
/// Only debug-info entries (`<line>: <decl>`) count; the "Non-debugging symbols" section has no
/// line prefix and is ignored, which is what separates user code from library code.
pub fn parse_function_catalogue(text: &str) -> Result<FunctionCatalogue, ParseSkipped> {
    let catalogue: FunctionCatalogue = text
        .lines()
        .filter_map(|line| DEFINITION.captures(line))
        .filter_map(|caps| {
            let decl = caps.get(1)?.as_str();
            let name = decl.split_whitespace().last()?.trim_start_matches('*');
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect();

    if catalogue.is_empty() {
        Err(ParseSkipped {
            what: "function definitions",
        })
    } else {
        Ok(catalogue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_FUNCTIONS: &str = "All defined functions:

File main.c:
27:	int compute_sum(int, int);
11:	int *int_array(int);
47:	int main();
5:	static void helper(void);
40:	struct node *  make_node(int);

Non-debugging symbols:
0x0000000000001000  _init
0x0000000000001030  printf@plt
0x0000000000001040  malloc@plt
";

    #[test]
    fn collects_debug_functions_only() {
        let catalogue = parse_function_catalogue(INFO_FUNCTIONS).unwrap();
        assert_eq!(catalogue.len(), 5);
        for name in ["compute_sum", "int_array", "main", "helper", "make_node"] {
            assert!(catalogue.contains(name), "missing {}", name);
        }
        assert!(!catalogue.contains("printf@plt"));
        assert!(!catalogue.contains("_init"));
    }

    #[test]
    fn no_definitions_is_skipped() {
        let err = parse_function_catalogue("No symbol table is loaded.\n").unwrap_err();
        assert_eq!(err.what, "function definitions");
    }
}
