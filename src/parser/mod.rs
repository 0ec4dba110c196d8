mod backtrace;
mod functions;
mod lines;
mod locals;
mod types;

/// A function name as GDB prints it in frames: C identifiers, C++ qualified names and PLT stubs.
const FUNCTION_NAME: &str = r"[A-Za-z_][\w:.~<>@]*";

pub use backtrace::parse_backtrace;
pub use functions::parse_function_catalogue;
pub use lines::{call_site_identifiers, is_program_exit, stopped_line};
pub use locals::{parse_address_of, parse_literal, parse_locals, parse_print_integer, ELEMENT_LIMIT};
pub use types::{FunctionCatalogue, Literal, Local, ParseSkipped, StackFrame};
