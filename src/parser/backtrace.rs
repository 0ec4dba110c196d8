use super::types::{ParseSkipped, StackFrame};
use super::FUNCTION_NAME;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // #1  0x000055555555513d in helper (x=1) at main.c:7
    // #0  0x00007ffff7e4a8f5 in strlen () from /lib/x86_64-linux-gnu/libc.so.6
    static ref FRAME: Regex = Regex::new(&format!(
        r"^#(\d+)\s+(?:0x[0-9a-fA-F]+\s+in\s+)?({})\s*\(.*\)(?:\s+at\s+(\S+):(\d+))?",
        FUNCTION_NAME
    ))
    .unwrap();
}

/// Parse `backtrace` output into frames, innermost (`#0`) first.
///
/// Lines that don't look like frames are dropped.
pub fn parse_backtrace(text: &str) -> Result<Vec<StackFrame>, ParseSkipped> {
    let frames: Vec<StackFrame> = text
        .lines()
        .filter_map(|line| FRAME.captures(line.trim_start()))
        .filter_map(|caps| {
            Some(StackFrame {
                frame_index: caps.get(1)?.as_str().parse().ok()?,
                function_name: caps.get(2)?.as_str().to_string(),
                source_file: caps.get(3).map(|m| m.as_str().to_string()),
                source_line: caps.get(4).and_then(|m| m.as_str().parse().ok()),
            })
        })
        .collect();

    if frames.is_empty() {
        Err(ParseSkipped { what: "stack frames" })
    } else {
        Ok(frames)
    }
}
