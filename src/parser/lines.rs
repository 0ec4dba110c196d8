use super::FUNCTION_NAME;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SOURCE_LINE: Regex = Regex::new(r"^(\d+)\s").unwrap();
    // `0x0000555555555189 in strlen (s=0x2000)` or `helper (x=1) at main.c:5`
    static ref CALL_SITE: Regex = Regex::new(&format!(
        r"^(?:0x[0-9a-fA-F]+\s+in\s+)?({})\s*\(",
        FUNCTION_NAME
    ))
    .unwrap();
    static ref PROGRAM_EXIT: Regex = Regex::new(
        r"(?i)(process \d+\) exited|program exited normally|exited with code|exited normally|not being run)"
    )
    .unwrap();
}

/// The source line the debugger stopped at: the last line of `text` that begins with a line
/// number. Earlier matches are usually noise from library code.
pub fn stopped_line(text: &str) -> Option<u32> {
    text.lines()
        .filter_map(|line| SOURCE_LINE.captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .last()
}

/// Identifiers of every function-entry line in `text`, in order.
pub fn call_site_identifiers(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .filter_map(|line| CALL_SITE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

pub fn is_program_exit(text: &str) -> bool {
    PROGRAM_EXIT.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_numbered_line_wins() {
        let text = "0x0000555555555040 in strlen@plt ()\n7\t  int n = 1;\nhelper (x=2) at main.c:12\n12\t  return 0;\n";
        assert_eq!(stopped_line(text), Some(12));
        assert_eq!(stopped_line("Run till exit from #0 ...\n"), None);
    }

    #[test]
    fn call_sites_skip_source_lines() {
        let text = "0x1000 in strlen (s=0x2000)\n12   return foo(0);\nhelper (x=1) at main.c:5\nBreakpoint 1, main () at main.c:3\n";
        let ids: Vec<_> = call_site_identifiers(text).collect();
        assert_eq!(ids, vec!["strlen", "helper"]);
    }

    #[test]
    fn call_sites_keep_qualified_and_plt_names() {
        let text = "0x0000555555555030 in strlen@plt ()\nns::Parser::run (this=0x1) at p.cc:9\n";
        let ids: Vec<_> = call_site_identifiers(text).collect();
        assert_eq!(ids, vec!["strlen@plt", "ns::Parser::run"]);
    }

    #[test]
    fn exit_phrases() {
        assert!(is_program_exit("[Inferior 1 (process 1234) exited normally]"));
        assert!(is_program_exit("Inferior 1 (process 99) exited with code 01"));
        assert!(is_program_exit("The program is not being run."));
        assert!(is_program_exit("Program Exited Normally."));
        assert!(!is_program_exit("12\t  return 0;\n"));
    }
}
