use regex::Regex;

/// Decides whether accumulated output ends with a prompt.
#[derive(Debug, Clone)]
pub struct PromptDetector {
    /// Literal prompt and the pattern matching it at the end of output.
    prompts: Vec<(String, Regex)>,
}

impl PromptDetector {
    /// `sentinels` are literal prompt strings, primary first. Trailing whitespace is optional when
    /// matching.
    pub fn new<S: AsRef<str>>(sentinels: &[S]) -> Self {
        let prompts = sentinels
            .iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| {
                let pattern = Regex::new(&format!(r"{}[ \t]*\z", regex::escape(s.trim_end()))).ok()?;
                Some((s, pattern))
            })
            .collect();
        Self { prompts }
    }

    /// Byte offset where the prompt starts, if `buffer` ends with one.
    pub fn prompt_start(&self, buffer: &str) -> Option<usize> {
        self.prompt_match(buffer).map(|(start, _)| start)
    }

    /// Where the prompt starts, and the part of it still to come when the output stopped
    /// before its trailing whitespace.
    pub fn prompt_match(&self, buffer: &str) -> Option<(usize, &str)> {
        self.prompts
            .iter()
            .filter_map(|(sentinel, pattern)| {
                let found = pattern.find(buffer)?;
                let rest = sentinel.strip_prefix(found.as_str()).unwrap_or("");
                Some((found.start(), rest))
            })
            .min_by_key(|&(start, _)| start)
    }

    /// Length of the longest tail of `buffer` that could still grow into a prompt.
    pub fn pending_tail(&self, buffer: &str) -> usize {
        self.prompts
            .iter()
            .filter_map(|(s, _)| {
                (1..s.len())
                    .rev()
                    .filter(|&k| s.is_char_boundary(k))
                    .find(|&k| buffer.ends_with(&s[..k]))
            })
            .max()
            .unwrap_or(0)
    }
}

impl Default for PromptDetector {
    fn default() -> Self {
        Self::new(&["(gdb) "])
    }
}

/// Output accumulated for the in-flight command, independent of line boundaries.
#[derive(Debug, Default)]
pub struct CarryBuffer {
    text: String,
    /// Bytes already handed out for display.
    streamed: usize,
}

impl CarryBuffer {
    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text not yet streamed, up to `end`.
    pub fn take_unstreamed(&mut self, end: usize) -> Option<String> {
        let end = end.min(self.text.len());
        if end <= self.streamed || !self.text.is_char_boundary(end) {
            return None;
        }
        let out = self.text[self.streamed..end].to_string();
        self.streamed = end;
        Some(out)
    }

    /// Empty the buffer, returning everything before `prompt_start`.
    pub fn finish(&mut self, prompt_start: usize) -> String {
        let mut text = std::mem::take(&mut self.text);
        text.truncate(prompt_start);
        self.streamed = 0;
        text
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.streamed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_only_counts_at_the_end() {
        let detector = PromptDetector::new(&["(visual-gdb) ", "(gdb) "]);
        assert_eq!(detector.prompt_start("x = 1\n(gdb) "), Some(6));
        assert_eq!(detector.prompt_start("x = 1\n(visual-gdb) "), Some(6));
        assert_eq!(detector.prompt_start("x = 1\n(gdb)"), Some(6));
        assert_eq!(detector.prompt_start("printed (gdb) here\n"), None);
    }

    #[test]
    fn early_match_reports_what_is_still_to_come() {
        let detector = PromptDetector::new(&["(visual-gdb) ", "(gdb) "]);
        assert_eq!(detector.prompt_match("x = 1\n(gdb)"), Some((6, " ")));
        assert_eq!(detector.prompt_match("x = 1\n(gdb) "), Some((6, "")));
        assert_eq!(detector.prompt_match("(visual-gdb)"), Some((0, " ")));
        assert_eq!(detector.prompt_match("x = 1\n"), None);
    }

    #[test]
    fn pending_tail_holds_back_prompt_prefix() {
        let detector = PromptDetector::new(&["(gdb) "]);
        assert_eq!(detector.pending_tail("output\n(gd"), 3);
        assert_eq!(detector.pending_tail("output\n"), 0);
    }

    #[test]
    fn finish_clears_everything() {
        let mut carry = CarryBuffer::default();
        carry.push("abc\n(gdb) ");
        assert_eq!(carry.take_unstreamed(2).as_deref(), Some("ab"));
        assert_eq!(carry.finish(4), "abc\n");
        assert!(carry.is_empty());
        assert_eq!(carry.take_unstreamed(10), None);
    }
}
