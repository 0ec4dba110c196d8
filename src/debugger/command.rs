/// What a command does, resolved once from its text when it is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Nothing is written; waits for the banner prompt.
    Startup,
    Step,
    Next,
    Finish,
    Backtrace,
    InfoFunctions,
    InfoLocals,
    InfoArgs,
    Run,
    Continue,
    Print,
    Other,
}

impl CommandKind {
    pub fn classify(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let first = match words.next() {
            Some(word) => word,
            None => return CommandKind::Startup,
        };

        match first {
            "s" | "step" => CommandKind::Step,
            "n" | "next" => CommandKind::Next,
            "fin" | "finish" => CommandKind::Finish,
            "bt" | "backtrace" | "where" => CommandKind::Backtrace,
            "r" | "run" => CommandKind::Run,
            "c" | "cont" | "continue" => CommandKind::Continue,
            "p" | "print" => CommandKind::Print,
            "i" | "info" => match words.next() {
                Some(topic) if topic.starts_with("func") => CommandKind::InfoFunctions,
                Some(topic) if topic.starts_with("lo") => CommandKind::InfoLocals,
                Some(topic) if topic.starts_with("ar") => CommandKind::InfoArgs,
                _ => CommandKind::Other,
            },
            _ => CommandKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    /// Whether the result is surfaced to output listeners.
    pub display: bool,
}

impl Command {
    pub fn new(text: impl Into<String>, display: bool) -> Self {
        let text = text.into();
        let kind = CommandKind::classify(&text);
        Self {
            text,
            kind,
            display,
        }
    }

    pub fn startup() -> Self {
        Self {
            text: String::new(),
            kind: CommandKind::Startup,
            display: false,
        }
    }
}

/// Output of one completed command, without the prompt that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub command: Command,
    pub text: String,
    pub display: bool,
}
