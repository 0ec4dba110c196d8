use super::channel::{CommandChannel, Completion, Feed, Reply};
use super::command::{Command, CommandKind};
use super::prompt::PromptDetector;
use super::stepping::{StepController, StepState};
use crate::error::SessionError;
use crate::parser::{self, FunctionCatalogue};
use std::io::Write;
use tracing::{debug, info, warn};

/// Everything a session mutates when output arrives: the command channel, the step controller
/// and the facts they share. Independent of how bytes reach it.
pub struct DebugContext<W> {
    channel: CommandChannel<W>,
    steps: StepController,
    catalogue: FunctionCatalogue,
    exited: bool,
}

impl<W: Write> DebugContext<W> {
    pub fn new(input: W, detector: PromptDetector) -> Self {
        Self::with_channel(CommandChannel::new(input, detector))
    }

    pub fn detached(detector: PromptDetector) -> Self {
        Self::with_channel(CommandChannel::detached(detector))
    }

    fn with_channel(channel: CommandChannel<W>) -> Self {
        Self {
            channel,
            steps: StepController::new(),
            catalogue: FunctionCatalogue::new(),
            exited: false,
        }
    }

    pub fn channel(&self) -> &CommandChannel<W> {
        &self.channel
    }

    pub fn catalogue(&self) -> &FunctionCatalogue {
        &self.catalogue
    }

    pub fn step_state(&self) -> StepState {
        self.steps.state()
    }

    /// Whether the target program has exited since the last `run`.
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    pub fn is_running(&self) -> bool {
        self.channel.is_running()
    }

    pub fn is_idle(&self) -> bool {
        self.channel.is_idle()
    }

    /// Foreground issue: fails if anything is in flight.
    pub fn submit(&mut self, command: Command, reply: Option<Reply>) -> Result<(), SessionError> {
        let is_run = command.kind == CommandKind::Run;
        self.channel.issue(command, reply)?;
        if is_run {
            self.exited = false;
        }
        Ok(())
    }

    /// Background issue: waits behind the in-flight command, if any.
    pub fn enqueue(&mut self, command: Command) -> Result<(), SessionError> {
        if !self.channel.is_running() {
            return Err(SessionError::NotRunning);
        }
        self.channel.enqueue(command);
        self.channel.dispatch_next()?;
        Ok(())
    }

    /// Feed one chunk of debugger output. Returns the text that should be displayed.
    pub fn on_output(&mut self, chunk: &str) -> Vec<String> {
        let mut shown = Vec::new();
        match self.channel.feed(chunk) {
            // Whitespace trailing a prompt that already matched.
            Feed::Unsolicited(text) if text.trim().is_empty() => {}
            Feed::Unsolicited(text) => {
                if parser::is_program_exit(&text) {
                    self.mark_exited();
                }
                shown.push(text);
            }
            Feed::Pending(Some(text)) => shown.push(text),
            Feed::Pending(None) => {}
            Feed::Complete(completion) => self.complete(completion, &mut shown),
        }
        shown
    }

    fn complete(&mut self, mut completion: Completion, shown: &mut Vec<String>) {
        if let Some(tail) = completion.tail.take() {
            shown.push(tail);
        }

        let kind = completion.response.command.kind;
        if kind == CommandKind::InfoFunctions {
            self.catalogue = match parser::parse_function_catalogue(&completion.response.text) {
                Ok(catalogue) => {
                    info!(functions = catalogue.len(), "function catalogue refreshed");
                    catalogue
                }
                Err(skipped) => {
                    debug!(%skipped, "function catalogue emptied");
                    FunctionCatalogue::new()
                }
            };
        }

        let outcome = self
            .steps
            .observe(kind, &completion.response.text, &self.catalogue);
        if outcome.suppress {
            completion.response.display = false;
        } else if outcome.reveal {
            completion.response.display = true;
            shown.push(completion.response.text.clone());
        } else if kind == CommandKind::Step && completion.response.display {
            shown.push(completion.response.text.clone());
        }

        if parser::is_program_exit(&completion.response.text) {
            self.mark_exited();
        } else if let Some(follow_up) = outcome.follow_up {
            self.channel.enqueue(follow_up);
        }

        completion.respond();

        if let Err(e) = self.channel.dispatch_next() {
            warn!(error = %e, "could not dispatch queued command");
            self.channel.terminate();
        }
    }

    fn mark_exited(&mut self) {
        if !self.exited {
            info!("target program exited");
        }
        self.exited = true;
        self.steps.reset();
        self.channel.clear_queue();
    }

    /// Give up on the in-flight command (timeout): drop it, the queue and any skip in progress.
    pub fn abort(&mut self) -> Option<Command> {
        self.steps.reset();
        self.channel.abort_in_flight()
    }

    /// The debugger's output closed.
    pub fn on_closed(&mut self) {
        self.steps.reset();
        self.channel.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn context() -> DebugContext<Vec<u8>> {
        DebugContext::new(Vec::new(), PromptDetector::new(&["(gdb) "]))
    }

    fn written(ctx: &DebugContext<Vec<u8>>) -> String {
        String::from_utf8_lossy(ctx.channel().input().unwrap()).into_owned()
    }

    #[test]
    fn info_functions_replaces_catalogue() {
        let mut ctx = context();
        ctx.submit(Command::new("info functions", false), None).unwrap();
        ctx.on_output("File a.c:\n3:\tint main(void);\n(gdb) ");
        assert!(ctx.catalogue().contains("main"));
        assert_eq!(written(&ctx), "info functions\n");

        ctx.submit(Command::new("info functions", false), None).unwrap();
        ctx.on_output("File a.c:\n9:\tint other(void);\n(gdb) ");
        assert!(!ctx.catalogue().contains("main"));
        assert!(ctx.catalogue().contains("other"));
    }

    #[test]
    fn displayed_output_streams_without_prompt() {
        let mut ctx = context();
        ctx.submit(Command::new("print x", true), None).unwrap();
        assert_eq!(ctx.on_output("$1 = 4"), vec!["$1 = 4"]);
        assert_eq!(ctx.on_output("\n(gd"), vec!["\n"]);
        assert!(ctx.on_output("b) ").is_empty());
        assert!(ctx.is_idle());
    }

    #[test]
    fn suppressed_output_is_not_shown() {
        let mut ctx = context();
        ctx.submit(Command::new("info locals", false), None).unwrap();
        assert!(ctx.on_output("x = 1\n(gdb) ").is_empty());
    }

    #[test]
    fn exit_clears_pending_skip() {
        let mut ctx = context();
        ctx.submit(Command::new("step", true), None).unwrap();
        let shown = ctx.on_output("[Inferior 1 (process 7) exited normally]\n(gdb) ");
        assert_eq!(shown.len(), 1);
        assert!(ctx.has_exited());
        assert!(ctx.is_idle());
        assert_eq!(ctx.step_state(), StepState::Idle);
    }

    #[test]
    fn terminate_fails_outstanding_command() {
        let mut ctx = context();
        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::new("run", true), Some(tx)).unwrap();
        ctx.on_closed();
        assert!(matches!(rx.recv().unwrap(), Err(SessionError::SessionTerminated)));
        assert!(matches!(
            ctx.submit(Command::new("next", true), None),
            Err(SessionError::NotRunning)
        ));
    }
}
