use super::command::{Command, CommandKind};
use crate::parser::{call_site_identifiers, stopped_line, FunctionCatalogue};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Idle,
    /// A `finish` was queued to leave library code entered from `finish_from`.
    AwaitingSkipDecision { finish_from: Option<u32> },
}

/// What the session should do with a response after the controller has seen it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Hide this response from output listeners.
    pub suppress: bool,
    /// Show this response even though its command was not displayed.
    pub reveal: bool,
    pub follow_up: Option<Command>,
}

/// Steps over calls into functions outside the target program's catalogue.
///
/// A `step` that lands in an unknown function is hidden and followed by a hidden `finish`. If the
/// `finish` returns to the line the step started from, a visible `next` moves past the call.
#[derive(Debug)]
pub struct StepController {
    state: StepState,
}

impl StepController {
    pub fn new() -> Self {
        Self {
            state: StepState::Idle,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = StepState::Idle;
    }

    pub fn observe(
        &mut self,
        kind: CommandKind,
        text: &str,
        catalogue: &FunctionCatalogue,
    ) -> StepOutcome {
        match self.state {
            StepState::Idle if kind == CommandKind::Step => {
                let unknown = call_site_identifiers(text).find(|name| !catalogue.contains(name));
                match unknown {
                    Some(name) => {
                        let finish_from = stopped_line(text);
                        debug!(function = name, ?finish_from, "stepped into library code");
                        self.state = StepState::AwaitingSkipDecision { finish_from };
                        StepOutcome {
                            suppress: true,
                            follow_up: Some(Command::new("finish", false)),
                            ..StepOutcome::default()
                        }
                    }
                    None => StepOutcome::default(),
                }
            }
            StepState::Idle => StepOutcome::default(),
            StepState::AwaitingSkipDecision { finish_from } => {
                self.state = StepState::Idle;
                if stopped_line(text) == finish_from {
                    debug!(?finish_from, "back on the calling line, stepping past it");
                    StepOutcome {
                        follow_up: Some(Command::new("next", true)),
                        ..StepOutcome::default()
                    }
                } else {
                    StepOutcome {
                        reveal: true,
                        ..StepOutcome::default()
                    }
                }
            }
        }
    }
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}
