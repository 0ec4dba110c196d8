mod channel;
mod command;
mod context;
mod prompt;
mod session;
mod stepping;

pub use channel::{CommandChannel, Completion, Feed, Reply};
pub use command::{Command, CommandKind, Response};
pub use context::DebugContext;
pub use prompt::{CarryBuffer, PromptDetector};
pub use session::{OutputListener, Session};
pub use stepping::{StepController, StepOutcome, StepState};
