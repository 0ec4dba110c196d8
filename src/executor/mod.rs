mod interactive;
mod runner;

pub use interactive::{parse_input, run_interactive, Input};
pub use runner::{run_automated_session, StopRecorder};
