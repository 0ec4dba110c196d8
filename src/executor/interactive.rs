use super::runner::StopRecorder;
use crate::debugger::{CommandKind, Session};
use crate::error::SessionError;
use crate::state::Address;
use std::io::{self, BufRead, Write};

/// A line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Sent to the debugger as is.
    Debugger(String),
    State,
    Undo(Address),
    Catalogue,
    Quit,
    Invalid(String),
}

/// Lines starting with `:` are handled locally; everything else goes to the debugger.
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let meta = match line.strip_prefix(':') {
        Some(meta) => meta,
        None => return Input::Debugger(line.to_string()),
    };

    let words = match shlex::split(meta) {
        Some(words) => words,
        None => return Input::Invalid("unbalanced quotes".to_string()),
    };
    match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["state"] => Input::State,
        ["catalogue"] => Input::Catalogue,
        ["q"] | ["quit"] => Input::Quit,
        ["undo", address] => match parse_address(address) {
            Some(address) => Input::Undo(address),
            None => Input::Invalid(format!("not an address: {}", address)),
        },
        _ => Input::Invalid(format!("unknown command: {}", meta.trim())),
    }
}

fn parse_address(text: &str) -> Option<Address> {
    match text.strip_prefix("0x") {
        Some(hex) => Address::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Commands after which the target may have stopped somewhere new.
fn moves_target(kind: CommandKind) -> bool {
    matches!(
        kind,
        CommandKind::Step
            | CommandKind::Next
            | CommandKind::Finish
            | CommandKind::Run
            | CommandKind::Continue
    )
}

pub fn run_interactive<R: BufRead>(session: &Session, input: R) -> io::Result<()> {
    let mut recorder = StopRecorder::new(session);

    eprintln!("\nCommands: any debugger command, :state, :undo <addr>, :catalogue, :quit");
    eprint!("> ");
    io::stderr().flush()?;

    for line in input.lines() {
        let line = line?;
        match parse_input(&line) {
            Input::Quit => break,
            Input::State => print!("{}", session.program_state().describe()),
            Input::Catalogue => {
                let catalogue = session.catalogue();
                let mut names: Vec<&str> = catalogue.names().collect();
                names.sort_unstable();
                println!("{}", names.join("\n"));
            }
            Input::Undo(address) => {
                match session.update_program_state(|p| p.rollback_at(address).map(|v| v.describe())) {
                    Some(text) => print!("{}", text),
                    None => eprintln!("❌ Nothing recorded at {:#x}", address),
                }
            }
            Input::Invalid(reason) => eprintln!("❓ {}", reason),
            Input::Debugger(text) if text.is_empty() => {}
            Input::Debugger(text) => {
                // Queued step-skip commands go first.
                let sent = session
                    .wait_idle()
                    .and_then(|()| session.send_foreground(&text));
                match sent {
                    Ok(response) => {
                        if moves_target(response.command.kind) {
                            session.wait_idle().ok();
                            if !session.has_exited() {
                                if let Err(e) = recorder.record_stop() {
                                    eprintln!("❌ {}", e);
                                }
                            }
                        }
                    }
                    Err(SessionError::SessionTerminated) | Err(SessionError::NotRunning) => {
                        eprintln!("🚪 Debugger exited");
                        break;
                    }
                    Err(e) => eprintln!("❌ {}", e),
                }
            }
        }
        io::stdout().flush()?;
        eprint!("> ");
        io::stderr().flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_commands() {
        assert_eq!(parse_input(":state"), Input::State);
        assert_eq!(parse_input("  :quit "), Input::Quit);
        assert_eq!(parse_input(":undo 0x7ffe10"), Input::Undo(0x7ffe10));
        assert_eq!(parse_input(":undo '4096'"), Input::Undo(4096));
        assert!(matches!(parse_input(":undo here"), Input::Invalid(_)));
        assert!(matches!(parse_input(":frobnicate"), Input::Invalid(_)));
        assert!(matches!(parse_input(":undo \"0x1"), Input::Invalid(_)));
    }

    #[test]
    fn other_lines_go_to_the_debugger() {
        assert_eq!(parse_input("print x"), Input::Debugger("print x".into()));
        assert_eq!(parse_input(""), Input::Debugger(String::new()));
    }

    #[test]
    fn step_commands_move_the_target() {
        assert!(moves_target(CommandKind::Step));
        assert!(moves_target(CommandKind::Continue));
        assert!(!moves_target(CommandKind::Print));
        assert!(!moves_target(CommandKind::Backtrace));
    }
}
