use crate::debugger::Session;
use crate::error::SessionError;
use crate::parser::{parse_address_of, parse_backtrace, parse_literal, parse_locals, parse_print_integer};
use crate::state::{MemlogTail, Observed, Snapshot, SnapshotLog};
use std::fs::File;
use std::io::BufWriter;
use tracing::{debug, info, trace, warn};

/// Records what the target looks like each time it stops.
pub struct StopRecorder<'a> {
    session: &'a Session,
    log: SnapshotLog,
    memlog: Option<MemlogTail>,
}

impl<'a> StopRecorder<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            log: SnapshotLog::new(),
            memlog: session.config().memlog_path.as_ref().map(MemlogTail::new),
        }
    }

    pub fn log(&self) -> &SnapshotLog {
        &self.log
    }

    pub fn into_log(self) -> SnapshotLog {
        self.log
    }

    /// Backtrace into a snapshot and the frame stack, then locals, arguments and heap events.
    pub fn record_stop(&mut self) -> Result<&Snapshot, SessionError> {
        let backtrace = self.session.issue("backtrace", false)?;
        let frames = parse_backtrace(&backtrace.text).unwrap_or_else(|skipped| {
            debug!(%skipped, "stop without a backtrace");
            Vec::new()
        });

        let depth = self.session.update_program_state(|program| {
            program.sync_frames(&frames);
            program.frames().len()
        });
        if let Some(innermost) = depth.checked_sub(1) {
            self.record_locals(innermost, "info args")?;
            self.record_locals(innermost, "info locals")?;
        }
        self.poll_memlog();

        let snapshot = self.log.record(frames);
        debug!(sequence = snapshot.sequence, line = ?snapshot.current_line, "stop recorded");
        Ok(snapshot)
    }

    fn record_locals(&mut self, frame: usize, command: &str) -> Result<(), SessionError> {
        let response = self.session.issue(command, false)?;
        let locals = match parse_locals(&response.text) {
            Ok(locals) => locals,
            Err(skipped) => {
                trace!(command, %skipped);
                return Ok(());
            }
        };

        for local in locals {
            let address = self.session.issue(&format!("print &{}", local.name), false)?;
            let (type_name, address) = match parse_address_of(&address.text) {
                Some((type_name, address)) => (type_name, Some(address)),
                None => (String::new(), None),
            };
            let size = self
                .session
                .issue(&format!("print sizeof({})", local.name), false)?;

            let observed = Observed {
                literal: parse_literal(&local.value),
                name: local.name,
                type_name,
                address,
                size_bytes: parse_print_integer(&size.text).map(|n| n as usize),
                frame,
            };
            self.session.update_program_state(|program| {
                for value in observed.into_values() {
                    program.observe(value);
                }
            });
        }
        Ok(())
    }

    fn poll_memlog(&mut self) {
        let tail = match &mut self.memlog {
            Some(tail) => tail,
            None => return,
        };
        match tail.poll() {
            Ok(events) if events.is_empty() => {}
            Ok(events) => {
                trace!(events = events.len(), "memlog events");
                self.session.update_program_state(|program| {
                    for event in &events {
                        program.apply_memlog(event);
                    }
                });
            }
            Err(e) => warn!(error = %e, "could not read memlog"),
        }
    }
}

/// Run the target to its entry breakpoint and step until it exits, recording every stop.
///
/// A debugger that dies part way through ends the run; the stops recorded so far are kept.
pub fn run_automated_session(session: &Session) -> Result<Vec<Snapshot>, SessionError> {
    let mut recorder = StopRecorder::new(session);
    match drive(session, &mut recorder) {
        Ok(()) => {}
        Err(SessionError::SessionTerminated) => warn!("debugger terminated during the run"),
        Err(e) => return Err(e),
    }

    let log = recorder.into_log();
    if let Some(path) = &session.config().snapshot_path {
        log.write_jsonl(BufWriter::new(File::create(path)?))?;
        info!(path = %path.display(), snapshots = log.len(), "snapshots written");
    }
    Ok(log.into_snapshots())
}

fn drive(session: &Session, recorder: &mut StopRecorder<'_>) -> Result<(), SessionError> {
    session.issue("info functions", false)?;
    if session.catalogue().is_empty() {
        warn!("no functions found; every step into a call will be skipped");
    }

    let entry = &session.config().entry_breakpoint;
    session.issue(&format!("break {}", entry), false)?;
    session.issue("run", true)?;
    session.wait_idle()?;

    let max_steps = session.config().max_steps;
    for step in 0..max_steps {
        if session.has_exited() {
            info!(steps = step, "target exited");
            return Ok(());
        }
        recorder.record_stop()?;
        session.issue("step", true)?;
        // Let a step-skip sequence finish before looking at the stop.
        session.wait_idle()?;
    }

    if !session.has_exited() {
        warn!(max_steps, "step limit reached");
    }
    Ok(())
}
