use super::command::{Command, Response};
use super::context::DebugContext;
use super::prompt::PromptDetector;
use super::stepping::StepState;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::parser::FunctionCatalogue;
use crate::state::ProgramState;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdin, Command as Process, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Called with display-worthy debugger output as it is produced. Must not register further
/// listeners on the same session.
pub type OutputListener = Box<dyn Fn(&str) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

enum Event {
    Output(String),
    Closed(Stream),
}

struct Shared {
    context: Mutex<DebugContext<ChildStdin>>,
    /// Signalled whenever the context changes.
    settled: Condvar,
    listeners: Mutex<Vec<OutputListener>>,
    program: Mutex<ProgramState>,
}

impl Shared {
    fn context(&self) -> MutexGuard<'_, DebugContext<ChildStdin>> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, shown: &[String]) {
        if shown.is_empty() {
            return;
        }
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for text in shown {
            for listener in listeners.iter() {
                listener(text);
            }
        }
    }
}

/// A running debugger subprocess.
pub struct Session {
    shared: Arc<Shared>,
    child: Mutex<Child>,
    config: SessionConfig,
}

impl Session {
    /// Spawn the debugger on `executable` and run the startup command sequence.
    pub fn start(
        executable: &Path,
        working_dir: &Path,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let spawn_failed = |source| SessionError::SpawnFailed {
            program: config.debugger.clone(),
            source,
        };

        let mut process = Process::new(&config.debugger);
        process
            .args(&config.debugger_args)
            .arg(executable)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(memlog) = &config.memlog_path {
            process.env("MEMLOG_OUT", memlog);
        }

        let mut child = process.spawn().map_err(spawn_failed)?;
        let (stdin, stdout, stderr) =
            match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
                _ => {
                    let _ = child.kill();
                    return Err(spawn_failed(io::Error::new(
                        io::ErrorKind::Other,
                        "debugger pipes unavailable",
                    )));
                }
            };
        info!(debugger = %config.debugger, executable = %executable.display(), "debugger started");

        let detector = PromptDetector::new(&config.sentinels());
        let shared = Arc::new(Shared {
            context: Mutex::new(DebugContext::new(stdin, detector)),
            settled: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
            program: Mutex::new(ProgramState::new()),
        });

        let (events, received) = mpsc::channel();
        spawn_reader(stdout, Stream::Stdout, events.clone());
        spawn_reader(stderr, Stream::Stderr, events);
        let pump_shared = Arc::clone(&shared);
        thread::spawn(move || pump(pump_shared, received));

        let session = Self {
            shared,
            child: Mutex::new(child),
            config,
        };

        session.issue_command(Command::startup())?;
        for text in session.config.startup_commands() {
            session.issue(&text, false)?;
        }
        debug!("startup sequence done");

        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a command and wait for its prompt. Fails with `Busy` instead of waiting for another
    /// command to finish.
    pub fn issue(&self, text: &str, display: bool) -> Result<Response, SessionError> {
        self.issue_command(Command::new(text, display))
    }

    pub fn send_foreground(&self, text: &str) -> Result<Response, SessionError> {
        self.issue(text, true)
    }

    /// Queue a command behind whatever is in flight.
    pub fn enqueue_background(&self, text: &str, display: bool) -> Result<(), SessionError> {
        let result = self.shared.context().enqueue(Command::new(text, display));
        self.shared.settled.notify_all();
        result
    }

    fn issue_command(&self, command: Command) -> Result<Response, SessionError> {
        let (reply, response) = mpsc::channel();
        self.shared.context().submit(command, Some(reply))?;

        let received = match self.config.command_timeout() {
            Some(limit) => response.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => SessionError::Timeout(limit),
                RecvTimeoutError::Disconnected => SessionError::SessionTerminated,
            }),
            None => response
                .recv()
                .map_err(|_| SessionError::SessionTerminated),
        };

        match received {
            Ok(result) => result,
            Err(SessionError::Timeout(limit)) => {
                let mut ctx = self.shared.context();
                // The prompt may have arrived while we were taking the lock.
                if let Ok(result) = response.try_recv() {
                    return result;
                }
                if let Some(command) = ctx.abort() {
                    warn!(command = %command.text, ?limit, "command timed out");
                }
                drop(ctx);
                self.shared.settled.notify_all();
                Err(SessionError::Timeout(limit))
            }
            Err(e) => Err(e),
        }
    }

    /// Block until nothing is in flight and the background queue is empty.
    pub fn wait_idle(&self) -> Result<(), SessionError> {
        let limit = self.config.command_timeout();
        let started = Instant::now();
        let mut ctx = self.shared.context();
        loop {
            if !ctx.is_running() {
                return Err(SessionError::SessionTerminated);
            }
            if ctx.is_idle() {
                return Ok(());
            }
            ctx = match limit {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        if let Some(command) = ctx.abort() {
                            warn!(command = %command.text, ?limit, "background command timed out");
                        }
                        drop(ctx);
                        self.shared.settled.notify_all();
                        return Err(SessionError::Timeout(limit));
                    }
                    self.shared
                        .settled
                        .wait_timeout(ctx, limit - elapsed)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .shared
                    .settled
                    .wait(ctx)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    pub fn on_output<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + 'static,
    {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn has_exited(&self) -> bool {
        self.shared.context().has_exited()
    }

    pub fn is_running(&self) -> bool {
        self.shared.context().is_running()
    }

    pub fn catalogue(&self) -> FunctionCatalogue {
        self.shared.context().catalogue().clone()
    }

    pub fn step_state(&self) -> StepState {
        self.shared.context().step_state()
    }

    /// A copy of the current program state, for rendering.
    pub fn program_state(&self) -> ProgramState {
        self.shared
            .program
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_program_state<R>(&self, update: impl FnOnce(&mut ProgramState) -> R) -> R {
        let mut program = self
            .shared
            .program
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut program)
    }

    /// Kill the debugger. Anyone waiting on a command gets `SessionTerminated`.
    pub fn kill(&self) {
        {
            let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = child.kill() {
                debug!(error = %e, "debugger already gone");
            }
            let _ = child.wait();
        }
        self.shared.context().on_closed();
        self.shared.settled.notify_all();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.kill();
    }
}

fn spawn_reader<R>(mut stream: R, which: Stream, events: Sender<Event>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut pending = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    let text = decode_utf8(&mut pending);
                    if !text.is_empty() && events.send(Event::Output(text)).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(stream = ?which, error = %e, "read failed");
                    break;
                }
            }
        }
        let _ = events.send(Event::Closed(which));
    });
}

/// Decode as much of `pending` as possible, keeping an incomplete trailing character for the
/// next read.
fn decode_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

fn pump(shared: Arc<Shared>, events: Receiver<Event>) {
    for event in events {
        match event {
            Event::Output(chunk) => {
                trace!(bytes = chunk.len(), "output");
                let shown = shared.context().on_output(&chunk);
                shared.settled.notify_all();
                shared.emit(&shown);
            }
            Event::Closed(Stream::Stdout) => {
                info!("debugger output closed");
                shared.context().on_closed();
                shared.settled.notify_all();
            }
            Event::Closed(Stream::Stderr) => {}
        }
    }
}
