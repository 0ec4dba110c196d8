use super::command::{Command, CommandKind, Response};
use super::prompt::{CarryBuffer, PromptDetector};
use crate::error::SessionError;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::mpsc::Sender;
use tracing::{debug, trace};

pub type Reply = Sender<Result<Response, SessionError>>;

struct InFlight {
    command: Command,
    reply: Option<Reply>,
}

/// A command whose prompt has been seen.
pub struct Completion {
    pub response: Response,
    /// Displayable text not yet streamed.
    pub tail: Option<String>,
    reply: Option<Reply>,
}

impl Completion {
    /// Hand the response to whoever issued the command and give it back.
    pub fn respond(mut self) -> Response {
        if let Some(reply) = self.reply.take() {
            // The issuer may have given up (timeout); that's fine.
            let _ = reply.send(Ok(self.response.clone()));
        }
        self.response
    }
}

pub enum Feed {
    /// Nothing was in flight.
    Unsolicited(String),
    /// Still waiting for the prompt; carries text that can be displayed now.
    Pending(Option<String>),
    Complete(Completion),
}

/// Framing and serialization of commands over the debugger's input: one command in flight at a
/// time, background commands waiting in FIFO order behind it.
pub struct CommandChannel<W> {
    input: Option<W>,
    detector: PromptDetector,
    carry: CarryBuffer,
    in_flight: Option<InFlight>,
    queue: VecDeque<Command>,
    /// Trailing part of the last prompt, matched before it arrived.
    prompt_rest: String,
}

impl<W: Write> CommandChannel<W> {
    pub fn new(input: W, detector: PromptDetector) -> Self {
        Self {
            input: Some(input),
            detector,
            carry: CarryBuffer::default(),
            in_flight: None,
            queue: VecDeque::new(),
            prompt_rest: String::new(),
        }
    }

    /// A channel with nothing attached; every issue fails with `NotRunning`.
    pub fn detached(detector: PromptDetector) -> Self {
        Self {
            input: None,
            detector,
            carry: CarryBuffer::default(),
            in_flight: None,
            queue: VecDeque::new(),
            prompt_rest: String::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.input.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    pub fn in_flight(&self) -> Option<&Command> {
        self.in_flight.as_ref().map(|f| &f.command)
    }

    pub fn queued(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter()
    }

    pub fn input(&self) -> Option<&W> {
        self.input.as_ref()
    }

    pub fn issue(&mut self, command: Command, reply: Option<Reply>) -> Result<(), SessionError> {
        if let Some(current) = &self.in_flight {
            return Err(SessionError::Busy(current.command.text.clone()));
        }
        let input = self.input.as_mut().ok_or(SessionError::NotRunning)?;

        self.carry.clear();
        if command.kind != CommandKind::Startup {
            input.write_all(command.text.as_bytes())?;
            input.write_all(b"\n")?;
            input.flush()?;
        }
        debug!(command = %command.text, display = command.display, "issued");

        self.in_flight = Some(InFlight { command, reply });
        Ok(())
    }

    pub fn enqueue(&mut self, command: Command) {
        trace!(command = %command.text, "queued");
        self.queue.push_back(command);
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Issue the oldest background command if the slot is free.
    pub fn dispatch_next(&mut self) -> Result<Option<Command>, SessionError> {
        if self.in_flight.is_some() {
            return Ok(None);
        }
        match self.queue.pop_front() {
            Some(command) => {
                self.issue(command.clone(), None)?;
                Ok(Some(command))
            }
            None => Ok(None),
        }
    }

    pub fn feed(&mut self, chunk: &str) -> Feed {
        let chunk = self.skip_prompt_rest(chunk);
        let streams = match &self.in_flight {
            None => return Feed::Unsolicited(chunk.to_string()),
            // Step output is held back: it may be suppressed once complete.
            Some(f) => f.command.display && f.command.kind != CommandKind::Step,
        };

        self.carry.push(chunk);

        let found = self
            .detector
            .prompt_match(self.carry.as_str())
            .map(|(start, rest)| (start, rest.to_string()));
        if let Some((start, rest)) = found {
            self.prompt_rest = rest;
            let tail = if streams {
                self.carry.take_unstreamed(start)
            } else {
                None
            };
            let text = self.carry.finish(start);
            if let Some(InFlight { command, reply }) = self.in_flight.take() {
                debug!(command = %command.text, bytes = text.len(), "completed");
                return Feed::Complete(Completion {
                    response: Response {
                        display: command.display,
                        command,
                        text,
                    },
                    tail,
                    reply,
                });
            }
        }

        if streams {
            let end = self.carry.as_str().len() - self.detector.pending_tail(self.carry.as_str());
            Feed::Pending(self.carry.take_unstreamed(end))
        } else {
            Feed::Pending(None)
        }
    }

    /// Drop the leading part of `chunk` that finishes the prompt already matched.
    fn skip_prompt_rest<'c>(&mut self, chunk: &'c str) -> &'c str {
        if self.prompt_rest.is_empty() {
            return chunk;
        }
        let rest = std::mem::take(&mut self.prompt_rest);
        let skipped: usize = rest
            .chars()
            .zip(chunk.chars())
            .take_while(|(expected, got)| expected == got)
            .map(|(c, _)| c.len_utf8())
            .sum();
        if skipped == chunk.len() && skipped < rest.len() {
            self.prompt_rest = rest[skipped..].to_string();
        }
        &chunk[skipped..]
    }

    /// Drop the in-flight command and everything queued behind it.
    pub fn abort_in_flight(&mut self) -> Option<Command> {
        self.carry.clear();
        self.prompt_rest.clear();
        self.queue.clear();
        self.in_flight.take().map(|f| f.command)
    }

    /// The debugger is gone: detach the input and fail whatever was outstanding.
    pub fn terminate(&mut self) {
        self.input = None;
        self.carry.clear();
        self.prompt_rest.clear();
        self.queue.clear();
        if let Some(InFlight { command, reply }) = self.in_flight.take() {
            debug!(command = %command.text, "terminated while in flight");
            if let Some(reply) = reply {
                let _ = reply.send(Err(SessionError::SessionTerminated));
            }
        }
    }
}
