use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no debugger process is attached")]
    NotRunning,

    #[error("command `{0}` is still in flight")]
    Busy(String),

    #[error("could not start debugger `{program}`")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("debugger exited while a command was outstanding")]
    SessionTerminated,

    #[error("no prompt seen after {0:?}")]
    Timeout(Duration),

    #[error("I/O error")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file")]
    Io(#[from] io::Error),

    #[error("invalid config file")]
    Json(#[from] serde_json::Error),
}
