use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one debugger session and the automated runner on top of it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub debugger: String,
    pub debugger_args: Vec<String>,
    /// Primary prompt sentinel, installed with `set prompt` at startup.
    pub prompt: String,
    /// The debugger's own prompts, seen before the custom prompt is set.
    pub fallback_prompts: Vec<String>,
    /// Zero disables the bound.
    pub command_timeout_ms: u64,
    pub entry_breakpoint: String,
    pub max_steps: usize,
    pub memlog_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debugger: "gdb".to_string(),
            debugger_args: vec!["--quiet".to_string()],
            prompt: "(visual-gdb) ".to_string(),
            fallback_prompts: vec!["(gdb) ".to_string()],
            command_timeout_ms: 30_000,
            entry_breakpoint: "main".to_string(),
            max_steps: 10_000,
            memlog_path: None,
            snapshot_path: None,
            log_level: "warn".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        match self.command_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Primary sentinel first, then the fallbacks.
    pub fn sentinels(&self) -> Vec<String> {
        let mut all = vec![self.prompt.clone()];
        all.extend(self.fallback_prompts.iter().cloned());
        all
    }

    pub fn startup_commands(&self) -> Vec<String> {
        vec![
            "set pagination off".to_string(),
            "set confirm off".to_string(),
            format!("set prompt {}", self.prompt),
        ]
    }
}
