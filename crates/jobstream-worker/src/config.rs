//! Worker process configuration.
//!
//! Program, working directory and entry script always come from here, never
//! from request input.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-call timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_KILL_GRACE_SECS: u64 = 2;

/// Lower bound for the kill grace period
pub const MIN_KILL_GRACE_SECS: u64 = 1;

/// Lower bound for the single-URL parse timeout
pub const MIN_PARSE_TIMEOUT_SECS: u64 = 5;

/// Configuration for spawning worker processes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Executable to run (usually an interpreter)
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments placed before the entry script (e.g. `-u` for unbuffered output)
    #[serde(default = "default_interpreter_args")]
    pub interpreter_args: Vec<String>,
    /// Directory the worker runs in; relative paths resolve against the current dir
    #[serde(default = "default_working_directory")]
    pub working_directory: String,
    /// Entry script passed to the executable
    #[serde(default = "default_main_script")]
    pub main_script: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds to wait after SIGTERM before force-killing (at least one)
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,
    /// Spawn real worker processes (`false` selects the stub worker)
    #[serde(default = "default_true")]
    pub enable_direct_execution: bool,
}

fn default_command() -> String {
    "../mcp-jobboard/.venv/bin/python".to_string()
}

fn default_interpreter_args() -> Vec<String> {
    vec!["-u".to_string()]
}

fn default_working_directory() -> String {
    "../mcp-jobboard".to_string()
}

fn default_main_script() -> String {
    "main.py".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_kill_grace_secs() -> u64 {
    DEFAULT_KILL_GRACE_SECS
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            interpreter_args: default_interpreter_args(),
            working_directory: default_working_directory(),
            main_script: default_main_script(),
            timeout_secs: default_timeout_secs(),
            kill_grace_secs: default_kill_grace_secs(),
            enable_direct_execution: true,
        }
    }
}

impl WorkerConfig {
    /// Working directory, made absolute against the current directory.
    #[must_use]
    pub fn resolved_working_directory(&self) -> PathBuf {
        let wd = Path::new(&self.working_directory);
        if wd.is_absolute() {
            return normalize(wd);
        }
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        normalize(&base.join(wd))
    }

    /// Per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Timeout for single-URL parsing (never below five seconds).
    #[must_use]
    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(MIN_PARSE_TIMEOUT_SECS))
    }

    /// Grace period between terminate and force-kill, never below one second.
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs.max(MIN_KILL_GRACE_SECS))
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
