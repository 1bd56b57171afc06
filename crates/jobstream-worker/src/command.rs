//! Worker command construction.
//!
//! Program, interpreter args and entry script come from [`WorkerConfig`];
//! request values are appended as plain argument strings, never through a
//! shell.

use crate::config::WorkerConfig;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// A fully resolved worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable
    pub program: String,
    /// Complete argument vector (interpreter args, script, mode args)
    pub args: Vec<String>,
    /// Absolute working directory
    pub working_directory: PathBuf,
}

impl WorkerCommand {
    fn base(config: &WorkerConfig) -> Self {
        let mut args = config.interpreter_args.clone();
        args.push(config.main_script.clone());
        Self {
            program: config.command.clone(),
            args,
            working_directory: config.resolved_working_directory(),
        }
    }

    fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    fn flag(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(name).arg(value)
    }

    fn flag_if_present(self, name: &str, value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            self
        } else {
            self.flag(name, value)
        }
    }

    /// Streaming search over one or more sources.
    #[must_use]
    pub fn search(
        config: &WorkerConfig,
        sources: &str,
        keywords: &str,
        max_pages: u32,
        per_source_limit: u32,
    ) -> Self {
        Self::base(config)
            .flag_if_present("--sources", sources)
            .flag_if_present("--keywords", keywords)
            .flag("--max-pages", max_pages.to_string())
            .flag("--per-source-limit", per_source_limit.to_string())
            .arg("--json")
    }

    /// Single page of a single source.
    #[must_use]
    pub fn page(
        config: &WorkerConfig,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Self {
        Self::base(config)
            .arg("--json")
            .flag("--mode", "page")
            .flag_if_present("--sources", source)
            .flag_if_present("--keywords", query)
            .flag("--page", page.to_string())
            .flag("--page-size", page_size.to_string())
    }

    /// Parse a single job URL.
    #[must_use]
    pub fn parse_url(config: &WorkerConfig, url: &str) -> Self {
        Self::base(config)
            .arg("--json")
            .flag("--mode", "parse")
            .flag("--url", url.trim())
    }

    /// Program followed by its arguments, for logging.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the tokio command: piped stdout/stderr, no stdin, killed on drop.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerConfig {
        WorkerConfig {
            command: "/venv/bin/python".to_string(),
            working_directory: "/srv/worker".to_string(),
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn test_search_args() {
        let cmd = WorkerCommand::search(&config(), "lever,greenhouse", "rust backend", 3, 20);
        assert_eq!(cmd.program, "/venv/bin/python");
        assert_eq!(cmd.working_directory, PathBuf::from("/srv/worker"));
        assert_eq!(
            cmd.args,
            vec![
                "-u",
                "main.py",
                "--sources",
                "lever,greenhouse",
                "--keywords",
                "rust backend",
                "--max-pages",
                "3",
                "--per-source-limit",
                "20",
                "--json",
            ]
        );
    }

    #[test]
    fn test_search_skips_empty_filters() {
        let cmd = WorkerCommand::search(&config(), "  ", "", 1, 10);
        assert!(!cmd.args.contains(&"--sources".to_string()));
        assert!(!cmd.args.contains(&"--keywords".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("--json"));
    }

    #[test]
    fn test_request_values_stay_single_arguments() {
        let cmd = WorkerCommand::search(&config(), "lever; rm -rf /", "$(whoami)", 1, 1);
        assert!(cmd.args.contains(&"lever; rm -rf /".to_string()));
        assert!(cmd.args.contains(&"$(whoami)".to_string()));
    }

    #[test]
    fn test_page_args() {
        let cmd = WorkerCommand::page(&config(), "lever", "rust", 2, 25);
        assert_eq!(
            cmd.args,
            vec![
                "-u",
                "main.py",
                "--json",
                "--mode",
                "page",
                "--sources",
                "lever",
                "--keywords",
                "rust",
                "--page",
                "2",
                "--page-size",
                "25",
            ]
        );
    }

    #[test]
    fn test_parse_url_args() {
        let cmd = WorkerCommand::parse_url(&config(), " https://jobs.example.com/1 ");
        assert_eq!(
            cmd.args,
            vec![
                "-u",
                "main.py",
                "--json",
                "--mode",
                "parse",
                "--url",
                "https://jobs.example.com/1",
            ]
        );
        assert!(cmd.display().starts_with("/venv/bin/python -u main.py"));
    }
}
