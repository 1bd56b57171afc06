//! Process orchestrator - one supervised worker per request.
//!
//! `execute` spawns a streaming worker and returns immediately; a supervisor
//! task forwards every stdout line to the request channel, enforces the
//! timeout and reaps the process. `fetch_page` / `fetch_by_url` run a bounded
//! worker and wait for its single result line.

use crate::command::WorkerCommand;
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::protocol::{self, JobDetails, LineKind, PageResult, WorkerLine};
use crate::registry::{ProcessRegistry, ProcessState, RegistrySlot};
use chrono::Utc;
use jobstream_bus::{channel_for_request, event_types, EventBus};
use serde_json::{json, Value};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Upper bound for reaping a process after SIGKILL
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for draining stdout after a worker exits on its own.
/// Only hit when a grandchild keeps the pipe open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of pages a streaming search may visit
pub const DEFAULT_MAX_PAGES: u32 = 1;

/// Default item limit per source for a streaming search
pub const DEFAULT_PER_SOURCE_LIMIT: u32 = 50;

/// A streaming search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Registry key; at most one worker per id
    pub request_id: String,
    /// Bus channel receiving the worker's events
    pub channel: String,
    /// Comma-separated source keys
    pub sources: String,
    /// Search keywords
    pub keywords: String,
    /// Pages per source
    pub max_pages: u32,
    /// Items per source
    pub per_source_limit: u32,
}

impl SearchRequest {
    /// Request publishing to `req:<request_id>` with default limits.
    pub fn new(
        request_id: impl Into<String>,
        sources: impl Into<String>,
        keywords: impl Into<String>,
    ) -> Self {
        let request_id = request_id.into();
        Self {
            channel: channel_for_request(&request_id),
            request_id,
            sources: sources.into(),
            keywords: keywords.into(),
            max_pages: DEFAULT_MAX_PAGES,
            per_source_limit: DEFAULT_PER_SOURCE_LIMIT,
        }
    }

    /// Publish to another channel (fan-out of one request over several workers).
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Override page and item limits.
    #[must_use]
    pub fn with_limits(mut self, max_pages: u32, per_source_limit: u32) -> Self {
        self.max_pages = max_pages;
        self.per_source_limit = per_source_limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.request_id.trim().is_empty() {
            return Err(Error::InvalidRequest("request id is empty".to_string()));
        }
        if self.channel.trim().is_empty() {
            return Err(Error::InvalidRequest("channel is empty".to_string()));
        }
        Ok(())
    }
}

/// Result of [`ProcessOrchestrator::execute`].
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// Worker spawned; the handle resolves once it has been reaped
    Started(SupervisorHandle),
    /// A worker for this request id is already registered; nothing was spawned
    AlreadyRunning,
}

impl ExecuteOutcome {
    /// Whether a new worker was started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Handle to a background supervisor.
#[derive(Debug)]
pub struct SupervisorHandle {
    request_id: String,
    join: JoinHandle<ProcessState>,
}

impl SupervisorHandle {
    pub(crate) fn new(request_id: &str, join: JoinHandle<ProcessState>) -> Self {
        Self {
            request_id: request_id.to_string(),
            join,
        }
    }

    /// Request id being supervised.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait until the worker has been reaped and unregistered.
    pub async fn wait(self) -> ProcessState {
        match self.join.await {
            Ok(state) => state,
            Err(e) => {
                error!(request_id = %self.request_id, error = %e, "Supervisor task failed");
                ProcessState::Failed
            }
        }
    }
}

/// Spawns and supervises worker processes.
#[derive(Clone)]
pub struct ProcessOrchestrator {
    config: Arc<WorkerConfig>,
    bus: EventBus,
    registry: ProcessRegistry,
    parse_seq: Arc<AtomicU64>,
}

impl ProcessOrchestrator {
    /// Create an orchestrator publishing to `bus`.
    #[must_use]
    pub fn new(config: WorkerConfig, bus: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            bus,
            registry: ProcessRegistry::new(),
            parse_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Worker configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Registry of live workers.
    #[must_use]
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Start a streaming search.
    ///
    /// Publishes `crawlStart` before any worker output and returns without
    /// waiting for the process. A second call for a request id that is still
    /// registered is ignored.
    pub async fn execute(&self, request: SearchRequest) -> Result<ExecuteOutcome> {
        request.validate()?;

        let command = WorkerCommand::search(
            &self.config,
            &request.sources,
            &request.keywords,
            request.max_pages,
            request.per_source_limit,
        );
        let Some(slot) = self.registry.reserve(
            &request.request_id,
            command.display(),
            command.working_directory.clone(),
        ) else {
            warn!(
                request_id = %request.request_id,
                "Search already in progress for this request id"
            );
            return Ok(ExecuteOutcome::AlreadyRunning);
        };

        info!(
            request_id = %request.request_id,
            command = %command.display(),
            cwd = %command.working_directory.display(),
            "Starting worker"
        );

        let child = match command.to_command().spawn() {
            Ok(child) => child,
            Err(e) => {
                slot.set_state(ProcessState::Failed);
                error!(request_id = %request.request_id, error = %e, "Failed to spawn worker");
                publish_error(
                    &self.bus,
                    &request.channel,
                    format!("Worker process failed: {e}"),
                );
                return Err(Error::Spawn(e.to_string()));
            }
        };
        slot.set_running(child.id());

        self.bus.publish(
            &request.channel,
            event_types::CRAWL_START,
            json!({
                "source": request.sources,
                "query": request.keywords,
                "maxPages": request.max_pages,
                "perSourceLimit": request.per_source_limit,
                "timestamp": now_millis(),
            }),
        );

        let process = WorkerProcess { child, slot };
        let join = tokio::spawn(supervise(
            self.bus.clone(),
            request.channel,
            process,
            self.config.timeout(),
            self.config.kill_grace(),
        ));
        Ok(ExecuteOutcome::Started(SupervisorHandle::new(
            &request.request_id,
            join,
        )))
    }

    /// Fetch one page of one source.
    pub async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult> {
        if request_id.trim().is_empty() {
            return Err(Error::InvalidRequest("request id is empty".to_string()));
        }
        if page == 0 || page_size == 0 {
            return Err(Error::InvalidRequest(format!(
                "page ({page}) and page size ({page_size}) must be positive"
            )));
        }

        let command = WorkerCommand::page(&self.config, source, query, page, page_size);
        debug!(request_id = %request_id, source = %source, page, page_size, "Fetching page");

        let payload = self
            .run_for_result(
                request_id,
                command,
                &[protocol::TYPE_PAGE, protocol::TYPE_PARSED],
                self.config.timeout(),
            )
            .await?;
        PageResult::from_payload(&payload, page)
    }

    /// Parse a single job URL.
    pub async fn fetch_by_url(&self, url: &str) -> Result<JobDetails> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidRequest("url is empty".to_string()));
        }

        let key = format!("parse-{}", self.parse_seq.fetch_add(1, Ordering::Relaxed));
        let command = WorkerCommand::parse_url(&self.config, url);
        debug!(key = %key, url = %url, "Parsing job url");

        let payload = self
            .run_for_result(
                &key,
                command,
                &[protocol::TYPE_PARSED],
                self.config.parse_timeout(),
            )
            .await?;
        Ok(JobDetails::from_parsed(&payload, url))
    }

    /// Stop the worker registered under `request_id`.
    ///
    /// Returns `false` if no such worker exists. Termination and cleanup run
    /// on the worker's supervisor.
    pub fn stop(&self, request_id: &str) -> bool {
        let stopped = self.registry.stop(request_id);
        if stopped {
            info!(request_id = %request_id, "Worker stop requested");
        }
        stopped
    }

    /// Stop every registered worker.
    pub fn stop_all(&self) -> usize {
        let count = self.registry.stop_all();
        if count > 0 {
            info!(count, "Stopping all workers");
        }
        count
    }

    /// Spawn a bounded worker and return its first result payload.
    async fn run_for_result(
        &self,
        key: &str,
        command: WorkerCommand,
        accept: &[&str],
        limit: Duration,
    ) -> Result<Value> {
        let Some(slot) =
            self.registry
                .reserve(key, command.display(), command.working_directory.clone())
        else {
            warn!(request_id = %key, "Worker already in progress for this request id");
            return Err(Error::AlreadyRunning(key.to_string()));
        };

        let mut child = match command.to_command().spawn() {
            Ok(child) => child,
            Err(e) => {
                slot.set_state(ProcessState::Failed);
                error!(request_id = %key, error = %e, "Failed to spawn worker");
                return Err(Error::Spawn(e.to_string()));
            }
        };
        slot.set_running(child.id());

        let stdout = child.stdout.take();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(key.to_string(), stderr)));
        let mut process = WorkerProcess { child, slot };
        let cancel = process.slot.cancelled();

        let outcome = match stdout {
            Some(stdout) => tokio::select! {
                found = tokio::time::timeout(limit, first_result(stdout, accept)) => {
                    found.unwrap_or(Err(Error::Timeout(limit.as_secs())))
                }
                _ = cancel.cancelled() => Err(Error::Worker("stopped".to_string())),
            },
            None => Err(Error::Spawn("stdout not captured".to_string())),
        };

        let grace = self.config.kill_grace();
        let state = match &outcome {
            Ok(_) => match tokio::time::timeout(grace, process.child.wait()).await {
                Ok(Ok(status)) => ProcessState::Exited {
                    code: status.code(),
                },
                _ => {
                    process.terminate(grace).await;
                    ProcessState::Killed
                }
            },
            Err(Error::Timeout(secs)) => {
                warn!(request_id = %key, timeout_secs = secs, "Worker timed out");
                process.slot.set_state(ProcessState::TimedOut);
                process.terminate(grace).await;
                ProcessState::Killed
            }
            Err(e) => {
                debug!(request_id = %key, error = %e, "Worker produced no result");
                process.terminate(grace).await;
                ProcessState::Killed
            }
        };
        process.slot.set_state(state);
        drop(process);

        if let Some(task) = stderr_task {
            join_bounded(task, grace).await;
        }
        outcome
    }
}

impl std::fmt::Debug for ProcessOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessOrchestrator")
            .field("command", &self.config.command)
            .field("active", &self.registry.len())
            .finish()
    }
}

/// A spawned child bound to its registry slot.
///
/// Dropping it force-kills a still-running child and then releases the slot,
/// whichever way the owning task ends.
struct WorkerProcess {
    child: Child,
    slot: RegistrySlot,
}

impl WorkerProcess {
    async fn terminate(&mut self, grace: Duration) -> Option<ExitStatus> {
        terminate(&mut self.child, grace).await
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            warn!(request_id = %self.slot.request_id(), "Force-killing worker on drop");
            if let Err(e) = self.child.start_kill() {
                debug!(request_id = %self.slot.request_id(), error = %e, "Kill on drop failed");
            }
        }
    }
}

enum Finish {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Stopped,
}

async fn supervise(
    bus: EventBus,
    channel: String,
    mut process: WorkerProcess,
    timeout: Duration,
    grace: Duration,
) -> ProcessState {
    let request_id = process.slot.request_id().to_string();
    let cancel = process.slot.cancelled();

    let stdout_task = process.child.stdout.take().map(|stdout| {
        tokio::spawn(pump_stdout(
            bus.clone(),
            channel.clone(),
            request_id.clone(),
            stdout,
        ))
    });
    let stderr_task = process
        .child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(drain_stderr(request_id.clone(), stderr)));

    let finish = tokio::select! {
        waited = tokio::time::timeout(timeout, process.child.wait()) => match waited {
            Ok(result) => Finish::Exited(result),
            Err(_) => Finish::TimedOut,
        },
        _ = cancel.cancelled() => Finish::Stopped,
    };

    let state = match finish {
        Finish::Exited(Ok(status)) => {
            if let Some(task) = stdout_task {
                join_drained(task, &request_id).await;
            }
            let code = status.code();
            if status.success() {
                info!(request_id = %request_id, "Worker completed");
            } else {
                warn!(request_id = %request_id, exit_code = ?code, "Worker exited with non-zero status");
            }
            bus.publish(
                &channel,
                event_types::COMPLETE,
                json!({ "exitCode": code, "timestamp": now_millis() }),
            );
            ProcessState::Exited { code }
        }
        Finish::Exited(Err(e)) => {
            error!(request_id = %request_id, error = %e, "Failed waiting for worker");
            process.slot.set_state(ProcessState::Failed);
            process.terminate(grace).await;
            if let Some(task) = stdout_task {
                join_bounded(task, grace).await;
            }
            publish_error(&bus, &channel, format!("Worker process failed: {e}"));
            ProcessState::Failed
        }
        Finish::TimedOut => {
            warn!(
                request_id = %request_id,
                timeout_secs = timeout.as_secs(),
                "Worker timed out, terminating"
            );
            process.slot.set_state(ProcessState::TimedOut);
            process.terminate(grace).await;
            if let Some(task) = stdout_task {
                join_bounded(task, grace).await;
            }
            bus.publish(
                &channel,
                event_types::ERROR,
                json!({
                    "message": "Search operation timed out",
                    "timeout_secs": timeout.as_secs(),
                    "timestamp": now_millis(),
                }),
            );
            ProcessState::Killed
        }
        Finish::Stopped => {
            info!(request_id = %request_id, "Stopping worker");
            process.terminate(grace).await;
            if let Some(task) = stdout_task {
                join_bounded(task, grace).await;
            }
            publish_error(&bus, &channel, "Search operation stopped".to_string());
            ProcessState::Killed
        }
    };

    process.slot.set_state(state);
    drop(process);

    if let Some(task) = stderr_task {
        join_bounded(task, grace).await;
    }
    debug!(request_id = %request_id, state = %state, "Supervisor finished");
    state
}

/// Forward stdout lines to the channel. Returns the number of events published.
async fn pump_stdout(
    bus: EventBus,
    channel: String,
    request_id: String,
    stdout: ChildStdout,
) -> usize {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut forwarded = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Failed reading worker stdout");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        match protocol::parse_line(&line) {
            None => {}
            Some(WorkerLine::Event {
                event_type,
                payload,
            }) => {
                bus.publish(&channel, &event_type, payload);
                forwarded += 1;
            }
            Some(WorkerLine::Malformed { raw, error }) => {
                warn!(request_id = %request_id, error = %error, "Unparseable worker line");
                bus.publish(
                    &channel,
                    event_types::PARSE_ERROR,
                    json!({
                        "rawLine": raw,
                        "error": error,
                        "timestamp": now_millis(),
                    }),
                );
            }
        }
    }
    debug!(request_id = %request_id, forwarded, "Worker stdout closed");
    forwarded
}

/// Log stderr at warn; never published.
async fn drain_stderr<R>(request_id: String, stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => warn!(request_id = %request_id, "[worker stderr] {}", line),
            Ok(None) => break,
            Err(e) => {
                debug!(request_id = %request_id, error = %e, "Stopped reading worker stderr");
                break;
            }
        }
    }
}

/// Read lines until one of the `accept` types, a failure, or EOF.
async fn first_result(stdout: ChildStdout, accept: &[&str]) -> Result<Value> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Err(Error::NoResult(format!(
                "worker exited without a {} line",
                accept.join("/")
            )));
        }

        let line = String::from_utf8_lossy(&buf);
        let Some(parsed) = protocol::parse_line(&line) else {
            continue;
        };
        match parsed.kind() {
            LineKind::Result(payload) => {
                let event_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();
                if accept.contains(&event_type) {
                    return Ok(payload.clone());
                }
            }
            LineKind::Failure(message) => return Err(Error::Worker(message)),
            LineKind::Informational | LineKind::Other => {}
        }
    }
}

/// Terminate politely, then force-kill after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }

    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            send_sigterm(pid);
            if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
                return Some(status);
            }
            debug!(pid, "Worker ignored SIGTERM, killing");
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Kill failed");
    }
    match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to reap worker");
            None
        }
        Err(_) => {
            warn!("Worker not reaped after kill");
            None
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM failed");
    }
}

/// Await a reader task, aborting it if it outlives `grace`.
async fn join_bounded<T>(mut task: JoinHandle<T>, grace: Duration) {
    if tokio::time::timeout(grace, &mut task).await.is_err() {
        debug!("Reader still open after grace period, aborting");
        task.abort();
    }
}

/// Wait for the stdout reader to reach EOF so every line is published before
/// `complete`.
async fn join_drained(mut task: JoinHandle<usize>, request_id: &str) {
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
        Ok(Ok(forwarded)) => debug!(request_id = %request_id, forwarded, "Worker output drained"),
        Ok(Err(e)) => warn!(request_id = %request_id, error = %e, "Stdout reader failed"),
        Err(_) => {
            warn!(
                request_id = %request_id,
                drain_secs = DRAIN_TIMEOUT.as_secs(),
                "Worker stdout still open after exit, remaining output dropped"
            );
            task.abort();
        }
    }
}

fn publish_error(bus: &EventBus, channel: &str, message: String) {
    bus.publish(
        channel,
        event_types::ERROR,
        json!({ "message": message, "timestamp": now_millis() }),
    );
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
