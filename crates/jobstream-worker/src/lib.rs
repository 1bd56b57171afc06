//! Jobstream Worker - out-of-process search execution
//!
//! This crate runs the external job-board worker and turns its NDJSON stdout
//! into bus events:
//! - Orchestrator: one supervised process per request, timeout and reaping
//! - Protocol: line decoding and result mapping
//! - Registry: duplicate guard and live process introspection
//! - Stub: deterministic synthetic worker for running without one installed

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod stub;

pub use client::{worker_client, WorkerClient};
pub use command::WorkerCommand;
pub use config::WorkerConfig;
pub use error::{Error, Result};
pub use orchestrator::{ExecuteOutcome, ProcessOrchestrator, SearchRequest, SupervisorHandle};
pub use protocol::{parse_line, JobDetails, PageResult, PostingSummary, WorkerLine};
pub use registry::{ProcessInfo, ProcessRegistry, ProcessState};
pub use stub::StubWorker;
