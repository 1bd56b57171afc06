//! Jobstream Core - request pipelines
//!
//! This crate drives long-running requests on top of the bus and the worker:
//! - Crawl: paginated accumulation with a hard item cap and truncation flag
//! - Analysis: per-job scoring with streamed progress
//! - Tracker: completes a request channel once every source reported done

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analysis;
pub mod crawl;
pub mod error;
pub mod ports;
pub mod tracker;

pub use analysis::{run_analysis, AnalysisOutcome, AnalysisRequest, HeuristicScorer, JobScore, Scorer};
pub use crawl::{run_crawl, CrawlAccumulator, CrawlParams, CrawlRequest, CrawlResult};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use ports::{BusNotifier, CompletionNotifier, PageFetcher, StreamEmitter, WorkerPageFetcher};
pub use tracker::SourceTracker;
