//! Server configuration types
//!
//! One section per component; every field has a serde default so a partial
//! file or a handful of environment variables is enough.

use jobstream_bus::BusConfig;
use jobstream_worker::WorkerConfig;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub crawl: CrawlDefaults,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Values used when a paged crawl request leaves them unset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CrawlDefaults {
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "default_max_items")]
    pub default_max_items: i64,
}

fn default_page_size() -> i64 {
    jobstream_core::crawl::DEFAULT_PAGE_SIZE
}

fn default_max_items() -> i64 {
    jobstream_core::crawl::DEFAULT_MAX_ITEMS
}

impl Default for CrawlDefaults {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            default_max_items: default_max_items(),
        }
    }
}
