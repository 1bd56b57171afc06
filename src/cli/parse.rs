//! `jobstream parse` - single posting lookup

use crate::server::{build_components, load_config};
use anyhow::{bail, Context, Result};
use jobstream_core::format_error_for_cli;

pub async fn run(url: &str) -> Result<()> {
    let config = load_config()?;
    let (_bus, worker) = build_components(&config);

    match worker.fetch_by_url(url).await {
        Ok(details) => {
            let rendered =
                serde_json::to_string_pretty(&details).context("Failed to render job details")?;
            println!("{rendered}");
            Ok(())
        }
        Err(e) => {
            let err: jobstream_core::Error = e.into();
            bail!(format_error_for_cli(&err))
        }
    }
}
