use crate::api::HttpBillingApi;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{BatchReport, InvoicePipeline, PipelineOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Build the HTTP client from `config` and push every file through the
/// pipeline. Missing credentials fail here, before any request is made.
pub async fn run_import(
    config: &Config,
    files: &[PathBuf],
    create_customers: bool,
) -> Result<BatchReport> {
    let api = HttpBillingApi::from_config(config)?;

    let options = PipelineOptions {
        create_customers,
        mode: config.mode,
        max_concurrency: config.max_concurrency,
    };
    info!(
        "Importing {} file(s) in {:?} mode against {}",
        files.len(),
        options.mode,
        config.base_url
    );

    let pipeline = InvoicePipeline::new(Arc::new(api), options);
    Ok(pipeline.process_files(files).await)
}
