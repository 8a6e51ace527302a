use crate::api::{ApiReply, BillingApi};
use crate::constants::COL_INVOICE_NUMBER;
use crate::error::{ImportError, Result};
use crate::mapper::{build_invoice, parse_customer, parse_item};
use crate::policy::{pick_send_method, sanitize_item};
use crate::types::{Customer, Invoice, Row, SendCommand, SendMethod};
use metrics::counter;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// How rows and files are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// Every invoice of every file in its own task
    #[default]
    Concurrent,
    /// One invoice at a time, files in the order given
    Sequential,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub create_customers: bool,
    pub mode: ConcurrencyMode,
    pub max_concurrency: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            create_customers: true,
            mode: ConcurrencyMode::Concurrent,
            max_concurrency: None,
        }
    }
}

/// Step of the per-invoice sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    MapRow,
    CreateCustomer,
    CreateInvoice,
    Send,
    /// The task processing the row did not finish
    Aborted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MapRow => "map_row",
            Stage::CreateCustomer => "create_customer",
            Stage::CreateInvoice => "create_invoice",
            Stage::Send => "send",
            Stage::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum InvoiceOutcome {
    Sent {
        invoice_no: String,
        invoice_id: String,
        method: SendMethod,
    },
    Failed {
        invoice_no: Option<String>,
        stage: Stage,
        error: ImportError,
    },
}

impl InvoiceOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, InvoiceOutcome::Sent { .. })
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            InvoiceOutcome::Failed { stage, .. } => Some(*stage),
            InvoiceOutcome::Sent { .. } => None,
        }
    }
}

/// Outcomes of one CSV file, in row order
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcomes: Vec<InvoiceOutcome>,
}

impl FileReport {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}

/// A file that could not be read at all
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: ImportError,
}

/// Result of a whole run, files in the order they were given
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub failed_files: Vec<FileFailure>,
}

impl BatchReport {
    pub fn total_invoices(&self) -> usize {
        self.files.iter().map(|f| f.outcomes.len()).sum()
    }

    pub fn sent(&self) -> usize {
        self.files.iter().map(FileReport::sent).sum()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().map(FileReport::failed).sum()
    }
}

/// Turns CSV rows into customers, billograms and send commands.
///
/// Cloning is cheap; clones share the API client and the concurrency limit.
#[derive(Clone)]
pub struct InvoicePipeline {
    api: Arc<dyn BillingApi>,
    options: PipelineOptions,
    limiter: Option<Arc<Semaphore>>,
}

impl InvoicePipeline {
    pub fn new(api: Arc<dyn BillingApi>, options: PipelineOptions) -> Self {
        let limiter = options
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            api,
            options,
            limiter,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Build every payload for a row; nothing is sent if this fails
    fn map_row(row: &Row) -> Result<(Customer, Invoice)> {
        let customer = parse_customer(row)?;
        let mut item = parse_item(row)?;
        sanitize_item(&mut item);
        let invoice = build_invoice(row, &customer, item)?;
        Ok((customer, invoice))
    }

    fn failed(invoice_no: Option<String>, stage: Stage, error: ImportError) -> InvoiceOutcome {
        error!("{}", error);
        counter!("billogram_invoices_failed_total", "stage" => stage.as_str()).increment(1);
        InvoiceOutcome::Failed {
            invoice_no,
            stage,
            error,
        }
    }

    /// Create the customer (unless skipped), create the billogram and send
    /// it. The first failing step ends processing of this invoice; records
    /// created by earlier steps are left in place.
    pub async fn process_invoice(&self, row: Row) -> InvoiceOutcome {
        counter!("billogram_rows_total").increment(1);

        let (customer, invoice) = match Self::map_row(&row) {
            Ok(mapped) => mapped,
            Err(e) => {
                let invoice_no = row.get(COL_INVOICE_NUMBER).map(str::to_string);
                return Self::failed(invoice_no, Stage::MapRow, e);
            }
        };
        let invoice_no = invoice.invoice_no.clone();
        let name = &customer.name;

        if self.options.create_customers {
            let reply = self.api.create_customer(&customer).await;
            if let Err(e) = validate_response(reply, &format!("creating customer {name}")) {
                return Self::failed(Some(invoice_no), Stage::CreateCustomer, e);
            }
        }

        let context = format!("creating invoice for {name}");
        let invoice_id = match validate_response(self.api.create_invoice(&invoice).await, &context)
            .and_then(|reply| {
                reply.created_id().ok_or_else(|| ImportError::Api {
                    context: context.clone(),
                    message: "response carried no billogram id".to_string(),
                })
            }) {
            Ok(id) => id,
            Err(e) => return Self::failed(Some(invoice_no), Stage::CreateInvoice, e),
        };

        let method = pick_send_method(&customer);
        let reply = self.api.send_invoice(&invoice_id, &SendCommand { method }).await;
        if let Err(e) = validate_response(reply, &format!("sending invoice to {name}")) {
            return Self::failed(Some(invoice_no), Stage::Send, e);
        }

        debug!("Sent billogram {} ({}) by {}", invoice_id, invoice_no, method);
        counter!("billogram_invoices_sent_total", "method" => method.as_str()).increment(1);
        InvoiceOutcome::Sent {
            invoice_no,
            invoice_id,
            method,
        }
    }

    async fn handle_row(&self, row: Result<Row>) -> InvoiceOutcome {
        match row {
            Ok(row) => self.process_invoice(row).await,
            Err(e) => Self::failed(None, Stage::MapRow, e),
        }
    }

    async fn run_rows(&self, rows: Vec<Result<Row>>) -> Vec<InvoiceOutcome> {
        match self.options.mode {
            ConcurrencyMode::Sequential => {
                let mut outcomes = Vec::with_capacity(rows.len());
                for (i, row) in rows.into_iter().enumerate() {
                    let span = info_span!("invoice", row = i + 1);
                    outcomes.push(self.handle_row(row).instrument(span).await);
                }
                outcomes
            }
            ConcurrencyMode::Concurrent => {
                let total = rows.len();
                let mut tasks = JoinSet::new();
                let mut spawned = HashMap::with_capacity(total);
                for (i, row) in rows.into_iter().enumerate() {
                    let invoice_no = row
                        .as_ref()
                        .ok()
                        .and_then(|r| r.get(COL_INVOICE_NUMBER))
                        .map(str::to_string);
                    let pipeline = self.clone();
                    let span = info_span!("invoice", row = i + 1);
                    let handle = tasks.spawn(
                        async move {
                            let _permit = match &pipeline.limiter {
                                Some(sem) => sem.clone().acquire_owned().await.ok(),
                                None => None,
                            };
                            pipeline.handle_row(row).await
                        }
                        .instrument(span),
                    );
                    spawned.insert(handle.id(), (i, invoice_no));
                }

                let mut slots: Vec<Option<InvoiceOutcome>> = (0..total).map(|_| None).collect();
                while let Some(joined) = tasks.join_next_with_id().await {
                    match joined {
                        Ok((id, outcome)) => {
                            if let Some((i, _)) = spawned.remove(&id) {
                                slots[i] = Some(outcome);
                            }
                        }
                        Err(e) => {
                            if let Some((i, invoice_no)) = spawned.remove(&e.id()) {
                                slots[i] = Some(Self::failed(invoice_no, Stage::Aborted, e.into()));
                            }
                        }
                    }
                }
                // JoinSet yields every spawned task exactly once
                slots.into_iter().flatten().collect()
            }
        }
    }

    /// Process every invoice row of a CSV file.
    ///
    /// Errors are returned only when the file itself cannot be read; a bad
    /// row becomes a failed outcome.
    #[instrument(skip(self, path), fields(file = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> Result<FileReport> {
        info!("Processing invoices in {}", path.display());
        let rows = read_rows(path)?;
        let outcomes = self.run_rows(rows).await;
        let report = FileReport {
            path: path.to_path_buf(),
            outcomes,
        };
        info!(
            "Processed invoices in {} ({} sent, {} failed)",
            path.display(),
            report.sent(),
            report.failed()
        );
        Ok(report)
    }

    /// Process all files. Never fails: unreadable files are listed in the
    /// report and the remaining files still run.
    pub async fn process_files(&self, paths: &[PathBuf]) -> BatchReport {
        let mut results = Vec::with_capacity(paths.len());
        match self.options.mode {
            ConcurrencyMode::Sequential => {
                for path in paths {
                    results.push((path.clone(), self.process_file(path).await));
                }
            }
            ConcurrencyMode::Concurrent => {
                let mut tasks = JoinSet::new();
                let mut spawned = HashMap::with_capacity(paths.len());
                for (i, path) in paths.iter().cloned().enumerate() {
                    let pipeline = self.clone();
                    let handle = tasks.spawn(async move {
                        let result = pipeline.process_file(&path).await;
                        (path, result)
                    });
                    spawned.insert(handle.id(), i);
                }
                let mut slots: Vec<Option<(PathBuf, Result<FileReport>)>> =
                    paths.iter().map(|_| None).collect();
                while let Some(joined) = tasks.join_next_with_id().await {
                    match joined {
                        Ok((id, entry)) => {
                            if let Some(i) = spawned.remove(&id) {
                                slots[i] = Some(entry);
                            }
                        }
                        Err(e) => {
                            if let Some(i) = spawned.remove(&e.id()) {
                                slots[i] = Some((paths[i].clone(), Err(e.into())));
                            }
                        }
                    }
                }
                results.extend(slots.into_iter().flatten());
            }
        }

        let mut report = BatchReport::default();
        for (path, result) in results {
            match result {
                Ok(file_report) => report.files.push(file_report),
                Err(error) => {
                    error!("Failed to process {}: {}", path.display(), error);
                    report.failed_files.push(FileFailure { path, error });
                }
            }
        }
        if report.failed() > 0 || !report.failed_files.is_empty() {
            warn!(
                "{} invoices failed, {} files could not be read",
                report.failed(),
                report.failed_files.len()
            );
        }
        report
    }
}

/// Require a 200 reply; anything else becomes an error naming what was
/// being done.
pub fn validate_response(reply: Result<ApiReply>, context: &str) -> Result<ApiReply> {
    match reply {
        Ok(reply) if reply.is_success() => Ok(reply),
        Ok(reply) => Err(ImportError::Api {
            context: context.to_string(),
            message: reply.error_message(),
        }),
        Err(e) => Err(ImportError::Api {
            context: context.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Read all records of a CSV file up front, keeping per-row errors
fn read_rows(path: &Path) -> Result<Vec<Result<Row>>> {
    // Cells are taken verbatim; padding is not stripped
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    // A broken header fails the whole file
    reader.headers()?;
    Ok(reader
        .deserialize::<Row>()
        .map(|r| r.map_err(ImportError::from))
        .collect())
}
