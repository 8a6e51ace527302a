#![allow(dead_code)]

use async_trait::async_trait;
use billogram_import::api::{ApiReply, BillingApi};
use billogram_import::error::Result;
use billogram_import::types::{Customer, Invoice, SendCommand, SendMethod};
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const HEADER: &str = "customer_number,name,email,phone_number,street_address,postal_code,city,invoice_number,article_name,article_price";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateCustomer(Customer),
    CreateInvoice(Invoice),
    Send { invoice_id: String, method: SendMethod },
}

/// Billing API double that records every call and rejects selected records
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<Call>>,
    reject_customers: HashSet<String>,
    reject_invoices: HashSet<String>,
    /// Invoices whose create reply is 200 without an id
    missing_ids: HashSet<String>,
    /// Invoices whose creation panics the task
    panics: HashSet<String>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_customer(mut self, customer_no: &str) -> Self {
        self.reject_customers.insert(customer_no.to_string());
        self
    }

    pub fn rejecting_invoice(mut self, invoice_no: &str) -> Self {
        self.reject_invoices.insert(invoice_no.to_string());
        self
    }

    pub fn without_id_for(mut self, invoice_no: &str) -> Self {
        self.missing_ids.insert(invoice_no.to_string());
        self
    }

    pub fn panicking_on(mut self, invoice_no: &str) -> Self {
        self.panics.insert(invoice_no.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateCustomer(customer) => Some(customer),
                _ => None,
            })
            .collect()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateInvoice(invoice) => Some(invoice),
                _ => None,
            })
            .collect()
    }

    pub fn sends(&self) -> Vec<(String, SendMethod)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { invoice_id, method } => Some((invoice_id, method)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn rejected(message: &str) -> ApiReply {
    ApiReply::new(400, json!({"status": "INVALID_PARAMETER", "data": {"message": message}}))
}

#[async_trait]
impl BillingApi for RecordingApi {
    async fn create_customer(&self, customer: &Customer) -> Result<ApiReply> {
        tokio::task::yield_now().await;
        self.record(Call::CreateCustomer(customer.clone()));
        if self.reject_customers.contains(&customer.customer_no) {
            return Ok(rejected("customer rejected"));
        }
        Ok(ApiReply::new(200, json!({"status": "OK", "data": {"customer_no": customer.customer_no}})))
    }

    async fn create_invoice(&self, invoice: &Invoice) -> Result<ApiReply> {
        // later rows finish first in concurrent runs
        let delay = 20u64.saturating_sub(invoice.invoice_no.parse::<u64>().unwrap_or(0) % 20);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if self.panics.contains(&invoice.invoice_no) {
            panic!("billing backend crashed on {}", invoice.invoice_no);
        }
        self.record(Call::CreateInvoice(invoice.clone()));
        if self.reject_invoices.contains(&invoice.invoice_no) {
            return Ok(rejected("invoice rejected"));
        }
        if self.missing_ids.contains(&invoice.invoice_no) {
            return Ok(ApiReply::new(200, json!({"status": "OK", "data": {}})));
        }
        Ok(ApiReply::new(
            200,
            json!({"status": "OK", "data": {"id": format!("bg-{}", invoice.invoice_no)}}),
        ))
    }

    async fn send_invoice(&self, invoice_id: &str, command: &SendCommand) -> Result<ApiReply> {
        tokio::task::yield_now().await;
        self.record(Call::Send {
            invoice_id: invoice_id.to_string(),
            method: command.method,
        });
        Ok(ApiReply::new(200, json!({"status": "OK", "data": {"id": invoice_id}})))
    }
}

/// CSV line for invoice `n` of customer `C-n`
pub fn row(n: usize, email: &str, phone: &str, article: &str) -> String {
    format!(
        "C-{n},Customer {n},{email},{phone},Gatan {n},1110{n},Stockholm,{inv},{article},{price}",
        inv = 1000 + n,
        price = 10 * n
    )
}

pub fn write_csv(dir: &Path, name: &str, header: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = String::from(header);
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}
