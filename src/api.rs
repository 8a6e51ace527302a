use crate::config::{Config, Credentials};
use crate::constants::{send_command_path, BILLOGRAM_PATH, CUSTOMER_PATH};
use crate::error::Result;
use crate::types::{Customer, Invoice, SendCommand};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Status and JSON body of an API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// The API signals success with 200 only
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Id of the record created by this call (`data.id`)
    pub fn created_id(&self) -> Option<String> {
        match &self.body["data"]["id"] {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Error text reported by the API (`data.message`), or the status code
    pub fn error_message(&self) -> String {
        self.body["data"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP status {}", self.status))
    }
}

/// The three Billogram calls the importer makes
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// `POST /customer`
    async fn create_customer(&self, customer: &Customer) -> Result<ApiReply>;

    /// `POST /billogram`
    async fn create_invoice(&self, invoice: &Invoice) -> Result<ApiReply>;

    /// `POST /billogram/{id}/command/send`
    async fn send_invoice(&self, invoice_id: &str, command: &SendCommand) -> Result<ApiReply>;
}

/// reqwest-backed client with basic auth; one instance is shared by all tasks
pub struct HttpBillingApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpBillingApi {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.credentials()?,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    async fn post_json<T: Serialize + ?Sized + Sync>(&self, path: &str, payload: &T) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.login, Some(&self.credentials.password))
            .json(payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        // Error pages are not always JSON
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        debug!("POST {} -> {}", path, status);
        Ok(ApiReply { status, body })
    }
}

#[async_trait]
impl BillingApi for HttpBillingApi {
    #[instrument(skip(self, customer), fields(customer_no = %customer.customer_no))]
    async fn create_customer(&self, customer: &Customer) -> Result<ApiReply> {
        self.post_json(CUSTOMER_PATH, customer).await
    }

    #[instrument(skip(self, invoice), fields(invoice_no = %invoice.invoice_no))]
    async fn create_invoice(&self, invoice: &Invoice) -> Result<ApiReply> {
        self.post_json(BILLOGRAM_PATH, invoice).await
    }

    #[instrument(skip(self, command), fields(method = %command.method))]
    async fn send_invoice(&self, invoice_id: &str, command: &SendCommand) -> Result<ApiReply> {
        self.post_json(&send_command_path(invoice_id), command).await
    }
}
