use crate::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One CSV record keyed by header name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: HashMap<String, String>,
}

impl Row {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    /// Value of a required column
    pub fn field(&self, column: &str) -> Result<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| ImportError::MissingField(column.to_string()))
    }

    /// Value of a column that may be absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street_address: String,
    pub zipcode: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub phone: String,
    pub name: String,
}

/// Payload for `POST /customer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_no: String,
    pub name: String,
    pub address: Address,
    pub contact: Contact,
}

/// A single invoice line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Item {
    pub fn new(title: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            vat: None,
            unit: None,
            count: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub customer_no: String,
}

/// Payload for `POST /billogram`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_no: String,
    pub customer: CustomerRef,
    pub items: Vec<Item>,
}

/// Delivery channel for a created billogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SendMethod {
    Email,
    #[serde(rename = "SMS")]
    Sms,
    Letter,
}

impl SendMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendMethod::Email => "Email",
            SendMethod::Sms => "SMS",
            SendMethod::Letter => "Letter",
        }
    }
}

impl fmt::Display for SendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload for `POST /billogram/{id}/command/send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCommand {
    pub method: SendMethod,
}
