use crate::constants::*;
use crate::error::Result;
use crate::types::{Address, Contact, Customer, CustomerRef, Invoice, Item, Row};

/// Primary address of the customer on this row
pub fn parse_address(row: &Row) -> Result<Address> {
    Ok(Address {
        street_address: row.field(COL_STREET_ADDRESS)?.to_string(),
        zipcode: row.field(COL_POSTAL_CODE)?.to_string(),
        city: row.field(COL_CITY)?.to_string(),
    })
}

pub fn parse_contact(row: &Row) -> Result<Contact> {
    Ok(Contact {
        email: row.field(COL_EMAIL)?.to_string(),
        phone: row.field(COL_PHONE_NUMBER)?.to_string(),
        name: row.field(COL_NAME)?.to_string(),
    })
}

pub fn parse_customer(row: &Row) -> Result<Customer> {
    Ok(Customer {
        customer_no: row.field(COL_CUSTOMER_NUMBER)?.to_string(),
        name: row.field(COL_NAME)?.to_string(),
        address: parse_address(row)?,
        contact: parse_contact(row)?,
    })
}

/// The invoiced article, without any defaults filled in
pub fn parse_item(row: &Row) -> Result<Item> {
    Ok(Item::new(
        row.field(COL_ARTICLE_NAME)?,
        row.field(COL_ARTICLE_PRICE)?,
    ))
}

pub fn build_invoice(row: &Row, customer: &Customer, item: Item) -> Result<Invoice> {
    Ok(Invoice {
        invoice_no: row.field(COL_INVOICE_NUMBER)?.to_string(),
        customer: CustomerRef {
            customer_no: customer.customer_no.clone(),
        },
        items: vec![item],
    })
}
