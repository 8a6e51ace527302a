use crate::constants::{
    ABBREVIATED_TITLE, DEFAULT_COUNT, DEFAULT_UNIT, DEFAULT_VAT, MAX_TITLE_CHARS,
};
use crate::types::{Customer, Item, SendMethod};
use once_cell::sync::Lazy;
use regex::Regex;

// Anchored so that only whole-string matches count
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0\d{9}$").expect("valid phone regex"));

/// Make sure the item has every field the API requires.
///
/// Missing vat/unit/count get default values; present values are left alone.
/// A title longer than the API limit is replaced by a short stand-in and the
/// full title is moved into the description.
pub fn sanitize_item(item: &mut Item) {
    item.vat.get_or_insert_with(|| DEFAULT_VAT.to_string());
    item.unit.get_or_insert_with(|| DEFAULT_UNIT.to_string());
    item.count.get_or_insert_with(|| DEFAULT_COUNT.to_string());

    if item.title.chars().count() > MAX_TITLE_CHARS {
        let full_title = std::mem::replace(&mut item.title, ABBREVIATED_TITLE.to_string());
        item.description = Some(full_title);
    }
}

pub fn is_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

pub fn is_phone_number(s: &str) -> bool {
    PHONE_RE.is_match(s)
}

/// Email when the address looks valid, SMS when the phone number does,
/// letter otherwise.
pub fn pick_send_method(customer: &Customer) -> SendMethod {
    if is_email(&customer.contact.email) {
        SendMethod::Email
    } else if is_phone_number(&customer.contact.phone) {
        SendMethod::Sms
    } else {
        SendMethod::Letter
    }
}
