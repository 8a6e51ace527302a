/// Billogram sandbox, used unless `base_url` is set in the config file
pub const DEFAULT_BASE_URL: &str = "https://sandbox.billogram.com/api/v2";

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "BILLOGRAM_CONFIG";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

// Item defaults applied by the sanitizer
pub const DEFAULT_VAT: &str = "25";
pub const DEFAULT_UNIT: &str = "unit";
pub const DEFAULT_COUNT: &str = "1";

/// Longest item title the API accepts
pub const MAX_TITLE_CHARS: usize = 40;
/// Stand-in title for items whose name is too long
pub const ABBREVIATED_TITLE: &str = "movie";

// API paths
pub const CUSTOMER_PATH: &str = "/customer";
pub const BILLOGRAM_PATH: &str = "/billogram";

pub fn send_command_path(invoice_id: &str) -> String {
    format!("{BILLOGRAM_PATH}/{invoice_id}/command/send")
}

// CSV column names
pub const COL_CUSTOMER_NUMBER: &str = "customer_number";
pub const COL_NAME: &str = "name";
pub const COL_EMAIL: &str = "email";
pub const COL_PHONE_NUMBER: &str = "phone_number";
pub const COL_STREET_ADDRESS: &str = "street_address";
pub const COL_POSTAL_CODE: &str = "postal_code";
pub const COL_CITY: &str = "city";
pub const COL_INVOICE_NUMBER: &str = "invoice_number";
pub const COL_ARTICLE_NAME: &str = "article_name";
pub const COL_ARTICLE_PRICE: &str = "article_price";
