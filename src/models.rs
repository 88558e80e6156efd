use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Synced input records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    #[serde(default)]
    pub line_item_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub account_code: Option<String>,
    pub line_amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    #[serde(default, rename = "type")]
    pub invoice_type: Option<String>,
    pub status: String,
    pub date: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    pub total: f64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankTransaction {
    pub id: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default, rename = "type")]
    pub bank_transaction_type: Option<String>,
    pub status: String,
    pub date: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    pub total: f64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A CRM donation. Anything beyond the fixed columns is kept in
/// `additional_fields` and stored as one JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub amount: f64,
    pub close_date: String,
    #[serde(default)]
    pub dfk: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Query output rows
// ---------------------------------------------------------------------------

/// One invoice or bank transaction with its reconciliation figures.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordSummary {
    pub id: String,
    pub reference: Option<String>,
    pub date: String,
    pub status: String,
    pub contact_name: Option<String>,
    pub total: f64,
    pub donation_total: f64,
    pub crms_total: f64,
    pub is_reconciled: bool,
    pub row_count: i64,
}

/// One line item of a record, repeating the parent's aggregates.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WideRow {
    pub id: String,
    pub reference: Option<String>,
    pub date: String,
    pub status: String,
    pub contact_name: Option<String>,
    pub total: f64,
    pub donation_total: f64,
    pub crms_total: f64,
    pub is_reconciled: bool,
    pub line_item_id: Option<String>,
    pub description: Option<String>,
    pub account_code: Option<String>,
    pub account_name: Option<String>,
    pub line_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub is_donation: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DonationRow {
    pub id: String,
    pub name: Option<String>,
    pub amount: f64,
    pub close_date: String,
    pub dfk: Option<String>,
    pub created_date: Option<String>,
    pub last_modified_date: Option<String>,
    /// Stored JSON object, returned as written.
    pub additional_fields: String,
    pub row_count: i64,
}

impl DonationRow {
    pub fn additional_fields_map(&self) -> serde_json::Result<Map<String, Value>> {
        serde_json::from_str(&self.additional_fields)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountRow {
    pub id: String,
    pub code: Option<String>,
    pub name: String,
    pub account_type: Option<String>,
    pub status: Option<String>,
    pub currency_code: Option<String>,
    pub updated_at: Option<String>,
    pub row_count: i64,
}
