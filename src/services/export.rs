//! Report export.

use csv::Writer;
use serde_json::Value;
use thiserror::Error;

use crate::store::{today, Record};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no export layout for {0} report")]
    UnknownReport(String),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to finish CSV: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered export ready to be sent as a download.
#[derive(Debug, Clone)]
pub struct Export {
    pub filename: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub trait ReportExporter: Send + Sync {
    /// Render `rows` of report `kind`.
    fn export(&self, kind: &str, rows: &[Record]) -> Result<Export, ExportError>;
}

/// A CSV column: header text, source field, and whether blanks read "N/A".
struct Column(&'static str, &'static str, bool);

const MEMBER_COLUMNS: &[Column] = &[
    Column("ID", "id", false),
    Column("Company Name", "company_name", false),
    Column("Membership ID", "membership_id", false),
    Column("Contact Person", "contact_person", false),
    Column("Email", "email", false),
    Column("Phone", "phone", false),
    Column("Address", "address", false),
    Column("Status", "membership_status", false),
    Column("Joining Date", "joining_date", false),
    Column("Expiry Date", "expiry_date", false),
];

const VERIFICATION_COLUMNS: &[Column] = &[
    Column("ID", "id", false),
    Column("Date", "verification_date", false),
    Column("Company Name", "company_name", true),
    Column("Membership ID", "membership_id", true),
    Column("Method", "verification_method", false),
    Column("Input", "verification_input", false),
    Column("Result", "verification_result", false),
    Column("Verified By", "user_email", true),
    Column("IP Address", "ip_address", false),
];

const OFFER_COLUMNS: &[Column] = &[
    Column("ID", "id", false),
    Column("Title", "title", false),
    Column("Category", "category", false),
    Column("Partner", "partner_name", false),
    Column("Status", "status", false),
    Column("Discount Value", "discount_value", false),
    Column("Start Date", "start_date", false),
    Column("End Date", "end_date", true),
];

fn columns(kind: &str) -> Option<&'static [Column]> {
    match kind {
        "members" => Some(MEMBER_COLUMNS),
        "verifications" => Some(VERIFICATION_COLUMNS),
        "offers" => Some(OFFER_COLUMNS),
        _ => None,
    }
}

fn cell(row: &Record, column: &Column) -> String {
    let Column(_, field, na) = *column;
    let text = match row.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if na && text.is_empty() {
        "N/A".to_string()
    } else {
        text
    }
}

/// Exports reports as CSV with one header row, named `{kind}_report_{date}.csv`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExporter;

impl ReportExporter for CsvExporter {
    fn export(&self, kind: &str, rows: &[Record]) -> Result<Export, ExportError> {
        let columns = columns(kind).ok_or_else(|| ExportError::UnknownReport(kind.to_string()))?;

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(columns.iter().map(|Column(header, ..)| *header))?;
        for row in rows {
            writer.write_record(columns.iter().map(|column| cell(row, column)))?;
        }
        writer.flush()?;
        let body = writer.into_inner().map_err(|e| e.into_error())?;

        Ok(Export {
            filename: format!("{}_report_{}.csv", kind, today()),
            content_type: "text/csv".to_string(),
            body,
        })
    }
}
