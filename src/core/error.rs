use super::country::Country;
use rust_decimal::Decimal;

/// Rate configuration gaps. These abort the whole run before any line is computed,
/// since every total computed afterwards would misstate the liability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("unknown country {0}: not an EU member state or no VAT rate configured")]
    UnknownCountry(Country),
    #[error("invalid {field} for {scope}: {value}")]
    InvalidRate {
        scope: String,
        field: &'static str,
        value: Decimal,
    },
}

/// Failures scoped to a single input record. The record is rejected and reported
/// next to the totals; the rest of the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("line item {line_item_id} is unclassifiable: {reason}")]
    UnclassifiableLineItem {
        line_item_id: String,
        reason: String,
    },
    #[error("line item {line_item_id} was imported via IE but delivered to {destination}; IE parcels are domestic only")]
    InvalidIeDestination {
        line_item_id: String,
        destination: Country,
    },
    #[error("line item {line_item_id} has non-positive value {value}")]
    InvalidValue { line_item_id: String, value: Decimal },
    #[error("line item {line_item_id} is partially returned ({returned} of {imported}); only full returns are supported")]
    UnsupportedPartialReturn {
        line_item_id: String,
        imported: u32,
        returned: u32,
    },
}

impl RecordError {
    /// Stable reason code for the rejected-records report
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::MalformedInput(_) => "MalformedInput",
            RecordError::UnclassifiableLineItem { .. } => "UnclassifiableLineItem",
            RecordError::InvalidIeDestination { .. } => "InvalidIEDestination",
            RecordError::InvalidValue { .. } => "InvalidValue",
            RecordError::UnsupportedPartialReturn { .. } => "UnsupportedPartialReturn",
        }
    }
}

/// Error from a computation stage that may hit either a record or a rate problem
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaxError {
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A record that was not computed, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// 1-based data row in the input file
    pub row: usize,
    pub line_item_id: Option<String>,
    pub error: RecordError,
}

impl Rejection {
    pub fn new(row: usize, line_item_id: Option<String>, error: RecordError) -> Self {
        Rejection {
            row,
            line_item_id,
            error,
        }
    }
}
