use super::classify::check_record;
use super::country::{Country, ImportCountry};
use super::error::{RecordError, Rejection};
use chrono::{NaiveDate, NaiveDateTime};
use dutyclaim_derive::CsvSchema;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// The only currency the engine accepts; conversion happens upstream
pub const CURRENCY: &str = "EUR";

/// Column description generated by `#[derive(CsvSchema)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Whether a line was kept by the customer or sent back in full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ReturnStatus {
    Delivered,
    Returned,
}

/// A normalized parcel line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub parcel_id: String,
    pub line_item_id: String,
    pub mrn: String,
    pub origin_country: Country,
    pub import_country: ImportCountry,
    /// Consignee country
    pub destination: Country,
    pub unit_price: Decimal,
    pub quantity_imported: u32,
    pub quantity_returned: u32,
    pub hs_code: String,
    pub entry_date: NaiveDate,
    pub export_date: Option<NaiveDate>,
    /// Sum of line values over every line sharing this item's MRN
    pub consignment_value: Decimal,
}

impl LineItem {
    /// Declared unit price × quantity imported
    pub fn parcel_value(&self) -> Result<Decimal, RecordError> {
        line_value(self.unit_price, self.quantity_imported).ok_or_else(|| {
            RecordError::MalformedInput(format!(
                "line item {}: unit_price {} × quantity {} is out of range",
                self.line_item_id, self.unit_price, self.quantity_imported
            ))
        })
    }

    /// Returns are all-or-nothing per line; anything in between is rejected
    pub fn return_status(&self) -> Result<ReturnStatus, RecordError> {
        match self.quantity_returned {
            0 => Ok(ReturnStatus::Delivered),
            r if r == self.quantity_imported => Ok(ReturnStatus::Returned),
            r if r > self.quantity_imported => Err(RecordError::MalformedInput(format!(
                "line item {}: quantity returned {} exceeds quantity imported {}",
                self.line_item_id, r, self.quantity_imported
            ))),
            r => Err(RecordError::UnsupportedPartialReturn {
                line_item_id: self.line_item_id.clone(),
                imported: self.quantity_imported,
                returned: r,
            }),
        }
    }
}

/// CSV record format for line items
#[derive(Debug, Clone, Serialize, Deserialize, CsvSchema)]
pub struct LineItemRecord {
    /// Parcel identifier
    pub parcel_id: String,
    /// Line item identifier, unique within the file
    pub line_item_id: String,
    /// Customs movement reference number; characters 3-4 name the import country (NL or IE)
    pub mrn: String,
    /// Country of origin of the goods
    pub origin_country: String,
    /// Destination (consignee) country
    pub consignee_country: String,
    /// Declared unit price in EUR
    pub unit_price: Decimal,
    /// Quantity imported
    pub quantity_imported: u32,
    /// Quantity returned: 0 or equal to quantity imported
    pub quantity_returned: u32,
    /// Currency code, must be EUR
    pub currency: String,
    /// HS code (first four digits select the tariff rate)
    pub hs_code: String,
    /// Customs entry date (YYYY-MM-DD)
    pub entry_date: String,
    /// Export date for returned goods (YYYY-MM-DD)
    #[serde(default)]
    pub export_date: Option<String>,
}

/// Items read from the input, with the rows that failed to load
#[derive(Debug, Default)]
pub struct LoadedItems {
    /// (row, item) in file order
    pub items: Vec<(usize, LineItem)>,
    pub rejections: Vec<Rejection>,
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, RecordError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RecordError::MalformedInput(format!(
            "missing required field '{field}'"
        )));
    }
    Ok(value)
}

fn parse_country(field: &str, value: &str) -> Result<Country, RecordError> {
    Country::new(required(field, value)?)
        .map_err(|e| RecordError::MalformedInput(format!("{field}: {e}")))
}

/// Parse a date that may carry a time component
fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RecordError> {
    let value = required(field, value)?;
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.date());
        }
    }
    Err(RecordError::MalformedInput(format!(
        "{field}: invalid date '{value}'"
    )))
}

impl LineItemRecord {
    /// Convert into a line item. The consignment value is filled in by [`read_csv`]
    /// once every line of the file is known.
    pub fn into_line_item(self) -> Result<LineItem, RecordError> {
        let line_item_id = required("line_item_id", &self.line_item_id)?.to_string();
        let parcel_id = required("parcel_id", &self.parcel_id)?.to_string();
        let mrn = required("mrn", &self.mrn)?.to_string();
        let import_country = ImportCountry::from_mrn(&mrn)
            .map_err(|e| RecordError::MalformedInput(format!("mrn: {e}")))?;

        let currency = required("currency", &self.currency)?;
        if !currency.eq_ignore_ascii_case(CURRENCY) {
            return Err(RecordError::MalformedInput(format!(
                "currency: {currency} is not supported, convert to {CURRENCY} upstream"
            )));
        }
        if self.quantity_returned > self.quantity_imported {
            return Err(RecordError::MalformedInput(format!(
                "quantity_returned {} exceeds quantity_imported {}",
                self.quantity_returned, self.quantity_imported
            )));
        }

        let export_date = match self.export_date.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(parse_date("export_date", s)?),
            _ => None,
        };

        let item = LineItem {
            parcel_id,
            line_item_id,
            import_country,
            origin_country: parse_country("origin_country", &self.origin_country)?,
            destination: parse_country("consignee_country", &self.consignee_country)?,
            unit_price: self.unit_price,
            quantity_imported: self.quantity_imported,
            quantity_returned: self.quantity_returned,
            hs_code: required("hs_code", &self.hs_code)?.to_string(),
            entry_date: parse_date("entry_date", &self.entry_date)?,
            export_date,
            mrn,
            consignment_value: Decimal::ZERO,
        };
        item.parcel_value()?;
        Ok(item)
    }
}

fn line_value(unit_price: Decimal, quantity: u32) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Read line items from CSV.
///
/// Rows that fail to deserialize or validate are returned as `MalformedInput`
/// rejections; nothing is defaulted. I/O errors abort the read.
pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<LoadedItems> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records: Vec<(usize, LineItemRecord)> = Vec::new();
    let mut loaded = LoadedItems::default();

    for (index, result) in rdr.deserialize::<LineItemRecord>().enumerate() {
        let row = index + 1;
        match result {
            Ok(record) => records.push((row, record)),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => loaded.rejections.push(Rejection::new(
                row,
                None,
                RecordError::MalformedInput(e.to_string()),
            )),
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut converted: Vec<(usize, LineItem)> = Vec::with_capacity(records.len());
    for (row, record) in records {
        let id = record.line_item_id.trim().to_string();
        if id.is_empty() {
            loaded.rejections.push(Rejection::new(
                row,
                None,
                RecordError::MalformedInput("missing required field 'line_item_id'".to_string()),
            ));
            continue;
        }
        if !seen.insert(id.clone()) {
            loaded.rejections.push(Rejection::new(
                row,
                Some(id.clone()),
                RecordError::MalformedInput(format!("duplicate line_item_id {id}")),
            ));
            continue;
        }
        match record.into_line_item() {
            Ok(item) => converted.push((row, item)),
            Err(error) => loaded.rejections.push(Rejection::new(row, Some(id), error)),
        }
    }

    // Only lines that will be computed count toward their consignment; `None` marks
    // a consignment whose sum is out of range.
    let mut consignment_values: HashMap<String, Option<Decimal>> = HashMap::new();
    for (_, item) in &converted {
        let Ok(value) = check_record(item) else {
            continue;
        };
        let total = consignment_values
            .entry(item.mrn.clone())
            .or_insert(Some(Decimal::ZERO));
        *total = total.and_then(|t| t.checked_add(value));
    }

    for (row, mut item) in converted {
        match consignment_values.get(&item.mrn) {
            Some(None) => loaded.rejections.push(Rejection::new(
                row,
                Some(item.line_item_id.clone()),
                RecordError::MalformedInput(format!(
                    "consignment {} value is out of range",
                    item.mrn
                )),
            )),
            Some(Some(value)) => {
                item.consignment_value = *value;
                loaded.items.push((row, item));
            }
            // Nothing in the consignment is computable; classification rejects it
            None => loaded.items.push((row, item)),
        }
    }

    loaded.rejections.sort_by_key(|r| r.row);
    log::info!(
        "Loaded {} line items, {} rejected on input",
        loaded.items.len(),
        loaded.rejections.len()
    );
    Ok(loaded)
}
