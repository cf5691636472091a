//! Customs tariff: duty rates by 4-digit goods code

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

/// Origin value for third-country duty rates that apply to every origin
pub const ERGA_OMNES: &str = "ERGA OMNES";

/// Duty rate per 4-digit goods code. The highest rate seen for a code wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tariff {
    rates: BTreeMap<String, Decimal>,
}

#[derive(Debug, Deserialize)]
struct TariffRecord {
    #[serde(rename = "Goods code", alias = "goods_code")]
    goods_code: String,
    #[serde(rename = "Origin", alias = "origin", default)]
    origin: Option<String>,
    #[serde(rename = "Duty", alias = "duty", default)]
    duty: Option<String>,
}

impl Tariff {
    pub fn empty() -> Self {
        Tariff::default()
    }

    /// Build from (goods code, rate) pairs, keeping the maximum per 4-digit code
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut tariff = Tariff::empty();
        for (code, rate) in entries {
            tariff.insert(code.as_ref(), rate);
        }
        tariff
    }

    fn insert(&mut self, goods_code: &str, rate: Decimal) {
        let Some(key) = goods_code_4(goods_code) else {
            return;
        };
        self.rates
            .entry(key)
            .and_modify(|r| *r = (*r).max(rate))
            .or_insert(rate);
    }

    /// Duty rate for an HS code, looked up by its first four digits
    pub fn rate_for(&self, hs_code: &str) -> Option<Decimal> {
        goods_code_4(hs_code).and_then(|key| self.rates.get(&key).copied())
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Read a tariff extract with `Goods code`, `Origin` and `Duty` columns.
    ///
    /// Only `ERGA OMNES` rows are used (rows without an origin are accepted as such).
    /// Duty cells without a percentage (`NAR`, conditional duties) are skipped.
    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Tariff> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        let mut total = 0usize;
        let mut parsed = 0usize;

        for result in rdr.deserialize::<TariffRecord>() {
            let record = result?;
            let applies_to_all = record
                .origin
                .as_deref()
                .map_or(true, |o| o.trim().eq_ignore_ascii_case(ERGA_OMNES));
            if !applies_to_all {
                continue;
            }
            total += 1;
            if let Some(rate) = record.duty.as_deref().and_then(parse_duty_rate) {
                parsed += 1;
                entries.push((record.goods_code, rate));
            }
        }
        let tariff = Tariff::from_entries(entries);

        log::info!(
            "Duty parsing: {}/{} parsed, {} without a percentage rate, {} goods codes",
            parsed,
            total,
            total - parsed,
            tariff.len()
        );
        Ok(tariff)
    }
}

fn goods_code_4(code: &str) -> Option<String> {
    let digits: String = code
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(4)
        .collect();
    (digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

/// Parse a tariff duty cell into a fraction: `"12.000 %"` → 0.12, `"2,5%"` → 0.025,
/// a bare number is read as a percentage. Returns `None` when there is no rate.
pub fn parse_duty_rate(cell: &str) -> Option<Decimal> {
    let cell = cell.trim();
    let number = match cell.find('%') {
        Some(pos) => {
            let before = cell[..pos].trim_end();
            let start = before
                .char_indices()
                .rev()
                .take_while(|(_, c)| c.is_ascii_digit() || *c == '.' || *c == ',')
                .last()
                .map(|(i, _)| i)?;
            &before[start..]
        }
        None => cell,
    };
    if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let percent = Decimal::from_str(&number.replace(',', ".")).ok()?;
    Some(percent / Decimal::ONE_HUNDRED)
}
