pub mod rejected;
pub mod returns;
pub mod run;
pub mod schema;

use crate::core::{
    self, DutyRevenuePolicy, LoadedItems, RateTable, ReportingPeriod, RunConfig, RunOutput, Tariff,
};
use anyhow::Context;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Input files and run settings shared by the computing commands
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Line item CSV file. Reads from stdin with "-".
    #[arg(short, long)]
    items: PathBuf,

    /// Reporting period (e.g. "Q3 2024" or "2024-Q3")
    #[arg(short, long)]
    period: ReportingPeriod,

    /// Rate table JSON. Uses the built-in table if not specified.
    #[arg(short, long)]
    rates: Option<PathBuf>,

    /// Tariff CSV with "Goods code", "Origin" and "Duty" columns
    #[arg(short, long)]
    tariff: Option<PathBuf>,

    /// How reclaimed duty is shared with the carrier
    #[arg(long, value_enum, default_value_t = DutyPolicyArg::ReclaimCommission)]
    duty_policy: DutyPolicyArg,

    /// Compute on a single thread
    #[arg(long)]
    sequential: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum DutyPolicyArg {
    /// Commission on reclaimed VAT and duty
    #[default]
    ReclaimCommission,
    /// Commission on VAT only, all duty to the carrier
    CarrierPassThrough,
    /// Commission on VAT only, company keeps its share of duty
    CompanyShare,
}

impl From<DutyPolicyArg> for DutyRevenuePolicy {
    fn from(arg: DutyPolicyArg) -> Self {
        match arg {
            DutyPolicyArg::ReclaimCommission => DutyRevenuePolicy::ReclaimCommission,
            DutyPolicyArg::CarrierPassThrough => DutyRevenuePolicy::CarrierPassThrough,
            DutyPolicyArg::CompanyShare => DutyRevenuePolicy::CompanyShare,
        }
    }
}

/// Everything a command needs after a run
pub struct Computed {
    pub rates: RateTable,
    pub output: RunOutput,
}

impl InputArgs {
    /// Load inputs and run the engine
    pub fn compute(&self) -> anyhow::Result<Computed> {
        let rates = match &self.rates {
            Some(path) => RateTable::read_json(open(path)?)
                .with_context(|| format!("reading rate table {}", path.display()))?,
            None => RateTable::builtin(),
        };
        let tariff = match &self.tariff {
            Some(path) => Tariff::read_csv(open(path)?)
                .with_context(|| format!("reading tariff {}", path.display()))?,
            None => Tariff::empty(),
        };
        if tariff.is_empty() {
            log::warn!("No tariff rates loaded, duty falls back to the import country rate");
        }
        let loaded = read_items(&self.items)?;

        let config = RunConfig {
            policy: self.duty_policy.into(),
            parallel: !self.sequential,
            ..RunConfig::new(self.period)
        };
        let output = core::run(loaded, &rates, &tariff, &config)?;
        Ok(Computed { rates, output })
    }
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Read line items from a CSV file (or stdin with "-")
pub fn read_items(path: &Path) -> anyhow::Result<LoadedItems> {
    if path.as_os_str() == "-" {
        read_from_stdin()
    } else {
        core::read_line_items(open(path)?)
    }
}

fn read_from_stdin() -> anyhow::Result<LoadedItems> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    core::read_line_items(io::Cursor::new(buffer))
}

/// Format an amount as euros with 2 decimal places
pub fn format_eur(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded < Decimal::ZERO {
        format!("-€{:.2}", rounded.abs())
    } else {
        format!("€{:.2}", rounded)
    }
}

/// Format a rate fraction as a percentage, e.g. 0.255 → "25.5%"
pub fn format_rate(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn euro_formatting() {
        assert_eq!(format_eur(dec!(87.108)), "€87.11");
        assert_eq!(format_eur(dec!(-79.508)), "-€79.51");
        assert_eq!(format_eur(dec!(7.6)), "€7.60");
        assert_eq!(format_eur(Decimal::ZERO), "€0.00");
    }

    #[test]
    fn rate_formatting() {
        assert_eq!(format_rate(dec!(0.255)), "25.5%");
        assert_eq!(format_rate(dec!(0.19)), "19%");
    }
}
