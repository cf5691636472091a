//! Schema command - print expected input formats

use crate::core::{LineItemRecord, RateTable};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format
    #[arg(value_enum, default_value = "csv-fields")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the rate table file
    RatesJsonSchema,
    /// The built-in rate table as JSON, a starting point for --rates
    RatesDefault,
    /// CSV header row with line item column names
    CsvHeader,
    /// Line item CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::RatesJsonSchema => self.print_rates_schema(),
            SchemaFormat::RatesDefault => self.print_rates_default(),
            SchemaFormat::CsvHeader => self.print_csv_header(),
            SchemaFormat::CsvFields => self.print_csv_fields(),
        }
    }

    fn print_rates_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(RateTable);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_rates_default(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&RateTable::builtin())?);
        Ok(())
    }

    fn print_csv_header(&self) -> anyhow::Result<()> {
        let names: Vec<&str> = LineItemRecord::csv_schema().iter().map(|f| f.name).collect();
        println!("{}", names.join(","));
        Ok(())
    }

    fn print_csv_fields(&self) -> anyhow::Result<()> {
        println!("Line Item CSV Format");
        println!("====================");
        println!();
        for field in LineItemRecord::csv_schema() {
            let req = if field.required { "required" } else { "optional" };
            println!("{:20} ({:8})  {}", field.name, req, field.description);
        }
        println!();
        println!("Amounts are in EUR; convert other currencies before import.");
        println!("Partial returns (0 < quantity_returned < quantity_imported) are rejected.");
        Ok(())
    }
}
