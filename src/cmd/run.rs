//! Run command - per category and country totals with their report boxes

use crate::cmd::{format_eur, InputArgs};
use crate::core::{AggregateRow, BoxAssignment, Category, ComputedLine, RunOutput};
use clap::Args;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Show one row per line item instead of totals
    #[arg(long)]
    lines: bool,

    /// Output as CSV instead of formatted table
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct RunJson<'a> {
    period: String,
    totals: Vec<AggregateRow>,
    boxes: Vec<BoxAssignment>,
    rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<Vec<LineRow<'a>>>,
}

impl RunCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let computed = self.input.compute()?;
        let output = &computed.output;

        if self.json {
            self.print_json(output)
        } else if self.csv {
            self.write_csv(output)
        } else {
            self.print_tables(output);
            Ok(())
        }
    }

    fn print_tables(&self, output: &RunOutput) {
        let agg = &output.aggregation;
        println!();
        println!("TOTALS ({})", agg.period);
        println!();

        if self.lines {
            let rows: Vec<LineRow> = output.lines.iter().map(LineRow::from).collect();
            print_table(&rows, "No line items computed");
        } else {
            let rows: Vec<TotalsRow> = agg.rows().iter().map(TotalsRow::from).collect();
            print_table(&rows, "No line items computed");

            println!();
            println!("REPORT BOXES");
            println!();
            let boxes: Vec<BoxRow> = agg.box_assignments().iter().map(BoxRow::from).collect();
            print_table(&boxes, "Nothing to report");

            let mut present: Vec<Category> = agg.totals.keys().map(|(c, _)| *c).collect();
            present.dedup();
            if !present.is_empty() {
                println!();
                for category in present {
                    println!("  {:7} {}", category.tag(), category.description());
                }
            }
        }

        if !output.rejections.is_empty() {
            println!();
            println!(
                "\u{26A0} {} record(s) rejected, see `dutyclaim rejected`",
                output.rejections.len()
            );
        }
    }

    fn write_csv(&self, output: &RunOutput) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        if self.lines {
            for line in &output.lines {
                wtr.serialize(LineRow::from(line))?;
            }
        } else {
            for row in output.aggregation.rows() {
                wtr.serialize(TotalsRow::from(&row))?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    fn print_json(&self, output: &RunOutput) -> anyhow::Result<()> {
        let agg = &output.aggregation;
        let json = RunJson {
            period: agg.period.display(),
            totals: agg.rows(),
            boxes: agg.box_assignments(),
            rejected: output.rejections.len(),
            lines: self
                .lines
                .then(|| output.lines.iter().map(LineRow::from).collect()),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        Ok(())
    }
}

fn print_table<T: Tabled>(rows: &[T], empty: &str) {
    if rows.is_empty() {
        println!("{}", empty);
        return;
    }
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

#[derive(Debug, Tabled, Serialize)]
struct TotalsRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Lines")]
    lines: usize,
    #[tabled(rename = "Taxable")]
    taxable_amount: String,
    #[tabled(rename = "Duty")]
    duty: String,
    #[tabled(rename = "Import VAT")]
    vat: String,
    #[tabled(rename = "Sale VAT")]
    sale_vat: String,
    #[tabled(rename = "Return Credit")]
    return_credit: String,
    #[tabled(rename = "Commission")]
    commission: String,
    #[tabled(rename = "Carrier")]
    counterparty: String,
    #[tabled(rename = "Company Duty")]
    company_duty: String,
    #[tabled(rename = "Duty Loss")]
    duty_loss: String,
    #[tabled(rename = "Spread")]
    spread: String,
}

impl From<&AggregateRow> for TotalsRow {
    fn from(row: &AggregateRow) -> Self {
        let t = &row.totals;
        TotalsRow {
            category: row.category.tag().to_string(),
            country: row.country.to_string(),
            lines: t.lines,
            taxable_amount: format_eur(t.taxable_amount),
            duty: format_eur(t.duty),
            vat: format_eur(t.vat),
            sale_vat: format_eur(t.sale_vat),
            return_credit: format_eur(t.return_credit),
            commission: format_eur(t.commission),
            counterparty: format_eur(t.counterparty),
            company_duty: format_eur(t.company_duty),
            duty_loss: format_eur(t.duty_loss),
            spread: format_eur(t.spread),
        }
    }
}

#[derive(Debug, Tabled, Serialize)]
struct BoxRow {
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Report")]
    report: String,
    #[tabled(rename = "Box")]
    box_label: String,
    #[tabled(rename = "Amount")]
    amount: String,
}

impl From<&BoxAssignment> for BoxRow {
    fn from(b: &BoxAssignment) -> Self {
        BoxRow {
            category: b.category.tag(),
            country: b.country.to_string(),
            report: b.report.to_string(),
            box_label: b.box_label.clone(),
            amount: format_eur(b.amount),
        }
    }
}

#[derive(Debug, Tabled, Serialize)]
struct LineRow<'a> {
    #[tabled(rename = "#")]
    row: usize,
    #[tabled(rename = "Line Item")]
    line_item_id: &'a str,
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Import")]
    import_country: String,
    #[tabled(rename = "Dest.")]
    destination: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Duty")]
    duty: String,
    #[tabled(rename = "Import VAT")]
    vat: String,
    #[tabled(rename = "Sale VAT")]
    sale_vat: String,
    #[tabled(rename = "Commission")]
    commission: String,
    #[tabled(rename = "Duty Loss")]
    duty_loss: String,
}

impl<'a> From<&'a ComputedLine> for LineRow<'a> {
    fn from(line: &'a ComputedLine) -> Self {
        LineRow {
            row: line.row,
            line_item_id: &line.item.line_item_id,
            category: line.category.tag(),
            import_country: line.item.import_country.to_string(),
            destination: line.item.destination.to_string(),
            value: format_eur(line.figures.parcel_value),
            duty: format_eur(line.figures.duty_amount),
            vat: format_eur(line.figures.vat_amount),
            sale_vat: format_eur(line.figures.sale_vat),
            commission: format_eur(line.split.commission),
            duty_loss: format_eur(line.split.duty_loss),
        }
    }
}
