//! Rejected command - records that could not be computed, with the reason

use crate::cmd::InputArgs;
use crate::core::Rejection;
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct RejectedCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A rejected record for output
#[derive(Debug, Clone, Serialize)]
struct RejectedRecord {
    row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_item_id: Option<String>,
    reason: &'static str,
    message: String,
}

impl From<&Rejection> for RejectedRecord {
    fn from(r: &Rejection) -> Self {
        RejectedRecord {
            row: r.row,
            line_item_id: r.line_item_id.clone(),
            reason: r.error.code(),
            message: r.error.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectedOutput {
    period: String,
    computed: usize,
    rejected_count: usize,
    rejected: Vec<RejectedRecord>,
}

impl RejectedCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let computed = self.input.compute()?;
        let output = &computed.output;
        let records: Vec<RejectedRecord> =
            output.rejections.iter().map(RejectedRecord::from).collect();

        if self.json {
            let json = RejectedOutput {
                period: output.aggregation.period.display(),
                computed: output.lines.len(),
                rejected_count: records.len(),
                rejected: records.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            self.print_text(&records, output.aggregation.period.display(), output.lines.len());
        }

        // Exit with code 1 if anything was rejected
        if !records.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn print_text(&self, records: &[RejectedRecord], period: String, computed: usize) {
        println!();
        println!("REJECTED RECORDS ({})", period);
        println!();

        if records.is_empty() {
            println!("\u{2713} All {} line items computed.", computed);
            return;
        }

        println!(
            "\u{26A0} {} record(s) rejected, {} computed:",
            records.len(),
            computed
        );
        println!();
        for record in records {
            println!(
                "  Row {} [{}] {}",
                record.row,
                record.line_item_id.as_deref().unwrap_or("-"),
                record.reason
            );
            println!("     {}", record.message);
        }
    }
}
