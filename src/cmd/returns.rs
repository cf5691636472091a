//! Returns command - Dutch VAT return, OSS return, duty claim, VAT difference and revenue

use crate::cmd::{format_eur, format_rate, InputArgs};
use crate::core::{
    rgr_claim_lines, DutchVatReturn, DutyClaimLine, DutyReturnClaim, FinancialSummary, OssReturn,
    RevenueSummary, RgrClaimLine, VatDifference,
};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReturnsCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Which form to print
    #[arg(short, long, value_enum, default_value_t = FormType::All)]
    form: FormType,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormType {
    /// Dutch VAT return (boxes 1a, 5b)
    Dutch,
    /// OSS return per destination
    Oss,
    /// Duty return claim for returned goods
    Duty,
    /// Returned goods relief claim lines
    Rgr,
    /// NL import VAT against destination VAT
    Difference,
    /// Commission and carrier amounts
    Revenue,
    /// OSS due, Dutch net, duty and revenue headlines
    Summary,
    All,
}

impl FormType {
    fn includes(self, form: FormType) -> bool {
        self == FormType::All || self == form
    }
}

#[derive(Debug, Default, Serialize)]
struct FormsJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    dutch_vat_return: Option<DutchVatReturn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oss_return: Option<OssReturn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duty_return_claim: Option<DutyReturnClaim>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rgr_claim: Option<Vec<RgrClaimLine>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vat_difference: Option<VatDifference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vat_difference_settlement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revenue: Option<RevenueSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    financial_summary: Option<FinancialSummary>,
}

impl ReturnsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let computed = self.input.compute()?;
        let agg = &computed.output.aggregation;
        let form = self.form;

        let dutch = DutchVatReturn::from_aggregation(agg);
        let oss = OssReturn::from_aggregation(agg, &computed.rates)?;
        let duty = DutyReturnClaim::from_aggregation(agg);
        let revenue = RevenueSummary::from_aggregation(agg);

        let mut forms = FormsJson::default();
        if form.includes(FormType::Summary) {
            forms.financial_summary =
                Some(FinancialSummary::from_forms(&dutch, &oss, &duty, &revenue));
        }
        if form.includes(FormType::Dutch) {
            forms.dutch_vat_return = Some(dutch);
        }
        if form.includes(FormType::Oss) {
            forms.oss_return = Some(oss);
        }
        if form.includes(FormType::Duty) {
            forms.duty_return_claim = Some(duty);
        }
        if form.includes(FormType::Rgr) {
            forms.rgr_claim = Some(rgr_claim_lines(&computed.output.lines));
        }
        if form.includes(FormType::Difference) {
            let difference = VatDifference::from_aggregation(agg);
            forms.vat_difference_settlement = Some(difference.settlement());
            forms.vat_difference = Some(difference);
        }
        if form.includes(FormType::Revenue) {
            forms.revenue = Some(revenue);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&forms)?);
            return Ok(());
        }

        if let Some(r) = &forms.dutch_vat_return {
            print_dutch_return(r);
        }
        if let Some(oss) = &forms.oss_return {
            print_oss_return(oss);
        }
        if let Some(claim) = &forms.duty_return_claim {
            print_duty_claim(claim);
        }
        if let Some(lines) = &forms.rgr_claim {
            print_rgr_claim(lines);
        }
        if let (Some(diff), Some(settlement)) =
            (&forms.vat_difference, &forms.vat_difference_settlement)
        {
            print_vat_difference(diff, settlement);
        }
        if let Some(revenue) = &forms.revenue {
            print_revenue(revenue);
        }
        if let Some(summary) = &forms.financial_summary {
            print_financial_summary(summary);
        }
        Ok(())
    }
}

fn heading(title: &str, period: &str) {
    println!();
    println!("{} ({})", title, period);
    println!();
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

#[derive(Tabled)]
struct FormRow {
    #[tabled(rename = "Line")]
    line: &'static str,
    #[tabled(rename = "Box")]
    box_label: &'static str,
    #[tabled(rename = "Amount")]
    amount: String,
}

fn form_row(line: &'static str, box_label: &'static str, amount: String) -> FormRow {
    FormRow {
        line,
        box_label,
        amount,
    }
}

fn print_dutch_return(r: &DutchVatReturn) {
    heading("DUTCH VAT RETURN", &r.period);
    print_table(vec![
        form_row("IOSS sales, all countries", "1a", format_eur(r.ioss_sales)),
        form_row("IOSS returns (credit)", "1a (credit)", format_eur(-r.ioss_returns)),
        form_row("IOSS net", "1a", format_eur(r.ioss_net)),
        form_row(
            "NL high value sales, stayed in NL",
            "1a",
            format_eur(r.nl_high_value_sales),
        ),
        form_row(
            "NL high value returns (credit)",
            "1a (credit)",
            format_eur(-r.nl_high_value_returns),
        ),
        form_row("NL high value net", "1a", format_eur(r.nl_high_value_net)),
        form_row("Total output VAT", "Box 1 Total", format_eur(r.box_1_total)),
        form_row(
            "Import VAT to reclaim, goods sold to other EU countries",
            "5b",
            format_eur(r.import_vat_reclaim),
        ),
        form_row("Total input VAT", "Box 5 Total", format_eur(r.box_5_total)),
        form_row("Output VAT - input VAT", "Net", format_eur(r.net)),
        form_row("Status", "", r.position.label().to_string()),
    ]);
}

#[derive(Tabled)]
struct OssRow {
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "VAT Rate")]
    vat_rate: String,
    #[tabled(rename = "Taxable Amount")]
    taxable_amount: String,
    #[tabled(rename = "Sales VAT")]
    sales_vat: String,
    #[tabled(rename = "Returns VAT (Credit)")]
    returns_credit: String,
    #[tabled(rename = "Net VAT Due")]
    net_vat_due: String,
}

fn print_oss_return(oss: &OssReturn) {
    heading("OSS VAT RETURN", &oss.period);
    if oss.lines.is_empty() {
        println!("No cross-border sales");
        return;
    }
    print_table(
        oss.lines
            .iter()
            .map(|l| OssRow {
                country: l.country.to_string(),
                vat_rate: format_rate(l.vat_rate),
                taxable_amount: format_eur(l.taxable_amount),
                sales_vat: format_eur(l.sales_vat),
                returns_credit: format_eur(-l.returns_credit),
                net_vat_due: format_eur(l.net_vat_due),
            })
            .collect(),
    );
    println!("Total sales VAT: {}", format_eur(oss.total_sales_vat));
    println!("Total returns VAT (credit): {}", format_eur(-oss.total_returns_credit));
    println!("Net OSS VAT due: {}", format_eur(oss.total_net_vat_due));
    println!("Member state of identification: Netherlands (NL)");
}

#[derive(Tabled)]
struct DutyRow {
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Returned Value")]
    returned_value: String,
    #[tabled(rename = "Duty")]
    duty: String,
}

fn print_duty_claim(claim: &DutyReturnClaim) {
    heading("DUTY RETURN CLAIM", &claim.period);
    let rows = |lines: &[DutyClaimLine]| -> Vec<DutyRow> {
        lines
            .iter()
            .map(|l| DutyRow {
                country: l.country.to_string(),
                returned_value: format_eur(l.returned_value),
                duty: format_eur(l.duty),
            })
            .collect()
    };
    if claim.claims.is_empty() {
        println!("No reclaimable duty");
    } else {
        print_table(rows(&claim.claims));
        println!("Total duty to reclaim: {}", format_eur(claim.total_claim));
    }
    if !claim.excluded.is_empty() {
        println!();
        println!("Excluded, duty cannot be reclaimed:");
        print_table(rows(&claim.excluded));
        println!("Total duty loss: {}", format_eur(claim.total_loss));
    }
}

#[derive(Tabled)]
struct RgrRow {
    #[tabled(rename = "#")]
    row: usize,
    #[tabled(rename = "Parcel")]
    parcel_id: String,
    #[tabled(rename = "Line Item")]
    line_item_id: String,
    #[tabled(rename = "MRN")]
    mrn: String,
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Entry")]
    entry_date: String,
    #[tabled(rename = "Export")]
    export_date: String,
    #[tabled(rename = "VAT")]
    vat: String,
    #[tabled(rename = "Duty")]
    duty: String,
}

fn print_rgr_claim(lines: &[RgrClaimLine]) {
    println!();
    println!("RETURNED GOODS RELIEF CLAIM");
    println!();
    if lines.is_empty() {
        println!("No returned goods");
        return;
    }
    print_table(
        lines
            .iter()
            .map(|l| RgrRow {
                row: l.row,
                parcel_id: l.parcel_id.clone(),
                line_item_id: l.line_item_id.clone(),
                mrn: l.mrn.clone(),
                category: l.category.tag(),
                entry_date: l.entry_date.format("%Y-%m-%d").to_string(),
                export_date: l
                    .export_date
                    .map_or_else(String::new, |d| d.format("%Y-%m-%d").to_string()),
                vat: format_eur(l.vat_reclaimed),
                duty: format_eur(l.duty_reclaimed),
            })
            .collect(),
    );
}

#[derive(Tabled)]
struct DifferenceRow {
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Taxable Amount")]
    taxable_amount: String,
    #[tabled(rename = "VAT Paid In NL")]
    nl_import_vat: String,
    #[tabled(rename = "VAT In Destination")]
    destination_vat: String,
    #[tabled(rename = "Difference")]
    difference: String,
}

fn print_vat_difference(diff: &VatDifference, settlement: &str) {
    heading("VAT DIFFERENCE", &diff.period);
    if diff.lines.is_empty() {
        println!("No cross-border sales");
        return;
    }
    print_table(
        diff.lines
            .iter()
            .map(|l| DifferenceRow {
                country: l.country.to_string(),
                taxable_amount: format_eur(l.taxable_amount),
                nl_import_vat: format_eur(l.nl_import_vat),
                destination_vat: format_eur(l.destination_vat),
                difference: format_eur(l.difference),
            })
            .collect(),
    );
    println!("{}", settlement);
}

#[derive(Tabled)]
struct RevenueRow {
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Lines")]
    lines: usize,
    #[tabled(rename = "Commission")]
    commission: String,
    #[tabled(rename = "Company Duty")]
    company_duty: String,
    #[tabled(rename = "Revenue")]
    revenue: String,
    #[tabled(rename = "Carrier")]
    counterparty: String,
    #[tabled(rename = "Spread")]
    spread: String,
    #[tabled(rename = "Duty Loss")]
    duty_loss: String,
}

fn print_revenue(summary: &RevenueSummary) {
    heading("REVENUE SUMMARY", &summary.period);
    if summary.lines.is_empty() {
        println!("No line items computed");
        return;
    }
    print_table(
        summary
            .lines
            .iter()
            .map(|l| RevenueRow {
                category: l.category.tag(),
                lines: l.lines,
                commission: format_eur(l.commission),
                company_duty: format_eur(l.company_duty),
                revenue: format_eur(l.company_revenue()),
                counterparty: format_eur(l.counterparty),
                spread: format_eur(l.spread),
                duty_loss: format_eur(l.duty_loss),
            })
            .collect(),
    );
    println!("Total company revenue: {}", format_eur(summary.total_revenue()));
    println!("Total to carrier: {}", format_eur(summary.total_counterparty));
}

fn print_financial_summary(summary: &FinancialSummary) {
    heading("FINANCIAL SUMMARY", &summary.period);
    print_table(vec![
        form_row("VAT to pay on the OSS return", "OSS", format_eur(summary.oss_vat_due)),
        form_row(
            "Net VAT on the Dutch return, negative is a refund",
            "Net",
            format_eur(summary.dutch_net_vat),
        ),
        form_row("Duty claimed back from customs", "RGR", format_eur(summary.duty_reclaimed)),
        form_row("Duty that cannot be claimed back", "-", format_eur(summary.duty_loss)),
        form_row("Company revenue", "-", format_eur(summary.company_revenue)),
        form_row("Owed to the carrier", "-", format_eur(summary.carrier_amount)),
    ]);
}
