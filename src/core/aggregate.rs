use super::classify::Category;
use super::country::Country;
use super::line_item::LineItem;
use super::period::ReportingPeriod;
use super::split::RevenueSplit;
use super::tax::TaxFigures;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A classified line item with its figures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedLine {
    /// 1-based data row in the input file
    pub row: usize,
    pub item: LineItem,
    pub category: Category,
    pub figures: TaxFigures,
    pub split: RevenueSplit,
}

impl ComputedLine {
    /// Aggregation key. Country is the destination.
    pub fn key(&self) -> (Category, Country) {
        (self.category, self.item.destination)
    }
}

/// Summed figures for one (category, country)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub lines: usize,
    pub taxable_amount: Decimal,
    pub duty: Decimal,
    pub vat_base: Decimal,
    pub vat: Decimal,
    pub sale_vat: Decimal,
    pub return_credit: Decimal,
    pub vat_reclaimed: Decimal,
    pub duty_reclaimed: Decimal,
    pub commission: Decimal,
    pub counterparty: Decimal,
    pub company_duty: Decimal,
    pub duty_loss: Decimal,
    pub spread: Decimal,
}

impl Totals {
    pub fn add(&mut self, line: &ComputedLine) {
        let f = &line.figures;
        let s = &line.split;
        self.lines += 1;
        self.taxable_amount += f.parcel_value;
        self.duty += f.duty_amount;
        self.vat_base += f.vat_base;
        self.vat += f.vat_amount;
        self.sale_vat += f.sale_vat;
        self.return_credit += f.return_credit;
        self.vat_reclaimed += s.vat_reclaimed;
        self.duty_reclaimed += s.duty_reclaimed;
        self.commission += s.commission;
        self.counterparty += s.counterparty_amount;
        self.company_duty += s.company_duty_amount;
        self.duty_loss += s.duty_loss;
        self.spread += s.spread;
    }

    pub fn merge(&mut self, other: &Totals) {
        self.lines += other.lines;
        self.taxable_amount += other.taxable_amount;
        self.duty += other.duty;
        self.vat_base += other.vat_base;
        self.vat += other.vat;
        self.sale_vat += other.sale_vat;
        self.return_credit += other.return_credit;
        self.vat_reclaimed += other.vat_reclaimed;
        self.duty_reclaimed += other.duty_reclaimed;
        self.commission += other.commission;
        self.counterparty += other.counterparty;
        self.company_duty += other.company_duty;
        self.duty_loss += other.duty_loss;
        self.spread += other.spread;
    }
}

/// Where an aggregate figure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Report {
    DutchVatReturn,
    OssReturn,
    RgrClaim,
    DutyReturnClaim,
    /// Not reported, paid at import and never reclaimed
    SettledAtImport,
    /// Duty that cannot be recovered
    DutyLoss,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Report::DutchVatReturn => "Dutch VAT return",
            Report::OssReturn => "OSS return",
            Report::RgrClaim => "RGR claim",
            Report::DutyReturnClaim => "Duty return claim",
            Report::SettledAtImport => "Settled at import",
            Report::DutyLoss => "Duty loss",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxAssignment {
    pub category: Category,
    pub country: Country,
    pub report: Report,
    /// Box or line on the report, e.g. `1a`, `5b`, or the OSS destination
    #[serde(rename = "box")]
    pub box_label: String,
    pub amount: Decimal,
}

/// Totals row as emitted in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    pub period: String,
    pub category: Category,
    pub country: Country,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Per-line entry of the Returned Goods Relief claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RgrClaimLine {
    pub row: usize,
    pub parcel_id: String,
    pub line_item_id: String,
    pub mrn: String,
    pub category: Category,
    pub country: Country,
    pub entry_date: NaiveDate,
    pub export_date: Option<NaiveDate>,
    pub vat_reclaimed: Decimal,
    pub duty_reclaimed: Decimal,
    pub duty_loss: Decimal,
}

/// Totals keyed by (category, destination) for one reporting period.
///
/// `merge` is associative and commutative, so partial aggregations built on
/// any split of the input combine to the same result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub period: ReportingPeriod,
    pub totals: BTreeMap<(Category, Country), Totals>,
}

impl Aggregation {
    pub fn new(period: ReportingPeriod) -> Self {
        Aggregation {
            period,
            totals: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, line: &ComputedLine) {
        self.totals.entry(line.key()).or_default().add(line);
    }

    pub fn merge(mut self, other: Aggregation) -> Self {
        for (key, totals) in other.totals {
            self.totals.entry(key).or_default().merge(&totals);
        }
        self
    }

    /// Sum over every (category, country)
    pub fn total(&self) -> Totals {
        let mut total = Totals::default();
        for t in self.totals.values() {
            total.merge(t);
        }
        total
    }

    /// Sum over the countries of one category
    pub fn category_total(&self, category: Category) -> Totals {
        let mut total = Totals::default();
        for ((c, _), t) in &self.totals {
            if *c == category {
                total.merge(t);
            }
        }
        total
    }

    pub fn rows(&self) -> Vec<AggregateRow> {
        let period = self.period.display();
        self.totals
            .iter()
            .map(|((category, country), totals)| AggregateRow {
                period: period.clone(),
                category: *category,
                country: *country,
                totals: *totals,
            })
            .collect()
    }

    /// Map every (category, country) total onto the report box it feeds
    pub fn box_assignments(&self) -> Vec<BoxAssignment> {
        let mut boxes = Vec::new();
        for (&(category, country), t) in &self.totals {
            let mut assign = |report: Report, box_label: &str, amount: Decimal| {
                boxes.push(BoxAssignment {
                    category,
                    country,
                    report,
                    box_label: box_label.to_string(),
                    amount,
                })
            };
            match category {
                Category::Ioss => {
                    assign(Report::DutchVatReturn, "1a", t.sale_vat);
                    assign(Report::DutchVatReturn, "1a credit", -t.return_credit);
                }
                Category::ANl => {
                    assign(Report::DutchVatReturn, "5b", t.vat);
                    assign(Report::OssReturn, country.as_str(), t.sale_vat);
                }
                Category::BNl | Category::BIe => {
                    assign(Report::SettledAtImport, "-", t.vat);
                }
                Category::CNlX | Category::CNlD | Category::CIeD => {
                    assign(Report::RgrClaim, "RGR VAT", t.vat_reclaimed);
                    if !t.duty_reclaimed.is_zero() {
                        assign(Report::DutyReturnClaim, "RGR duty", t.duty_reclaimed);
                    }
                    if !t.duty_loss.is_zero() {
                        assign(Report::DutyLoss, "-", t.duty_loss);
                    }
                }
            }
        }
        boxes
    }
}

/// Aggregate computed lines in order
pub fn aggregate<'a, I>(period: ReportingPeriod, lines: I) -> Aggregation
where
    I: IntoIterator<Item = &'a ComputedLine>,
{
    let mut aggregation = Aggregation::new(period);
    for line in lines {
        aggregation.add(line);
    }
    aggregation
}

/// Claim lines for returned goods, in input order
pub fn rgr_claim_lines(lines: &[ComputedLine]) -> Vec<RgrClaimLine> {
    let mut claims: Vec<RgrClaimLine> = lines
        .iter()
        .filter(|l| l.category.is_rgr_return())
        .map(|l| RgrClaimLine {
            row: l.row,
            parcel_id: l.item.parcel_id.clone(),
            line_item_id: l.item.line_item_id.clone(),
            mrn: l.item.mrn.clone(),
            category: l.category,
            country: l.item.destination,
            entry_date: l.item.entry_date,
            export_date: l.item.export_date,
            vat_reclaimed: l.split.vat_reclaimed,
            duty_reclaimed: l.split.duty_reclaimed,
            duty_loss: l.split.duty_loss,
        })
        .collect();
    claims.sort_by_key(|c| c.row);
    claims
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::classify::classify;
    use crate::core::classify::tests::item;
    use crate::core::country::ImportCountry;
    use crate::core::rates::RateTable;
    use crate::core::split::{split_revenue, DutyRevenuePolicy};
    use crate::core::tariff::Tariff;
    use crate::core::tax::compute_tax;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    pub(crate) fn period() -> ReportingPeriod {
        ReportingPeriod::new(2024, 3).unwrap()
    }

    pub(crate) fn compute_line(row: usize, item: LineItem) -> ComputedLine {
        let rates = RateTable::builtin();
        let tariff = Tariff::from_entries([("6104", dec!(0.037))]);
        let category = classify(&item, &rates).unwrap();
        let figures = compute_tax(&item, category, &rates, &tariff).unwrap();
        let split = split_revenue(
            category,
            item.destination,
            &figures,
            &rates,
            DutyRevenuePolicy::default(),
        )
        .unwrap();
        ComputedLine {
            row,
            item,
            category,
            figures,
            split,
        }
    }

    fn de() -> Country {
        Country::new("DE").unwrap()
    }

    /// €100 IOSS parcel to DE: 40 kept, 60 returned
    fn ioss_parcel() -> Vec<ComputedLine> {
        let mut kept = item(ImportCountry::Nl, "DE", dec!(40), false);
        kept.consignment_value = dec!(100);
        let mut returned = item(ImportCountry::Nl, "DE", dec!(60), true);
        returned.line_item_id = "L2".to_string();
        returned.consignment_value = dec!(100);
        vec![compute_line(1, kept), compute_line(2, returned)]
    }

    #[test]
    fn ioss_net_vat_and_commission() {
        let agg = aggregate(period(), &ioss_parcel());
        let t = &agg.totals[&(Category::Ioss, de())];
        assert_eq!(t.lines, 2);
        assert_eq!(t.sale_vat, dec!(19.00));
        assert_eq!(t.return_credit, dec!(11.40));
        assert_eq!(t.sale_vat - t.return_credit, dec!(7.60));
        assert_eq!(t.commission, dec!(2.28));
    }

    #[test]
    fn one_row_per_category_and_country() {
        let mut lines = ioss_parcel();
        lines.push(compute_line(3, item(ImportCountry::Nl, "DE", dec!(400), false)));
        lines.push(compute_line(4, item(ImportCountry::Nl, "ES", dec!(400), false)));
        lines.push(compute_line(5, item(ImportCountry::Nl, "DE", dec!(300), false)));
        let agg = aggregate(period(), &lines);
        let rows = agg.rows();
        let keys: Vec<(Category, &str)> =
            rows.iter().map(|r| (r.category, r.country.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (Category::Ioss, "DE"),
                (Category::ANl, "DE"),
                (Category::ANl, "ES")
            ]
        );
        assert_eq!(rows[1].totals.lines, 2);
        assert_eq!(rows[1].totals.taxable_amount, dec!(700));
        assert!(rows.iter().all(|r| r.period == "Q3 2024"));
    }

    #[test]
    fn box_assignment_by_category() {
        let lines = vec![
            compute_line(1, item(ImportCountry::Nl, "DE", dec!(100), false)),
            compute_line(2, item(ImportCountry::Nl, "DE", dec!(400), false)),
            compute_line(3, item(ImportCountry::Nl, "NL", dec!(400), false)),
            compute_line(4, item(ImportCountry::Nl, "NL", dec!(400), true)),
            compute_line(5, item(ImportCountry::Ie, "IE", dec!(500), true)),
        ];
        let boxes = aggregate(period(), &lines).box_assignments();
        let find = |category: Category, report: Report| {
            boxes
                .iter()
                .find(|b| b.category == category && b.report == report)
                .map(|b| (b.box_label.as_str(), b.amount))
        };
        assert_eq!(find(Category::Ioss, Report::DutchVatReturn), Some(("1a", dec!(19.00))));
        assert_eq!(find(Category::ANl, Report::DutchVatReturn), Some(("5b", dec!(87.108))));
        assert_eq!(find(Category::ANl, Report::OssReturn), Some(("DE", dec!(76.00))));
        assert_eq!(find(Category::BNl, Report::SettledAtImport).map(|b| b.0), Some("-"));
        assert_eq!(find(Category::CNlD, Report::RgrClaim).map(|b| b.0), Some("RGR VAT"));
        assert_eq!(
            find(Category::CNlD, Report::DutyReturnClaim),
            Some(("RGR duty", dec!(14.80)))
        );
        // IE duty is never claimed, only reported as a loss
        assert_eq!(find(Category::CIeD, Report::DutyReturnClaim), None);
        assert_eq!(find(Category::CIeD, Report::DutyLoss), Some(("-", dec!(18.50))));
    }

    #[test]
    fn claim_lines_only_for_returns() {
        let lines = vec![
            compute_line(1, item(ImportCountry::Nl, "DE", dec!(400), false)),
            compute_line(2, item(ImportCountry::Ie, "IE", dec!(500), true)),
            compute_line(3, item(ImportCountry::Nl, "DE", dec!(60), true)),
        ];
        let claims = rgr_claim_lines(&lines);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].row, 2);
        assert_eq!(claims[0].duty_reclaimed, Decimal::ZERO);
        assert_eq!(claims[0].duty_loss, dec!(18.50));
    }

    #[test]
    fn merge_of_halves_equals_whole() {
        let lines = vec![
            compute_line(1, item(ImportCountry::Nl, "DE", dec!(400), false)),
            compute_line(2, item(ImportCountry::Ie, "IE", dec!(500), true)),
            compute_line(3, item(ImportCountry::Nl, "DE", dec!(60), true)),
            compute_line(4, item(ImportCountry::Nl, "DE", dec!(1200), false)),
        ];
        let whole = aggregate(period(), &lines);
        let left = aggregate(period(), &lines[..2]);
        let right = aggregate(period(), &lines[2..]);
        assert_eq!(left.clone().merge(right.clone()), whole);
        assert_eq!(right.merge(left), whole);
    }

    pub(crate) fn arb_lines() -> impl Strategy<Value = Vec<ComputedLine>> {
        let route = prop::sample::select(vec![
            (ImportCountry::Nl, "DE"),
            (ImportCountry::Nl, "NL"),
            (ImportCountry::Nl, "ES"),
            (ImportCountry::Ie, "IE"),
        ]);
        prop::collection::vec((route, 1i64..200_000i64, any::<bool>()), 1..40).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, ((import, dest), cents, returned))| {
                    let mut it = item(import, dest, Decimal::new(cents, 2), returned);
                    it.line_item_id = format!("L{}", i + 1);
                    compute_line(i + 1, it)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn aggregation_is_order_independent(
            (lines, shuffled) in arb_lines().prop_flat_map(|lines| {
                let shuffled = Just(lines.clone()).prop_shuffle();
                (Just(lines), shuffled)
            })
        ) {
            prop_assert_eq!(aggregate(period(), &lines), aggregate(period(), &shuffled));
        }
    }
}
