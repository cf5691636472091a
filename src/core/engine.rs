use super::aggregate::{Aggregation, ComputedLine};
use super::classify::classify;
use super::error::{RateError, Rejection, TaxError};
use super::line_item::{LineItem, LoadedItems};
use super::period::ReportingPeriod;
use super::rates::RateTable;
use super::split::{split_revenue, DutyRevenuePolicy};
use super::tariff::Tariff;
use super::tax::compute_tax;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Settings fixed at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub period: ReportingPeriod,
    pub policy: DutyRevenuePolicy,
    /// Compute lines on the rayon pool
    pub parallel: bool,
}

impl RunConfig {
    pub fn new(period: ReportingPeriod) -> Self {
        RunConfig {
            period,
            policy: DutyRevenuePolicy::default(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Computed lines in input order
    pub lines: Vec<ComputedLine>,
    pub aggregation: Aggregation,
    /// Input and computation rejections, by row
    pub rejections: Vec<Rejection>,
}

/// Classify, compute and split a single line item
pub fn process_line(
    row: usize,
    item: LineItem,
    rates: &RateTable,
    tariff: &Tariff,
    policy: DutyRevenuePolicy,
) -> Result<ComputedLine, TaxError> {
    let category = classify(&item, rates)?;
    let figures = compute_tax(&item, category, rates, tariff)?;
    let split = split_revenue(category, item.destination, &figures, rates, policy)?;
    Ok(ComputedLine {
        row,
        item,
        category,
        figures,
        split,
    })
}

/// Run the full computation over loaded line items.
///
/// Every import and EU destination country in the input must have rates before
/// anything is computed; a gap fails the run. Record-level failures become
/// rejections and the run continues.
pub fn run(
    loaded: LoadedItems,
    rates: &RateTable,
    tariff: &Tariff,
    config: &RunConfig,
) -> Result<RunOutput, RateError> {
    rates.validate()?;
    let referenced: BTreeSet<_> = loaded
        .items
        .iter()
        .flat_map(|(_, item)| [item.import_country.country(), item.destination])
        .filter(|c| c.is_eu_member())
        .collect();
    rates.require(referenced)?;

    let policy = config.policy;
    let results: Vec<(usize, Option<String>, Result<ComputedLine, TaxError>)> = if config.parallel {
        loaded
            .items
            .into_par_iter()
            .map(|(row, item)| {
                let id = item.line_item_id.clone();
                (row, Some(id), process_line(row, item, rates, tariff, policy))
            })
            .collect()
    } else {
        loaded
            .items
            .into_iter()
            .map(|(row, item)| {
                let id = item.line_item_id.clone();
                (row, Some(id), process_line(row, item, rates, tariff, policy))
            })
            .collect()
    };

    let mut lines = Vec::with_capacity(results.len());
    let mut rejections = loaded.rejections;
    for (row, id, result) in results {
        match result {
            Ok(line) => lines.push(line),
            Err(TaxError::Record(error)) => rejections.push(Rejection::new(row, id, error)),
            Err(TaxError::Rate(error)) => return Err(error),
        }
    }
    rejections.sort_by_key(|r| r.row);

    let period = config.period;
    let aggregation = if config.parallel {
        lines
            .par_iter()
            .fold(
                || Aggregation::new(period),
                |mut acc, line| {
                    acc.add(line);
                    acc
                },
            )
            .reduce(|| Aggregation::new(period), Aggregation::merge)
    } else {
        super::aggregate::aggregate(period, &lines)
    };

    for rejection in &rejections {
        log::warn!(
            "Row {} ({}): {} rejected: {}",
            rejection.row,
            rejection.line_item_id.as_deref().unwrap_or("-"),
            rejection.error.code(),
            rejection.error
        );
    }
    log::info!(
        "{}: {} lines computed into {} category/country totals, {} rejected ({} policy)",
        period,
        lines.len(),
        aggregation.totals.len(),
        rejections.len(),
        policy
    );

    Ok(RunOutput {
        lines,
        aggregation,
        rejections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::tests::period;
    use crate::core::classify::tests::item;
    use crate::core::classify::Category;
    use crate::core::country::{Country, ImportCountry};
    use crate::core::error::RecordError;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tariff() -> Tariff {
        Tariff::from_entries([("6104", dec!(0.037))])
    }

    fn loaded(items: Vec<LineItem>) -> LoadedItems {
        LoadedItems {
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, mut it)| {
                    it.line_item_id = format!("L{}", i + 1);
                    (i + 1, it)
                })
                .collect(),
            rejections: Vec::new(),
        }
    }

    fn config(parallel: bool) -> RunConfig {
        RunConfig {
            parallel,
            ..RunConfig::new(period())
        }
    }

    #[test]
    fn bad_records_are_rejected_and_run_continues() {
        let mut partial = item(ImportCountry::Nl, "DE", dec!(100), false);
        partial.quantity_imported = 3;
        partial.quantity_returned = 1;
        partial.consignment_value = dec!(300);
        let input = loaded(vec![
            item(ImportCountry::Nl, "DE", dec!(400), false),
            item(ImportCountry::Ie, "DE", dec!(400), false),
            item(ImportCountry::Nl, "CH", dec!(400), false),
            item(ImportCountry::Nl, "NL", Decimal::ZERO, false),
            partial,
        ]);
        let out = run(input, &RateTable::builtin(), &tariff(), &config(true)).unwrap();
        assert_eq!(out.lines.len(), 1);
        let codes: Vec<(usize, &str)> = out
            .rejections
            .iter()
            .map(|r| (r.row, r.error.code()))
            .collect();
        assert_eq!(
            codes,
            vec![
                (2, "InvalidIEDestination"),
                (3, "UnclassifiableLineItem"),
                (4, "InvalidValue"),
                (5, "UnsupportedPartialReturn"),
            ]
        );
        assert_eq!(out.rejections[0].line_item_id.as_deref(), Some("L2"));
    }

    #[test]
    fn input_rejections_are_kept() {
        let mut input = loaded(vec![item(ImportCountry::Nl, "DE", dec!(400), false)]);
        input.items[0].0 = 2;
        input.rejections.push(Rejection::new(
            1,
            None,
            RecordError::MalformedInput("missing field".to_string()),
        ));
        let out = run(input, &RateTable::builtin(), &tariff(), &config(false)).unwrap();
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.rejections[0].row, 1);
    }

    #[test]
    fn missing_destination_rate_aborts_run() {
        let input = loaded(vec![
            item(ImportCountry::Nl, "DE", dec!(400), false),
            item(ImportCountry::Nl, "FR", dec!(400), false),
        ]);
        let err = run(input, &RateTable::builtin(), &tariff(), &config(true)).unwrap_err();
        assert_eq!(err, RateError::UnknownCountry(Country::new("FR").unwrap()));
    }

    #[test]
    fn invalid_rate_table_aborts_run() {
        let mut rates = RateTable::builtin();
        rates.defaults.commission_rate = dec!(1.5);
        let input = loaded(vec![item(ImportCountry::Nl, "DE", dec!(400), false)]);
        assert!(matches!(
            run(input, &rates, &tariff(), &config(true)),
            Err(RateError::InvalidRate { .. })
        ));
    }

    #[test]
    fn policy_is_applied_to_every_return() {
        let input = || {
            loaded(vec![
                item(ImportCountry::Nl, "DE", dec!(400), true),
                item(ImportCountry::Nl, "NL", dec!(400), true),
            ])
        };
        let commission = |policy| {
            let cfg = RunConfig {
                policy,
                ..config(true)
            };
            let out = run(input(), &RateTable::builtin(), &tariff(), &cfg).unwrap();
            out.aggregation.total().commission
        };
        // (87.108 + 14.80) × 0.20 per line
        assert_eq!(commission(DutyRevenuePolicy::ReclaimCommission), dec!(40.7632));
        assert_eq!(commission(DutyRevenuePolicy::CarrierPassThrough), dec!(34.8432));
        assert_eq!(commission(DutyRevenuePolicy::CompanyShare), dec!(34.8432));
    }

    #[test]
    fn scenario_totals() {
        let input = loaded(vec![
            item(ImportCountry::Nl, "DE", dec!(400), false),
            item(ImportCountry::Ie, "IE", dec!(500), true),
        ]);
        let out = run(input, &RateTable::builtin(), &tariff(), &config(true)).unwrap();
        let de = Country::new("DE").unwrap();
        let a = &out.aggregation.totals[&(Category::ANl, de)];
        assert_eq!(a.vat, dec!(87.108));
        assert_eq!(a.sale_vat, dec!(76.00));
        assert_eq!(a.spread, dec!(11.108));
        let c = &out.aggregation.totals[&(Category::CIeD, Country::IE)];
        assert_eq!(c.vat_reclaimed, dec!(119.255));
        assert_eq!(c.duty_reclaimed, Decimal::ZERO);
        assert_eq!(c.duty_loss, dec!(18.50));
        assert_eq!(c.commission.round_dp(2), dec!(35.78));
    }

    fn arb_items() -> impl Strategy<Value = Vec<LineItem>> {
        let route = prop::sample::select(vec![
            (ImportCountry::Nl, "DE"),
            (ImportCountry::Nl, "NL"),
            (ImportCountry::Nl, "IT"),
            (ImportCountry::Ie, "IE"),
            (ImportCountry::Ie, "DE"),
            (ImportCountry::Nl, "CH"),
        ]);
        prop::collection::vec((route, 0i64..200_000i64, any::<bool>()), 0..60).prop_map(|specs| {
            specs
                .into_iter()
                .map(|((import, dest), cents, returned)| {
                    item(import, dest, Decimal::new(cents, 2), returned)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn parallel_matches_sequential(items in arb_items()) {
            let rates = RateTable::builtin();
            let par = run(loaded(items.clone()), &rates, &tariff(), &config(true)).unwrap();
            let seq = run(loaded(items), &rates, &tariff(), &config(false)).unwrap();
            prop_assert_eq!(par, seq);
        }

        #[test]
        fn totals_ignore_input_order(
            (items, shuffled) in arb_items().prop_flat_map(|items| {
                let shuffled = Just(items.clone()).prop_shuffle();
                (Just(items), shuffled)
            })
        ) {
            let rates = RateTable::builtin();
            let a = run(loaded(items), &rates, &tariff(), &config(true)).unwrap();
            let b = run(loaded(shuffled), &rates, &tariff(), &config(true)).unwrap();
            prop_assert_eq!(a.aggregation, b.aggregation);
            prop_assert_eq!(a.rejections.len(), b.rejections.len());
        }
    }
}
