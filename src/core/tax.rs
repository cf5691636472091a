use super::classify::Category;
use super::error::{RecordError, TaxError};
use super::line_item::{LineItem, ReturnStatus};
use super::rates::RateTable;
use super::tariff::Tariff;
use rust_decimal::Decimal;
use serde::Serialize;

/// VAT and duty figures for a single line item. Unrounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaxFigures {
    pub parcel_value: Decimal,
    pub duty_rate: Decimal,
    pub duty_amount: Decimal,
    pub vat_base: Decimal,
    /// Import country VAT rate (zero for IOSS)
    pub vat_rate: Decimal,
    /// Import VAT paid at clearance, reclaimed through 5b or RGR
    pub vat_amount: Decimal,
    /// Destination VAT rate for sale-side VAT
    pub sale_vat_rate: Decimal,
    /// VAT due at sale: IOSS sales and A-NL OSS liability
    pub sale_vat: Decimal,
    /// IOSS sale VAT reversed by a full return
    pub return_credit: Decimal,
}

/// Duty rate for an item: the tariff rate for its goods code, or the
/// import country's configured rate when the tariff has no entry.
pub fn duty_rate(item: &LineItem, rates: &RateTable, tariff: &Tariff) -> Result<Decimal, TaxError> {
    if let Some(rate) = tariff.rate_for(&item.hs_code) {
        return Ok(rate);
    }
    let rate = rates.rates(item.import_country.country())?.duty_rate;
    if rate.is_zero() {
        log::warn!(
            "No duty rate for HS code {} (line item {}), using 0",
            item.hs_code,
            item.line_item_id
        );
    }
    Ok(rate)
}

/// Compute duty and VAT for a classified line item
pub fn compute_tax(
    item: &LineItem,
    category: Category,
    rates: &RateTable,
    tariff: &Tariff,
) -> Result<TaxFigures, TaxError> {
    let value = item.parcel_value()?;
    if value <= Decimal::ZERO {
        return Err(RecordError::InvalidValue {
            line_item_id: item.line_item_id.clone(),
            value,
        }
        .into());
    }

    let figures = match category {
        Category::Ioss => {
            // Low-value relief: no duty, VAT charged at sale at the destination rate
            let sale_vat_rate = rates.rates(item.destination)?.vat_rate;
            let sale_vat = value * sale_vat_rate;
            let return_credit = match item.return_status()? {
                ReturnStatus::Returned => sale_vat,
                ReturnStatus::Delivered => Decimal::ZERO,
            };
            TaxFigures {
                parcel_value: value,
                vat_base: value,
                sale_vat_rate,
                sale_vat,
                return_credit,
                ..TaxFigures::default()
            }
        }
        Category::ANl
        | Category::BNl
        | Category::BIe
        | Category::CNlX
        | Category::CNlD
        | Category::CIeD => {
            let duty_rate = duty_rate(item, rates, tariff)?;
            let vat_rate = rates.rates(item.import_country.country())?.vat_rate;
            let out_of_range = || {
                RecordError::MalformedInput(format!(
                    "line item {}: duty and VAT on {} are out of range",
                    item.line_item_id, value
                ))
            };
            let duty_amount = value.checked_mul(duty_rate).ok_or_else(out_of_range)?;
            let vat_base = value.checked_add(duty_amount).ok_or_else(out_of_range)?;
            let vat_amount = vat_base.checked_mul(vat_rate).ok_or_else(out_of_range)?;
            // Reclaimed VAT plus duty is split downstream
            vat_amount.checked_add(duty_amount).ok_or_else(out_of_range)?;
            let mut figures = TaxFigures {
                parcel_value: value,
                duty_rate,
                duty_amount,
                vat_base,
                vat_rate,
                vat_amount,
                ..TaxFigures::default()
            };
            if category == Category::ANl {
                figures.sale_vat_rate = rates.rates(item.destination)?.vat_rate;
                figures.sale_vat = value * figures.sale_vat_rate;
            }
            figures
        }
    };

    log::debug!(
        "{} {}: value {} duty {} vat {} sale vat {}",
        item.line_item_id,
        category,
        figures.parcel_value,
        figures.duty_amount,
        figures.vat_amount,
        figures.sale_vat
    );
    Ok(figures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::tests::item;
    use crate::core::classify::classify;
    use crate::core::country::ImportCountry;
    use rust_decimal_macros::dec;

    fn tariff() -> Tariff {
        Tariff::from_entries([("6104", dec!(0.037)), ("6204", dec!(0.037))])
    }

    fn compute(item: &LineItem) -> TaxFigures {
        let rates = RateTable::builtin();
        let category = classify(item, &rates).unwrap();
        compute_tax(item, category, &rates, &tariff()).unwrap()
    }

    #[test]
    fn cross_border_nl_sale() {
        let it = item(ImportCountry::Nl, "DE", dec!(400), false);
        let f = compute(&it);
        assert_eq!(f.duty_amount, dec!(14.80));
        assert_eq!(f.vat_base, dec!(414.80));
        assert_eq!(f.vat_amount, dec!(87.108));
        assert_eq!(f.sale_vat, dec!(76.00));
        assert_eq!(f.return_credit, Decimal::ZERO);
    }

    #[test]
    fn ie_domestic_return() {
        let mut it = item(ImportCountry::Ie, "IE", dec!(500), true);
        it.hs_code = "6204629090".to_string();
        let f = compute(&it);
        assert_eq!(f.duty_amount, dec!(18.50));
        assert_eq!(f.vat_base, dec!(518.50));
        assert_eq!(f.vat_amount, dec!(119.255));
        assert_eq!(f.vat_rate, dec!(0.23));
        assert_eq!(f.sale_vat, Decimal::ZERO);
    }

    #[test]
    fn ioss_has_no_duty_or_import_vat() {
        let it = item(ImportCountry::Nl, "DE", dec!(100), false);
        let f = compute(&it);
        assert_eq!(f.duty_amount, Decimal::ZERO);
        assert_eq!(f.vat_amount, Decimal::ZERO);
        assert_eq!(f.vat_base, dec!(100));
        assert_eq!(f.sale_vat, dec!(19.00));
        assert_eq!(f.return_credit, Decimal::ZERO);
    }

    #[test]
    fn returned_ioss_carries_full_credit() {
        let it = item(ImportCountry::Nl, "DE", dec!(60), true);
        let f = compute(&it);
        assert_eq!(f.sale_vat, dec!(11.40));
        assert_eq!(f.return_credit, dec!(11.40));
    }

    #[test]
    fn vat_base_always_includes_duty() {
        let rates = RateTable::builtin();
        for (import, dest, returned) in [
            (ImportCountry::Nl, "DE", false),
            (ImportCountry::Nl, "NL", false),
            (ImportCountry::Ie, "IE", false),
            (ImportCountry::Nl, "ES", true),
            (ImportCountry::Nl, "NL", true),
            (ImportCountry::Ie, "IE", true),
        ] {
            let it = item(import, dest, dec!(812.34), returned);
            let category = classify(&it, &rates).unwrap();
            let f = compute_tax(&it, category, &rates, &tariff()).unwrap();
            assert_eq!(f.vat_base, f.parcel_value + f.duty_amount, "{category}");
        }
    }

    #[test]
    fn falls_back_to_configured_duty_rate() {
        let mut rates = RateTable::builtin();
        rates.defaults.duty_rate = dec!(0.12);
        let it = item(ImportCountry::Nl, "NL", dec!(200), false);
        let f = compute_tax(&it, Category::BNl, &rates, &Tariff::empty()).unwrap();
        assert_eq!(f.duty_rate, dec!(0.12));
        assert_eq!(f.duty_amount, dec!(24));
    }

    #[test]
    fn non_positive_value_is_rejected() {
        let rates = RateTable::builtin();
        for value in [Decimal::ZERO, dec!(-5)] {
            let it = item(ImportCountry::Nl, "DE", value, false);
            assert_eq!(
                compute_tax(&it, Category::ANl, &rates, &tariff()),
                Err(TaxError::Record(RecordError::InvalidValue {
                    line_item_id: "L1".to_string(),
                    value,
                }))
            );
        }
    }

    #[test]
    fn duty_and_vat_out_of_range_are_rejected() {
        let rates = RateTable::builtin();
        let it = item(ImportCountry::Nl, "NL", Decimal::MAX, false);
        assert!(matches!(
            compute_tax(&it, Category::BNl, &rates, &tariff()),
            Err(TaxError::Record(RecordError::MalformedInput(_)))
        ));
    }

    #[test]
    fn missing_destination_rate_is_a_rate_error() {
        let rates = RateTable::builtin();
        let it = item(ImportCountry::Nl, "FR", dec!(400), false);
        assert!(matches!(
            compute_tax(&it, Category::ANl, &rates, &tariff()),
            Err(TaxError::Rate(_))
        ));
    }
}
