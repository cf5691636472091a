use super::country::{Country, ImportCountry};
use super::error::RecordError;
use super::line_item::{LineItem, ReturnStatus};
use super::rates::RateTable;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// Tax-treatment category of a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Low-value consignment: no import VAT, VAT collected at sale
    Ioss,
    /// Cross-border sale of an NL import
    ANl,
    /// Domestic sale of an NL import
    BNl,
    /// Domestic sale of an IE import
    BIe,
    /// Return of a cross-border NL sale
    CNlX,
    /// Return of a domestic NL sale
    CNlD,
    /// Return of a domestic IE sale
    CIeD,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Ioss,
        Category::ANl,
        Category::BNl,
        Category::BIe,
        Category::CNlX,
        Category::CNlD,
        Category::CIeD,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Category::Ioss => "IOSS",
            Category::ANl => "A-NL",
            Category::BNl => "B-NL",
            Category::BIe => "B-IE",
            Category::CNlX => "C-NL-X",
            Category::CNlD => "C-NL-D",
            Category::CIeD => "C-IE-D",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Ioss => "IOSS low-value consignment",
            Category::ANl => "Cross-border sale, NL import",
            Category::BNl => "Domestic sale, NL import",
            Category::BIe => "Domestic sale, IE import",
            Category::CNlX => "Return of cross-border NL sale",
            Category::CNlD => "Return of domestic NL sale",
            Category::CIeD => "Return of domestic IE sale",
        }
    }

    /// Returns reclaimed through RGR
    pub fn is_rgr_return(&self) -> bool {
        matches!(self, Category::CNlX | Category::CNlD | Category::CIeD)
    }

    /// Import country implied by the category. IOSS covers both.
    pub fn import_country(&self) -> Option<ImportCountry> {
        match self {
            Category::Ioss => None,
            Category::ANl | Category::BNl | Category::CNlX | Category::CNlD => {
                Some(ImportCountry::Nl)
            }
            Category::BIe | Category::CIeD => Some(ImportCountry::Ie),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// Record-level checks that reject a line item whatever its value: return
/// quantities, a positive value, an EU destination and the IE domestic-only rule.
///
/// Returns the line value. Only lines passing these checks count toward their
/// consignment's value.
pub fn check_record(item: &LineItem) -> Result<Decimal, RecordError> {
    item.return_status()?;

    let value = item.parcel_value()?;
    if value <= Decimal::ZERO {
        return Err(RecordError::InvalidValue {
            line_item_id: item.line_item_id.clone(),
            value,
        });
    }

    if !item.destination.is_eu_member() {
        return Err(RecordError::UnclassifiableLineItem {
            line_item_id: item.line_item_id.clone(),
            reason: format!("destination {} is outside the EU", item.destination),
        });
    }

    if item.import_country == ImportCountry::Ie && item.destination != Country::IE {
        return Err(RecordError::InvalidIeDestination {
            line_item_id: item.line_item_id.clone(),
            destination: item.destination,
        });
    }
    Ok(value)
}

/// Assign a line item to exactly one category.
///
/// [`check_record`] runs first, so an IE import delivered outside IE is rejected
/// even when its consignment is low value. Then:
/// 1. consignment value at or below the import country's threshold → IOSS
/// 2. returned items go to the C family, delivered items to A/B
/// 3. import vs destination country picks cross-border or domestic
pub fn classify(item: &LineItem, rates: &RateTable) -> Result<Category, RecordError> {
    check_record(item)?;
    let status = item.return_status()?;

    let import = item.import_country;
    if item.consignment_value <= rates.threshold(import.country()) {
        return Ok(Category::Ioss);
    }

    let domestic = item.destination == import.country();
    match (import, status, domestic) {
        (ImportCountry::Nl, ReturnStatus::Delivered, false) => Ok(Category::ANl),
        (ImportCountry::Nl, ReturnStatus::Delivered, true) => Ok(Category::BNl),
        (ImportCountry::Nl, ReturnStatus::Returned, false) => Ok(Category::CNlX),
        (ImportCountry::Nl, ReturnStatus::Returned, true) => Ok(Category::CNlD),
        (ImportCountry::Ie, ReturnStatus::Delivered, _) => Ok(Category::BIe),
        (ImportCountry::Ie, ReturnStatus::Returned, _) => Ok(Category::CIeD),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    /// Single-line consignment fixture
    pub(crate) fn item(
        import: ImportCountry,
        destination: &str,
        value: Decimal,
        returned: bool,
    ) -> LineItem {
        LineItem {
            parcel_id: "P1".to_string(),
            line_item_id: "L1".to_string(),
            mrn: format!("24{}0000000000001", import),
            origin_country: Country::new("CN").unwrap(),
            import_country: import,
            destination: Country::new(destination).unwrap(),
            unit_price: value,
            quantity_imported: 1,
            quantity_returned: u32::from(returned),
            hs_code: "6104430090".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
            export_date: None,
            consignment_value: value,
        }
    }

    fn classify_builtin(item: &LineItem) -> Result<Category, RecordError> {
        classify(item, &RateTable::builtin())
    }

    #[test]
    fn low_value_is_ioss_regardless_of_route() {
        for (import, dest, returned) in [
            (ImportCountry::Nl, "DE", false),
            (ImportCountry::Nl, "NL", true),
            (ImportCountry::Ie, "IE", true),
        ] {
            let it = item(import, dest, dec!(100), returned);
            assert_eq!(classify_builtin(&it), Ok(Category::Ioss));
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let at = item(ImportCountry::Nl, "DE", dec!(150), false);
        assert_eq!(classify_builtin(&at), Ok(Category::Ioss));
        let above = item(ImportCountry::Nl, "DE", dec!(150.01), false);
        assert_eq!(classify_builtin(&above), Ok(Category::ANl));
    }

    #[test]
    fn threshold_uses_consignment_value() {
        // A cheap line in an expensive consignment is not IOSS
        let mut it = item(ImportCountry::Nl, "DE", dec!(40), false);
        it.consignment_value = dec!(400);
        assert_eq!(classify_builtin(&it), Ok(Category::ANl));
    }

    #[test]
    fn high_value_categories() {
        let cases = [
            (ImportCountry::Nl, "DE", false, Category::ANl),
            (ImportCountry::Nl, "NL", false, Category::BNl),
            (ImportCountry::Ie, "IE", false, Category::BIe),
            (ImportCountry::Nl, "ES", true, Category::CNlX),
            (ImportCountry::Nl, "NL", true, Category::CNlD),
            (ImportCountry::Ie, "IE", true, Category::CIeD),
        ];
        for (import, dest, returned, expected) in cases {
            let it = item(import, dest, dec!(400), returned);
            assert_eq!(classify_builtin(&it), Ok(expected), "{import} -> {dest}");
        }
    }

    #[test]
    fn ie_import_to_other_country_is_rejected_at_any_value() {
        for (value, returned) in [
            (dec!(400), false),
            (dec!(400), true),
            (dec!(100), false),
            (dec!(100), true),
        ] {
            let it = item(ImportCountry::Ie, "DE", value, returned);
            assert_eq!(
                classify_builtin(&it),
                Err(RecordError::InvalidIeDestination {
                    line_item_id: "L1".to_string(),
                    destination: Country::new("DE").unwrap(),
                })
            );
        }
    }

    #[test]
    fn non_eu_destination_is_unclassifiable() {
        let it = item(ImportCountry::Nl, "CH", dec!(400), false);
        assert!(matches!(
            classify_builtin(&it),
            Err(RecordError::UnclassifiableLineItem { .. })
        ));
    }

    #[test]
    fn non_positive_value_is_rejected() {
        for value in [dec!(0), dec!(-25)] {
            let it = item(ImportCountry::Nl, "DE", value, false);
            assert_eq!(
                classify_builtin(&it),
                Err(RecordError::InvalidValue {
                    line_item_id: "L1".to_string(),
                    value,
                })
            );
        }
    }

    #[test]
    fn value_out_of_range_is_malformed() {
        let mut it = item(ImportCountry::Nl, "DE", Decimal::MAX, false);
        it.quantity_imported = 2;
        assert!(matches!(
            check_record(&it),
            Err(RecordError::MalformedInput(_))
        ));
    }

    #[test]
    fn partial_return_is_rejected_before_classification() {
        let mut it = item(ImportCountry::Nl, "DE", dec!(400), false);
        it.quantity_imported = 4;
        it.quantity_returned = 2;
        assert!(matches!(
            classify_builtin(&it),
            Err(RecordError::UnsupportedPartialReturn { .. })
        ));
    }

    #[test]
    fn category_tags_and_import_countries() {
        let tags: Vec<&str> = Category::ALL.iter().map(|c| c.tag()).collect();
        assert_eq!(
            tags,
            vec!["IOSS", "A-NL", "B-NL", "B-IE", "C-NL-X", "C-NL-D", "C-IE-D"]
        );
        assert_eq!(Category::CIeD.import_country(), Some(ImportCountry::Ie));
        assert_eq!(Category::ANl.import_country(), Some(ImportCountry::Nl));
        assert_eq!(Category::Ioss.import_country(), None);
        assert!(Category::CNlX.is_rgr_return());
        assert!(!Category::Ioss.is_rgr_return());
    }

    fn arb_item() -> impl Strategy<Value = LineItem> {
        let dest = prop::sample::select(vec!["NL", "IE", "DE", "ES", "FR", "CH"]);
        let import = prop::sample::select(vec![ImportCountry::Nl, ImportCountry::Ie]);
        (import, dest, 1i64..100_000i64, 1u32..5, 0u32..6).prop_map(
            |(import, dest, cents, imported, returned)| {
                let mut it = item(import, dest, Decimal::new(cents, 2), false);
                it.quantity_imported = imported;
                it.quantity_returned = returned;
                it.consignment_value = it.parcel_value().unwrap();
                it
            },
        )
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(it in arb_item()) {
            let table = RateTable::builtin();
            prop_assert_eq!(classify(&it, &table), classify(&it.clone(), &table));
        }

        #[test]
        fn ie_imports_never_cross_border(it in arb_item()) {
            let table = RateTable::builtin();
            if it.import_country == ImportCountry::Ie {
                match classify(&it, &table) {
                    Ok(_) => prop_assert_eq!(it.destination, Country::IE),
                    Err(RecordError::InvalidIeDestination { .. }) => {
                        prop_assert!(it.destination != Country::IE)
                    }
                    Err(_) => {}
                }
            }
        }
    }
}
