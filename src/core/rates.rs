use super::country::Country;
use super::error::RateError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Resolved rates for one country
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBundle {
    pub vat_rate: Decimal,
    pub duty_rate: Decimal,
    /// Company commission on reclaimed amounts
    pub commission_rate: Decimal,
    /// Company share of reclaimed duty under the company-share policy
    pub duty_revenue_share: Decimal,
    /// Consignment value at or below which the IOSS scheme applies
    pub threshold: Decimal,
    /// Whether duty paid on import can be recovered through an RGR claim.
    /// Kept as a flag rather than a zero duty rate so "not reclaimable" is never
    /// confused with "not configured".
    pub duty_reclaimable: bool,
}

/// Values applied to every country that does not override them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RateDefaults {
    #[schemars(with = "f64")]
    pub duty_rate: Decimal,
    #[schemars(with = "f64")]
    pub commission_rate: Decimal,
    #[schemars(with = "f64")]
    pub duty_revenue_share: Decimal,
    #[schemars(with = "f64")]
    pub threshold: Decimal,
    pub duty_reclaimable: bool,
}

impl Default for RateDefaults {
    fn default() -> Self {
        RateDefaults {
            duty_rate: Decimal::ZERO,
            commission_rate: dec!(0.20),
            duty_revenue_share: dec!(0.80),
            threshold: dec!(150),
            duty_reclaimable: true,
        }
    }
}

/// Per-country entry. The VAT rate is mandatory; everything else falls back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CountryRates {
    #[schemars(with = "f64")]
    pub vat_rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    pub duty_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    pub commission_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    pub duty_revenue_share: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    pub threshold: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duty_reclaimable: Option<bool>,
}

impl CountryRates {
    pub fn vat(vat_rate: Decimal) -> Self {
        CountryRates {
            vat_rate,
            duty_rate: None,
            commission_rate: None,
            duty_revenue_share: None,
            threshold: None,
            duty_reclaimable: None,
        }
    }
}

/// Country-indexed rate table, loaded once per run and read-only afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RateTable {
    #[serde(default)]
    pub defaults: RateDefaults,
    pub countries: BTreeMap<Country, CountryRates>,
}

impl Default for RateTable {
    fn default() -> Self {
        RateTable::builtin()
    }
}

impl RateTable {
    /// Built-in table for the countries the parcel data currently ships to
    pub fn builtin() -> Self {
        let vat = [
            ("DE", dec!(0.19)),
            ("PT", dec!(0.23)),
            ("ES", dec!(0.21)),
            ("SE", dec!(0.25)),
            ("NL", dec!(0.21)),
            ("DK", dec!(0.25)),
            ("FI", dec!(0.255)),
            ("IT", dec!(0.22)),
            ("AT", dec!(0.20)),
            ("BE", dec!(0.21)),
            ("EE", dec!(0.22)),
        ];
        let mut countries: BTreeMap<Country, CountryRates> = vat
            .iter()
            .filter_map(|(code, rate)| Country::new(code).ok().map(|c| (c, CountryRates::vat(*rate))))
            .collect();

        // Ireland: higher VAT and commission, duty never recoverable
        countries.insert(
            Country::IE,
            CountryRates {
                vat_rate: dec!(0.23),
                duty_rate: None,
                commission_rate: Some(dec!(0.30)),
                duty_revenue_share: Some(dec!(0.70)),
                threshold: None,
                duty_reclaimable: Some(false),
            },
        );

        RateTable {
            defaults: RateDefaults::default(),
            countries,
        }
    }

    /// Read a rate table from JSON and check it
    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<RateTable> {
        let table: RateTable = serde_json::from_reader(reader)?;
        table.validate()?;
        Ok(table)
    }

    /// Rates for a country. Fails for non-EU codes and for countries with no VAT rate.
    pub fn rates(&self, country: Country) -> Result<RateBundle, RateError> {
        if !country.is_eu_member() {
            return Err(RateError::UnknownCountry(country));
        }
        let entry = self
            .countries
            .get(&country)
            .ok_or(RateError::UnknownCountry(country))?;
        let d = &self.defaults;
        Ok(RateBundle {
            vat_rate: entry.vat_rate,
            duty_rate: entry.duty_rate.unwrap_or(d.duty_rate),
            commission_rate: entry.commission_rate.unwrap_or(d.commission_rate),
            duty_revenue_share: entry.duty_revenue_share.unwrap_or(d.duty_revenue_share),
            threshold: entry.threshold.unwrap_or(d.threshold),
            duty_reclaimable: entry.duty_reclaimable.unwrap_or(d.duty_reclaimable),
        })
    }

    /// IOSS threshold for a country; falls back to the default threshold
    /// even when the country has no entry.
    pub fn threshold(&self, country: Country) -> Decimal {
        self.countries
            .get(&country)
            .and_then(|c| c.threshold)
            .unwrap_or(self.defaults.threshold)
    }

    /// Check every configured rate is a fraction in [0, 1] and thresholds are positive
    pub fn validate(&self) -> Result<(), RateError> {
        let d = &self.defaults;
        check_fraction("defaults", "duty_rate", d.duty_rate)?;
        check_fraction("defaults", "commission_rate", d.commission_rate)?;
        check_fraction("defaults", "duty_revenue_share", d.duty_revenue_share)?;
        check_positive("defaults", "threshold", d.threshold)?;

        for (country, entry) in &self.countries {
            let scope = country.to_string();
            if !country.is_eu_member() {
                return Err(RateError::UnknownCountry(*country));
            }
            check_fraction(&scope, "vat_rate", entry.vat_rate)?;
            let optional = [
                ("duty_rate", entry.duty_rate),
                ("commission_rate", entry.commission_rate),
                ("duty_revenue_share", entry.duty_revenue_share),
            ];
            for (field, value) in optional {
                if let Some(value) = value {
                    check_fraction(&scope, field, value)?;
                }
            }
            if let Some(threshold) = entry.threshold {
                check_positive(&scope, "threshold", threshold)?;
            }
        }
        Ok(())
    }

    /// Require rates for every listed country, failing on the first gap
    pub fn require<I>(&self, countries: I) -> Result<(), RateError>
    where
        I: IntoIterator<Item = Country>,
    {
        for country in countries {
            self.rates(country)?;
        }
        Ok(())
    }
}

fn check_fraction(scope: &str, field: &'static str, value: Decimal) -> Result<(), RateError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(RateError::InvalidRate {
            scope: scope.to_string(),
            field,
            value,
        });
    }
    Ok(())
}

fn check_positive(scope: &str, field: &'static str, value: Decimal) -> Result<(), RateError> {
    if value <= Decimal::ZERO {
        return Err(RateError::InvalidRate {
            scope: scope.to_string(),
            field,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country(code: &str) -> Country {
        Country::new(code).unwrap()
    }

    #[test]
    fn defaults_apply_without_override() {
        let table = RateTable::builtin();
        let de = table.rates(country("DE")).unwrap();
        assert_eq!(de.vat_rate, dec!(0.19));
        assert_eq!(de.commission_rate, dec!(0.20));
        assert_eq!(de.duty_revenue_share, dec!(0.80));
        assert_eq!(de.threshold, dec!(150));
        assert!(de.duty_reclaimable);
    }

    #[test]
    fn ireland_override() {
        let ie = RateTable::builtin().rates(Country::IE).unwrap();
        assert_eq!(ie.vat_rate, dec!(0.23));
        assert_eq!(ie.commission_rate, dec!(0.30));
        assert_eq!(ie.duty_revenue_share, dec!(0.70));
        assert!(!ie.duty_reclaimable);
    }

    #[test]
    fn ireland_is_the_only_non_reclaimable_country() {
        let table = RateTable::builtin();
        let non_reclaimable: Vec<Country> = table
            .countries
            .keys()
            .copied()
            .filter(|c| !table.rates(*c).unwrap().duty_reclaimable)
            .collect();
        assert_eq!(non_reclaimable, vec![Country::IE]);
    }

    #[test]
    fn unknown_country_for_non_member() {
        let table = RateTable::builtin();
        assert_eq!(
            table.rates(country("CH")),
            Err(RateError::UnknownCountry(country("CH")))
        );
    }

    #[test]
    fn unknown_country_for_member_without_vat_rate() {
        // France is a member state but the built-in table has no VAT rate for it
        let table = RateTable::builtin();
        assert_eq!(
            table.rates(country("FR")),
            Err(RateError::UnknownCountry(country("FR")))
        );
        assert!(table.require([Country::NL, country("FR")]).is_err());
        assert!(table.require([Country::NL, Country::IE]).is_ok());
    }

    #[test]
    fn threshold_falls_back_to_default() {
        let table = RateTable::builtin();
        assert_eq!(table.threshold(country("FR")), dec!(150));
        assert_eq!(table.threshold(Country::NL), dec!(150));
    }

    #[test]
    fn read_json_table() {
        let json = r#"{
            "defaults": {
                "duty_rate": 0.037,
                "commission_rate": 0.2,
                "duty_revenue_share": 0.8,
                "threshold": 150,
                "duty_reclaimable": true
            },
            "countries": {
                "NL": { "vat_rate": 0.21 },
                "DE": { "vat_rate": 0.19 },
                "IE": { "vat_rate": 0.23, "commission_rate": 0.3, "duty_reclaimable": false }
            }
        }"#;
        let table = RateTable::read_json(json.as_bytes()).unwrap();
        let nl = table.rates(Country::NL).unwrap();
        assert_eq!(nl.duty_rate, dec!(0.037));
        let ie = table.rates(Country::IE).unwrap();
        assert_eq!(ie.commission_rate, dec!(0.3));
        assert!(!ie.duty_reclaimable);
    }

    #[test]
    fn read_json_rejects_out_of_range_rate() {
        let json = r#"{ "countries": { "NL": { "vat_rate": 21 } } }"#;
        assert!(RateTable::read_json(json.as_bytes()).is_err());
    }

    #[test]
    fn read_json_rejects_non_member_entry() {
        let json = r#"{ "countries": { "CH": { "vat_rate": 0.081 } } }"#;
        assert!(RateTable::read_json(json.as_bytes()).is_err());
    }

    #[test]
    fn builtin_table_is_valid() {
        assert_eq!(RateTable::builtin().validate(), Ok(()));
    }
}
