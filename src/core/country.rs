use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EU member states (ISO 3166-1 alpha-2, Greece as GR)
pub const EU_MEMBER_STATES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU", "IE", "IT",
    "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CountryError {
    #[error("invalid country code '{0}'")]
    InvalidCode(String),
    #[error("MRN '{0}' does not carry an import country prefix")]
    MissingMrnPrefix(String),
    #[error("import country {0} is not handled (expected NL or IE)")]
    UnsupportedImportCountry(Country),
}

/// Two-letter uppercase country code
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Country([u8; 2]);

impl Country {
    pub const NL: Country = Country(*b"NL");
    pub const IE: Country = Country(*b"IE");

    pub fn new(code: &str) -> Result<Self, CountryError> {
        let code = code.trim();
        match code.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Ok(Country([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => Err(CountryError::InvalidCode(code.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII letters by construction
        std::str::from_utf8(&self.0).unwrap_or("??")
    }

    pub fn is_eu_member(&self) -> bool {
        EU_MEMBER_STATES.contains(&self.as_str())
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Country({})", self.as_str())
    }
}

impl FromStr for Country {
    type Err = CountryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::new(s)
    }
}

impl TryFrom<String> for Country {
    type Error = CountryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Country::new(&value)
    }
}

impl From<Country> for String {
    fn from(country: Country) -> Self {
        country.as_str().to_string()
    }
}

impl JsonSchema for Country {
    fn schema_name() -> String {
        "Country".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Member state where the parcel cleared customs. Only NL and IE imports are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ImportCountry {
    Nl,
    Ie,
}

impl ImportCountry {
    pub fn country(self) -> Country {
        match self {
            ImportCountry::Nl => Country::NL,
            ImportCountry::Ie => Country::IE,
        }
    }

    /// Read the import country from an MRN: two year digits followed by the
    /// country code, e.g. `24NL7K3M0F2A9B1C8`.
    pub fn from_mrn(mrn: &str) -> Result<Self, CountryError> {
        let mrn = mrn.trim();
        let prefix = mrn
            .get(2..4)
            .filter(|_| mrn.as_bytes().iter().take(2).all(u8::is_ascii_digit))
            .ok_or_else(|| CountryError::MissingMrnPrefix(mrn.to_string()))?;
        let country =
            Country::new(prefix).map_err(|_| CountryError::MissingMrnPrefix(mrn.to_string()))?;
        ImportCountry::try_from(country)
    }
}

impl TryFrom<Country> for ImportCountry {
    type Error = CountryError;

    fn try_from(country: Country) -> Result<Self, Self::Error> {
        match country {
            Country::NL => Ok(ImportCountry::Nl),
            Country::IE => Ok(ImportCountry::Ie),
            other => Err(CountryError::UnsupportedImportCountry(other)),
        }
    }
}

impl fmt::Display for ImportCountry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.country().fmt(f)
    }
}
