use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid reporting period '{0}' (expected e.g. \"Q3 2024\" or \"2024-Q3\")")]
pub struct PeriodError(String);

/// Reporting quarter attached to every aggregate row.
/// Used only as a grouping key; no calendar logic hangs off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportingPeriod {
    pub year: i32,
    pub quarter: u8,
}

impl ReportingPeriod {
    pub fn new(year: i32, quarter: u8) -> Result<Self, PeriodError> {
        if (1..=4).contains(&quarter) && (1000..=9999).contains(&year) {
            Ok(ReportingPeriod { year, quarter })
        } else {
            Err(PeriodError(format!("Q{quarter} {year}")))
        }
    }

    /// Display as "Q3 2024"
    pub fn display(&self) -> String {
        format!("Q{} {}", self.quarter, self.year)
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl FromStr for ReportingPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PeriodError(s.to_string());
        let normalized = s.trim().to_uppercase();

        // "Q3 2024" / "Q3-2024" or "2024-Q3" / "2024 Q3" / "2024Q3"
        let (quarter, year) = if let Some(rest) = normalized.strip_prefix('Q') {
            let (q, y) = rest.split_at(rest.find([' ', '-', '/']).ok_or_else(err)?);
            (q.to_string(), y.trim_start_matches([' ', '-', '/']).to_string())
        } else {
            let pos = normalized.find('Q').ok_or_else(err)?;
            let (y, q) = normalized.split_at(pos);
            (
                q.trim_start_matches('Q').to_string(),
                y.trim_end_matches([' ', '-', '/']).to_string(),
            )
        };

        let quarter: u8 = quarter.trim().parse().map_err(|_| err())?;
        let year: i32 = year.trim().parse().map_err(|_| err())?;
        ReportingPeriod::new(year, quarter).map_err(|_| err())
    }
}
