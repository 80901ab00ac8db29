use crate::error::CalcError;
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Taxing jurisdiction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Jurisdiction {
    Uk,
    Sa,
}

impl Jurisdiction {
    /// Stable lowercase key used in serialized maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Jurisdiction::Uk => "uk",
            Jurisdiction::Sa => "sa",
        }
    }

    pub fn from_str(s: &str) -> Option<Jurisdiction> {
        match s.to_lowercase().as_str() {
            "uk" => Some(Jurisdiction::Uk),
            "sa" | "za" => Some(Jurisdiction::Sa),
            _ => None,
        }
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Jurisdiction::Uk => write!(f, "UK"),
            Jurisdiction::Sa => write!(f, "SA"),
        }
    }
}

/// Tax year, named by its end year (2025 = the 2024/25 year).
///
/// The UK year runs 6 April to 5 April; the SA year of assessment runs
/// 1 March to the end of February.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct TaxYear(pub i32);

impl TaxYear {
    /// Tax year containing the given date.
    pub fn from_date(jurisdiction: Jurisdiction, date: NaiveDate) -> Self {
        let year = date.year();
        match jurisdiction {
            Jurisdiction::Uk => {
                if date >= NaiveDate::from_ymd_opt(year, 4, 6).unwrap() {
                    TaxYear(year + 1)
                } else {
                    TaxYear(year)
                }
            }
            Jurisdiction::Sa => {
                if date >= NaiveDate::from_ymd_opt(year, 3, 1).unwrap() {
                    TaxYear(year + 1)
                } else {
                    TaxYear(year)
                }
            }
        }
    }

    pub fn start_date(&self, jurisdiction: Jurisdiction) -> NaiveDate {
        match jurisdiction {
            Jurisdiction::Uk => NaiveDate::from_ymd_opt(self.0 - 1, 4, 6).unwrap(),
            Jurisdiction::Sa => NaiveDate::from_ymd_opt(self.0 - 1, 3, 1).unwrap(),
        }
    }

    pub fn end_date(&self, jurisdiction: Jurisdiction) -> NaiveDate {
        match jurisdiction {
            Jurisdiction::Uk => NaiveDate::from_ymd_opt(self.0, 4, 5).unwrap(),
            // Day before 1 March: 28 or 29 February depending on leap year.
            Jurisdiction::Sa => NaiveDate::from_ymd_opt(self.0, 3, 1)
                .unwrap()
                .pred_opt()
                .unwrap(),
        }
    }

    /// Number of days in this jurisdiction's tax year (365 or 366).
    pub fn days_in_year(&self, jurisdiction: Jurisdiction) -> u32 {
        let span = self.end_date(jurisdiction) - self.start_date(jurisdiction);
        span.num_days() as u32 + 1
    }

    /// Display as "2024/25" format.
    pub fn display(&self) -> String {
        format!("{}/{:02}", self.0 - 1, self.0 % 100)
    }

    /// Reject years that cannot correspond to a published configuration.
    pub fn validate(&self) -> Result<(), CalcError> {
        // UK self assessment era onwards; generous upper bound.
        if !(1973..=2100).contains(&self.0) {
            return Err(CalcError::InvalidTaxYear(self.0));
        }
        Ok(())
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uk_year_boundaries() {
        let apr5 = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        let apr6 = NaiveDate::from_ymd_opt(2024, 4, 6).unwrap();
        assert_eq!(TaxYear::from_date(Jurisdiction::Uk, apr5), TaxYear(2024));
        assert_eq!(TaxYear::from_date(Jurisdiction::Uk, apr6), TaxYear(2025));
    }

    #[test]
    fn sa_year_boundaries() {
        let feb29 = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let mar1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(TaxYear::from_date(Jurisdiction::Sa, feb29), TaxYear(2024));
        assert_eq!(TaxYear::from_date(Jurisdiction::Sa, mar1), TaxYear(2025));
    }

    #[test]
    fn sa_leap_year_has_366_days() {
        // 1 Mar 2023 - 29 Feb 2024
        assert_eq!(TaxYear(2024).days_in_year(Jurisdiction::Sa), 366);
        // 1 Mar 2024 - 28 Feb 2025
        assert_eq!(TaxYear(2025).days_in_year(Jurisdiction::Sa), 365);
    }

    #[test]
    fn uk_year_day_counts() {
        // 6 Apr 2023 - 5 Apr 2024 contains 29 Feb 2024.
        assert_eq!(TaxYear(2024).days_in_year(Jurisdiction::Uk), 366);
        assert_eq!(TaxYear(2025).days_in_year(Jurisdiction::Uk), 365);
    }

    #[test]
    fn display_format() {
        assert_eq!(TaxYear(2025).display(), "2024/25");
        assert_eq!(TaxYear(2024).display(), "2023/24");
    }

    #[test]
    fn year_validation() {
        assert!(TaxYear(2025).validate().is_ok());
        assert_eq!(
            TaxYear(190).validate(),
            Err(CalcError::InvalidTaxYear(190))
        );
        assert_eq!(
            TaxYear(2500).validate(),
            Err(CalcError::InvalidTaxYear(2500))
        );
    }

    #[test]
    fn jurisdiction_from_str() {
        assert_eq!(Jurisdiction::from_str("uk"), Some(Jurisdiction::Uk));
        assert_eq!(Jurisdiction::from_str("SA"), Some(Jurisdiction::Sa));
        assert_eq!(Jurisdiction::from_str("za"), Some(Jurisdiction::Sa));
        assert_eq!(Jurisdiction::from_str("fr"), None);
    }
}
