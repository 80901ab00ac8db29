//! Versioned, immutable rate and allowance tables keyed by
//! (jurisdiction, tax year).

pub mod sa;
pub mod uk;

use crate::bands::{validate_bands, TaxBandDef};
use crate::error::CalcError;
use crate::year::{Jurisdiction, TaxYear};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, RwLock};

/// Rates, bands and allowances for one jurisdiction and one tax year.
///
/// Immutable once published; a correction is published as a new version of
/// the same (jurisdiction, year) rather than mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxYearConfig {
    pub jurisdiction: Jurisdiction,
    pub tax_year: TaxYear,
    /// Assigned by the repository on publish; starts at 1.
    #[serde(default)]
    pub version: u32,
    pub rules: JurisdictionRules,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JurisdictionRules {
    Uk(UkRules),
    Sa(SaRules),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkRules {
    #[schemars(with = "f64")]
    pub personal_allowance: Decimal,
    /// Income above this tapers the allowance by £1 per £2.
    #[schemars(with = "f64")]
    pub allowance_taper_threshold: Decimal,
    /// Bands over taxable (post-allowance) income.
    pub income_tax_bands: Vec<TaxBandDef>,
    pub scottish_income_tax_bands: Vec<TaxBandDef>,
    pub ni: NiThresholds,
    #[schemars(with = "f64")]
    pub cgt_annual_exemption: Decimal,
    pub cgt_rates: UkCgtRates,
    #[schemars(with = "f64")]
    pub dividend_allowance: Decimal,
    /// Dividend rates over the same band bounds as the income table.
    pub dividend_bands: Vec<TaxBandDef>,
}

/// National Insurance thresholds and rates (annual figures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NiThresholds {
    #[schemars(with = "f64")]
    pub class1_primary_threshold: Decimal,
    #[schemars(with = "f64")]
    pub class1_upper_limit: Decimal,
    #[schemars(with = "f64")]
    pub class1_main_rate: Decimal,
    #[schemars(with = "f64")]
    pub class1_upper_rate: Decimal,
    #[schemars(with = "f64")]
    pub class2_weekly_rate: Decimal,
    #[schemars(with = "f64")]
    pub class2_small_profits_threshold: Decimal,
    #[schemars(with = "f64")]
    pub class4_lower_limit: Decimal,
    #[schemars(with = "f64")]
    pub class4_upper_limit: Decimal,
    #[schemars(with = "f64")]
    pub class4_main_rate: Decimal,
    #[schemars(with = "f64")]
    pub class4_upper_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkCgtRates {
    #[schemars(with = "f64")]
    pub property_basic: Decimal,
    #[schemars(with = "f64")]
    pub property_higher: Decimal,
    #[schemars(with = "f64")]
    pub other_basic: Decimal,
    #[schemars(with = "f64")]
    pub other_higher: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaRules {
    pub income_tax_bands: Vec<TaxBandDef>,
    pub rebates: SaRebates,
    #[schemars(with = "f64")]
    pub cgt_annual_exclusion: Decimal,
    #[schemars(with = "f64")]
    pub cgt_inclusion_rate: Decimal,
    #[schemars(with = "f64")]
    pub dividend_tax_rate: Decimal,
    /// Annual local-interest exemption before interest enters ordinary income.
    #[schemars(with = "f64")]
    pub interest_exemption: Decimal,
}

/// Age-banded rebates subtracted from gross income tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaRebates {
    #[schemars(with = "f64")]
    pub primary: Decimal,
    #[schemars(with = "f64")]
    pub secondary: Decimal,
    #[schemars(with = "f64")]
    pub tertiary: Decimal,
    pub secondary_age: u32,
    pub tertiary_age: u32,
}

impl TaxYearConfig {
    /// Publish-time validation: consistent jurisdiction tag, well-formed band
    /// tables, sane rates and allowances.
    pub fn validate(&self) -> Result<(), CalcError> {
        self.tax_year.validate()?;
        match (&self.rules, self.jurisdiction) {
            (JurisdictionRules::Uk(rules), Jurisdiction::Uk) => rules.validate(),
            (JurisdictionRules::Sa(rules), Jurisdiction::Sa) => rules.validate(),
            _ => Err(CalcError::JurisdictionMismatch {
                jurisdiction: self.jurisdiction,
                tax_year: self.tax_year,
            }),
        }
    }

    pub fn uk_rules(&self) -> Result<&UkRules, CalcError> {
        match &self.rules {
            JurisdictionRules::Uk(rules) => Ok(rules),
            JurisdictionRules::Sa(_) => Err(CalcError::JurisdictionMismatch {
                jurisdiction: self.jurisdiction,
                tax_year: self.tax_year,
            }),
        }
    }

    pub fn sa_rules(&self) -> Result<&SaRules, CalcError> {
        match &self.rules {
            JurisdictionRules::Sa(rules) => Ok(rules),
            JurisdictionRules::Uk(_) => Err(CalcError::JurisdictionMismatch {
                jurisdiction: self.jurisdiction,
                tax_year: self.tax_year,
            }),
        }
    }
}

impl UkRules {
    fn validate(&self) -> Result<(), CalcError> {
        validate_bands(&self.income_tax_bands)?;
        validate_bands(&self.scottish_income_tax_bands)?;
        validate_bands(&self.dividend_bands)?;
        for amount in [
            self.personal_allowance,
            self.allowance_taper_threshold,
            self.cgt_annual_exemption,
            self.dividend_allowance,
        ] {
            if amount < Decimal::ZERO {
                return Err(CalcError::InvalidInput(
                    "negative allowance in UK configuration".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl SaRules {
    fn validate(&self) -> Result<(), CalcError> {
        validate_bands(&self.income_tax_bands)?;
        if self.cgt_inclusion_rate < Decimal::ZERO || self.cgt_inclusion_rate > Decimal::ONE {
            return Err(CalcError::InvalidInput(
                "SA inclusion rate outside 0..=1".to_string(),
            ));
        }
        if self.dividend_tax_rate < Decimal::ZERO || self.dividend_tax_rate > Decimal::ONE {
            return Err(CalcError::InvalidInput(
                "SA dividend tax rate outside 0..=1".to_string(),
            ));
        }
        Ok(())
    }
}

/// All published config versions, ascending per key; the last entry is
/// current. The whole map is replaced on publish, never mutated.
#[derive(Debug, Default, Clone)]
struct Snapshot {
    configs: HashMap<(Jurisdiction, TaxYear), Vec<Arc<TaxYearConfig>>>,
}

/// Repository of published tax year configurations.
///
/// Readers clone an `Arc` to the current snapshot, so a concurrent publish
/// never changes the tables an in-flight calculation sees.
#[derive(Debug)]
pub struct ConfigRepository {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl ConfigRepository {
    pub fn empty() -> Self {
        ConfigRepository {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Repository pre-loaded with the built-in published years.
    pub fn builtin() -> Self {
        let repo = ConfigRepository::empty();
        for config in uk::published().into_iter().chain(sa::published()) {
            // Built-in tables are validated by tests; a broken one is a bug.
            if let Err(err) = repo.publish(config) {
                unreachable!("built-in configuration rejected: {err}");
            }
        }
        repo
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Latest published configuration for (jurisdiction, year).
    pub fn get(
        &self,
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    ) -> Result<Arc<TaxYearConfig>, CalcError> {
        self.current()
            .configs
            .get(&(jurisdiction, tax_year))
            .and_then(|versions| versions.last().cloned())
            .ok_or(CalcError::ConfigNotFound {
                jurisdiction,
                tax_year,
            })
    }

    /// A specific superseded (or current) version, for reproducing
    /// historical calculations.
    pub fn get_version(
        &self,
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        version: u32,
    ) -> Result<Arc<TaxYearConfig>, CalcError> {
        let snapshot = self.current();
        let versions = snapshot.configs.get(&(jurisdiction, tax_year)).ok_or(
            CalcError::ConfigNotFound {
                jurisdiction,
                tax_year,
            },
        )?;
        versions
            .iter()
            .find(|c| c.version == version)
            .cloned()
            .ok_or(CalcError::ConfigVersionNotFound {
                jurisdiction,
                tax_year,
                version,
            })
    }

    /// Validate and publish a configuration, superseding any current version
    /// for the same (jurisdiction, year). Returns the assigned version.
    ///
    /// The snapshot is rebuilt and swapped in one step; concurrent readers
    /// keep whichever snapshot they already hold.
    pub fn publish(&self, mut config: TaxYearConfig) -> Result<u32, CalcError> {
        config.validate()?;
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = Snapshot::clone(&**guard);
        let versions = next
            .configs
            .entry((config.jurisdiction, config.tax_year))
            .or_default();
        let version = versions.last().map(|c| c.version).unwrap_or(0) + 1;
        config.version = version;
        log::debug!(
            "publishing {} {} v{}",
            config.jurisdiction,
            config.tax_year,
            version
        );
        versions.push(Arc::new(config));
        *guard = Arc::new(next);
        Ok(version)
    }

    /// Publish extra configurations from a JSON array.
    pub fn load_json<R: Read>(&self, reader: R) -> Result<usize, CalcError> {
        let configs: Vec<TaxYearConfig> = serde_json::from_reader(reader)
            .map_err(|err| CalcError::InvalidInput(format!("config JSON: {err}")))?;
        let count = configs.len();
        for config in configs {
            self.publish(config)?;
        }
        Ok(count)
    }

    /// (jurisdiction, year, current version) for everything published.
    pub fn published(&self) -> Vec<(Jurisdiction, TaxYear, u32)> {
        let snapshot = self.current();
        let mut entries: Vec<_> = snapshot
            .configs
            .iter()
            .filter_map(|((jurisdiction, year), versions)| {
                versions.last().map(|c| (*jurisdiction, *year, c.version))
            })
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builtin_years_are_published() {
        let repo = ConfigRepository::builtin();
        for year in [2024, 2025, 2026] {
            assert!(repo.get(Jurisdiction::Uk, TaxYear(year)).is_ok());
            assert!(repo.get(Jurisdiction::Sa, TaxYear(year)).is_ok());
        }
    }

    #[test]
    fn unpublished_year_is_config_not_found() {
        let repo = ConfigRepository::builtin();
        assert_eq!(
            repo.get(Jurisdiction::Uk, TaxYear(1999)).unwrap_err(),
            CalcError::ConfigNotFound {
                jurisdiction: Jurisdiction::Uk,
                tax_year: TaxYear(1999),
            }
        );
    }

    #[test]
    fn builtin_configs_validate() {
        for config in uk::published().into_iter().chain(sa::published()) {
            config.validate().unwrap();
        }
    }

    #[test]
    fn publish_supersedes_and_retains_versions() {
        let repo = ConfigRepository::builtin();
        let original = repo.get(Jurisdiction::Uk, TaxYear(2025)).unwrap();
        assert_eq!(original.version, 1);

        let mut correction = TaxYearConfig::clone(&original);
        if let JurisdictionRules::Uk(rules) = &mut correction.rules {
            rules.cgt_annual_exemption = dec!(2000);
        }
        let version = repo.publish(correction).unwrap();
        assert_eq!(version, 2);

        let current = repo.get(Jurisdiction::Uk, TaxYear(2025)).unwrap();
        assert_eq!(current.version, 2);

        // The superseded table is still retrievable, unchanged.
        let pinned = repo
            .get_version(Jurisdiction::Uk, TaxYear(2025), 1)
            .unwrap();
        assert_eq!(pinned.uk_rules().unwrap().cgt_annual_exemption, dec!(3000));
    }

    #[test]
    fn snapshot_isolation_across_publish() {
        let repo = ConfigRepository::builtin();
        let held = repo.get(Jurisdiction::Sa, TaxYear(2025)).unwrap();
        let mut correction = TaxYearConfig::clone(&held);
        if let JurisdictionRules::Sa(rules) = &mut correction.rules {
            rules.cgt_annual_exclusion = dec!(50000);
        }
        repo.publish(correction).unwrap();
        // The Arc obtained before the publish still sees the old value.
        assert_eq!(
            held.sa_rules().unwrap().cgt_annual_exclusion,
            dec!(40000)
        );
    }

    #[test]
    fn publish_rejects_mismatched_jurisdiction() {
        let repo = ConfigRepository::empty();
        let sa = sa::published().remove(0);
        let broken = TaxYearConfig {
            jurisdiction: Jurisdiction::Uk,
            ..sa
        };
        assert!(matches!(
            repo.publish(broken),
            Err(CalcError::JurisdictionMismatch { .. })
        ));
    }

    #[test]
    fn publish_rejects_bad_band_table() {
        let repo = ConfigRepository::empty();
        let mut config = uk::published().remove(0);
        if let JurisdictionRules::Uk(rules) = &mut config.rules {
            rules.income_tax_bands[0].upper = Some(dec!(10000));
        }
        assert!(matches!(
            repo.publish(config),
            Err(CalcError::InvalidBandTable(_))
        ));
    }

    #[test]
    fn load_json_round_trip() {
        let repo = ConfigRepository::empty();
        let configs = vec![uk::published().remove(0)];
        let json = serde_json::to_vec(&configs).unwrap();
        let count = repo.load_json(json.as_slice()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(repo.published().len(), 1);
    }
}
