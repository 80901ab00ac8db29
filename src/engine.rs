//! Composite tax orchestration: pulls inputs, drives the calculators in
//! dependency order, aggregates liability net of relief, and writes one
//! audit record per calculation.

use crate::audit::{audit_record_id, AuditStore, CalculationAuditRecord};
use crate::config::ConfigRepository;
use crate::dta::{
    residence_tie_breaker, DtaReliefCalculator, DtaResidenceResult, ReliefCalculation,
    TreatyResidence,
};
use crate::error::CalcError;
use crate::income::{sa_totals, uk_totals, IncomeItem, IncomeScope};
use crate::residency::{determine_residency, ResidencyDetermination, ResidencyFacts};
use crate::tax::{SaLiability, SaTaxCalculator, UkLiability, UkTaxCalculator};
use crate::warnings::Warning;
use crate::year::{Jurisdiction, TaxYear};
use chrono::Utc;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_true() -> bool {
    true
}

/// Input contract for one composite calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxCalculationRequest {
    pub tax_year: TaxYear,
    pub age: u32,
    /// Scottish income tax bands apply (a residency flag, not an income flag).
    #[serde(default)]
    pub scottish_taxpayer: bool,
    /// Supplied exchange rate; no live conversion happens here.
    #[schemars(with = "f64")]
    pub zar_per_gbp: Decimal,
    #[serde(default = "default_true")]
    pub assess_uk: bool,
    #[serde(default = "default_true")]
    pub assess_sa: bool,
    pub income: Vec<IncomeItem>,
    pub residency: ResidencyFacts,
    /// Pin config versions ("uk"/"sa" keys) to reproduce a historical
    /// calculation after later corrections were published.
    #[serde(default)]
    pub pinned_versions: Option<BTreeMap<String, u32>>,
}

/// One jurisdiction's assessed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkAssessment {
    pub scope: IncomeScope,
    pub liability: UkLiability,
    #[schemars(with = "f64")]
    pub relief_applied: Decimal,
    /// Total tax net of relief, floored at zero.
    #[schemars(with = "f64")]
    pub total_due: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaAssessment {
    pub scope: IncomeScope,
    pub liability: SaLiability,
    #[schemars(with = "f64")]
    pub relief_applied: Decimal,
    #[schemars(with = "f64")]
    pub total_due: Decimal,
}

/// Output contract. Identical requests against pinned config versions
/// serialize identically (the determinism contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxCalculationResult {
    pub tax_year: TaxYear,
    pub engine_version: String,
    pub residency: ResidencyDetermination,
    pub treaty_residence: DtaResidenceResult,
    pub uk: Option<UkAssessment>,
    pub sa: Option<SaAssessment>,
    pub relief: Vec<ReliefCalculation>,
    pub warnings: Vec<Warning>,
    pub audit_record_id: String,
}

/// External income ledger; owns income storage, this crate only reads.
pub trait IncomeLedger {
    fn list_income(&self, user_id: &str, tax_year: TaxYear) -> anyhow::Result<Vec<IncomeItem>>;
}

/// External provider of day counts and tie facts.
pub trait ResidencyFactsProvider {
    fn get_residency_facts(
        &self,
        user_id: &str,
        tax_year: TaxYear,
    ) -> anyhow::Result<ResidencyFacts>;
}

/// Caller-supplied taxpayer options for ledger-driven calculations.
#[derive(Debug, Clone, Copy)]
pub struct TaxpayerProfile {
    pub age: u32,
    pub scottish_taxpayer: bool,
    pub zar_per_gbp: Decimal,
}

/// The composite orchestrator. All calculation state is per-call; the only
/// shared resources are the config snapshots and the audit store.
#[derive(Debug)]
pub struct TaxEngine {
    repository: Arc<ConfigRepository>,
    audit: AuditStore,
}

impl TaxEngine {
    pub fn new(repository: Arc<ConfigRepository>) -> Self {
        TaxEngine {
            repository,
            audit: AuditStore::new(),
        }
    }

    /// Engine over the built-in published configurations.
    pub fn with_builtin_config() -> Self {
        TaxEngine::new(Arc::new(ConfigRepository::builtin()))
    }

    pub fn repository(&self) -> &Arc<ConfigRepository> {
        &self.repository
    }

    /// Exposed collaborator interface for residency-only queries.
    pub fn determine_residency(&self, facts: &ResidencyFacts) -> ResidencyDetermination {
        determine_residency(facts)
    }

    pub fn get_audit_record(&self, id: &str) -> Result<Arc<CalculationAuditRecord>, CalcError> {
        self.audit.get(id)
    }

    /// Fetch inputs from the collaborators once, then run the pure
    /// calculation.
    pub fn calculate_for_user(
        &self,
        user_id: &str,
        tax_year: TaxYear,
        profile: TaxpayerProfile,
        ledger: &dyn IncomeLedger,
        facts_provider: &dyn ResidencyFactsProvider,
    ) -> anyhow::Result<TaxCalculationResult> {
        let income = ledger.list_income(user_id, tax_year)?;
        let residency = facts_provider.get_residency_facts(user_id, tax_year)?;
        let request = TaxCalculationRequest {
            tax_year,
            age: profile.age,
            scottish_taxpayer: profile.scottish_taxpayer,
            zar_per_gbp: profile.zar_per_gbp,
            assess_uk: true,
            assess_sa: true,
            income,
            residency,
            pinned_versions: None,
        };
        Ok(self.calculate(&request)?)
    }

    /// Run one composite calculation.
    ///
    /// Order matters: validation, then residency determination, then the
    /// treaty tie-breaker, then per-jurisdiction liabilities, then relief.
    pub fn calculate(
        &self,
        request: &TaxCalculationRequest,
    ) -> Result<TaxCalculationResult, CalcError> {
        self.validate(request)?;

        let uk_calc = if request.assess_uk {
            Some(UkTaxCalculator::new(self.config_for(request, Jurisdiction::Uk)?)?)
        } else {
            None
        };
        let sa_calc = if request.assess_sa {
            Some(SaTaxCalculator::new(self.config_for(request, Jurisdiction::Sa)?)?)
        } else {
            None
        };

        let residency = determine_residency(&request.residency);
        let mut warnings = residency.warnings.clone();

        let treaty_residence = residence_tie_breaker(
            residency.uk_resident,
            residency.sa_resident,
            &request.residency.tie_breaker,
        );
        if treaty_residence.residence == TreatyResidence::Undetermined {
            // Best-effort default: both assessments stand, no relief.
            warnings.push(Warning::ResidenceUndetermined);
        }

        // Relief needs both calculators and a single treaty residence.
        let (relief, relief_warnings) = match (
            &uk_calc,
            &sa_calc,
            treaty_residence.residence.jurisdiction(),
        ) {
            (Some(uk), Some(sa), Some(residence)) => DtaReliefCalculator::new(
                uk,
                sa,
                request.zar_per_gbp,
                request.age,
                request.scottish_taxpayer,
            )
            .relief(
                residence,
                request.residency.tie_breaker.nationality,
                &request.income,
            ),
            _ => (Vec::new(), Vec::new()),
        };
        warnings.extend(relief_warnings);
        let total_relief: Decimal = relief.iter().map(|r| r.credit).sum();

        let uk = uk_calc.as_ref().map(|calc| {
            let scope = if residency.uk_resident {
                IncomeScope::Worldwide
            } else {
                IncomeScope::SourceOnly
            };
            let totals = uk_totals(&request.income, scope, request.zar_per_gbp);
            let liability = calc.liability(&totals, request.scottish_taxpayer);
            let relief_applied = if treaty_residence.residence == TreatyResidence::Uk {
                total_relief
            } else {
                Decimal::ZERO
            };
            let total_due = (liability.total_tax - relief_applied).max(Decimal::ZERO);
            UkAssessment {
                scope,
                liability,
                relief_applied,
                total_due,
            }
        });

        let sa = sa_calc.as_ref().map(|calc| {
            let scope = if residency.sa_resident {
                IncomeScope::Worldwide
            } else {
                IncomeScope::SourceOnly
            };
            let totals = sa_totals(
                &request.income,
                scope,
                request.zar_per_gbp,
                calc.interest_exemption(),
            );
            let liability = calc.liability(&totals, request.age);
            let relief_applied = if treaty_residence.residence == TreatyResidence::Sa {
                total_relief
            } else {
                Decimal::ZERO
            };
            let total_due = (liability.total_tax - relief_applied).max(Decimal::ZERO);
            SaAssessment {
                scope,
                liability,
                relief_applied,
                total_due,
            }
        });

        let mut config_versions = BTreeMap::new();
        if let Some(calc) = &uk_calc {
            config_versions.insert(Jurisdiction::Uk.as_str().to_string(), calc.config().version);
        }
        if let Some(calc) = &sa_calc {
            config_versions.insert(Jurisdiction::Sa.as_str().to_string(), calc.config().version);
        }

        let audit_id = audit_record_id(request, &config_versions, ENGINE_VERSION)?;
        let result = TaxCalculationResult {
            tax_year: request.tax_year,
            engine_version: ENGINE_VERSION.to_string(),
            residency,
            treaty_residence,
            uk,
            sa,
            relief,
            warnings,
            audit_record_id: audit_id.clone(),
        };

        self.audit.insert(CalculationAuditRecord {
            id: audit_id,
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            request: request.clone(),
            config_versions,
            result: result.clone(),
        });

        log::debug!(
            "calculation {} complete for {}",
            result.audit_record_id,
            request.tax_year
        );
        Ok(result)
    }

    fn config_for(
        &self,
        request: &TaxCalculationRequest,
        jurisdiction: Jurisdiction,
    ) -> Result<Arc<crate::config::TaxYearConfig>, CalcError> {
        let pinned = request
            .pinned_versions
            .as_ref()
            .and_then(|pins| pins.get(jurisdiction.as_str()).copied());
        match pinned {
            Some(version) => self
                .repository
                .get_version(jurisdiction, request.tax_year, version),
            None => self.repository.get(jurisdiction, request.tax_year),
        }
    }

    /// Reject malformed input before any calculation runs.
    fn validate(&self, request: &TaxCalculationRequest) -> Result<(), CalcError> {
        request.tax_year.validate()?;
        if request.zar_per_gbp <= Decimal::ZERO {
            return Err(CalcError::InvalidExchangeRate(request.zar_per_gbp));
        }
        if !request.assess_uk && !request.assess_sa {
            return Err(CalcError::InvalidInput(
                "at least one jurisdiction must be assessed".to_string(),
            ));
        }
        for item in &request.income {
            item.validate()?;
        }

        let facts = &request.residency;
        for (jurisdiction, days) in [
            (Jurisdiction::Uk, facts.days_in_uk),
            (Jurisdiction::Uk, facts.uk_work_days),
            (Jurisdiction::Uk, facts.days_at_uk_home),
            (Jurisdiction::Sa, facts.days_in_sa),
        ] {
            let days_in_year = request.tax_year.days_in_year(jurisdiction);
            if days > days_in_year {
                return Err(CalcError::DayCountExceedsYear {
                    jurisdiction,
                    tax_year: request.tax_year,
                    days,
                    days_in_year,
                });
            }
        }
        // Prior-year SA counts cannot exceed the longest possible year.
        if let Some(days) = facts.sa_days_prior_years.iter().find(|d| **d > 366) {
            return Err(CalcError::InvalidInput(format!(
                "prior-year SA day count {days} exceeds 366"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::income::{Currency, IncomeType};
    use crate::residency::TieBreakerFacts;
    use rust_decimal_macros::dec;

    fn facts() -> ResidencyFacts {
        ResidencyFacts {
            days_in_uk: 0,
            days_in_sa: 0,
            sa_days_prior_years: vec![0; 5],
            uk_resident_prior_years: vec![false; 3],
            uk_work_days: 0,
            full_time_work_abroad: false,
            full_time_work_uk: false,
            sole_home_in_uk: false,
            days_at_uk_home: 0,
            family_tie: false,
            accommodation_tie: false,
            ninety_day_tie: false,
            country_tie: false,
            uk_domicile_of_origin: false,
            uk_domicile_of_choice: None,
            tie_breaker: TieBreakerFacts::default(),
        }
    }

    fn item(id: &str, income_type: IncomeType, source: Jurisdiction, amount: Decimal) -> IncomeItem {
        IncomeItem {
            id: id.to_string(),
            income_type,
            source_country: source,
            amount,
            currency: Currency::of(source),
            immovable_property: false,
            government_pension: false,
            days_worked_in_source: None,
            employer_resident_in_source: None,
            permanent_establishment: None,
        }
    }

    fn uk_resident_request() -> TaxCalculationRequest {
        let mut residency = facts();
        residency.days_in_uk = 200;
        TaxCalculationRequest {
            tax_year: TaxYear(2025),
            age: 40,
            scottish_taxpayer: false,
            zar_per_gbp: dec!(23),
            assess_uk: true,
            assess_sa: true,
            income: vec![item(
                "salary",
                IncomeType::Employment,
                Jurisdiction::Uk,
                dec!(30000),
            )],
            residency,
            pinned_versions: None,
        }
    }

    #[test]
    fn uk_salary_composite() {
        let engine = TaxEngine::with_builtin_config();
        let result = engine.calculate(&uk_resident_request()).unwrap();
        assert!(result.residency.uk_resident);
        assert!(!result.residency.sa_resident);
        assert_eq!(result.treaty_residence.residence, TreatyResidence::Uk);

        let uk = result.uk.as_ref().unwrap();
        assert_eq!(uk.scope, IncomeScope::Worldwide);
        assert_eq!(uk.liability.income_tax.breakdown.total_tax, dec!(3486));
        assert_eq!(uk.liability.national_insurance.class1, dec!(1394.40));
        assert_eq!(uk.relief_applied, Decimal::ZERO);
        assert_eq!(uk.total_due, dec!(4880.40));

        // Non-resident in SA with no SA income: nothing due there.
        let sa = result.sa.as_ref().unwrap();
        assert_eq!(sa.scope, IncomeScope::SourceOnly);
        assert_eq!(sa.total_due, Decimal::ZERO);
    }

    #[test]
    fn missing_config_year_fails() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.tax_year = TaxYear(1999);
        assert!(matches!(
            engine.calculate(&request),
            Err(CalcError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn negative_income_rejected_before_calculation() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.income[0].amount = dec!(-100);
        assert!(matches!(
            engine.calculate(&request),
            Err(CalcError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn impossible_day_count_rejected() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.residency.days_in_uk = 370;
        assert!(matches!(
            engine.calculate(&request),
            Err(CalcError::DayCountExceedsYear { .. })
        ));
    }

    #[test]
    fn zero_exchange_rate_rejected() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.zar_per_gbp = Decimal::ZERO;
        assert!(matches!(
            engine.calculate(&request),
            Err(CalcError::InvalidExchangeRate(_))
        ));
    }

    #[test]
    fn determinism_identical_requests_identical_bytes() {
        let engine = TaxEngine::with_builtin_config();
        let request = uk_resident_request();
        let first = engine.calculate(&request).unwrap();
        let second = engine.calculate(&request).unwrap();
        assert_eq!(first.audit_record_id, second.audit_record_id);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn audit_record_reproduces_inputs() {
        let engine = TaxEngine::with_builtin_config();
        let request = uk_resident_request();
        let result = engine.calculate(&request).unwrap();
        let record = engine.get_audit_record(&result.audit_record_id).unwrap();
        assert_eq!(record.request, request);
        assert_eq!(record.config_versions["uk"], 1);
        assert_eq!(record.result, result);

        // Replaying the recorded request reproduces the recorded result.
        let replay = engine.calculate(&record.request).unwrap();
        assert_eq!(replay, record.result);
    }

    #[test]
    fn unknown_audit_record_id() {
        let engine = TaxEngine::with_builtin_config();
        assert!(matches!(
            engine.get_audit_record("missing"),
            Err(CalcError::AuditRecordNotFound(_))
        ));
    }

    #[test]
    fn dual_resident_dividend_relief_flows_to_uk() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.zar_per_gbp = dec!(20);
        request.residency.days_in_uk = 200;
        request.residency.days_in_sa = 120;
        request.residency.sa_days_prior_years = vec![120; 5];
        request.residency.tie_breaker = TieBreakerFacts {
            permanent_home_uk: true,
            ..TieBreakerFacts::default()
        };
        request.income = vec![
            item("salary", IncomeType::Employment, Jurisdiction::Uk, dec!(60000)),
            item("div", IncomeType::Dividend, Jurisdiction::Sa, dec!(200000)),
        ];

        let result = engine.calculate(&request).unwrap();
        assert!(result.residency.uk_resident && result.residency.sa_resident);
        assert_eq!(result.treaty_residence.residence, TreatyResidence::Uk);
        assert_eq!(result.treaty_residence.resolved_by, "permanent home");

        assert_eq!(result.relief.len(), 1);
        // Treaty-capped SA withholding: 15% of R200,000 in GBP.
        assert_eq!(result.relief[0].credit, dec!(1500));

        let uk = result.uk.as_ref().unwrap();
        assert_eq!(uk.relief_applied, dec!(1500));
        let sa = result.sa.as_ref().unwrap();
        assert_eq!(sa.relief_applied, Decimal::ZERO);
        // SA still withholds on its local dividend (worldwide scope, dual
        // resident): 20% of R200,000.
        assert_eq!(sa.liability.dividend_withholding, dec!(40000));
    }

    #[test]
    fn undetermined_residence_proceeds_without_relief() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.residency.days_in_uk = 200;
        request.residency.days_in_sa = 120;
        request.residency.sa_days_prior_years = vec![120; 5];
        // No tie-breaker facts at all: the cascade exhausts.
        request.income.push(item(
            "div",
            IncomeType::Dividend,
            Jurisdiction::Sa,
            dec!(100000),
        ));

        let result = engine.calculate(&request).unwrap();
        assert_eq!(
            result.treaty_residence.residence,
            TreatyResidence::Undetermined
        );
        assert!(result.treaty_residence.requires_mutual_agreement);
        assert!(result.warnings.contains(&Warning::ResidenceUndetermined));
        assert!(result.relief.is_empty());
        assert_eq!(result.uk.as_ref().unwrap().relief_applied, Decimal::ZERO);
    }

    #[test]
    fn pinned_version_reproduces_superseded_config() {
        use crate::config::JurisdictionRules;

        let engine = TaxEngine::with_builtin_config();
        let request = uk_resident_request();
        let original = engine.calculate(&request).unwrap();

        // A correction raises the personal allowance for 2024/25.
        let current = engine
            .repository()
            .get(Jurisdiction::Uk, TaxYear(2025))
            .unwrap();
        let mut correction = crate::config::TaxYearConfig::clone(&current);
        if let JurisdictionRules::Uk(rules) = &mut correction.rules {
            rules.personal_allowance = dec!(13000);
        }
        engine.repository().publish(correction).unwrap();

        // Unpinned: the new table applies.
        let recalculated = engine.calculate(&request).unwrap();
        let uk = recalculated.uk.as_ref().unwrap();
        assert_eq!(uk.liability.income_tax.personal_allowance, dec!(13000));

        // Pinned to version 1: the original numbers come back.
        let mut pinned = request.clone();
        pinned.pinned_versions = Some(BTreeMap::from([("uk".to_string(), 1)]));
        let replay = engine.calculate(&pinned).unwrap();
        assert_eq!(
            replay.uk.as_ref().unwrap().liability,
            original.uk.as_ref().unwrap().liability
        );
    }

    #[test]
    fn single_jurisdiction_assessment() {
        let engine = TaxEngine::with_builtin_config();
        let mut request = uk_resident_request();
        request.assess_sa = false;
        let result = engine.calculate(&request).unwrap();
        assert!(result.uk.is_some());
        assert!(result.sa.is_none());
        // Relief needs both jurisdictions assessed.
        assert!(result.relief.is_empty());
    }

    #[test]
    fn ledger_driven_calculation() {
        struct FixedLedger(Vec<IncomeItem>);
        impl IncomeLedger for FixedLedger {
            fn list_income(
                &self,
                _user_id: &str,
                _tax_year: TaxYear,
            ) -> anyhow::Result<Vec<IncomeItem>> {
                Ok(self.0.clone())
            }
        }
        struct FixedFacts(ResidencyFacts);
        impl ResidencyFactsProvider for FixedFacts {
            fn get_residency_facts(
                &self,
                _user_id: &str,
                _tax_year: TaxYear,
            ) -> anyhow::Result<ResidencyFacts> {
                Ok(self.0.clone())
            }
        }

        let engine = TaxEngine::with_builtin_config();
        let ledger = FixedLedger(vec![item(
            "salary",
            IncomeType::Employment,
            Jurisdiction::Uk,
            dec!(30000),
        )]);
        let mut residency = facts();
        residency.days_in_uk = 200;
        let provider = FixedFacts(residency);
        let profile = TaxpayerProfile {
            age: 40,
            scottish_taxpayer: false,
            zar_per_gbp: dec!(23),
        };
        let result = engine
            .calculate_for_user("user-1", TaxYear(2025), profile, &ledger, &provider)
            .unwrap();
        assert_eq!(
            result.uk.as_ref().unwrap().liability.income_tax.breakdown.total_tax,
            dec!(3486)
        );
    }
}
