//! Residency and domicile determination.
//!
//! Each test is an ordered table of named rules evaluated top-down; a rule
//! either terminates with a result or falls through to the next. Every
//! evaluated rule is appended to the decision path, which is kept on the
//! determination for audit.

pub mod domicile;
pub mod presence;
pub mod srt;

use crate::warnings::Warning;
use crate::year::Jurisdiction;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Facts consumed by the determination engine. Immutable per calculation
/// call; owned by the residency-facts provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResidencyFacts {
    /// Days present in the UK at midnight this tax year.
    pub days_in_uk: u32,
    /// Days physically present in SA this year of assessment.
    pub days_in_sa: u32,
    /// SA day counts for up to five preceding years, most recent first.
    #[serde(default)]
    pub sa_days_prior_years: Vec<u32>,
    /// UK residence outcomes for preceding tax years, most recent first
    /// (up to twenty; feeds the arriver/leaver split and deemed domicile).
    #[serde(default)]
    pub uk_resident_prior_years: Vec<bool>,
    /// Days with more than three hours' work in the UK.
    #[serde(default)]
    pub uk_work_days: u32,
    #[serde(default)]
    pub full_time_work_abroad: bool,
    #[serde(default)]
    pub full_time_work_uk: bool,
    /// The taxpayer's only home is in the UK.
    #[serde(default)]
    pub sole_home_in_uk: bool,
    /// Days present at that UK home during the year.
    #[serde(default)]
    pub days_at_uk_home: u32,
    #[serde(default)]
    pub family_tie: bool,
    #[serde(default)]
    pub accommodation_tie: bool,
    /// More than 90 days in the UK in either of the two prior years.
    #[serde(default)]
    pub ninety_day_tie: bool,
    /// Present in the UK at midnight more than in any other country
    /// (counted for leavers only).
    #[serde(default)]
    pub country_tie: bool,
    /// Declared domicile of origin is the UK.
    pub uk_domicile_of_origin: bool,
    /// Declared domicile of choice, where one displaces the origin.
    #[serde(default)]
    pub uk_domicile_of_choice: Option<bool>,
    /// Facts for the treaty residence tie-breaker.
    #[serde(default)]
    pub tie_breaker: TieBreakerFacts,
}

/// Facts feeding the treaty Article 4 tie-breaker cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TieBreakerFacts {
    #[serde(default)]
    pub permanent_home_uk: bool,
    #[serde(default)]
    pub permanent_home_sa: bool,
    /// Where personal and economic relations are closer, if determinable.
    #[serde(default)]
    pub centre_of_vital_interests: Option<Jurisdiction>,
    #[serde(default)]
    pub habitual_abode: Option<Jurisdiction>,
    #[serde(default)]
    pub nationality: Option<Jurisdiction>,
}

/// One evaluated rule and what it concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleTrace {
    pub rule: String,
    pub outcome: String,
}

impl RuleTrace {
    pub fn new(rule: impl Into<String>, outcome: impl Into<String>) -> Self {
        RuleTrace {
            rule: rule.into(),
            outcome: outcome.into(),
        }
    }
}

/// Domicile position for the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DomicileStatus {
    /// Declared domicile (origin, or choice where one exists) is the UK.
    pub uk_domiciled: bool,
    /// Deemed domiciled for tax purposes; additive to the declared status.
    pub deemed_domiciled: bool,
}

/// Authoritative residency determination for one (taxpayer, tax year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResidencyDetermination {
    pub uk_resident: bool,
    pub sa_resident: bool,
    pub domicile: DomicileStatus,
    /// Every rule evaluated, in order.
    pub decision_path: Vec<RuleTrace>,
    pub reasoning: String,
    pub warnings: Vec<Warning>,
}

/// Run the full determination: UK SRT, SA physical presence, UK domicile.
///
/// Never fails on ambiguous input; ambiguity surfaces as warnings and
/// conservative outcomes, not errors.
pub fn determine_residency(facts: &ResidencyFacts) -> ResidencyDetermination {
    let mut decision_path = Vec::new();
    let mut warnings = Vec::new();

    let uk_resident = srt::uk_statutory_residence(facts, &mut decision_path);
    let sa_resident = presence::sa_physical_presence(facts, &mut decision_path, &mut warnings);
    let domicile = domicile::determine_domicile(facts, &mut decision_path);

    let reasoning = decision_path
        .iter()
        .map(|t| format!("{}: {}", t.rule, t.outcome))
        .collect::<Vec<_>>()
        .join("; ");

    ResidencyDetermination {
        uk_resident,
        sa_resident,
        domicile,
        decision_path,
        reasoning,
        warnings,
    }
}

#[cfg(test)]
pub(crate) fn facts() -> ResidencyFacts {
    ResidencyFacts {
        days_in_uk: 0,
        days_in_sa: 0,
        sa_days_prior_years: vec![0, 0, 0, 0, 0],
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determination_carries_full_decision_path() {
        let mut f = facts();
        f.days_in_uk = 200;
        f.days_in_sa = 100;
        let det = determine_residency(&f);
        assert!(det.uk_resident);
        assert!(!det.sa_resident);
        // SRT, presence and domicile sections all contribute trace entries.
        assert!(det.decision_path.iter().any(|t| t.rule.starts_with("srt")));
        assert!(det
            .decision_path
            .iter()
            .any(|t| t.rule.starts_with("sa presence")));
        assert!(det
            .decision_path
            .iter()
            .any(|t| t.rule.starts_with("domicile")));
        assert!(!det.reasoning.is_empty());
    }

    #[test]
    fn never_panics_on_empty_histories() {
        let mut f = facts();
        f.sa_days_prior_years.clear();
        f.uk_resident_prior_years.clear();
        f.days_in_sa = 100;
        let det = determine_residency(&f);
        assert!(!det.sa_resident);
        assert!(det
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MissingPriorYearDayCounts { .. })));
    }
}
