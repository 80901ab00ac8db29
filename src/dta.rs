//! UK/SA Double Tax Agreement: residence tie-breaker, treaty-article
//! categorization and per-item credit relief.

use crate::income::{sa_totals, uk_totals, Currency, IncomeItem, IncomeScope, IncomeType};
use crate::residency::{RuleTrace, TieBreakerFacts};
use crate::tax::{SaTaxCalculator, UkTaxCalculator};
use crate::warnings::Warning;
use crate::year::Jurisdiction;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Treaty withholding caps on source-country tax.
const TREATY_DIVIDEND_CAP: Decimal = dec!(0.15);
const TREATY_INTEREST_CAP: Decimal = dec!(0.10);

/// Outcome of the Article 4 tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TreatyResidence {
    Uk,
    Sa,
    Neither,
    Undetermined,
}

impl TreatyResidence {
    pub fn jurisdiction(&self) -> Option<Jurisdiction> {
        match self {
            TreatyResidence::Uk => Some(Jurisdiction::Uk),
            TreatyResidence::Sa => Some(Jurisdiction::Sa),
            TreatyResidence::Neither | TreatyResidence::Undetermined => None,
        }
    }
}

/// Tie-breaker outcome plus the cascade step that resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DtaResidenceResult {
    pub residence: TreatyResidence,
    pub resolved_by: String,
    pub cascade: Vec<RuleTrace>,
    /// Set when the cascade exhausted without resolving; the case needs a
    /// mutual agreement procedure.
    pub requires_mutual_agreement: bool,
}

impl DtaResidenceResult {
    fn resolved(
        residence: TreatyResidence,
        step: &str,
        mut cascade: Vec<RuleTrace>,
        outcome: String,
    ) -> Self {
        cascade.push(RuleTrace::new(step, outcome));
        DtaResidenceResult {
            residence,
            resolved_by: step.to_string(),
            cascade,
            requires_mutual_agreement: false,
        }
    }
}

/// Article 4 tie-breaker cascade. Terminates in a defined state for every
/// input; an exhausted cascade yields `Undetermined`, never an error.
pub fn residence_tie_breaker(
    uk_resident: bool,
    sa_resident: bool,
    facts: &TieBreakerFacts,
) -> DtaResidenceResult {
    let mut cascade = Vec::new();

    match (uk_resident, sa_resident) {
        (false, false) => {
            return DtaResidenceResult::resolved(
                TreatyResidence::Neither,
                "domestic residence",
                cascade,
                "resident in neither country".to_string(),
            )
        }
        (true, false) => {
            return DtaResidenceResult::resolved(
                TreatyResidence::Uk,
                "domestic residence",
                cascade,
                "resident in the uk only".to_string(),
            )
        }
        (false, true) => {
            return DtaResidenceResult::resolved(
                TreatyResidence::Sa,
                "domestic residence",
                cascade,
                "resident in sa only".to_string(),
            )
        }
        (true, true) => {
            cascade.push(RuleTrace::new(
                "domestic residence",
                "dual resident, tie-breaker required",
            ));
        }
    }

    // Permanent home: a home in exactly one country resolves immediately.
    // Homes in both defer to the centre of vital interests; no home in
    // either skips straight to habitual abode.
    let homes_in_both = match (facts.permanent_home_uk, facts.permanent_home_sa) {
        (true, false) => {
            return DtaResidenceResult::resolved(
                TreatyResidence::Uk,
                "permanent home",
                cascade,
                "permanent home in the uk only".to_string(),
            )
        }
        (false, true) => {
            return DtaResidenceResult::resolved(
                TreatyResidence::Sa,
                "permanent home",
                cascade,
                "permanent home in sa only".to_string(),
            )
        }
        (true, true) => {
            cascade.push(RuleTrace::new("permanent home", "home in both countries"));
            true
        }
        (false, false) => {
            cascade.push(RuleTrace::new("permanent home", "no home in either country"));
            false
        }
    };

    if homes_in_both {
        match facts.centre_of_vital_interests {
            Some(jurisdiction) => {
                return DtaResidenceResult::resolved(
                    treaty_residence_of(jurisdiction),
                    "centre of vital interests",
                    cascade,
                    format!("closer relations in {jurisdiction}"),
                )
            }
            None => cascade.push(RuleTrace::new("centre of vital interests", "indeterminate")),
        }
    }

    match facts.habitual_abode {
        Some(jurisdiction) => {
            return DtaResidenceResult::resolved(
                treaty_residence_of(jurisdiction),
                "habitual abode",
                cascade,
                format!("habitual abode in {jurisdiction}"),
            )
        }
        None => cascade.push(RuleTrace::new("habitual abode", "in both or neither")),
    }

    match facts.nationality {
        Some(jurisdiction) => {
            return DtaResidenceResult::resolved(
                treaty_residence_of(jurisdiction),
                "nationality",
                cascade,
                format!("national of {jurisdiction}"),
            )
        }
        None => cascade.push(RuleTrace::new("nationality", "of both or neither")),
    }

    cascade.push(RuleTrace::new(
        "cascade exhausted",
        "undetermined, mutual agreement procedure required",
    ));
    DtaResidenceResult {
        residence: TreatyResidence::Undetermined,
        resolved_by: "cascade exhausted".to_string(),
        cascade,
        requires_mutual_agreement: true,
    }
}

fn treaty_residence_of(jurisdiction: Jurisdiction) -> TreatyResidence {
    match jurisdiction {
        Jurisdiction::Uk => TreatyResidence::Uk,
        Jurisdiction::Sa => TreatyResidence::Sa,
    }
}

/// Treaty article an income item falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TreatyArticle {
    Employment,
    Dividends,
    Interest,
    CapitalGains,
    Pensions,
    OtherIncome,
}

/// Who may tax an item under its article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TaxingRights {
    /// Only the residence country taxes; no relief arises.
    ResidenceOnly,
    /// The source country taxes first (capped for dividends and interest);
    /// the residence country relieves by credit.
    SourcePrimary {
        #[schemars(with = "Option<f64>")]
        withholding_cap: Option<Decimal>,
    },
}

/// Result of mapping an item onto the treaty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleMapping {
    Resolved(TreatyArticle, TaxingRights),
    /// The facts needed to settle the article are missing; the item
    /// degrades to the conservative outcome (fully taxable, no relief).
    Unresolved(TreatyArticle),
}

/// Map an item to its treaty article and taxing rights.
///
/// `nationality` is the taxpayer's, used by the government-pension rule.
pub fn categorize(
    item: &IncomeItem,
    residence: Jurisdiction,
    nationality: Option<Jurisdiction>,
) -> ArticleMapping {
    use ArticleMapping::{Resolved, Unresolved};
    match item.income_type {
        IncomeType::Employment => {
            // Source may tax unless the short-stay exemption holds: under
            // 183 days worked there, a non-resident employer, and no
            // permanent establishment. Employer residence and permanent
            // establishment need human judgment when unknown.
            let short_stay = item.days_worked_in_source.map(|d| d < 183);
            let foreign_employer = item.employer_resident_in_source.map(|r| !r);
            let no_establishment = item.permanent_establishment.map(|pe| !pe);
            match (short_stay, foreign_employer, no_establishment) {
                (Some(true), Some(true), Some(true)) => {
                    Resolved(TreatyArticle::Employment, TaxingRights::ResidenceOnly)
                }
                // Any condition known to fail settles source taxation.
                (Some(false), _, _) | (_, Some(false), _) | (_, _, Some(false)) => Resolved(
                    TreatyArticle::Employment,
                    TaxingRights::SourcePrimary {
                        withholding_cap: None,
                    },
                ),
                _ => Unresolved(TreatyArticle::Employment),
            }
        }
        IncomeType::SelfEmployment => Resolved(
            // Independent services follow the employment allocation here:
            // taxable where performed.
            TreatyArticle::Employment,
            TaxingRights::SourcePrimary {
                withholding_cap: None,
            },
        ),
        IncomeType::Dividend => Resolved(
            TreatyArticle::Dividends,
            TaxingRights::SourcePrimary {
                withholding_cap: Some(TREATY_DIVIDEND_CAP),
            },
        ),
        IncomeType::Interest => Resolved(
            TreatyArticle::Interest,
            TaxingRights::SourcePrimary {
                withholding_cap: Some(TREATY_INTEREST_CAP),
            },
        ),
        IncomeType::CapitalGain => {
            if item.immovable_property {
                Resolved(
                    TreatyArticle::CapitalGains,
                    TaxingRights::SourcePrimary {
                        withholding_cap: None,
                    },
                )
            } else {
                Resolved(TreatyArticle::CapitalGains, TaxingRights::ResidenceOnly)
            }
        }
        IncomeType::Pension => {
            if item.government_pension {
                // Government pensions stay taxable at source unless the
                // beneficiary is a national of the residence country.
                if nationality == Some(residence) {
                    Resolved(TreatyArticle::Pensions, TaxingRights::ResidenceOnly)
                } else {
                    Resolved(
                        TreatyArticle::Pensions,
                        TaxingRights::SourcePrimary {
                            withholding_cap: None,
                        },
                    )
                }
            } else {
                Resolved(TreatyArticle::Pensions, TaxingRights::ResidenceOnly)
            }
        }
        IncomeType::Other => Resolved(TreatyArticle::OtherIncome, TaxingRights::ResidenceOnly),
    }
}

/// Per-item relief record. Taxes are expressed in the residence country's
/// currency; `credit` never exceeds either side and is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReliefCalculation {
    pub item_id: String,
    pub article: TreatyArticle,
    pub source_country: Jurisdiction,
    pub residence_country: Jurisdiction,
    /// Source-country tax on the item, after any treaty cap.
    #[schemars(with = "f64")]
    pub source_tax: Decimal,
    /// Residence-country tax on the item before relief, attributed by the
    /// marginal-slice (income delta) method.
    #[schemars(with = "f64")]
    pub residence_tax: Decimal,
    #[schemars(with = "f64")]
    pub credit: Decimal,
    /// Country granting the relief; `None` when no relief is due.
    pub relief_country: Option<Jurisdiction>,
}

/// Foreign tax credit computation across a set of income items.
///
/// Depends on both calculators; pure over its inputs.
pub struct DtaReliefCalculator<'a> {
    uk: &'a UkTaxCalculator,
    sa: &'a SaTaxCalculator,
    zar_per_gbp: Decimal,
    age: u32,
    scottish: bool,
}

impl<'a> DtaReliefCalculator<'a> {
    pub fn new(
        uk: &'a UkTaxCalculator,
        sa: &'a SaTaxCalculator,
        zar_per_gbp: Decimal,
        age: u32,
        scottish: bool,
    ) -> Self {
        DtaReliefCalculator {
            uk,
            sa,
            zar_per_gbp,
            age,
            scottish,
        }
    }

    /// Relief for every item sourced outside the residence country.
    ///
    /// An item whose article cannot be settled degrades to zero relief
    /// with a warning; the calculation never aborts for that reason.
    pub fn relief(
        &self,
        residence: Jurisdiction,
        nationality: Option<Jurisdiction>,
        items: &[IncomeItem],
    ) -> (Vec<ReliefCalculation>, Vec<Warning>) {
        let mut reliefs = Vec::new();
        let mut warnings = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if item.source_country == residence {
                continue;
            }
            let record = match categorize(item, residence, nationality) {
                ArticleMapping::Unresolved(article) => {
                    log::warn!("treaty article unresolved for item {}", item.id);
                    warnings.push(Warning::TreatyArticleUnresolved {
                        item_id: item.id.clone(),
                    });
                    ReliefCalculation {
                        item_id: item.id.clone(),
                        article,
                        source_country: item.source_country,
                        residence_country: residence,
                        source_tax: Decimal::ZERO,
                        residence_tax: Decimal::ZERO,
                        credit: Decimal::ZERO,
                        relief_country: None,
                    }
                }
                ArticleMapping::Resolved(article, TaxingRights::ResidenceOnly) => {
                    // Exclusive residence rights: no credit may be claimed.
                    ReliefCalculation {
                        item_id: item.id.clone(),
                        article,
                        source_country: item.source_country,
                        residence_country: residence,
                        source_tax: Decimal::ZERO,
                        residence_tax: self.residence_tax_on_item(residence, items, index),
                        credit: Decimal::ZERO,
                        relief_country: None,
                    }
                }
                ArticleMapping::Resolved(
                    article,
                    TaxingRights::SourcePrimary { withholding_cap },
                ) => {
                    let residence_tax = self.residence_tax_on_item(residence, items, index);
                    let source_tax =
                        self.source_tax_on_item(item, items, index, withholding_cap, residence);
                    let credit = source_tax.min(residence_tax).max(Decimal::ZERO);
                    ReliefCalculation {
                        item_id: item.id.clone(),
                        article,
                        source_country: item.source_country,
                        residence_country: residence,
                        source_tax,
                        residence_tax,
                        credit,
                        relief_country: Some(residence),
                    }
                }
            };
            reliefs.push(record);
        }

        (reliefs, warnings)
    }

    /// Residence-country tax attributable to one item: the creditable-tax
    /// delta of removing it from the worldwide base.
    fn residence_tax_on_item(
        &self,
        residence: Jurisdiction,
        items: &[IncomeItem],
        index: usize,
    ) -> Decimal {
        let without = without_item(items, index);
        let delta = self.creditable_tax(residence, items, IncomeScope::Worldwide)
            - self.creditable_tax(residence, &without, IncomeScope::Worldwide);
        delta.max(Decimal::ZERO)
    }

    /// Source-country tax on one item: the delta over the source-only base,
    /// capped at the treaty withholding rate where one applies. Expressed
    /// in the residence country's currency.
    fn source_tax_on_item(
        &self,
        item: &IncomeItem,
        items: &[IncomeItem],
        index: usize,
        withholding_cap: Option<Decimal>,
        residence: Jurisdiction,
    ) -> Decimal {
        let source = item.source_country;
        let without = without_item(items, index);
        let mut tax = self.creditable_tax(source, items, IncomeScope::SourceOnly)
            - self.creditable_tax(source, &without, IncomeScope::SourceOnly);
        tax = tax.max(Decimal::ZERO);
        if let Some(cap) = withholding_cap {
            let capped =
                (item.amount_in(Currency::of(source), self.zar_per_gbp) * cap).round_dp(2);
            tax = tax.min(capped);
        }
        convert(tax, Currency::of(source), Currency::of(residence), self.zar_per_gbp)
    }

    /// Creditable tax (excluding social security contributions) one
    /// jurisdiction would charge on a set of items under the given scope.
    fn creditable_tax(
        &self,
        jurisdiction: Jurisdiction,
        items: &[IncomeItem],
        scope: IncomeScope,
    ) -> Decimal {
        match jurisdiction {
            Jurisdiction::Uk => {
                let totals = uk_totals(items, scope, self.zar_per_gbp);
                self.uk.liability(&totals, self.scottish).creditable_tax
            }
            Jurisdiction::Sa => {
                let exemption = self.sa.interest_exemption();
                let totals = sa_totals(items, scope, self.zar_per_gbp, exemption);
                self.sa.liability(&totals, self.age).creditable_tax
            }
        }
    }
}

fn without_item(items: &[IncomeItem], index: usize) -> Vec<IncomeItem> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, item)| item.clone())
        .collect()
}

fn convert(amount: Decimal, from: Currency, to: Currency, zar_per_gbp: Decimal) -> Decimal {
    match (from, to) {
        (a, b) if a == b => amount,
        (Currency::Gbp, Currency::Zar) => (amount * zar_per_gbp).round_dp(2),
        (Currency::Zar, Currency::Gbp) => (amount / zar_per_gbp).round_dp(2),
        _ => amount,
    }
}
