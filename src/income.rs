use crate::error::CalcError;
use crate::year::Jurisdiction;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Classification of an income item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    Employment,
    SelfEmployment,
    Dividend,
    Interest,
    Pension,
    CapitalGain,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Gbp,
    Zar,
}

impl Currency {
    pub fn of(jurisdiction: Jurisdiction) -> Currency {
        match jurisdiction {
            Jurisdiction::Uk => Currency::Gbp,
            Jurisdiction::Sa => Currency::Zar,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::Gbp => write!(f, "GBP"),
            Currency::Zar => write!(f, "ZAR"),
        }
    }
}

/// Read-only snapshot of one income item, as supplied by the income ledger.
///
/// Conversion between GBP and ZAR uses the exchange rate supplied with the
/// calculation request; this crate never fetches rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeItem {
    pub id: String,
    pub income_type: IncomeType,
    pub source_country: Jurisdiction,
    #[schemars(with = "f64")]
    pub amount: Decimal,
    pub currency: Currency,
    /// Capital gains: the gain arises on immovable property.
    #[serde(default)]
    pub immovable_property: bool,
    /// Pensions: paid in respect of government service.
    #[serde(default)]
    pub government_pension: bool,
    /// Employment: days physically worked in the source country.
    #[serde(default)]
    pub days_worked_in_source: Option<u32>,
    /// Employment: whether the employer is a resident of the source country.
    #[serde(default)]
    pub employer_resident_in_source: Option<bool>,
    /// Employment: whether the employer has a permanent establishment in the
    /// source country. `None` means undetermined and requires human judgment.
    #[serde(default)]
    pub permanent_establishment: Option<bool>,
}

impl IncomeItem {
    /// Amount expressed in `currency`, at `zar_per_gbp`, rounded to 2 places.
    pub fn amount_in(&self, currency: Currency, zar_per_gbp: Decimal) -> Decimal {
        match (self.currency, currency) {
            (from, to) if from == to => self.amount,
            (Currency::Gbp, Currency::Zar) => (self.amount * zar_per_gbp).round_dp(2),
            (Currency::Zar, Currency::Gbp) => (self.amount / zar_per_gbp).round_dp(2),
            _ => self.amount,
        }
    }

    pub fn validate(&self) -> Result<(), CalcError> {
        if self.amount < Decimal::ZERO {
            return Err(CalcError::NegativeAmount {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Which items enter a jurisdiction's taxable base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncomeScope {
    /// Resident basis: everything, wherever sourced.
    Worldwide,
    /// Non-resident basis: only items sourced in the jurisdiction.
    SourceOnly,
}

fn in_scope(item: &IncomeItem, jurisdiction: Jurisdiction, scope: IncomeScope) -> bool {
    match scope {
        IncomeScope::Worldwide => true,
        IncomeScope::SourceOnly => item.source_country == jurisdiction,
    }
}

/// Income totals entering the UK computation, in GBP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkIncomeTotals {
    /// Employment, self-employment, pension, interest and other income.
    #[schemars(with = "f64")]
    pub ordinary: Decimal,
    #[schemars(with = "f64")]
    pub employment: Decimal,
    #[schemars(with = "f64")]
    pub self_employment: Decimal,
    #[schemars(with = "f64")]
    pub dividends: Decimal,
    #[schemars(with = "f64")]
    pub property_gains: Decimal,
    #[schemars(with = "f64")]
    pub other_gains: Decimal,
}

/// Income totals entering the SA computation, in ZAR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaIncomeTotals {
    /// Employment, self-employment, pension, other income, taxable interest
    /// and foreign dividends.
    #[schemars(with = "f64")]
    pub ordinary: Decimal,
    /// Local dividends, subject to withholding rather than the bands.
    #[schemars(with = "f64")]
    pub local_dividends: Decimal,
    #[schemars(with = "f64")]
    pub gains: Decimal,
    /// Local interest covered by the annual exemption.
    #[schemars(with = "f64")]
    pub exempt_interest: Decimal,
}

/// Sum the items entering the UK base. Dividends stack separately and gains
/// are split by asset type for the rate selection.
pub fn uk_totals(items: &[IncomeItem], scope: IncomeScope, zar_per_gbp: Decimal) -> UkIncomeTotals {
    let mut totals = UkIncomeTotals::default();
    for item in items {
        if !in_scope(item, Jurisdiction::Uk, scope) {
            continue;
        }
        let amount = item.amount_in(Currency::Gbp, zar_per_gbp);
        match item.income_type {
            IncomeType::Employment => {
                totals.employment += amount;
                totals.ordinary += amount;
            }
            IncomeType::SelfEmployment => {
                totals.self_employment += amount;
                totals.ordinary += amount;
            }
            IncomeType::Pension | IncomeType::Interest | IncomeType::Other => {
                totals.ordinary += amount;
            }
            IncomeType::Dividend => totals.dividends += amount,
            IncomeType::CapitalGain => {
                if item.immovable_property {
                    totals.property_gains += amount;
                } else {
                    totals.other_gains += amount;
                }
            }
        }
    }
    totals
}

/// Sum the items entering the SA base. Local interest is exempted up to the
/// annual exemption; foreign dividends enter ordinary income while local
/// dividends are withheld at source.
pub fn sa_totals(
    items: &[IncomeItem],
    scope: IncomeScope,
    zar_per_gbp: Decimal,
    interest_exemption: Decimal,
) -> SaIncomeTotals {
    let mut totals = SaIncomeTotals::default();
    let mut exemption_left = interest_exemption.max(Decimal::ZERO);
    for item in items {
        if !in_scope(item, Jurisdiction::Sa, scope) {
            continue;
        }
        let amount = item.amount_in(Currency::Zar, zar_per_gbp);
        match item.income_type {
            IncomeType::Employment
            | IncomeType::SelfEmployment
            | IncomeType::Pension
            | IncomeType::Other => totals.ordinary += amount,
            IncomeType::Interest => {
                if item.source_country == Jurisdiction::Sa {
                    let exempt = amount.min(exemption_left);
                    exemption_left -= exempt;
                    totals.exempt_interest += exempt;
                    totals.ordinary += amount - exempt;
                } else {
                    totals.ordinary += amount;
                }
            }
            IncomeType::Dividend => {
                if item.source_country == Jurisdiction::Sa {
                    totals.local_dividends += amount;
                } else {
                    totals.ordinary += amount;
                }
            }
            IncomeType::CapitalGain => totals.gains += amount,
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(
        id: &str,
        income_type: IncomeType,
        source: Jurisdiction,
        amount: Decimal,
        currency: Currency,
    ) -> IncomeItem {
        IncomeItem {
            id: id.to_string(),
            income_type,
            source_country: source,
            amount,
            currency,
            immovable_property: false,
            government_pension: false,
            days_worked_in_source: None,
            employer_resident_in_source: None,
            permanent_establishment: None,
        }
    }

    #[test]
    fn currency_conversion() {
        let salary = item(
            "s1",
            IncomeType::Employment,
            Jurisdiction::Sa,
            dec!(230000),
            Currency::Zar,
        );
        assert_eq!(salary.amount_in(Currency::Zar, dec!(23)), dec!(230000));
        assert_eq!(salary.amount_in(Currency::Gbp, dec!(23)), dec!(10000));
    }

    #[test]
    fn negative_amount_rejected() {
        let mut bad = item(
            "s1",
            IncomeType::Employment,
            Jurisdiction::Uk,
            dec!(-1),
            Currency::Gbp,
        );
        assert!(bad.validate().is_err());
        bad.amount = dec!(0);
        assert!(bad.validate().is_ok());
    }

    #[test]
    fn uk_totals_split_by_type() {
        let items = vec![
            item("e", IncomeType::Employment, Jurisdiction::Uk, dec!(30000), Currency::Gbp),
            item("d", IncomeType::Dividend, Jurisdiction::Uk, dec!(2000), Currency::Gbp),
            item("g", IncomeType::CapitalGain, Jurisdiction::Uk, dec!(10000), Currency::Gbp),
            item("p", IncomeType::Pension, Jurisdiction::Uk, dec!(5000), Currency::Gbp),
        ];
        let totals = uk_totals(&items, IncomeScope::Worldwide, dec!(23));
        assert_eq!(totals.ordinary, dec!(35000));
        assert_eq!(totals.employment, dec!(30000));
        assert_eq!(totals.dividends, dec!(2000));
        assert_eq!(totals.other_gains, dec!(10000));
        assert_eq!(totals.property_gains, Decimal::ZERO);
    }

    #[test]
    fn uk_source_only_scope_excludes_foreign_items() {
        let items = vec![
            item("uk", IncomeType::Employment, Jurisdiction::Uk, dec!(10000), Currency::Gbp),
            item("sa", IncomeType::Employment, Jurisdiction::Sa, dec!(230000), Currency::Zar),
        ];
        let totals = uk_totals(&items, IncomeScope::SourceOnly, dec!(23));
        assert_eq!(totals.ordinary, dec!(10000));
    }

    #[test]
    fn sa_local_interest_exemption() {
        let items = vec![
            item("i1", IncomeType::Interest, Jurisdiction::Sa, dec!(30000), Currency::Zar),
        ];
        let totals = sa_totals(&items, IncomeScope::Worldwide, dec!(23), dec!(23800));
        assert_eq!(totals.exempt_interest, dec!(23800));
        assert_eq!(totals.ordinary, dec!(6200));
    }

    #[test]
    fn sa_foreign_interest_not_exempt() {
        let items = vec![
            item("i1", IncomeType::Interest, Jurisdiction::Uk, dec!(1000), Currency::Gbp),
        ];
        let totals = sa_totals(&items, IncomeScope::Worldwide, dec!(20), dec!(23800));
        assert_eq!(totals.exempt_interest, Decimal::ZERO);
        assert_eq!(totals.ordinary, dec!(20000));
    }

    #[test]
    fn sa_dividends_local_vs_foreign() {
        let items = vec![
            item("d1", IncomeType::Dividend, Jurisdiction::Sa, dec!(10000), Currency::Zar),
            item("d2", IncomeType::Dividend, Jurisdiction::Uk, dec!(500), Currency::Gbp),
        ];
        let totals = sa_totals(&items, IncomeScope::Worldwide, dec!(20), dec!(23800));
        assert_eq!(totals.local_dividends, dec!(10000));
        // Foreign dividend flows into ordinary income at the supplied rate.
        assert_eq!(totals.ordinary, dec!(10000));
    }
}
