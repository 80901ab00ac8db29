use crate::bands::{apply_bands, BandResult};
use crate::config::{SaRules, TaxYearConfig};
use crate::error::CalcError;
use crate::income::SaIncomeTotals;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// SA tax calculator for one published year of assessment.
///
/// Pure: every method is a function of the held config and its arguments.
#[derive(Debug, Clone)]
pub struct SaTaxCalculator {
    config: Arc<TaxYearConfig>,
}

/// Income tax after the age-banded rebate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaIncomeTax {
    #[schemars(with = "f64")]
    pub taxable_income: Decimal,
    pub breakdown: BandResult,
    /// Rebate the taxpayer qualifies for by age.
    #[schemars(with = "f64")]
    pub rebate: Decimal,
    /// Rebate actually used; never more than the gross tax.
    #[schemars(with = "f64")]
    pub rebate_applied: Decimal,
    #[schemars(with = "f64")]
    pub tax_payable: Decimal,
}

/// CGT via the inclusion-rate method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaCgt {
    #[schemars(with = "f64")]
    pub gain: Decimal,
    #[schemars(with = "f64")]
    pub annual_exclusion_used: Decimal,
    /// Portion of the gain included in ordinary taxable income.
    #[schemars(with = "f64")]
    pub included_gain: Decimal,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// Full SA position for one year's income totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaLiability {
    pub totals: SaIncomeTotals,
    pub income_tax: SaIncomeTax,
    pub capital_gains: SaCgt,
    #[schemars(with = "f64")]
    pub dividend_withholding: Decimal,
    /// All SA taxes here are creditable under the treaty.
    #[schemars(with = "f64")]
    pub creditable_tax: Decimal,
    #[schemars(with = "f64")]
    pub total_tax: Decimal,
}

impl SaTaxCalculator {
    pub fn new(config: Arc<TaxYearConfig>) -> Result<Self, CalcError> {
        config.sa_rules()?;
        Ok(SaTaxCalculator { config })
    }

    pub fn config(&self) -> &Arc<TaxYearConfig> {
        &self.config
    }

    fn rules(&self) -> &SaRules {
        match self.config.sa_rules() {
            Ok(rules) => rules,
            // Checked in the constructor.
            Err(_) => unreachable!("SaTaxCalculator holds a non-SA config"),
        }
    }

    /// Rebate for the taxpayer's age: primary, plus secondary from 65,
    /// plus tertiary from 75.
    pub fn rebate_for_age(&self, age: u32) -> Decimal {
        let rebates = &self.rules().rebates;
        let mut rebate = rebates.primary;
        if age >= rebates.secondary_age {
            rebate += rebates.secondary;
        }
        if age >= rebates.tertiary_age {
            rebate += rebates.tertiary;
        }
        rebate
    }

    /// Income tax on taxable income: bands, then the age rebate, floored at
    /// zero. The rebate never creates negative tax.
    pub fn income_tax(&self, taxable_income: Decimal, age: u32) -> SaIncomeTax {
        let rules = self.rules();
        let taxable_income = taxable_income.max(Decimal::ZERO);
        let breakdown = apply_bands(taxable_income, &rules.income_tax_bands);
        let rebate = self.rebate_for_age(age);
        let rebate_applied = rebate.min(breakdown.total_tax);
        let tax_payable = breakdown.total_tax - rebate_applied;
        log::debug!(
            "SA income tax on {}: gross {}, rebate {}, payable {}",
            taxable_income,
            breakdown.total_tax,
            rebate_applied,
            tax_payable
        );
        SaIncomeTax {
            taxable_income,
            breakdown,
            rebate,
            rebate_applied,
            tax_payable,
        }
    }

    /// CGT via the inclusion-rate method: the included portion of the gain
    /// is added to ordinary taxable income and taxed at the marginal rate.
    ///
    /// Computed as two income-tax calls (with and without the included
    /// gain), never as a flat rate, so the correct marginal band applies.
    pub fn capital_gains_tax(
        &self,
        gain: Decimal,
        ordinary_taxable_income: Decimal,
        age: u32,
    ) -> SaCgt {
        let rules = self.rules();
        let gain = gain.max(Decimal::ZERO);
        let annual_exclusion_used = gain.min(rules.cgt_annual_exclusion);
        let included_gain =
            ((gain - annual_exclusion_used) * rules.cgt_inclusion_rate).round_dp(2);
        let with_gain = self.income_tax(ordinary_taxable_income + included_gain, age);
        let without_gain = self.income_tax(ordinary_taxable_income, age);
        SaCgt {
            gain,
            annual_exclusion_used,
            included_gain,
            tax: with_gain.tax_payable - without_gain.tax_payable,
        }
    }

    /// Withholding on local dividends, independent of the bands. Foreign
    /// dividends flow into ordinary taxable income instead.
    pub fn dividend_withholding(&self, local_dividends: Decimal) -> Decimal {
        let rules = self.rules();
        (local_dividends.max(Decimal::ZERO) * rules.dividend_tax_rate).round_dp(2)
    }

    /// Annual local-interest exemption from the held configuration.
    pub fn interest_exemption(&self) -> Decimal {
        self.rules().interest_exemption
    }

    /// Full position for one year's totals: income tax on the ordinary
    /// stack, gains via the inclusion-rate delta, withholding on local
    /// dividends.
    pub fn liability(&self, totals: &SaIncomeTotals, age: u32) -> SaLiability {
        let income_tax = self.income_tax(totals.ordinary, age);
        let capital_gains = self.capital_gains_tax(totals.gains, totals.ordinary, age);
        let dividend_withholding = self.dividend_withholding(totals.local_dividends);
        let creditable_tax =
            income_tax.tax_payable + capital_gains.tax + dividend_withholding;
        SaLiability {
            totals: totals.clone(),
            income_tax,
            capital_gains,
            dividend_withholding,
            creditable_tax,
            total_tax: creditable_tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sa;
    use rust_decimal_macros::dec;

    fn calculator() -> SaTaxCalculator {
        SaTaxCalculator::new(Arc::new(sa::year_2025())).unwrap()
    }

    #[test]
    fn income_500k_age_40() {
        let calc = calculator();
        let result = calc.income_tax(dec!(500000), 40);
        assert_eq!(result.breakdown.total_tax, dec!(86611));
        assert_eq!(result.rebate_applied, dec!(17235));
        assert_eq!(result.tax_payable, dec!(69376));
    }

    #[test]
    fn rebate_bands_by_age() {
        let calc = calculator();
        assert_eq!(calc.rebate_for_age(40), dec!(17235));
        assert_eq!(calc.rebate_for_age(64), dec!(17235));
        assert_eq!(calc.rebate_for_age(65), dec!(26679));
        assert_eq!(calc.rebate_for_age(75), dec!(29824));
    }

    #[test]
    fn rebate_never_creates_negative_tax() {
        let calc = calculator();
        let result = calc.income_tax(dec!(50000), 40);
        // Gross 12% of 50,000 = 6,000, below the primary rebate.
        assert_eq!(result.breakdown.total_tax, dec!(6000));
        assert_eq!(result.rebate_applied, dec!(6000));
        assert_eq!(result.tax_payable, Decimal::ZERO);
    }

    #[test]
    fn zero_income_zero_tax() {
        let calc = calculator();
        let result = calc.income_tax(Decimal::ZERO, 40);
        assert_eq!(result.tax_payable, Decimal::ZERO);
        assert_eq!(result.breakdown.effective_rate, Decimal::ZERO);
    }

    #[test]
    fn cgt_inclusion_rate_method() {
        let calc = calculator();
        let cgt = calc.capital_gains_tax(dec!(140000), dec!(500000), 40);
        assert_eq!(cgt.annual_exclusion_used, dec!(40000));
        // (140,000 - 40,000) * 40%
        assert_eq!(cgt.included_gain, dec!(40000));
        // 500,000 sits in the 25% bracket with 12,800 of headroom; the
        // included gain straddles into the 31% bracket.
        // 12,800 @ 25% + 27,200 @ 31% = 3,200 + 8,432
        assert_eq!(cgt.tax, dec!(11632));
    }

    #[test]
    fn cgt_below_exclusion_is_free() {
        let calc = calculator();
        let cgt = calc.capital_gains_tax(dec!(30000), dec!(500000), 40);
        assert_eq!(cgt.included_gain, Decimal::ZERO);
        assert_eq!(cgt.tax, Decimal::ZERO);
    }

    #[test]
    fn cgt_uses_marginal_not_flat_rate() {
        let calc = calculator();
        // Low ordinary income: without the gain the rebate wipes the tax
        // (gross 16,800 < 17,235), so the gain's delta reflects the rebate
        // that the extra 40,000 of included gain exhausts.
        let cgt = calc.capital_gains_tax(dec!(140000), dec!(140000), 40);
        // with gain: gross on 180,000 = 21,600, payable 4,365;
        // without gain: payable 0.
        assert_eq!(cgt.tax, dec!(4365));
    }

    #[test]
    fn dividend_withholding_flat_rate() {
        let calc = calculator();
        assert_eq!(calc.dividend_withholding(dec!(10000)), dec!(2000));
        assert_eq!(calc.dividend_withholding(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn rejects_uk_config() {
        use crate::config::uk;
        assert!(SaTaxCalculator::new(Arc::new(uk::published().remove(0))).is_err());
    }

    #[test]
    fn liability_composes_components() {
        let calc = calculator();
        let totals = SaIncomeTotals {
            ordinary: dec!(500000),
            local_dividends: dec!(10000),
            gains: dec!(140000),
            exempt_interest: Decimal::ZERO,
        };
        let liability = calc.liability(&totals, 40);
        assert_eq!(liability.income_tax.tax_payable, dec!(69376));
        assert_eq!(liability.capital_gains.tax, dec!(11632));
        assert_eq!(liability.dividend_withholding, dec!(2000));
        assert_eq!(liability.total_tax, dec!(83008));
        assert_eq!(liability.creditable_tax, liability.total_tax);
    }
}
