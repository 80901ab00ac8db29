use crate::bands::{apply_bands, apply_bands_above, BandResult};
use crate::config::{TaxYearConfig, UkCgtRates, UkRules};
use crate::error::CalcError;
use crate::income::UkIncomeTotals;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const WEEKS_PER_YEAR: u32 = 52;

/// UK tax calculator for one published tax year configuration.
///
/// Pure: every method is a function of the held config and its arguments.
#[derive(Debug, Clone)]
pub struct UkTaxCalculator {
    config: Arc<TaxYearConfig>,
}

/// Income tax computation with the personal-allowance taper applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkIncomeTax {
    #[schemars(with = "f64")]
    pub total_income: Decimal,
    #[schemars(with = "f64")]
    pub personal_allowance: Decimal,
    #[schemars(with = "f64")]
    pub taxable_income: Decimal,
    pub scottish: bool,
    pub breakdown: BandResult,
}

/// National Insurance, computed independently of income tax.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct NiBreakdown {
    #[schemars(with = "f64")]
    pub class1: Decimal,
    #[schemars(with = "f64")]
    pub class2: Decimal,
    #[schemars(with = "f64")]
    pub class4: Decimal,
    #[schemars(with = "f64")]
    pub total: Decimal,
}

/// Capital gains tax with the gain split across the remaining basic band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkCgt {
    #[schemars(with = "f64")]
    pub gain: Decimal,
    #[schemars(with = "f64")]
    pub annual_exemption_used: Decimal,
    #[schemars(with = "f64")]
    pub taxable_gain: Decimal,
    #[schemars(with = "f64")]
    pub taxed_at_basic: Decimal,
    #[schemars(with = "f64")]
    pub taxed_at_higher: Decimal,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// Full UK position for one year's income totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkLiability {
    pub totals: UkIncomeTotals,
    pub income_tax: UkIncomeTax,
    pub national_insurance: NiBreakdown,
    pub dividend_tax: UkDividendTax,
    pub property_gains: UkCgt,
    pub other_gains: UkCgt,
    /// Income tax, dividend tax and CGT; the taxes a treaty credit can
    /// offset. National Insurance is a contribution, not a creditable tax.
    #[schemars(with = "f64")]
    pub creditable_tax: Decimal,
    #[schemars(with = "f64")]
    pub total_tax: Decimal,
}

/// Dividend tax stacked above other income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UkDividendTax {
    #[schemars(with = "f64")]
    pub dividends: Decimal,
    #[schemars(with = "f64")]
    pub allowance_used: Decimal,
    #[schemars(with = "f64")]
    pub taxable_dividends: Decimal,
    pub breakdown: BandResult,
}

impl UkTaxCalculator {
    pub fn new(config: Arc<TaxYearConfig>) -> Result<Self, CalcError> {
        config.uk_rules()?;
        Ok(UkTaxCalculator { config })
    }

    pub fn config(&self) -> &Arc<TaxYearConfig> {
        &self.config
    }

    fn rules(&self) -> &UkRules {
        match self.config.uk_rules() {
            Ok(rules) => rules,
            // Checked in the constructor.
            Err(_) => unreachable!("UkTaxCalculator holds a non-UK config"),
        }
    }

    /// Personal allowance after the taper: reduced by £1 for every £2 of
    /// income over the threshold, floored at zero.
    pub fn personal_allowance(&self, total_income: Decimal) -> Decimal {
        let rules = self.rules();
        if total_income <= rules.allowance_taper_threshold {
            return rules.personal_allowance;
        }
        let reduction = ((total_income - rules.allowance_taper_threshold) / dec!(2)).floor();
        (rules.personal_allowance - reduction).max(Decimal::ZERO)
    }

    /// Income tax on total (pre-allowance) income, standard or Scottish
    /// bands by residency flag.
    pub fn income_tax(&self, total_income: Decimal, scottish: bool) -> UkIncomeTax {
        let rules = self.rules();
        let total_income = total_income.max(Decimal::ZERO);
        let personal_allowance = self.personal_allowance(total_income);
        let taxable_income = (total_income - personal_allowance).max(Decimal::ZERO);
        let bands = if scottish {
            &rules.scottish_income_tax_bands
        } else {
            &rules.income_tax_bands
        };
        let breakdown = apply_bands(taxable_income, bands);
        log::debug!(
            "UK income tax on {}: allowance {}, taxable {}, tax {}",
            total_income,
            personal_allowance,
            taxable_income,
            breakdown.total_tax
        );
        UkIncomeTax {
            total_income,
            personal_allowance,
            taxable_income,
            scottish,
            breakdown,
        }
    }

    /// Width of the basic-rate band not consumed by taxable income. Feeds
    /// the CGT split; CGT never re-derives it.
    pub fn basic_rate_band_remaining(&self, taxable_income: Decimal) -> Decimal {
        let rules = self.rules();
        match rules.income_tax_bands.first().and_then(|b| b.upper) {
            Some(upper) => (upper - taxable_income.max(Decimal::ZERO)).max(Decimal::ZERO),
            None => Decimal::ZERO,
        }
    }

    /// Class 1 employee, Class 2 and Class 4 contributions. No shared
    /// allowance with income tax.
    pub fn national_insurance(
        &self,
        employment_earnings: Decimal,
        self_employment_profits: Decimal,
    ) -> NiBreakdown {
        let ni = &self.rules().ni;
        let earnings = employment_earnings.max(Decimal::ZERO);
        let profits = self_employment_profits.max(Decimal::ZERO);

        let class1 = banded_charge(
            earnings,
            ni.class1_primary_threshold,
            ni.class1_upper_limit,
            ni.class1_main_rate,
            ni.class1_upper_rate,
        );
        let class2 = if profits > ni.class2_small_profits_threshold {
            (ni.class2_weekly_rate * Decimal::from(WEEKS_PER_YEAR)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let class4 = banded_charge(
            profits,
            ni.class4_lower_limit,
            ni.class4_upper_limit,
            ni.class4_main_rate,
            ni.class4_upper_rate,
        );

        NiBreakdown {
            class1,
            class2,
            class4,
            total: class1 + class2 + class4,
        }
    }

    /// CGT: annual exempt amount first, then the remaining gain fills the
    /// supplied remaining basic-rate band before the higher rate applies.
    pub fn capital_gains_tax(
        &self,
        gain: Decimal,
        immovable_property: bool,
        basic_rate_band_remaining: Decimal,
    ) -> UkCgt {
        let rules = self.rules();
        cgt_with(
            gain,
            &rules.cgt_rates,
            immovable_property,
            rules.cgt_annual_exemption,
            basic_rate_band_remaining,
        )
    }

    /// Full position for one year's totals: income tax, NI, dividends
    /// stacked last, and gains split across what the income stack left of
    /// the basic band. The annual exempt amount covers property gains
    /// first (the higher-rated asset type).
    pub fn liability(&self, totals: &UkIncomeTotals, scottish: bool) -> UkLiability {
        let rules = self.rules();
        let income_tax = self.income_tax(totals.ordinary, scottish);
        let dividend_tax = self.dividend_tax(totals.dividends, income_tax.taxable_income);
        let band_remaining = self
            .basic_rate_band_remaining(income_tax.taxable_income + dividend_tax.taxable_dividends);

        let property_gains = cgt_with(
            totals.property_gains,
            &rules.cgt_rates,
            true,
            rules.cgt_annual_exemption,
            band_remaining,
        );
        let other_gains = cgt_with(
            totals.other_gains,
            &rules.cgt_rates,
            false,
            rules.cgt_annual_exemption - property_gains.annual_exemption_used,
            band_remaining - property_gains.taxed_at_basic,
        );

        let national_insurance =
            self.national_insurance(totals.employment, totals.self_employment);
        let creditable_tax = income_tax.breakdown.total_tax
            + dividend_tax.breakdown.total_tax
            + property_gains.tax
            + other_gains.tax;
        let total_tax = creditable_tax + national_insurance.total;
        UkLiability {
            totals: totals.clone(),
            income_tax,
            national_insurance,
            dividend_tax,
            property_gains,
            other_gains,
            creditable_tax,
            total_tax,
        }
    }

    /// Dividend tax. Dividends occupy the top slice of the income
    /// distribution, so band occupancy comes from the other-income taxable
    /// amount rather than being re-derived here.
    pub fn dividend_tax(&self, dividends: Decimal, other_taxable_income: Decimal) -> UkDividendTax {
        let rules = self.rules();
        let dividends = dividends.max(Decimal::ZERO);
        let allowance_used = dividends.min(rules.dividend_allowance);
        let taxable_dividends = dividends - allowance_used;
        let breakdown = apply_bands_above(
            other_taxable_income.max(Decimal::ZERO),
            taxable_dividends,
            &rules.dividend_bands,
        );
        UkDividendTax {
            dividends,
            allowance_used,
            taxable_dividends,
            breakdown,
        }
    }
}

/// CGT on one gain bucket with explicit exemption and basic-band headroom.
fn cgt_with(
    gain: Decimal,
    rates: &UkCgtRates,
    immovable_property: bool,
    exemption_available: Decimal,
    basic_rate_band_remaining: Decimal,
) -> UkCgt {
    let gain = gain.max(Decimal::ZERO);
    let annual_exemption_used = gain.min(exemption_available.max(Decimal::ZERO));
    let taxable_gain = gain - annual_exemption_used;
    let taxed_at_basic = taxable_gain.min(basic_rate_band_remaining.max(Decimal::ZERO));
    let taxed_at_higher = taxable_gain - taxed_at_basic;
    let (basic_rate, higher_rate) = if immovable_property {
        (rates.property_basic, rates.property_higher)
    } else {
        (rates.other_basic, rates.other_higher)
    };
    let tax =
        (taxed_at_basic * basic_rate).round_dp(2) + (taxed_at_higher * higher_rate).round_dp(2);
    UkCgt {
        gain,
        annual_exemption_used,
        taxable_gain,
        taxed_at_basic,
        taxed_at_higher,
        tax,
    }
}

/// Two-rate charge over (threshold, upper]: main rate between the bounds,
/// upper rate above, each rounded to 2 places.
fn banded_charge(
    amount: Decimal,
    threshold: Decimal,
    upper: Decimal,
    main_rate: Decimal,
    upper_rate: Decimal,
) -> Decimal {
    let in_main = (amount.min(upper) - threshold).max(Decimal::ZERO);
    let above = (amount - upper).max(Decimal::ZERO);
    (in_main * main_rate).round_dp(2) + (above * upper_rate).round_dp(2)
}
