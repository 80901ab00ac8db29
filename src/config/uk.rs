//! Built-in UK tax year configurations.

use super::{JurisdictionRules, NiThresholds, TaxYearConfig, UkCgtRates, UkRules};
use crate::bands::TaxBandDef;
use crate::year::{Jurisdiction, TaxYear};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// All built-in UK years.
pub fn published() -> Vec<TaxYearConfig> {
    vec![year_2024(), year_2025(), year_2026()]
}

/// Standard bands over taxable (post-allowance) income. Bounds have been
/// frozen since 2021/22.
fn standard_bands() -> Vec<TaxBandDef> {
    vec![
        TaxBandDef::new("basic", dec!(0), Some(dec!(37700)), dec!(0.20)),
        TaxBandDef::new("higher", dec!(37700), Some(dec!(125140)), dec!(0.40)),
        TaxBandDef::new("additional", dec!(125140), None, dec!(0.45)),
    ]
}

fn dividend_bands() -> Vec<TaxBandDef> {
    vec![
        TaxBandDef::new("basic", dec!(0), Some(dec!(37700)), dec!(0.0875)),
        TaxBandDef::new("higher", dec!(37700), Some(dec!(125140)), dec!(0.3375)),
        TaxBandDef::new("additional", dec!(125140), None, dec!(0.3935)),
    ]
}

fn config(tax_year: i32, rules: UkRules) -> TaxYearConfig {
    TaxYearConfig {
        jurisdiction: Jurisdiction::Uk,
        tax_year: TaxYear(tax_year),
        version: 0,
        rules: JurisdictionRules::Uk(rules),
    }
}

/// 2023/24.
pub(crate) fn year_2024() -> TaxYearConfig {
    config(
        2024,
        UkRules {
            personal_allowance: dec!(12570),
            allowance_taper_threshold: dec!(100000),
            income_tax_bands: standard_bands(),
            scottish_income_tax_bands: vec![
                TaxBandDef::new("starter", dec!(0), Some(dec!(2162)), dec!(0.19)),
                TaxBandDef::new("basic", dec!(2162), Some(dec!(13118)), dec!(0.20)),
                TaxBandDef::new("intermediate", dec!(13118), Some(dec!(31092)), dec!(0.21)),
                TaxBandDef::new("higher", dec!(31092), Some(dec!(112570)), dec!(0.42)),
                TaxBandDef::new("top", dec!(112570), None, dec!(0.47)),
            ],
            ni: NiThresholds {
                class1_primary_threshold: dec!(12570),
                class1_upper_limit: dec!(50270),
                class1_main_rate: dec!(0.12),
                class1_upper_rate: dec!(0.02),
                class2_weekly_rate: dec!(3.45),
                class2_small_profits_threshold: dec!(6725),
                class4_lower_limit: dec!(12570),
                class4_upper_limit: dec!(50270),
                class4_main_rate: dec!(0.09),
                class4_upper_rate: dec!(0.02),
            },
            cgt_annual_exemption: dec!(6000),
            cgt_rates: UkCgtRates {
                property_basic: dec!(0.18),
                property_higher: dec!(0.28),
                other_basic: dec!(0.10),
                other_higher: dec!(0.20),
            },
            dividend_allowance: dec!(1000),
            dividend_bands: dividend_bands(),
        },
    )
}

/// 2024/25.
pub(crate) fn year_2025() -> TaxYearConfig {
    config(
        2025,
        UkRules {
            personal_allowance: dec!(12570),
            allowance_taper_threshold: dec!(100000),
            income_tax_bands: standard_bands(),
            scottish_income_tax_bands: vec![
                TaxBandDef::new("starter", dec!(0), Some(dec!(2306)), dec!(0.19)),
                TaxBandDef::new("basic", dec!(2306), Some(dec!(13991)), dec!(0.20)),
                TaxBandDef::new("intermediate", dec!(13991), Some(dec!(31092)), dec!(0.21)),
                TaxBandDef::new("higher", dec!(31092), Some(dec!(62430)), dec!(0.42)),
                TaxBandDef::new("advanced", dec!(62430), Some(dec!(112570)), dec!(0.45)),
                TaxBandDef::new("top", dec!(112570), None, dec!(0.48)),
            ],
            ni: NiThresholds {
                class1_primary_threshold: dec!(12570),
                class1_upper_limit: dec!(50270),
                class1_main_rate: dec!(0.08),
                class1_upper_rate: dec!(0.02),
                class2_weekly_rate: dec!(3.45),
                class2_small_profits_threshold: dec!(6725),
                class4_lower_limit: dec!(12570),
                class4_upper_limit: dec!(50270),
                class4_main_rate: dec!(0.06),
                class4_upper_rate: dec!(0.02),
            },
            cgt_annual_exemption: dec!(3000),
            cgt_rates: UkCgtRates {
                property_basic: dec!(0.18),
                property_higher: dec!(0.24),
                other_basic: dec!(0.10),
                other_higher: dec!(0.20),
            },
            dividend_allowance: dec!(500),
            dividend_bands: dividend_bands(),
        },
    )
}

/// 2025/26. CGT rates on non-property assets aligned with property;
/// the flat-rate Class 2 charge no longer applies.
pub(crate) fn year_2026() -> TaxYearConfig {
    config(
        2026,
        UkRules {
            personal_allowance: dec!(12570),
            allowance_taper_threshold: dec!(100000),
            income_tax_bands: standard_bands(),
            scottish_income_tax_bands: vec![
                TaxBandDef::new("starter", dec!(0), Some(dec!(2827)), dec!(0.19)),
                TaxBandDef::new("basic", dec!(2827), Some(dec!(14921)), dec!(0.20)),
                TaxBandDef::new("intermediate", dec!(14921), Some(dec!(31092)), dec!(0.21)),
                TaxBandDef::new("higher", dec!(31092), Some(dec!(62430)), dec!(0.42)),
                TaxBandDef::new("advanced", dec!(62430), Some(dec!(112570)), dec!(0.45)),
                TaxBandDef::new("top", dec!(112570), None, dec!(0.48)),
            ],
            ni: NiThresholds {
                class1_primary_threshold: dec!(12570),
                class1_upper_limit: dec!(50270),
                class1_main_rate: dec!(0.08),
                class1_upper_rate: dec!(0.02),
                class2_weekly_rate: Decimal::ZERO,
                class2_small_profits_threshold: dec!(6725),
                class4_lower_limit: dec!(12570),
                class4_upper_limit: dec!(50270),
                class4_main_rate: dec!(0.06),
                class4_upper_rate: dec!(0.02),
            },
            cgt_annual_exemption: dec!(3000),
            cgt_rates: UkCgtRates {
                property_basic: dec!(0.18),
                property_higher: dec!(0.24),
                other_basic: dec!(0.18),
                other_higher: dec!(0.24),
            },
            dividend_allowance: dec!(500),
            dividend_bands: dividend_bands(),
        },
    )
}
