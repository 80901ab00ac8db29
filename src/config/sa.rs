//! Built-in SA tax year configurations.

use super::{JurisdictionRules, SaRebates, SaRules, TaxYearConfig};
use crate::bands::TaxBandDef;
use crate::year::{Jurisdiction, TaxYear};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// All built-in SA years of assessment.
pub fn published() -> Vec<TaxYearConfig> {
    vec![year_2024(), year_2025(), year_2026()]
}

fn config(tax_year: i32, rules: SaRules) -> TaxYearConfig {
    TaxYearConfig {
        jurisdiction: Jurisdiction::Sa,
        tax_year: TaxYear(tax_year),
        version: 0,
        rules: JurisdictionRules::Sa(rules),
    }
}

fn rebates() -> SaRebates {
    SaRebates {
        primary: dec!(17235),
        secondary: dec!(9444),
        tertiary: dec!(3145),
        secondary_age: 65,
        tertiary_age: 75,
    }
}

fn bands(bounds: [Decimal; 6]) -> Vec<TaxBandDef> {
    let rates = [
        dec!(0.12),
        dec!(0.18),
        dec!(0.25),
        dec!(0.31),
        dec!(0.36),
        dec!(0.41),
        dec!(0.45),
    ];
    let mut lower = Decimal::ZERO;
    let mut table = Vec::with_capacity(rates.len());
    for (i, rate) in rates.iter().enumerate() {
        let upper = bounds.get(i).copied();
        table.push(TaxBandDef::new(
            &format!("bracket {}", i + 1),
            lower,
            upper,
            *rate,
        ));
        if let Some(upper) = upper {
            lower = upper;
        }
    }
    table
}

/// 2023/24 year of assessment (ending 29 Feb 2024).
pub(crate) fn year_2024() -> TaxYearConfig {
    config(
        2024,
        SaRules {
            income_tax_bands: bands([
                dec!(214000),
                dec!(359400),
                dec!(507500),
                dec!(666100),
                dec!(849100),
                dec!(1798200),
            ]),
            rebates: rebates(),
            cgt_annual_exclusion: dec!(40000),
            cgt_inclusion_rate: dec!(0.40),
            dividend_tax_rate: dec!(0.20),
            interest_exemption: dec!(23800),
        },
    )
}

/// 2024/25 year of assessment (ending 28 Feb 2025).
pub(crate) fn year_2025() -> TaxYearConfig {
    config(
        2025,
        SaRules {
            income_tax_bands: bands([
                dec!(216200),
                dec!(363100),
                dec!(512800),
                dec!(673000),
                dec!(857900),
                dec!(1817000),
            ]),
            rebates: rebates(),
            cgt_annual_exclusion: dec!(40000),
            cgt_inclusion_rate: dec!(0.40),
            dividend_tax_rate: dec!(0.20),
            interest_exemption: dec!(23800),
        },
    )
}

/// 2025/26 year of assessment; brackets and rebates unchanged from 2024/25.
pub(crate) fn year_2026() -> TaxYearConfig {
    let mut config = year_2025();
    config.tax_year = TaxYear(2026);
    config
}
