use crate::error::CalcError;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One rate band in an ordered progressive table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxBandDef {
    pub name: String,
    #[schemars(with = "f64")]
    pub lower: Decimal,
    /// `None` marks the unbounded top band.
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub upper: Option<Decimal>,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

impl TaxBandDef {
    pub fn new(name: &str, lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> Self {
        TaxBandDef {
            name: name.to_string(),
            lower,
            upper,
            rate,
        }
    }
}

/// Tax charged within a single band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BandSlice {
    pub band: String,
    #[schemars(with = "f64")]
    pub rate: Decimal,
    #[schemars(with = "f64")]
    pub taxable: Decimal,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// Result of pushing a taxable amount through a band table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BandResult {
    pub slices: Vec<BandSlice>,
    #[schemars(with = "f64")]
    pub total_tax: Decimal,
    /// Rate of the band containing the next unit of income.
    #[schemars(with = "f64")]
    pub marginal_rate: Decimal,
    /// `total_tax / taxable`, zero when nothing was taxable.
    #[schemars(with = "f64")]
    pub effective_rate: Decimal,
}

/// Check a band table is usable: non-empty, starts at zero, contiguous,
/// strictly increasing bounds, exactly one unbounded top band, sane rates.
pub fn validate_bands(bands: &[TaxBandDef]) -> Result<(), CalcError> {
    let Some(first) = bands.first() else {
        return Err(CalcError::InvalidBandTable("empty band table".to_string()));
    };
    if !first.lower.is_zero() {
        return Err(CalcError::InvalidBandTable(format!(
            "first band '{}' must start at 0, starts at {}",
            first.name, first.lower
        )));
    }
    for (i, band) in bands.iter().enumerate() {
        if band.rate < Decimal::ZERO || band.rate > Decimal::ONE {
            return Err(CalcError::InvalidBandTable(format!(
                "band '{}' rate {} outside 0..=1",
                band.name, band.rate
            )));
        }
        match band.upper {
            Some(upper) => {
                if upper <= band.lower {
                    return Err(CalcError::InvalidBandTable(format!(
                        "band '{}' upper bound {} not above lower bound {}",
                        band.name, upper, band.lower
                    )));
                }
                match bands.get(i + 1) {
                    Some(next) if next.lower != upper => {
                        return Err(CalcError::InvalidBandTable(format!(
                            "gap between '{}' (to {}) and '{}' (from {})",
                            band.name, upper, next.name, next.lower
                        )));
                    }
                    Some(_) => {}
                    None => {
                        return Err(CalcError::InvalidBandTable(format!(
                            "top band '{}' must be unbounded",
                            band.name
                        )));
                    }
                }
            }
            None => {
                if i + 1 != bands.len() {
                    return Err(CalcError::InvalidBandTable(format!(
                        "unbounded band '{}' is not the top band",
                        band.name
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Progressive tax on `taxable` over an ordered band table.
///
/// Tax is rounded to 2 decimal places per band (banker's rounding), not on
/// the final sum. Zero or negative input yields a zero result, no error.
pub fn apply_bands(taxable: Decimal, bands: &[TaxBandDef]) -> BandResult {
    apply_bands_above(Decimal::ZERO, taxable, bands)
}

/// Progressive tax on `amount` stacked on top of `occupied` band width
/// already consumed by other income (the top-slice computation used for
/// dividend stacking).
pub fn apply_bands_above(occupied: Decimal, amount: Decimal, bands: &[TaxBandDef]) -> BandResult {
    let occupied = occupied.max(Decimal::ZERO);
    if amount <= Decimal::ZERO {
        return BandResult {
            slices: Vec::new(),
            total_tax: Decimal::ZERO,
            marginal_rate: marginal_rate_at(occupied, bands),
            effective_rate: Decimal::ZERO,
        };
    }

    let top = occupied + amount;
    let mut slices = Vec::new();
    let mut total_tax = Decimal::ZERO;
    for band in bands {
        let from = band.lower.max(occupied);
        let to = match band.upper {
            Some(upper) => upper.min(top),
            None => top,
        };
        if to <= from {
            continue;
        }
        let taxable_in_band = to - from;
        let tax = (taxable_in_band * band.rate).round_dp(2);
        log::debug!(
            "band {}: taxable {} at {} -> {}",
            band.name,
            taxable_in_band,
            band.rate,
            tax
        );
        total_tax += tax;
        slices.push(BandSlice {
            band: band.name.clone(),
            rate: band.rate,
            taxable: taxable_in_band,
            tax,
        });
    }

    BandResult {
        slices,
        total_tax,
        marginal_rate: marginal_rate_at(top, bands),
        effective_rate: (total_tax / amount).round_dp(4),
    }
}

/// Rate of the band that would tax the next unit of income at `position`.
fn marginal_rate_at(position: Decimal, bands: &[TaxBandDef]) -> Decimal {
    for band in bands {
        let within = match band.upper {
            Some(upper) => band.lower <= position && position < upper,
            None => band.lower <= position,
        };
        if within {
            return band.rate;
        }
    }
    Decimal::ZERO
}
