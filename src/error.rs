use crate::year::{Jurisdiction, TaxYear};
use rust_decimal::Decimal;

/// Errors surfaced by configuration lookup, input validation and calculation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("no published tax configuration for {jurisdiction} {tax_year}")]
    ConfigNotFound {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    },
    #[error("no published version {version} for {jurisdiction} {tax_year}")]
    ConfigVersionNotFound {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        version: u32,
    },
    #[error("configuration for {jurisdiction} {tax_year} carries rules for another jurisdiction")]
    JurisdictionMismatch {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
    },
    #[error("invalid tax band table: {0}")]
    InvalidBandTable(String),
    #[error("invalid tax year: {0}")]
    InvalidTaxYear(i32),
    #[error("negative amount on income item '{id}'")]
    NegativeAmount { id: String },
    #[error("exchange rate must be positive, got {0}")]
    InvalidExchangeRate(Decimal),
    #[error("day count {days} exceeds the {days_in_year} days of {jurisdiction} {tax_year}")]
    DayCountExceedsYear {
        jurisdiction: Jurisdiction,
        tax_year: TaxYear,
        days: u32,
        days_in_year: u32,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("audit record not found: {0}")]
    AuditRecordNotFound(String),
}
