pub mod sa;
pub mod uk;

pub use sa::{SaCgt, SaIncomeTax, SaLiability, SaTaxCalculator};
pub use uk::{NiBreakdown, UkCgt, UkDividendTax, UkIncomeTax, UkLiability, UkTaxCalculator};
