//! UK and South Africa cross-border tax calculation: progressive band
//! arithmetic over versioned year configurations, statutory residence and
//! domicile determination, treaty tie-breaking and foreign tax credit
//! relief, composed into an auditable total liability.

pub mod audit;
pub mod bands;
pub mod cmd;
pub mod config;
pub mod dta;
pub mod engine;
pub mod error;
pub mod income;
pub mod residency;
pub mod tax;
pub mod warnings;
pub mod year;

// Flat public surface for domain types and functions.
pub use audit::{audit_record_id, AuditStore, CalculationAuditRecord};
pub use bands::{apply_bands, apply_bands_above, validate_bands, BandResult, BandSlice, TaxBandDef};
pub use config::{ConfigRepository, JurisdictionRules, SaRules, TaxYearConfig, UkRules};
pub use dta::{
    categorize, residence_tie_breaker, ArticleMapping, DtaReliefCalculator, DtaResidenceResult,
    ReliefCalculation, TaxingRights, TreatyArticle, TreatyResidence,
};
pub use engine::{
    IncomeLedger, ResidencyFactsProvider, SaAssessment, TaxCalculationRequest,
    TaxCalculationResult, TaxEngine, TaxpayerProfile, UkAssessment, ENGINE_VERSION,
};
pub use error::CalcError;
pub use income::{Currency, IncomeItem, IncomeScope, IncomeType};
pub use residency::{
    determine_residency, DomicileStatus, ResidencyDetermination, ResidencyFacts, RuleTrace,
    TieBreakerFacts,
};
pub use tax::{SaLiability, SaTaxCalculator, UkLiability, UkTaxCalculator};
pub use warnings::Warning;
pub use year::{Jurisdiction, TaxYear};
