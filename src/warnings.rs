use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Advisory conditions attached to a calculation result.
///
/// None of these abort a calculation; they flag outcomes that need human
/// follow-up or that were degraded to a conservative default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// Treaty residence could not be resolved; a mutual agreement procedure
    /// is required. No relief was applied.
    ResidenceUndetermined,
    /// The item could not be mapped to a treaty article (missing permanent
    /// establishment or employer-residence facts). Relief for it is zero.
    TreatyArticleUnresolved { item_id: String },
    /// Fewer than five prior-year SA day counts were supplied; missing years
    /// count as zero days in the six-year average.
    MissingPriorYearDayCounts { supplied: usize },
}
