//! Write-once audit records for calculation reproducibility.

use crate::engine::{TaxCalculationRequest, TaxCalculationResult};
use crate::error::CalcError;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Full snapshot of one calculation: every input, the config versions used,
/// all intermediates (inside the result) and the final liability.
///
/// Re-running the recorded request against the recorded config versions
/// reproduces the recorded result exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalculationAuditRecord {
    /// Content hash of (request, config versions, engine version); the
    /// timestamp is excluded so identical inputs share an id.
    pub id: String,
    pub engine_version: String,
    #[schemars(with = "String")]
    pub created_at: DateTime<Utc>,
    pub request: TaxCalculationRequest,
    /// "uk" / "sa" mapped to the config version used.
    pub config_versions: BTreeMap<String, u32>,
    pub result: TaxCalculationResult,
}

/// Deterministic record id over the calculation's inputs.
pub fn audit_record_id(
    request: &TaxCalculationRequest,
    config_versions: &BTreeMap<String, u32>,
    engine_version: &str,
) -> Result<String, CalcError> {
    #[derive(Serialize)]
    struct Hashed<'a> {
        request: &'a TaxCalculationRequest,
        config_versions: &'a BTreeMap<String, u32>,
        engine_version: &'a str,
    }
    let canonical = serde_json::to_vec(&Hashed {
        request,
        config_versions,
        engine_version,
    })
    .map_err(|err| CalcError::InvalidInput(format!("audit serialization: {err}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

/// In-memory, write-once audit store. Records are keyed by content hash,
/// so re-inserting an identical calculation is a no-op; superseded
/// calculations are never deleted.
#[derive(Debug, Default)]
pub struct AuditStore {
    records: RwLock<HashMap<String, Arc<CalculationAuditRecord>>>,
}

impl AuditStore {
    pub fn new() -> Self {
        AuditStore::default()
    }

    pub fn insert(&self, record: CalculationAuditRecord) -> Arc<CalculationAuditRecord> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records
            .entry(record.id.clone())
            .or_insert_with(|| Arc::new(record))
            .clone()
    }

    pub fn get(&self, id: &str) -> Result<Arc<CalculationAuditRecord>, CalcError> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| CalcError::AuditRecordNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
