//! # RuleSet Storage
//!
//! The registry talks to storage only through [`RuleSetStore`]. Writes after
//! creation are compare-and-set on the record's [`Revision`]: a write whose
//! expected revision is stale fails instead of overwriting, so two concurrent
//! publishes of the same draft cannot both land.
//!
//! [`InMemoryRuleSetStore`] is the reference implementation. All operations
//! are synchronous; the lock is `parking_lot`, never held across `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use ratebook_core::{FirmId, RuleSetCode, RuleSetId};

use crate::ruleset::{Revision, RuleSet};

/// Storage-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `(firm, code, version)` is already taken.
    #[error("ruleset {code} v{version} already exists for firm {firm_id}")]
    Duplicate {
        firm_id: FirmId,
        code: RuleSetCode,
        version: u32,
    },

    #[error("ruleset {0} not found")]
    NotFound(RuleSetId),

    /// The persisted revision moved since the caller read the record.
    #[error("ruleset {id} changed concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        id: RuleSetId,
        expected: Revision,
        actual: Revision,
    },
}

/// Persistence seam for RuleSets.
pub trait RuleSetStore: Send + Sync + std::fmt::Debug {
    /// Insert a new record. Fails if its natural key is taken.
    fn insert(&self, ruleset: RuleSet) -> Result<(), StoreError>;

    /// Fetch by opaque id within a firm.
    fn get(&self, firm_id: &FirmId, id: &RuleSetId) -> Option<RuleSet>;

    /// Fetch by natural key.
    fn find(&self, firm_id: &FirmId, code: &RuleSetCode, version: u32) -> Option<RuleSet>;

    /// All of a firm's RuleSets, ordered by code then version.
    fn list(&self, firm_id: &FirmId) -> Vec<RuleSet>;

    /// Highest version used for `(firm, code)`.
    fn latest_version(&self, firm_id: &FirmId, code: &RuleSetCode) -> Option<u32>;

    /// Replace the record with `candidate` iff its persisted revision is
    /// still `expected`.
    fn compare_and_swap(&self, expected: Revision, candidate: RuleSet) -> Result<(), StoreError>;
}

type NaturalKey = (FirmId, RuleSetCode, u32);

#[derive(Debug, Default)]
struct Tables {
    by_id: HashMap<RuleSetId, RuleSet>,
    by_key: HashMap<NaturalKey, RuleSetId>,
}

/// Thread-safe, cloneable in-memory RuleSet store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleSetStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRuleSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a record with no checks at all.
    ///
    /// Simulates out-of-band storage corruption in tests; the registry never
    /// calls this.
    #[doc(hidden)]
    pub fn overwrite_unchecked(&self, ruleset: RuleSet) {
        self.tables.write().by_id.insert(ruleset.id, ruleset);
    }
}

impl RuleSetStore for InMemoryRuleSetStore {
    fn insert(&self, ruleset: RuleSet) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let key = (ruleset.firm_id, ruleset.code.clone(), ruleset.version);
        if tables.by_key.contains_key(&key) {
            return Err(StoreError::Duplicate {
                firm_id: ruleset.firm_id,
                code: ruleset.code,
                version: ruleset.version,
            });
        }
        tables.by_key.insert(key, ruleset.id);
        tables.by_id.insert(ruleset.id, ruleset);
        Ok(())
    }

    fn get(&self, firm_id: &FirmId, id: &RuleSetId) -> Option<RuleSet> {
        self.tables
            .read()
            .by_id
            .get(id)
            .filter(|rs| rs.firm_id == *firm_id)
            .cloned()
    }

    fn find(&self, firm_id: &FirmId, code: &RuleSetCode, version: u32) -> Option<RuleSet> {
        let tables = self.tables.read();
        let id = tables.by_key.get(&(*firm_id, code.clone(), version))?;
        tables.by_id.get(id).cloned()
    }

    fn list(&self, firm_id: &FirmId) -> Vec<RuleSet> {
        let mut out: Vec<RuleSet> = self
            .tables
            .read()
            .by_id
            .values()
            .filter(|rs| rs.firm_id == *firm_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.code.cmp(&b.code).then(a.version.cmp(&b.version)));
        out
    }

    fn latest_version(&self, firm_id: &FirmId, code: &RuleSetCode) -> Option<u32> {
        self.tables
            .read()
            .by_key
            .keys()
            .filter(|(f, c, _)| f == firm_id && c == code)
            .map(|(_, _, v)| *v)
            .max()
    }

    fn compare_and_swap(&self, expected: Revision, candidate: RuleSet) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let current = tables
            .by_id
            .get_mut(&candidate.id)
            .ok_or(StoreError::NotFound(candidate.id))?;
        if current.revision != expected {
            return Err(StoreError::Conflict {
                id: candidate.id,
                expected,
                actual: current.revision,
            });
        }
        *current = candidate;
        Ok(())
    }
}
