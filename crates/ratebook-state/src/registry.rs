//! # RuleSet Registry
//!
//! Lifecycle operations over a [`RuleSetStore`]. Every write after creation
//! funnels through one commit path which:
//!
//! 1. rejects a candidate built from a stale revision,
//! 2. diffs the candidate against the persisted record field by field and
//!    raises [`ImmutableRuleSetError`] naming the first frozen field that
//!    changed,
//! 3. recomputes the checksum from the candidate's rules (a caller-supplied
//!    checksum is never trusted),
//! 4. persists through compare-and-set on the persisted revision.
//!
//! Draft-time checks are structural (schema compatibility, JSON Schema).
//! Publish-time checks add the full configuration validation, so a
//! published RuleSet is always evaluable.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use ratebook_core::{Checksum, Currency, FirmId, RuleSetCode, RuleSetId, Timestamp};
use ratebook_schema::{CompatibilityChecker, DocumentValidator, SchemaVersion};

use crate::error::{ImmutableRuleSetError, RegistryError};
use crate::ruleset::{Revision, RuleSet, RuleSetStatus};
use crate::store::{InMemoryRuleSetStore, RuleSetStore};

/// Input for [`RuleSetRegistry::create_draft`].
#[derive(Debug, Clone)]
pub struct NewRuleSet {
    pub code: RuleSetCode,
    /// Business version. `None` takes the next free version for the code.
    pub version: Option<u32>,
    pub schema_version: SchemaVersion,
    pub default_currency: Currency,
    pub rules: Value,
}

/// RuleSet lifecycle service.
#[derive(Debug, Clone)]
pub struct RuleSetRegistry {
    store: Arc<dyn RuleSetStore>,
    checker: CompatibilityChecker,
    validator: Arc<DocumentValidator>,
}

impl RuleSetRegistry {
    pub fn new(
        store: Arc<dyn RuleSetStore>,
        checker: CompatibilityChecker,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            store,
            checker,
            validator: Arc::new(DocumentValidator::new()?),
        })
    }

    /// Registry over a fresh in-memory store with the standard checker.
    pub fn in_memory() -> Result<Self, RegistryError> {
        Self::new(
            Arc::new(InMemoryRuleSetStore::new()),
            CompatibilityChecker::standard(),
        )
    }

    pub fn checker(&self) -> &CompatibilityChecker {
        &self.checker
    }

    pub fn store(&self) -> &Arc<dyn RuleSetStore> {
        &self.store
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch by natural key.
    pub fn load(
        &self,
        firm_id: &FirmId,
        code: &RuleSetCode,
        version: u32,
    ) -> Result<RuleSet, RegistryError> {
        self.store
            .find(firm_id, code, version)
            .ok_or_else(|| RegistryError::NotFound(format!("ruleset {code} v{version}")))
    }

    /// Fetch by opaque id.
    pub fn get(&self, firm_id: &FirmId, id: &RuleSetId) -> Result<RuleSet, RegistryError> {
        self.store
            .get(firm_id, id)
            .ok_or_else(|| RegistryError::NotFound(format!("ruleset {id}")))
    }

    pub fn list(&self, firm_id: &FirmId) -> Vec<RuleSet> {
        self.store.list(firm_id)
    }

    /// The version a new draft of `code` would receive.
    pub fn next_version(&self, firm_id: &FirmId, code: &RuleSetCode) -> u32 {
        self.store
            .latest_version(firm_id, code)
            .map_or(1, |v| v.saturating_add(1))
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Create a draft. Fails if `(firm, code, version)` is taken.
    pub fn create_draft(&self, firm_id: FirmId, new: NewRuleSet) -> Result<RuleSet, RegistryError> {
        let checksum = self.check_draft_rules(&new.schema_version, &new.rules)?;
        let version = match new.version {
            Some(v) => v,
            None => self.next_version(&firm_id, &new.code),
        };
        if version == 0 {
            return Err(RegistryError::Invalid("ruleset version must be at least 1".into()));
        }

        let ruleset = RuleSet {
            id: RuleSetId::new(),
            firm_id,
            code: new.code,
            version,
            schema_version: new.schema_version,
            default_currency: new.default_currency,
            rules: new.rules,
            checksum,
            status: RuleSetStatus::Draft,
            created_at: Timestamp::now(),
            published_at: None,
            deprecated_at: None,
            revision: Revision::INITIAL,
        };
        self.store.insert(ruleset.clone())?;
        info!(
            ruleset_id = %ruleset.id,
            code = %ruleset.code,
            version = ruleset.version,
            checksum = %ruleset.checksum,
            "ruleset draft created"
        );
        Ok(ruleset)
    }

    /// Replace a draft's rules.
    ///
    /// `expected` pins the revision the caller last read; `None` accepts
    /// whatever is persisted now (the write itself is still compare-and-set).
    pub fn update(
        &self,
        firm_id: &FirmId,
        id: &RuleSetId,
        rules: Value,
        expected: Option<Revision>,
    ) -> Result<RuleSet, RegistryError> {
        let persisted = self.get(firm_id, id)?;
        if !persisted.status.is_editable() {
            return Err(ImmutableRuleSetError {
                ruleset_id: persisted.id,
                field: "rules",
            }
            .into());
        }
        let mut candidate = persisted.clone();
        candidate.rules = rules;
        if let Some(rev) = expected {
            candidate.revision = rev;
        }
        self.save(candidate)
    }

    /// Persist an edited record through the commit path.
    ///
    /// `candidate.revision` must be the revision it was read at. Status
    /// changes are only possible through [`publish`](Self::publish) and
    /// [`deprecate`](Self::deprecate).
    pub fn save(&self, candidate: RuleSet) -> Result<RuleSet, RegistryError> {
        let persisted = self.get(&candidate.firm_id, &candidate.id)?;
        if candidate.status != persisted.status {
            return Err(transition_error(&persisted, candidate.status));
        }
        if persisted.status.is_editable() {
            self.check_draft_rules(&candidate.schema_version, &candidate.rules)?;
        }
        self.commit(&persisted, candidate)
    }

    /// Draft → published. Runs publish-time validation and freezes the
    /// checksum. Publishing a published RuleSet returns it unchanged.
    pub fn publish(&self, firm_id: &FirmId, id: &RuleSetId) -> Result<RuleSet, RegistryError> {
        let persisted = self.get(firm_id, id)?;
        match persisted.status {
            RuleSetStatus::Published => {
                debug!(ruleset_id = %persisted.id, "publish of published ruleset is a no-op");
                return Ok(persisted);
            }
            RuleSetStatus::Deprecated => {
                return Err(transition_error(&persisted, RuleSetStatus::Published));
            }
            RuleSetStatus::Draft => {}
        }

        let normalized = self
            .checker
            .normalize(&persisted.schema_version, &persisted.rules)?;
        self.validator.validate_for_publish(&normalized)?;

        let mut candidate = persisted.clone();
        candidate.status = RuleSetStatus::Published;
        candidate.published_at = Some(Timestamp::now());
        let published = self.commit(&persisted, candidate)?;
        info!(
            ruleset_id = %published.id,
            code = %published.code,
            version = published.version,
            checksum = %published.checksum,
            "ruleset published"
        );
        Ok(published)
    }

    /// Published → deprecated. The RuleSet stays readable for reproduction.
    pub fn deprecate(&self, firm_id: &FirmId, id: &RuleSetId) -> Result<RuleSet, RegistryError> {
        let persisted = self.get(firm_id, id)?;
        if persisted.status != RuleSetStatus::Published {
            return Err(transition_error(&persisted, RuleSetStatus::Deprecated));
        }
        let mut candidate = persisted.clone();
        candidate.status = RuleSetStatus::Deprecated;
        candidate.deprecated_at = Some(Timestamp::now());
        let deprecated = self.commit(&persisted, candidate)?;
        info!(
            ruleset_id = %deprecated.id,
            code = %deprecated.code,
            version = deprecated.version,
            "ruleset deprecated"
        );
        Ok(deprecated)
    }

    // ── Commit path ──────────────────────────────────────────────────

    fn check_draft_rules(
        &self,
        schema_version: &SchemaVersion,
        rules: &Value,
    ) -> Result<Checksum, RegistryError> {
        let normalized = self.checker.normalize(schema_version, rules)?;
        self.validator.validate_structure(&normalized)?;
        Ok(Checksum::compute(rules)?)
    }

    fn commit(&self, persisted: &RuleSet, mut candidate: RuleSet) -> Result<RuleSet, RegistryError> {
        if candidate.revision != persisted.revision {
            return Err(RegistryError::ConcurrentModification {
                ruleset_id: persisted.id,
                expected: candidate.revision,
                actual: persisted.revision,
            });
        }
        if let Some(field) = frozen_field_changed(persisted, &candidate) {
            return Err(ImmutableRuleSetError {
                ruleset_id: persisted.id,
                field,
            }
            .into());
        }
        if !persisted.status.can_transition_to(candidate.status) {
            return Err(transition_error(persisted, candidate.status));
        }

        candidate.checksum = Checksum::compute(&candidate.rules)?;
        candidate.revision = persisted.revision.next();
        self.store
            .compare_and_swap(persisted.revision, candidate.clone())?;
        debug!(
            ruleset_id = %candidate.id,
            revision = %candidate.revision,
            status = %candidate.status,
            "ruleset committed"
        );
        Ok(candidate)
    }
}

/// Status change not reachable from the persisted status. Leaving a frozen
/// status is an immutability violation; skipping a step from draft is not.
fn transition_error(persisted: &RuleSet, to: RuleSetStatus) -> RegistryError {
    if persisted.status.is_editable() {
        RegistryError::InvalidTransition {
            from: persisted.status,
            to,
        }
    } else {
        ImmutableRuleSetError {
            ruleset_id: persisted.id,
            field: "status",
        }
        .into()
    }
}

/// First field the candidate changes that the persisted status freezes.
fn frozen_field_changed(persisted: &RuleSet, candidate: &RuleSet) -> Option<&'static str> {
    let identity = [
        ("id", persisted.id == candidate.id),
        ("firm_id", persisted.firm_id == candidate.firm_id),
        ("code", persisted.code == candidate.code),
        ("version", persisted.version == candidate.version),
        ("created_at", persisted.created_at == candidate.created_at),
    ];
    if let Some((field, _)) = identity.into_iter().find(|(_, same)| !*same) {
        return Some(field);
    }

    if !persisted.status.is_editable() {
        let content = [
            ("schema_version", persisted.schema_version == candidate.schema_version),
            ("default_currency", persisted.default_currency == candidate.default_currency),
            ("rules", persisted.rules == candidate.rules),
            ("checksum", persisted.checksum == candidate.checksum),
        ];
        if let Some((field, _)) = content.into_iter().find(|(_, same)| !*same) {
            return Some(field);
        }
    }

    if persisted.published_at.is_some() && persisted.published_at != candidate.published_at {
        return Some("published_at");
    }
    if persisted.deprecated_at.is_some() && persisted.deprecated_at != candidate.deprecated_at {
        return Some("deprecated_at");
    }
    if candidate.published_at.is_some() && candidate.status == RuleSetStatus::Draft {
        return Some("published_at");
    }
    if candidate.deprecated_at.is_some() && candidate.status != RuleSetStatus::Deprecated {
        return Some("deprecated_at");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> RuleSetRegistry {
        RuleSetRegistry::in_memory().unwrap()
    }

    fn basic_rules() -> Value {
        json!({
            "schema_version": "1.0.0",
            "products": [{"code": "BASIC", "unit_price": "1000.00"}],
            "discounts": [
                {"id": "volume", "kind": "per_line", "priority": 1,
                 "condition": {"type": "min_quantity", "value": 5},
                 "adjustment": {"type": "percent", "value": "10"},
                 "stacking": "additive"}
            ]
        })
    }

    fn new_ruleset(rules: Value) -> NewRuleSet {
        NewRuleSet {
            code: RuleSetCode::new("STANDARD").unwrap(),
            version: None,
            schema_version: SchemaVersion::new(1, 0, 0),
            default_currency: Currency::new("USD").unwrap(),
            rules,
        }
    }

    fn draft(reg: &RuleSetRegistry, firm: FirmId) -> RuleSet {
        reg.create_draft(firm, new_ruleset(basic_rules())).unwrap()
    }

    #[test]
    fn create_draft_computes_checksum_and_version() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        assert_eq!(rs.status, RuleSetStatus::Draft);
        assert_eq!(rs.version, 1);
        assert_eq!(rs.checksum, Checksum::compute(&basic_rules()).unwrap());
        assert_eq!(rs.revision, Revision::INITIAL);

        let second = draft(&reg, firm);
        assert_eq!(second.version, 2);
        assert_eq!(reg.next_version(&firm, &rs.code), 3);
    }

    #[test]
    fn duplicate_natural_key_is_rejected() {
        let reg = registry();
        let firm = FirmId::new();
        let mut new = new_ruleset(basic_rules());
        new.version = Some(4);
        reg.create_draft(firm, new.clone()).unwrap();
        let err = reg.create_draft(firm, new).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { version: 4, .. }));
    }

    #[test]
    fn draft_rejects_structurally_invalid_rules() {
        let reg = registry();
        let bad = json!({"schema_version": "1.0.0", "products": "none"});
        let err = reg.create_draft(FirmId::new(), new_ruleset(bad)).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn draft_rejects_unsupported_schema_major() {
        let reg = registry();
        let mut new = new_ruleset(json!({"schema_version": "2.0.0", "products": []}));
        new.schema_version = SchemaVersion::new(2, 0, 0);
        let err = reg.create_draft(FirmId::new(), new).unwrap_err();
        assert!(matches!(err, RegistryError::SchemaCompatibility(_)));
    }

    #[test]
    fn draft_rejects_embedded_version_mismatch() {
        let reg = registry();
        let mut new = new_ruleset(basic_rules());
        new.schema_version = SchemaVersion::new(1, 1, 0);
        let err = reg.create_draft(FirmId::new(), new).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::SchemaCompatibility(
                ratebook_schema::SchemaCompatibilityError::EmbeddedMismatch { .. }
            )
        ));
    }

    #[test]
    fn draft_rejects_float_numbers() {
        let reg = registry();
        let mut rules = basic_rules();
        rules["discounts"][0]["priority"] = json!(1.5);
        let err = reg.create_draft(FirmId::new(), new_ruleset(rules)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation(_) | RegistryError::Canonicalization(_)
        ));
    }

    #[test]
    fn update_recomputes_checksum_while_draft() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        let mut rules = basic_rules();
        rules["products"][0]["unit_price"] = json!("1200.00");
        let updated = reg.update(&firm, &rs.id, rules.clone(), Some(rs.revision)).unwrap();
        assert_ne!(updated.checksum, rs.checksum);
        assert_eq!(updated.checksum, Checksum::compute(&rules).unwrap());
        assert_eq!(updated.revision, rs.revision.next());
    }

    #[test]
    fn update_after_publish_names_rules_field() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        reg.publish(&firm, &rs.id).unwrap();
        let err = reg.update(&firm, &rs.id, basic_rules(), None).unwrap_err();
        match err {
            RegistryError::Immutable(e) => assert_eq!(e.field, "rules"),
            other => panic!("expected immutable error, got {other:?}"),
        }
    }

    #[test]
    fn publish_is_idempotent() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        let first = reg.publish(&firm, &rs.id).unwrap();
        let second = reg.publish(&firm, &rs.id).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, RuleSetStatus::Published);
        assert!(first.published_at.is_some());
        assert_eq!(first.checksum, rs.checksum);
    }

    #[test]
    fn publish_runs_configuration_checks() {
        let reg = registry();
        let firm = FirmId::new();
        let mut rules = basic_rules();
        rules["discounts"][0].as_object_mut().unwrap().remove("stacking");
        let rs = reg.create_draft(firm, new_ruleset(rules)).unwrap();
        let err = reg.publish(&firm, &rs.id).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation(ratebook_schema::DocumentError::Configuration(_))
        ));
        assert_eq!(reg.get(&firm, &rs.id).unwrap().status, RuleSetStatus::Draft);
    }

    #[test]
    fn deprecate_then_publish_fails() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        reg.publish(&firm, &rs.id).unwrap();
        let dep = reg.deprecate(&firm, &rs.id).unwrap();
        assert_eq!(dep.status, RuleSetStatus::Deprecated);
        assert!(dep.deprecated_at.is_some());

        let err = reg.publish(&firm, &rs.id).unwrap_err();
        assert!(matches!(err, RegistryError::Immutable(ref e) if e.field == "status"));
        let err = reg.deprecate(&firm, &rs.id).unwrap_err();
        assert!(matches!(err, RegistryError::Immutable(_)));
    }

    #[test]
    fn deprecate_requires_published() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        let err = reg.deprecate(&firm, &rs.id).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidTransition {
                from: RuleSetStatus::Draft,
                to: RuleSetStatus::Deprecated
            }
        ));
    }

    #[test]
    fn save_names_each_frozen_field() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        let published = reg.publish(&firm, &rs.id).unwrap();

        let mut c = published.clone();
        c.default_currency = Currency::new("EUR").unwrap();
        assert!(matches!(reg.save(c), Err(RegistryError::Immutable(ref e)) if e.field == "default_currency"));

        let mut c = published.clone();
        c.schema_version = SchemaVersion::new(1, 1, 0);
        assert!(matches!(reg.save(c), Err(RegistryError::Immutable(ref e)) if e.field == "schema_version"));

        let mut c = published.clone();
        c.code = RuleSetCode::new("OTHER").unwrap();
        assert!(matches!(reg.save(c), Err(RegistryError::Immutable(ref e)) if e.field == "code"));

        let mut c = published.clone();
        c.published_at = Some(Timestamp::parse("2020-01-01T00:00:00Z").unwrap());
        assert!(matches!(reg.save(c), Err(RegistryError::Immutable(ref e)) if e.field == "published_at"));

        let mut c = published;
        c.status = RuleSetStatus::Draft;
        assert!(matches!(reg.save(c), Err(RegistryError::Immutable(ref e)) if e.field == "status"));
    }

    #[test]
    fn save_ignores_caller_supplied_checksum() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        let mut c = rs.clone();
        c.checksum = Checksum::compute(&json!({"forged": true})).unwrap();
        let saved = reg.save(c).unwrap();
        assert_eq!(saved.checksum, rs.checksum);
    }

    #[test]
    fn stale_writes_are_rejected() {
        let reg = registry();
        let firm = FirmId::new();
        let stale = draft(&reg, firm);
        reg.update(&firm, &stale.id, basic_rules(), None).unwrap();

        let err = reg
            .update(&firm, &stale.id, basic_rules(), Some(stale.revision))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ConcurrentModification { .. }));

        let err = reg.save(stale).unwrap_err();
        assert!(matches!(err, RegistryError::ConcurrentModification { .. }));
    }

    #[test]
    fn update_racing_publish_fails() {
        let reg = registry();
        let firm = FirmId::new();
        let read_before_publish = draft(&reg, firm);
        reg.publish(&firm, &read_before_publish.id).unwrap();

        let mut edit = read_before_publish;
        edit.rules["products"][0]["unit_price"] = json!("1.00");
        let err = reg.save(edit).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ConcurrentModification { .. } | RegistryError::Immutable(_)
        ));
    }

    #[test]
    fn reads_are_tenant_scoped() {
        let reg = registry();
        let firm = FirmId::new();
        let rs = draft(&reg, firm);
        assert!(reg.get(&firm, &rs.id).is_ok());
        assert!(matches!(reg.get(&FirmId::new(), &rs.id), Err(RegistryError::NotFound(_))));
        assert!(reg.load(&firm, &rs.code, 1).is_ok());
        assert!(matches!(reg.load(&firm, &rs.code, 9), Err(RegistryError::NotFound(_))));
        assert_eq!(reg.list(&firm).len(), 1);
    }

    #[test]
    fn legacy_rules_are_stored_untouched() {
        let reg = registry();
        let legacy = json!({"schema_version": "0.9.0", "products": [{"code": "BASIC", "price": "10.00"}]});
        let mut new = new_ruleset(legacy.clone());
        new.schema_version = SchemaVersion::new(0, 9, 0);
        let firm = FirmId::new();
        let rs = reg.create_draft(firm, new).unwrap();
        assert_eq!(rs.rules, legacy);
        let published = reg.publish(&firm, &rs.id).unwrap();
        assert_eq!(published.checksum, Checksum::compute(&legacy).unwrap());
    }
}
