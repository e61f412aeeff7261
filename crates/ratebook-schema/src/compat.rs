//! # Schema Compatibility
//!
//! Decides whether a rule document's declared schema version can be
//! interpreted by this evaluator, and if so how.
//!
//! A declared version is accepted natively when some supported version
//! shares its major. Otherwise a shim registered for the declared
//! `(major, minor)` may rewrite the document into a supported major. Shim
//! use is logged at WARN so legacy documents stay visible in operations.
//!
//! Before either path, the version embedded in the rule tree must equal the
//! declared one. A RuleSet whose `schema_version` field disagrees with its
//! own rules is never interpreted.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::warn;

use crate::error::SchemaCompatibilityError;
use crate::version::SchemaVersion;

/// Rewrites a rule tree from a legacy schema into a supported one.
pub type ShimFn = fn(Value) -> Result<Value, String>;

/// A registered compatibility shim.
#[derive(Debug, Clone)]
pub struct CompatibilityShim {
    pub name: &'static str,
    /// Version the shim produces.
    pub target: SchemaVersion,
    pub apply: ShimFn,
}

/// How a compatible document will be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A supported version shares the declared major.
    Native,
    /// The named shim rewrites the document to `target`.
    Shimmed {
        shim: &'static str,
        target: SchemaVersion,
    },
}

/// The set of schema versions an evaluator understands, plus its shims.
#[derive(Debug, Clone)]
pub struct CompatibilityChecker {
    supported: BTreeSet<SchemaVersion>,
    shims: BTreeMap<(u64, u64), CompatibilityShim>,
}

impl CompatibilityChecker {
    /// A checker with the given supported versions and no shims.
    pub fn new(supported: impl IntoIterator<Item = SchemaVersion>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            shims: BTreeMap::new(),
        }
    }

    /// Versions 1.0.0 and 1.1.0 with the 0.9 legacy shim.
    pub fn standard() -> Self {
        Self::new([SchemaVersion::new(1, 0, 0), SchemaVersion::new(1, 1, 0)]).with_standard_shims()
    }

    /// Register the shims shipped with this crate.
    pub fn with_standard_shims(mut self) -> Self {
        self.register_shim(0, 9, legacy_v0_9_shim());
        self
    }

    /// Register a shim for documents declaring `major.minor.*`.
    ///
    /// A later registration for the same key replaces the earlier one.
    pub fn register_shim(&mut self, major: u64, minor: u64, shim: CompatibilityShim) {
        self.shims.insert((major, minor), shim);
    }

    /// Supported versions in ascending order.
    pub fn supported(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.supported.iter()
    }

    fn supported_strings(&self) -> Vec<String> {
        self.supported.iter().map(ToString::to_string).collect()
    }

    fn supports_major(&self, version: &SchemaVersion) -> bool {
        self.supported.iter().any(|s| s.is_compatible_with(version))
    }

    /// Check a declared version against the rule tree and the supported set.
    pub fn validate(
        &self,
        declared: &SchemaVersion,
        rules: &Value,
    ) -> Result<Resolution, SchemaCompatibilityError> {
        check_embedded(declared, rules)?;

        if self.supports_major(declared) {
            return Ok(Resolution::Native);
        }

        if let Some(shim) = self.shims.get(&(declared.major, declared.minor)) {
            if self.supports_major(&shim.target) {
                warn!(
                    declared = %declared,
                    shim = shim.name,
                    target = %shim.target,
                    "interpreting rule document through compatibility shim"
                );
                return Ok(Resolution::Shimmed {
                    shim: shim.name,
                    target: shim.target,
                });
            }
        }

        Err(SchemaCompatibilityError::Incompatible {
            declared: declared.to_string(),
            supported: self.supported_strings(),
        })
    }

    /// Validate, then return the rule tree in a supported schema.
    ///
    /// Native documents are borrowed unchanged; shimmed ones are rewritten.
    pub fn normalize<'a>(
        &self,
        declared: &SchemaVersion,
        rules: &'a Value,
    ) -> Result<Cow<'a, Value>, SchemaCompatibilityError> {
        match self.validate(declared, rules)? {
            Resolution::Native => Ok(Cow::Borrowed(rules)),
            Resolution::Shimmed { .. } => {
                let shim = self
                    .shims
                    .get(&(declared.major, declared.minor))
                    .ok_or_else(|| SchemaCompatibilityError::Incompatible {
                        declared: declared.to_string(),
                        supported: self.supported_strings(),
                    })?;
                let rewritten = (shim.apply)(rules.clone()).map_err(|reason| {
                    SchemaCompatibilityError::ShimFailed {
                        shim: shim.name.to_string(),
                        version: declared.to_string(),
                        reason,
                    }
                })?;
                Ok(Cow::Owned(rewritten))
            }
        }
    }
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_embedded(declared: &SchemaVersion, rules: &Value) -> Result<(), SchemaCompatibilityError> {
    let embedded = rules
        .get("schema_version")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaCompatibilityError::EmbeddedMissing {
            declared: declared.to_string(),
        })?;
    match embedded.parse::<SchemaVersion>() {
        Ok(v) if v == *declared => Ok(()),
        _ => Err(SchemaCompatibilityError::EmbeddedMismatch {
            declared: declared.to_string(),
            embedded: embedded.to_string(),
        }),
    }
}

/// Schema 0.9 named the product base price `price`. Renames it to
/// `unit_price` and stamps the document as 1.0.0.
pub fn legacy_v0_9_shim() -> CompatibilityShim {
    CompatibilityShim {
        name: "legacy-0.9",
        target: SchemaVersion::new(1, 0, 0),
        apply: rename_price_to_unit_price,
    }
}

fn rename_price_to_unit_price(mut rules: Value) -> Result<Value, String> {
    let root = rules
        .as_object_mut()
        .ok_or_else(|| "rule document is not an object".to_string())?;
    if let Some(products) = root.get_mut("products").and_then(Value::as_array_mut) {
        for (i, product) in products.iter_mut().enumerate() {
            let product = product
                .as_object_mut()
                .ok_or_else(|| format!("products[{i}] is not an object"))?;
            if let Some(price) = product.remove("price") {
                if product.contains_key("unit_price") {
                    return Err(format!("products[{i}] carries both price and unit_price"));
                }
                product.insert("unit_price".to_string(), price);
            }
        }
    }
    root.insert("schema_version".to_string(), Value::String("1.0.0".to_string()));
    Ok(rules)
}
