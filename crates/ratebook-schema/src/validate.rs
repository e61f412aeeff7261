//! # Rule Document Validation
//!
//! Two gates, applied at different points of a RuleSet's lifecycle:
//!
//! - **Structural** (draft time): the normalized rule tree conforms to the
//!   JSON Schema for its major (`schemas/rules-v1.schema.json`). Drafts are
//!   allowed to be incomplete in business terms, but never shapeless.
//! - **Configuration** (publish time): the tree parses into the typed model
//!   and is a coherent pricing policy. Every finding is collected before the
//!   error is returned so an author sees all problems at once.
//!
//! The JSON Schema is compiled once, at construction, from a copy embedded
//! in the binary. No `$ref` ever leaves the document, so no retriever is
//! installed.

use std::collections::{BTreeMap, HashSet};

use jsonschema::Validator;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::document::{
    Adjustment, DiscountKind, DiscountRule, QuoteCondition, RuleDocument, StackingMode,
};
use crate::error::{DocumentError, Violation, Violations};

const RULES_V1_SCHEMA: &str = include_str!("../schemas/rules-v1.schema.json");

/// Compiled validator for schema-major-1 rule documents.
pub struct DocumentValidator {
    validator: Validator,
}

impl std::fmt::Debug for DocumentValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentValidator")
            .field("schema", &"rules-v1.schema.json")
            .finish()
    }
}

impl DocumentValidator {
    /// Compile the embedded rule document schema.
    pub fn new() -> Result<Self, DocumentError> {
        let schema: Value = serde_json::from_str(RULES_V1_SCHEMA)
            .map_err(|e| DocumentError::SchemaBuild(format!("invalid JSON: {e}")))?;
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        let validator = opts
            .build(&schema)
            .map_err(|e| DocumentError::SchemaBuild(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Draft-time check: JSON Schema conformance only.
    pub fn validate_structure(&self, rules: &Value) -> Result<(), DocumentError> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(rules)
            .map(|e| Violation::new(e.instance_path.to_string(), e.to_string()))
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::Structural(violations.into()))
        }
    }

    /// Publish-time check: structure, typed parse, then policy coherence.
    ///
    /// Returns the typed document on success.
    pub fn validate_for_publish(&self, rules: &Value) -> Result<RuleDocument, DocumentError> {
        self.validate_structure(rules)?;
        let document =
            RuleDocument::from_value(rules).map_err(|e| DocumentError::Malformed(e.to_string()))?;
        let violations = check_configuration(&document);
        if violations.is_empty() {
            Ok(document)
        } else {
            Err(DocumentError::Configuration(violations))
        }
    }
}

/// Collect every configuration problem in a typed document.
pub fn check_configuration(document: &RuleDocument) -> Violations {
    let mut out = Violations::default();

    if document.products.is_empty() {
        out.push(Violation::new("/products", "at least one product is required"));
    }

    let mut codes = HashSet::new();
    for (i, product) in document.products.iter().enumerate() {
        let at = format!("/products/{i}");
        if !codes.insert(product.code.as_str()) {
            out.push(Violation::new(
                format!("{at}/code"),
                format!("duplicate product code '{}'", product.code),
            ));
        }
        if product.unit_price.is_sign_negative() {
            out.push(Violation::new(
                format!("{at}/unit_price"),
                format!("product '{}' has a negative unit price", product.code),
            ));
        }
        let mut thresholds = HashSet::new();
        for (t, tier) in product.tiers.iter().enumerate() {
            let tier_at = format!("{at}/tiers/{t}");
            if tier.min_quantity == 0 {
                out.push(Violation::new(
                    format!("{tier_at}/min_quantity"),
                    "tier threshold must be at least 1",
                ));
            }
            if !thresholds.insert(tier.min_quantity) {
                out.push(Violation::new(
                    format!("{tier_at}/min_quantity"),
                    format!(
                        "product '{}' has more than one tier at quantity {}",
                        product.code, tier.min_quantity
                    ),
                ));
            }
            if tier.unit_price.is_sign_negative() {
                out.push(Violation::new(
                    format!("{tier_at}/unit_price"),
                    "tier unit price is negative",
                ));
            }
        }
    }

    let mut ids = HashSet::new();
    for (i, rule) in document.discounts.iter().enumerate() {
        let at = format!("/discounts/{i}");
        let id = rule.id();
        if !ids.insert(id) {
            out.push(Violation::new(format!("{at}/id"), format!("duplicate discount id '{id}'")));
        }
        if rule.stacking().is_none() {
            out.push(Violation::new(
                format!("{at}/stacking"),
                format!("discount '{id}' must declare a stacking mode"),
            ));
        }
        check_adjustment(rule, &at, &mut out);
        for (s, code) in rule.applies_to().iter().enumerate() {
            if !codes.contains(code.as_str()) {
                out.push(Violation::new(
                    format!("{at}/applies_to/{s}"),
                    format!("discount '{id}' references unknown product '{code}'"),
                ));
            }
        }
        if let DiscountRule::WholeQuote(q) = rule {
            match &q.condition {
                QuoteCondition::PromoCode { code } if code.trim().is_empty() => {
                    out.push(Violation::new(
                        format!("{at}/condition/code"),
                        format!("discount '{id}' has an empty promo code"),
                    ));
                }
                QuoteCondition::MinSubtotal { amount } if amount.is_sign_negative() => {
                    out.push(Violation::new(
                        format!("{at}/condition/amount"),
                        format!("discount '{id}' has a negative subtotal threshold"),
                    ));
                }
                _ => {}
            }
        }
    }

    check_exclusive_ties(document, &mut out);
    out
}

fn check_adjustment(rule: &DiscountRule, at: &str, out: &mut Violations) {
    let id = rule.id();
    let path = format!("{at}/adjustment/value");
    match rule.adjustment() {
        Adjustment::Percent { value } => {
            if *value <= Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
                out.push(Violation::new(
                    path,
                    format!("discount '{id}' percent must be in (0, 100], got {value}"),
                ));
            }
        }
        Adjustment::Amount { value } => {
            if rule.kind() == DiscountKind::CrossLine {
                out.push(Violation::new(
                    format!("{at}/adjustment/type"),
                    format!("cross-line discount '{id}' must use a percent adjustment"),
                ));
            } else if *value <= Decimal::ZERO {
                out.push(Violation::new(
                    path,
                    format!("discount '{id}' amount must be positive, got {value}"),
                ));
            }
        }
    }
}

/// Two exclusive rules of the same kind and priority with overlapping scope
/// have no defined winner.
fn check_exclusive_ties(document: &RuleDocument, out: &mut Violations) {
    let mut groups: BTreeMap<(DiscountKind, i32), Vec<&DiscountRule>> = BTreeMap::new();
    for rule in &document.discounts {
        if rule.stacking() == Some(StackingMode::Exclusive) {
            groups.entry((rule.kind(), rule.priority())).or_default().push(rule);
        }
    }
    for ((kind, priority), rules) in groups {
        for (i, a) in rules.iter().enumerate() {
            for b in &rules[i + 1..] {
                if scopes_overlap(a.applies_to(), b.applies_to()) {
                    out.push(Violation::new(
                        "/discounts",
                        format!(
                            "exclusive {} discounts '{}' and '{}' share priority {priority} and overlap in scope",
                            kind.as_str(),
                            a.id(),
                            b.id()
                        ),
                    ));
                }
            }
        }
    }
}

fn scopes_overlap(a: &[String], b: &[String]) -> bool {
    a.is_empty() || b.is_empty() || a.iter().any(|code| b.contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> DocumentValidator {
        DocumentValidator::new().unwrap()
    }

    fn publishable() -> Value {
        json!({
            "schema_version": "1.0.0",
            "products": [
                {"code": "BASIC", "unit_price": "1000.00"},
                {"code": "PLUS", "unit_price": "1500.00",
                 "tiers": [{"min_quantity": 10, "unit_price": "1400.00"}]}
            ],
            "discounts": [
                {"id": "volume", "kind": "per_line", "priority": 1,
                 "applies_to": ["BASIC"],
                 "condition": {"type": "min_quantity", "value": 5},
                 "adjustment": {"type": "percent", "value": "10"},
                 "stacking": "additive"}
            ]
        })
    }

    fn configuration_violations(rules: Value) -> Violations {
        match validator().validate_for_publish(&rules).unwrap_err() {
            DocumentError::Configuration(v) => v,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn embedded_schema_compiles() {
        let v = validator();
        assert!(format!("{v:?}").contains("rules-v1"));
    }

    #[test]
    fn publishable_document_passes() {
        let doc = validator().validate_for_publish(&publishable()).unwrap();
        assert_eq!(doc.products.len(), 2);
    }

    #[test]
    fn structure_rejects_unknown_top_level_fields() {
        let mut rules = publishable();
        rules["surcharges"] = json!([]);
        let err = validator().validate_structure(&rules).unwrap_err();
        assert!(matches!(err, DocumentError::Structural(_)));
    }

    #[test]
    fn structure_rejects_numeric_prices() {
        let rules = json!({"schema_version": "1.0.0", "products": [{"code": "X", "unit_price": 10}]});
        let err = validator().validate_structure(&rules).unwrap_err();
        assert!(err.violations().unwrap().mentions("/products/0/unit_price"));
    }

    #[test]
    fn structure_accepts_incomplete_drafts() {
        let draft = json!({"schema_version": "1.0.0", "products": []});
        validator().validate_structure(&draft).unwrap();
        let mut no_stacking = publishable();
        no_stacking["discounts"][0].as_object_mut().unwrap().remove("stacking");
        validator().validate_structure(&no_stacking).unwrap();
    }

    #[test]
    fn publish_requires_a_product() {
        let v = configuration_violations(json!({"schema_version": "1.0.0", "products": []}));
        assert!(v.mentions("at least one product"));
    }

    #[test]
    fn publish_requires_stacking_mode() {
        let mut rules = publishable();
        rules["discounts"][0].as_object_mut().unwrap().remove("stacking");
        let v = configuration_violations(rules);
        assert!(v.mentions("/discounts/0/stacking"));
        assert!(v.mentions("volume"));
    }

    #[test]
    fn publish_rejects_duplicates_and_bad_references() {
        let mut rules = publishable();
        rules["products"][1]["code"] = json!("BASIC");
        rules["discounts"][0]["applies_to"] = json!(["GHOST"]);
        let v = configuration_violations(rules);
        assert!(v.mentions("duplicate product code 'BASIC'"));
        assert!(v.mentions("unknown product 'GHOST'"));
    }

    #[test]
    fn publish_rejects_out_of_range_adjustments() {
        let mut rules = publishable();
        rules["discounts"][0]["adjustment"]["value"] = json!("150");
        assert!(configuration_violations(rules).mentions("(0, 100]"));

        let mut rules = publishable();
        rules["discounts"][0]["adjustment"] = json!({"type": "amount", "value": "0"});
        assert!(configuration_violations(rules).mentions("must be positive"));
    }

    #[test]
    fn publish_rejects_cross_line_amounts() {
        let mut rules = publishable();
        rules["discounts"] = json!([
            {"id": "bundle", "kind": "cross_line",
             "condition": {"type": "min_total_quantity", "value": 3},
             "adjustment": {"type": "amount", "value": "50.00"},
             "stacking": "additive"}
        ]);
        assert!(configuration_violations(rules).mentions("must use a percent"));
    }

    #[test]
    fn publish_rejects_duplicate_tier_thresholds() {
        let mut rules = publishable();
        rules["products"][1]["tiers"] = json!([
            {"min_quantity": 10, "unit_price": "1400.00"},
            {"min_quantity": 10, "unit_price": "1300.00"}
        ]);
        assert!(configuration_violations(rules).mentions("more than one tier"));
    }

    #[test]
    fn publish_rejects_ambiguous_exclusive_rules() {
        let mut rules = publishable();
        rules["discounts"] = json!([
            {"id": "a", "kind": "per_line", "priority": 5,
             "adjustment": {"type": "percent", "value": "10"}, "stacking": "exclusive"},
            {"id": "b", "kind": "per_line", "priority": 5, "applies_to": ["PLUS"],
             "adjustment": {"type": "percent", "value": "20"}, "stacking": "exclusive"}
        ]);
        assert!(configuration_violations(rules).mentions("'a' and 'b'"));
    }

    #[test]
    fn disjoint_exclusive_rules_may_share_priority() {
        let mut rules = publishable();
        rules["discounts"] = json!([
            {"id": "a", "kind": "per_line", "priority": 5, "applies_to": ["BASIC"],
             "adjustment": {"type": "percent", "value": "10"}, "stacking": "exclusive"},
            {"id": "b", "kind": "per_line", "priority": 5, "applies_to": ["PLUS"],
             "adjustment": {"type": "percent", "value": "20"}, "stacking": "exclusive"}
        ]);
        validator().validate_for_publish(&rules).unwrap();
    }

    #[test]
    fn publish_rejects_empty_promo_code() {
        let mut rules = publishable();
        rules["discounts"] = json!([
            {"id": "promo", "kind": "whole_quote",
             "condition": {"type": "promo_code", "code": "  "},
             "adjustment": {"type": "percent", "value": "5"}, "stacking": "additive"}
        ]);
        assert!(configuration_violations(rules).mentions("empty promo code"));
    }

    #[test]
    fn all_findings_are_reported_together() {
        let mut rules = publishable();
        rules["products"][0]["unit_price"] = json!("-1.00");
        rules["discounts"][0].as_object_mut().unwrap().remove("stacking");
        let v = configuration_violations(rules);
        assert!(v.len() >= 2);
    }
}
