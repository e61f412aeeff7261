//! # Integration Tests for ratebook-api
//!
//! Drives the full router with `tower::ServiceExt::oneshot`: RuleSet
//! lifecycle, evaluation, quote versions, reproduction, tenant scoping,
//! error mapping and the OpenAPI document.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use ratebook_api::middleware::metrics::ApiMetrics;
use ratebook_api::state::AppState;

fn basic_rules() -> Value {
    json!({
        "schema_version": "1.0.0",
        "products": [{"code": "BASIC", "unit_price": "1000.00"}],
        "discounts": [{
            "id": "volume-5",
            "kind": "per_line",
            "priority": 10,
            "applies_to": ["BASIC"],
            "condition": {"type": "min_quantity", "value": 5},
            "adjustment": {"type": "percent", "value": "10"},
            "stacking": "additive"
        }]
    })
}

/// A router plus the tenant every request is sent for.
struct Harness {
    app: axum::Router,
    firm: Uuid,
    metrics: ApiMetrics,
}

impl Harness {
    fn new() -> Self {
        let metrics = ApiMetrics::new();
        let state = AppState::new().unwrap();
        Self {
            app: ratebook_api::app_with_metrics(state, metrics.clone()),
            firm: Uuid::new_v4(),
            metrics,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_as(self.firm, method, uri, body).await
    }

    async fn send_as(
        &self,
        firm: Uuid,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-firm-id", firm.to_string());
        let request = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&v).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    async fn create_draft(&self, rules: Value) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/v1/rulesets",
                Some(json!({
                    "code": "STANDARD",
                    "schema_version": rules["schema_version"],
                    "default_currency": "USD",
                    "rules": rules
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn published_basic(&self) -> Value {
        let draft = self.create_draft(basic_rules()).await;
        let id = draft["ruleset_id"].as_str().unwrap();
        let (status, body) = self
            .send("POST", &format!("/v1/rulesets/{id}/publish"), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

fn basic_context(qty: u32) -> Value {
    json!({"items": [{"code": "BASIC", "quantity": qty}]})
}

// -- Health & OpenAPI ---------------------------------------------------------

#[tokio::test]
async fn probes_need_no_tenant_header() {
    let h = Harness::new();
    for (uri, expected) in [("/health/liveness", "ok"), ("/health/readiness", "ready")] {
        let response = h
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], expected.as_bytes());
    }
}

#[tokio::test]
async fn openapi_document_lists_every_route() {
    let h = Harness::new();
    let (status, doc) = h.send("GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/v1/rulesets",
        "/v1/rulesets/{id}",
        "/v1/rulesets/{id}/publish",
        "/v1/rulesets/{id}/deprecate",
        "/v1/quotes/evaluate",
        "/v1/quotes",
        "/v1/quotes/{id}/versions",
        "/v1/quotes/versions/{id}/reproduce",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

// -- Tenant scoping -----------------------------------------------------------

#[tokio::test]
async fn missing_tenant_header_is_unauthorized() {
    let h = Harness::new();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/v1/rulesets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rulesets_are_invisible_to_other_firms() {
    let h = Harness::new();
    let draft = h.create_draft(basic_rules()).await;
    let id = draft["ruleset_id"].as_str().unwrap();

    let (status, _) = h
        .send_as(Uuid::new_v4(), "GET", &format!("/v1/rulesets/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = h.send_as(Uuid::new_v4(), "GET", "/v1/rulesets", None).await;
    assert_eq!(list, json!([]));
}

// -- RuleSet lifecycle --------------------------------------------------------

#[tokio::test]
async fn create_returns_draft_with_checksum() {
    let h = Harness::new();
    let body = h.create_draft(basic_rules()).await;
    assert_eq!(body["status"], "draft");
    assert_eq!(body["version"], 1);
    assert!(body["checksum"].as_str().unwrap().starts_with("sha256:"));
    assert!(body.get("published_at").is_none());
}

#[tokio::test]
async fn duplicate_code_and_version_conflicts() {
    let h = Harness::new();
    h.create_draft(basic_rules()).await;
    let (status, body) = h
        .send(
            "POST",
            "/v1/rulesets",
            Some(json!({
                "code": "STANDARD", "version": 1, "schema_version": "1.0.0",
                "default_currency": "USD", "rules": basic_rules()
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn unsupported_schema_major_is_rejected() {
    let h = Harness::new();
    let mut rules = basic_rules();
    rules["schema_version"] = json!("2.0.0");
    let (status, body) = h
        .send(
            "POST",
            "/v1/rulesets",
            Some(json!({
                "code": "NEXT", "schema_version": "2.0.0",
                "default_currency": "USD", "rules": rules
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "SCHEMA_INCOMPATIBLE");
}

#[tokio::test]
async fn structural_errors_carry_violation_details() {
    let h = Harness::new();
    let (status, body) = h
        .send(
            "POST",
            "/v1/rulesets",
            Some(json!({
                "code": "BROKEN", "schema_version": "1.0.0", "default_currency": "USD",
                "rules": {"schema_version": "1.0.0", "products": [{"unit_price": "10.00"}]}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"].as_array().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn publish_then_patch_is_immutable() {
    let h = Harness::new();
    let published = h.published_basic().await;
    assert_eq!(published["status"], "published");
    assert!(published["published_at"].is_string());
    let id = published["ruleset_id"].as_str().unwrap();

    let mut rules = basic_rules();
    rules["products"][0]["unit_price"] = json!("900.00");
    let (status, body) = h
        .send("PATCH", &format!("/v1/rulesets/{id}"), Some(json!({"rules": rules})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "IMMUTABLE_RULESET");
    assert!(body["error"]["message"].as_str().unwrap().contains("rules"));
}

#[tokio::test]
async fn patch_draft_recomputes_checksum_and_rejects_stale_revision() {
    let h = Harness::new();
    let draft = h.create_draft(basic_rules()).await;
    let id = draft["ruleset_id"].as_str().unwrap();

    let mut rules = basic_rules();
    rules["products"][0]["unit_price"] = json!("950.00");
    let (status, updated) = h
        .send(
            "PATCH",
            &format!("/v1/rulesets/{id}"),
            Some(json!({"rules": rules, "revision": draft["revision"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_ne!(updated["checksum"], draft["checksum"]);

    let (status, body) = h
        .send(
            "PATCH",
            &format!("/v1/rulesets/{id}"),
            Some(json!({"rules": basic_rules(), "revision": draft["revision"]})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn publish_is_idempotent_and_deprecate_is_final() {
    let h = Harness::new();
    let published = h.published_basic().await;
    let id = published["ruleset_id"].as_str().unwrap();

    let (status, again) = h
        .send("POST", &format!("/v1/rulesets/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["published_at"], published["published_at"]);
    assert_eq!(again["checksum"], published["checksum"]);

    let (status, deprecated) = h
        .send("POST", &format!("/v1/rulesets/{id}/deprecate"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deprecated["status"], "deprecated");
    assert!(deprecated["deprecated_at"].is_string());

    let (status, _) = h
        .send("POST", &format!("/v1/rulesets/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unpublishable_configuration_fails_at_publish() {
    let h = Harness::new();
    let mut rules = basic_rules();
    rules["discounts"][0]
        .as_object_mut()
        .unwrap()
        .remove("stacking");
    let draft = h.create_draft(rules).await;
    let id = draft["ruleset_id"].as_str().unwrap();

    let (status, body) = h
        .send("POST", &format!("/v1/rulesets/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// -- Evaluation ---------------------------------------------------------------

#[tokio::test]
async fn evaluate_basic_scenario() {
    let h = Harness::new();
    let published = h.published_basic().await;
    let (status, body) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(json!({
                "ruleset_id": published["ruleset_id"],
                "ruleset_version": 1,
                "context": basic_context(5)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["line_items"][0]["base_subtotal"], "5000.00");
    assert_eq!(body["line_items"][0]["discounts"][0]["amount"], "-500.00");
    assert_eq!(body["total"], "4500.00");
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["ruleset_checksum"], published["checksum"]);

    let trace = body["trace"].as_array().unwrap();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0]["outcome"], "matched");
    assert_eq!(trace[1]["rule_id"], "volume-5");
    assert_eq!(trace[1]["reason"], "qty>=5");
}

#[tokio::test]
async fn evaluate_error_mapping() {
    let h = Harness::new();
    let published = h.published_basic().await;
    let request = |context: Value| {
        json!({"ruleset_id": published["ruleset_id"], "ruleset_version": 1, "context": context})
    };

    let (status, body) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(request(json!({"items": [{"code": "PREMIUM", "quantity": 1}]}))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNKNOWN_PRODUCT");

    let (status, body) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(request(json!({"items": [{"code": "BASIC", "quantity": 1}], "currency": "EUR"}))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_CURRENCY");

    let (status, body) = h
        .send("POST", "/v1/quotes/evaluate", Some(request(json!({"items": []}))))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(request(json!({"items": [{"code": "BASIC", "quantity": -2}]}))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_amount_is_a_client_error() {
    let h = Harness::new();
    let draft = h
        .create_draft(json!({
            "schema_version": "1.0.0",
            "products": [{"code": "BIG", "unit_price": "10000000000000000000000.00"}]
        }))
        .await;
    let id = draft["ruleset_id"].as_str().unwrap();
    let (status, body) = h
        .send("POST", &format!("/v1/rulesets/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(json!({
                "ruleset_id": id,
                "ruleset_version": 1,
                "context": {"items": [{"code": "BIG", "quantity": 100_000_000}]}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"]["code"], "AMOUNT_OUT_OF_RANGE");
    assert!(body["error"]["message"].as_str().unwrap().contains("line BIG"));

    let (status, body) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(json!({
                "ruleset_id": id,
                "ruleset_version": 1,
                "context": {"items": [{"code": "BIG", "quantity": 2}]}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], "20000000000000000000000.00");
}

#[tokio::test]
async fn evaluate_against_draft_is_rejected() {
    let h = Harness::new();
    let draft = h.create_draft(basic_rules()).await;
    let (status, body) = h
        .send(
            "POST",
            "/v1/quotes/evaluate",
            Some(json!({
                "ruleset_id": draft["ruleset_id"],
                "ruleset_version": 1,
                "context": basic_context(5)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "RULESET_NOT_PUBLISHED");
}

// -- Quotes, versions, reproduction -------------------------------------------

#[tokio::test]
async fn quote_version_round_trip_and_reproduce() {
    let h = Harness::new();
    let published = h.published_basic().await;
    let ruleset_id = published["ruleset_id"].as_str().unwrap();

    let (status, quote) = h
        .send("POST", "/v1/quotes", Some(json!({"title": "Acme renewal"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let quote_id = quote["quote_id"].as_str().unwrap();

    let (status, version) = h
        .send(
            "POST",
            &format!("/v1/quotes/{quote_id}/versions"),
            Some(json!({
                "ruleset_id": ruleset_id,
                "ruleset_version": 1,
                "context": basic_context(5)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{version}");
    assert_eq!(version["sequence"], 1);
    assert_eq!(version["ruleset_checksum"], published["checksum"]);
    assert_eq!(version["output_snapshot"]["total"], "4500.00");
    let version_id = version["quote_version_id"].as_str().unwrap();

    let (_, quote) = h.send("GET", &format!("/v1/quotes/{quote_id}"), None).await;
    assert_eq!(quote["version_ids"], json!([version_id]));

    let (status, fetched) = h
        .send("GET", &format!("/v1/quotes/versions/{version_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, version);

    // Deprecation does not stop reproduction.
    h.send("POST", &format!("/v1/rulesets/{ruleset_id}/deprecate"), None)
        .await;
    let (status, report) = h
        .send("GET", &format!("/v1/quotes/versions/{version_id}/reproduce"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["match"], true);
    assert!(report.get("diverged_fields").is_none());
    assert_eq!(h.metrics.divergences(), 0);

    let (status, audit) = h.send("GET", "/v1/quotes/audit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["checked"], 1);
    assert_eq!(audit["matched"], 1);
}

#[tokio::test]
async fn blank_quote_title_is_rejected() {
    let h = Harness::new();
    let (status, body) = h
        .send("POST", "/v1/quotes", Some(json!({"title": "  "})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_quote_version_is_not_found() {
    let h = Harness::new();
    let (status, body) = h
        .send(
            "GET",
            &format!("/v1/quotes/versions/{}/reproduce", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn request_and_error_counters_advance() {
    let h = Harness::new();
    h.send("GET", "/v1/rulesets", None).await;
    h.send("GET", &format!("/v1/rulesets/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(h.metrics.requests(), 2);
    assert_eq!(h.metrics.errors(), 1);

    let (_, snapshot) = h.send("GET", "/health/metrics", None).await;
    assert_eq!(snapshot["reproduction_divergences"], 0);
}
