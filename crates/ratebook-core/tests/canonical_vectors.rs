//! # Canonicalization Test Vectors
//!
//! Fixed inputs with their expected canonical bytes and SHA-256 digests.
//! If any of these change, every stored RuleSet checksum and every
//! QuoteVersion reference in the field stops verifying.

use ratebook_core::{canonicalize, Checksum};

struct Vector {
    input: &'static str,
    canonical: &'static str,
    sha256: &'static str,
}

const VECTORS: &[Vector] = &[
    Vector {
        input: r#"{
            "schema_version": "1.0.0",
            "products": [ { "unit_price": "1000.00", "code": "BASIC" } ]
        }"#,
        canonical: r#"{"products":[{"code":"BASIC","unit_price":"1000.00"}],"schema_version":"1.0.0"}"#,
        sha256: "ebe1471a404f8939f2ed6d569f949003d91150c72a631e9be7f7d91fd0a21f6a",
    },
    Vector {
        input: r#"{"c": "x", "b": [true, false, null], "a": 1}"#,
        canonical: r#"{"a":1,"b":[true,false,null],"c":"x"}"#,
        sha256: "134a0bdc0f430c1e870c65399637eec4f9543c0d0a44942f3846af621833010a",
    },
    Vector {
        input: "[ ]",
        canonical: "[]",
        sha256: "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945",
    },
];

#[test]
fn vectors_canonicalize_to_expected_bytes() {
    for v in VECTORS {
        let value: serde_json::Value = serde_json::from_str(v.input).unwrap();
        let cb = canonicalize(&value).unwrap();
        assert_eq!(cb.as_str(), v.canonical, "input: {}", v.input);
    }
}

#[test]
fn vectors_hash_to_expected_digests() {
    for v in VECTORS {
        let value: serde_json::Value = serde_json::from_str(v.input).unwrap();
        let checksum = Checksum::compute(&value).unwrap();
        assert_eq!(checksum.to_hex(), v.sha256, "input: {}", v.input);
        assert_eq!(checksum.to_string(), format!("sha256:{}", v.sha256));
    }
}

#[test]
fn typed_struct_and_json_tree_agree() {
    #[derive(serde::Serialize)]
    struct Product<'a> {
        unit_price: &'a str,
        code: &'a str,
    }
    #[derive(serde::Serialize)]
    struct Rules<'a> {
        schema_version: &'a str,
        products: Vec<Product<'a>>,
    }

    let typed = Rules {
        schema_version: "1.0.0",
        products: vec![Product {
            unit_price: "1000.00",
            code: "BASIC",
        }],
    };
    let checksum = Checksum::compute(&typed).unwrap();
    assert_eq!(checksum.to_hex(), VECTORS[0].sha256);
}
