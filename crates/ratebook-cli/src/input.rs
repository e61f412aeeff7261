//! Reading command inputs.
//!
//! `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
//! Both land in a `serde_json::Value` first so YAML and JSON inputs feed
//! the same canonicalization and validation paths.

use std::path::Path;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde_json::Value;

use ratebook_schema::SchemaVersion;

/// Input syntax, from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Read a file into a JSON value.
pub fn load_value(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match Format::of(path) {
        Format::Json => serde_json::from_str(&text)
            .with_context(|| format!("parsing {} as JSON", path.display())),
        Format::Yaml => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {} as YAML", path.display())),
    }
}

/// Read a file and deserialize it into `T`.
pub fn load<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let value = load_value(path)?;
    serde_json::from_value(value).with_context(|| format!("decoding {}", path.display()))
}

/// The schema version a rule document declares about itself.
pub fn embedded_version(rules: &Value) -> anyhow::Result<SchemaVersion> {
    let raw = rules
        .get("schema_version")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("rule document has no string schema_version"))?;
    Ok(raw.parse::<SchemaVersion>()?)
}
