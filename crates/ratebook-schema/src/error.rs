//! # Schema and Document Errors
//!
//! Two families:
//!
//! - [`SchemaCompatibilityError`]: the running evaluator cannot safely
//!   interpret a rule document's declared schema version, or the declared and
//!   embedded versions disagree.
//! - [`DocumentError`]: the document is interpretable but malformed
//!   (structure at draft time, configuration shape at publish time).

use std::fmt;

use thiserror::Error;

/// The rule document's schema version cannot be honored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaCompatibilityError {
    /// Not a `major.minor.patch` string.
    #[error("invalid schema version \"{0}\" (expected major.minor.patch)")]
    InvalidVersion(String),

    /// No supported version shares the declared major and no shim is registered.
    #[error("schema version {declared} is incompatible with supported versions [{}]", .supported.join(", "))]
    Incompatible {
        /// The version the RuleSet declares.
        declared: String,
        /// Versions this evaluator understands.
        supported: Vec<String>,
    },

    /// The rule tree carries no `schema_version` of its own.
    #[error("rules do not embed a schema_version (declared {declared})")]
    EmbeddedMissing {
        /// The version the RuleSet declares.
        declared: String,
    },

    /// The rule tree's own `schema_version` differs from the declared field.
    #[error("declared schema version {declared} does not match version {embedded} embedded in rules")]
    EmbeddedMismatch {
        /// The RuleSet's `schema_version` field.
        declared: String,
        /// The `schema_version` inside `rules`.
        embedded: String,
    },

    /// A registered compatibility shim could not transform the document.
    #[error("compatibility shim '{shim}' failed for schema version {version}: {reason}")]
    ShimFailed {
        /// Shim name.
        shim: String,
        /// Version being shimmed.
        version: String,
        /// Failure description.
        reason: String,
    },
}

/// A single validation finding with a JSON Pointer location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the offending value, empty for the document root.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Collection of violations, rendered one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Whether any violation mentions `needle` in its path or message.
    pub fn mentions(&self, needle: &str) -> bool {
        self.0
            .iter()
            .any(|v| v.path.contains(needle) || v.message.contains(needle))
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(value: Vec<Violation>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {v}")?;
        }
        Ok(())
    }
}

/// The rule document is malformed.
#[derive(Error, Debug, Clone)]
pub enum DocumentError {
    /// Structural (JSON Schema) validation failed.
    #[error("rule document failed structural validation:\n{0}")]
    Structural(Violations),

    /// The document could not be read into the typed rule model.
    #[error("rule document is malformed: {0}")]
    Malformed(String),

    /// Publish-time configuration checks failed.
    #[error("rule document is not publishable:\n{0}")]
    Configuration(Violations),

    /// The embedded JSON Schema could not be compiled.
    #[error("rule document schema failed to compile: {0}")]
    SchemaBuild(String),
}

impl DocumentError {
    /// Violations carried by the error, if any.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Structural(v) | Self::Configuration(v) => Some(v),
            Self::Malformed(_) | Self::SchemaBuild(_) => None,
        }
    }
}
