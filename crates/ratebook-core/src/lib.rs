//! # ratebook-core: Foundational Types for Ratebook
//!
//! This crate is the leaf of the Ratebook dependency DAG. It defines the
//! primitives every other crate builds on: the canonical byte encoding used
//! for rule checksums, the checksum type itself, identifiers for tenants and
//! stored records, UTC timestamps, and ISO 4217 currency codes.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every checksum in the system is computed
//!    over bytes produced by `CanonicalBytes::new()`. No raw
//!    `serde_json::to_vec()` for hashing. Ever.
//!
//! 2. **`Checksum::compute()` accepts only serializable rule data** and always
//!    routes it through canonicalization, so two structurally equal rule trees
//!    can never hash differently.
//!
//! 3. **Newtype wrappers for identifiers.** `FirmId`, `RuleSetId`, `QuoteId`,
//!    `QuoteVersionId`, `RuleSetCode`, `Currency`. No bare strings or UUIDs
//!    cross crate boundaries.
//!
//! 4. **UTC-only timestamps** with seconds precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ratebook-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod checksum;
pub mod currency;
pub mod error;
pub mod identity;
pub mod temporal;

pub use canonical::{canonicalize, CanonicalBytes};
pub use checksum::{Checksum, ChecksumAlgorithm};
pub use currency::Currency;
pub use error::{CanonicalizationError, IntegrityError, ValidationError};
pub use identity::{FirmId, QuoteId, QuoteVersionId, RuleSetCode, RuleSetId};
pub use temporal::Timestamp;
