//! # ratebook-state: RuleSet Lifecycle
//!
//! The stored form of a pricing policy and the rules for changing it.
//!
//! - **RuleSet** (`ruleset.rs`): the record, its `draft → published →
//!   deprecated` status, the revision token, and the by-value
//!   [`RuleSetRef`] that consumers keep instead of a live pointer.
//!
//! - **Store** (`store.rs`): the persistence seam. Writes after creation are
//!   compare-and-set on the revision.
//!
//! - **Registry** (`registry.rs`): create, update, publish, deprecate and
//!   load, all through one commit path that enforces immutability after
//!   publish and recomputes the checksum on every save.

pub mod error;
pub mod registry;
pub mod ruleset;
pub mod store;

pub use error::{ImmutableRuleSetError, RegistryError};
pub use registry::{NewRuleSet, RuleSetRegistry};
pub use ruleset::{Revision, RuleSet, RuleSetIntegrityError, RuleSetRef, RuleSetStatus};
pub use store::{InMemoryRuleSetStore, RuleSetStore, StoreError};
