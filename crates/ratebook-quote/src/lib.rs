//! # ratebook-quote: Quotes and Reproduction
//!
//! - **Quote / QuoteVersion** (`quote.rs`): the working container and the
//!   immutable snapshot. A version names its RuleSet by value
//!   (`id`, `version`, `checksum`) and keeps full copies of its input,
//!   output and trace.
//!
//! - **Store** (`store.rs`): in-memory, insert-only for versions.
//!
//! - **Manager** (`manager.rs`): evaluate against a published RuleSet,
//!   record versions, reproduce them, and audit a firm.
//!
//! - **Reproduction** (`reproduce.rs`): the integrity-checked re-evaluation
//!   shared by the manager and the offline export audit.
//!
//! [`QuoteError`] is the single error type the HTTP layer and CLI map.

pub mod error;
pub mod manager;
pub mod quote;
pub mod reproduce;
pub mod store;

pub use error::QuoteError;
pub use manager::QuoteManager;
pub use quote::{Quote, QuoteVersion};
pub use reproduce::{audit_export, reproduce, AuditExport, AuditFailure, AuditReport, ReproductionReport};
pub use store::InMemoryQuoteStore;
