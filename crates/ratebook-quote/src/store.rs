//! # Quote Storage
//!
//! Quotes and their versions live in one lock so appending a version and
//! recording it on the parent quote is a single atomic step. Versions are
//! insert-only: there is no operation that replaces or removes one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use ratebook_core::{FirmId, QuoteId, QuoteVersionId};

use crate::quote::{Quote, QuoteVersion};

#[derive(Debug, Default)]
struct Tables {
    quotes: HashMap<QuoteId, Quote>,
    versions: HashMap<QuoteVersionId, QuoteVersion>,
}

/// Thread-safe, cloneable in-memory quote store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuoteStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_quote(&self, quote: Quote) {
        self.tables.write().quotes.insert(quote.id, quote);
    }

    pub fn get_quote(&self, firm_id: &FirmId, id: &QuoteId) -> Option<Quote> {
        self.tables
            .read()
            .quotes
            .get(id)
            .filter(|q| q.firm_id == *firm_id)
            .cloned()
    }

    /// A firm's quotes, oldest first.
    pub fn list_quotes(&self, firm_id: &FirmId) -> Vec<Quote> {
        let mut out: Vec<Quote> = self
            .tables
            .read()
            .quotes
            .values()
            .filter(|q| q.firm_id == *firm_id)
            .cloned()
            .collect();
        out.sort_by_key(|q| q.created_at);
        out
    }

    /// Build a version from the current state of its quote and append it.
    ///
    /// `build` runs under the write lock, so the sequence it reads from the
    /// quote cannot be taken by a concurrent append. Returns `None` if the
    /// quote does not exist for this firm.
    pub fn append_version(
        &self,
        firm_id: &FirmId,
        quote_id: &QuoteId,
        build: impl FnOnce(&Quote) -> QuoteVersion,
    ) -> Option<QuoteVersion> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        let quote = tables
            .quotes
            .get_mut(quote_id)
            .filter(|q| q.firm_id == *firm_id)?;
        let version = build(quote);
        quote.version_ids.push(version.id);
        tables.versions.insert(version.id, version.clone());
        Some(version)
    }

    pub fn get_version(&self, firm_id: &FirmId, id: &QuoteVersionId) -> Option<QuoteVersion> {
        self.tables
            .read()
            .versions
            .get(id)
            .filter(|v| v.firm_id == *firm_id)
            .cloned()
    }

    /// Versions of one quote in sequence order.
    pub fn versions_of(&self, firm_id: &FirmId, quote_id: &QuoteId) -> Vec<QuoteVersion> {
        let tables = self.tables.read();
        let Some(quote) = tables.quotes.get(quote_id).filter(|q| q.firm_id == *firm_id) else {
            return Vec::new();
        };
        quote
            .version_ids
            .iter()
            .filter_map(|id| tables.versions.get(id).cloned())
            .collect()
    }

    /// Every stored version of a firm, oldest first.
    pub fn list_versions(&self, firm_id: &FirmId) -> Vec<QuoteVersion> {
        let mut out: Vec<QuoteVersion> = self
            .tables
            .read()
            .versions
            .values()
            .filter(|v| v.firm_id == *firm_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        out
    }
}
