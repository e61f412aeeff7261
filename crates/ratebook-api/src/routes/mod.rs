//! # API Route Modules
//!
//! - `rulesets`: draft, update, publish, deprecate and read RuleSets.
//! - `quotes`: evaluate, quote containers, versions, reproduction, audit.
//! - `health`: liveness, readiness and in-process counters.

pub mod health;
pub mod quotes;
pub mod rulesets;
