//! Core request-matching engine for the webshield content filter.
//!
//! Given a network request (URL, document context, resource type,
//! third-party flag) and a compiled rule set, decide whether the request
//! is blocked, allowed by an exception, or force-allowed by an
//! `important` rule.
//!
//! # Architecture
//!
//! A rule set compiles once into a [`RuleIndex`]; the index and rules are
//! immutable afterwards, so matching needs no synchronization. The hot
//! path retrieves candidates by cheap discriminators (domain hash, URL
//! tokens) and only then evaluates the full rule predicate.
//!
//! # Modules
//!
//! - `hash`: Murmur3 hashing for domain and token keys
//! - `url`: allocation-free URL parsing and tokenization
//! - `domain`: registrable-domain (eTLD+1) logic and suffix walking
//! - `pattern`: compiled filter patterns
//! - `index`: candidate retrieval index
//! - `matcher`: full-predicate evaluation and decision aggregation
//! - `types`: shared type definitions

pub mod domain;
pub mod hash;
pub mod index;
pub mod matcher;
pub mod pattern;
pub mod types;
pub mod url;

pub use hash::{hash64, hash_domain, Hash64};
pub use index::RuleIndex;
pub use matcher::Matcher;
pub use pattern::{MatchPattern, PatternError};
pub use types::{BlockerResult, PartyMask, Request, ResourceTypeMask, Rule, RuleFlags};
