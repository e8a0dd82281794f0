//! Article deduplication.
//!
//! Four ordered checks decide whether an article is fresh:
//! 1. **Exact match**: SHA256 of the normalized title and description
//! 2. **Source**: the article URL was already committed for its source
//! 3. **Semantic similarity**: significant-term overlap within the same topic
//! 4. **Cross-module**: any generator already committed the same content
//!
//! The matcher short-circuits on the first match. Store failures degrade a
//! check instead of failing the evaluation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     DeduplicationService                         │
//! │  ┌─────────────────────────────────────────┐  ┌───────────────┐  │
//! │  │ SimilarityMatcher                       │  │ KeyRegistry   │  │
//! │  │  ┌─────────┐ ┌────────┐ ┌────────────┐  │  │ Topics        │  │
//! │  │  │ Exact   │ │ Source │ │ Semantic   │  │  │ Crosspost     │  │
//! │  │  └─────────┘ └────────┘ └────────────┘  │  └───────────────┘  │
//! │  └─────────────────────────────────────────┘                     │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//!                          dyn RecencyStore
//! ```

mod config;
mod exact_match;
mod hasher;
mod matcher;
mod semantic;
mod service;
mod source;
pub mod taxonomy;
pub mod terms;
mod types;

pub use config::DeduplicationConfig;
pub use exact_match::ExactMatchChecker;
pub use hasher::{ContentHasher, compute_content_fingerprint, url_fingerprint};
pub use matcher::{SimilarityMatcher, compute_fingerprints};
pub use semantic::{SemanticMatch, SemanticSimilarityChecker, term_overlap};
pub use service::DeduplicationService;
pub use source::SourceChecker;
pub use terms::compute_semantic_fingerprint;
pub use types::{
    ContentEntry, Deduplicator, Fingerprints, Provenance, ResetReport, SemanticEntry,
};
