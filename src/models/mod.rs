//! Data models for freshwire.
//!
//! Articles flow in, fingerprints and decisions flow out.

mod article;
mod decision;
mod family;
mod fingerprint;
mod topic;

pub use article::Article;
pub use decision::{CommitOutcome, Confidence, Decision, Evaluation};
pub use family::KeyFamily;
pub use fingerprint::{ContentFingerprint, SemanticFingerprint};
pub use topic::TopicLabel;
