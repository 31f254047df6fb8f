//! Optimistic concurrency decision for page updates.
//!
//! # Responsibility
//! - Compare the caller's expected version with the stored one and decide
//!   whether a write may proceed.
//!
//! # Invariants
//! - Stateless: the decision depends only on its three inputs.
//! - Callers must evaluate it inside the same store transaction as the
//!   write it guards (see `PageRepository::update_page`).
//! - A missing expected version never conflicts.

use crate::model::page::VersionToken;

/// Outcome of one version check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Versions match, or the caller had nothing to compare.
    Accept,
    /// Versions differ but the caller forced the write.
    Override,
    /// Versions differ; the write must not happen.
    Reject,
}

impl GuardDecision {
    pub fn allows_write(self) -> bool {
        !matches!(self, Self::Reject)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Override => "override",
            Self::Reject => "reject",
        }
    }
}

/// Decides whether an update expecting `expected` may replace `stored`.
///
/// | expected vs stored | force | decision |
/// |---|---|---|
/// | equal | any | `Accept` |
/// | different | `false` | `Reject` |
/// | different | `true` | `Override` |
/// | absent | any | `Accept` |
pub fn decide(expected: Option<&VersionToken>, stored: &VersionToken, force: bool) -> GuardDecision {
    match expected {
        None => GuardDecision::Accept,
        Some(token) if token == stored => GuardDecision::Accept,
        Some(_) if force => GuardDecision::Override,
        Some(_) => GuardDecision::Reject,
    }
}
