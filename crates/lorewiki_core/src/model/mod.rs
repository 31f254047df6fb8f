//! Wiki domain model.
//!
//! # Responsibility
//! - Define page addressing, the canonical page record and its document form.
//! - Model the per-edit session lifecycle.
//! - Describe registered projects.
//!
//! # Invariants
//! - A page is identified externally by `(project_id, category, slug)` and
//!   internally by a stable UUID.
//! - Version tokens are opaque and only ever compared for equality.

pub mod address;
pub mod document;
pub mod page;
pub mod project;
pub mod session;
