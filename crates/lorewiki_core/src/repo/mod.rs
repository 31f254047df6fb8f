//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the page and project data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `AddressTaken`,
//!   `VersionConflict`) in addition to DB transport errors.
//! - Lock timeouts are reported as `Unavailable`, never as generic DB errors.

pub mod page_repo;
pub mod project_repo;
