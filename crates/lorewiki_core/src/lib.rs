//! Core domain logic for LoreWiki.
//! This crate is the single source of truth for page addressing and the
//! optimistic concurrency save protocol.

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod logging;
pub mod model;
pub mod query;
pub mod render;
pub mod repo;
pub mod service;

pub use config::{ConfigError, WikiConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_timeout, DbError};
pub use error::{Conflict, ErrorKind, WikiError, WikiResult};
pub use guard::{decide, GuardDecision};
pub use logging::{init_from_config, init_logging, LoggingError};
pub use model::address::{
    compose, decompose, derive_slug, AddressError, AddressIssue, Category, PageAddress, ProjectId,
    Script, Slug, SlugPolicy,
};
pub use model::document::{parse_document, render_document, DocumentError, ParsedDocument};
pub use model::page::{Page, PageChanges, PageFields, PageId, PageStatus, VersionToken};
pub use model::project::{Project, ProjectChanges, ProjectFields, ProjectValidationError};
pub use model::session::{Draft, EditSession, EditState, SaveFailure, SaveRequest, SessionError};
pub use query::{ListQuery, PageFilter, PageList, SortField, SortOrder};
pub use render::{derive_excerpt, first_image, PassthroughRenderer, Renderer};
pub use repo::page_repo::{
    PageRepository, PageScope, ProjectSummary, RepoError, RepoResult, SqlitePageRepository,
    TagUsage,
};
pub use repo::project_repo::ProjectRepository;
pub use service::{
    Dashboard, DeleteAck, PageDetail, PageService, ProjectDeleteAck, RenderedPage, StoreSettings,
};
