//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into wiki operations.
//! - Keep the CLI and other transports decoupled from storage details.

pub mod page_service;

pub use page_service::{
    Dashboard, DeleteAck, PageDetail, PageService, ProjectDeleteAck, RenderedPage, StoreSettings,
};
