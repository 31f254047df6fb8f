//! Read-side views over stored pages.
//!
//! # Responsibility
//! - Filter, sort, paginate and group pages for list and dashboard views.
//! - Rank related pages by shared tags.
//!
//! # Invariants
//! - Query code never writes to storage.

pub mod engine;

pub use engine::{
    filter_pages, group_by_category, normalize_list_limit, paginate, recent_pages,
    related_pages, run_list_query, sort_pages, CategoryGroup, ListLimits, ListQuery, PageFilter,
    PageList, Pagination, RelatedPage, SortField, SortOrder, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
    RELATED_PAGES_LIMIT,
};
