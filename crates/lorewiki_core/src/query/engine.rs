//! In-memory filter, sort, paginate and grouping over page sets.
//!
//! # Responsibility
//! - Turn the raw page set from `PageRepository::list_pages` into list,
//!   dashboard and related-page views.
//!
//! # Invariants
//! - Pure: no function here mutates stored state.
//! - Sorting is stable and total; equal keys fall back to
//!   `(project_id, category, slug)` ascending whatever the order.
//! - Effective limits always land in `[1, max_limit]`.

use crate::model::address::{Category, ProjectId};
use crate::model::page::{Page, PageStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;
pub const RELATED_PAGES_LIMIT: usize = 5;

/// Row predicate for list views. Absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilter {
    pub project_id: Option<ProjectId>,
    pub category: Option<Category>,
    pub status: Option<PageStatus>,
    /// Exact, lowercased tag match.
    pub tag: Option<String>,
}

impl PageFilter {
    pub fn project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, page: &Page) -> bool {
        if page.is_deleted {
            return false;
        }
        if let Some(project_id) = self.project_id.as_ref() {
            if &page.project_id != project_id {
                return false;
            }
        }
        if let Some(category) = self.category.as_ref() {
            if &page.category != category {
                return false;
            }
        }
        if let Some(status) = self.status {
            if page.status != status {
                return false;
            }
        }
        if let Some(tag) = self.tag.as_deref() {
            let wanted = tag.trim().to_lowercase();
            if !page.tags.iter().any(|value| *value == wanted) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
    ViewCount,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Title => "title",
            Self::ViewCount => "view_count",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            "view_count" => Some(Self::ViewCount),
            _ => None,
        }
    }
}

impl Display for SortField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Default and ceiling for page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIST_LIMIT,
            max_limit: MAX_LIST_LIMIT,
        }
    }
}

/// Normalizes a requested page size.
///
/// `None` and `0` fall back to the default; values above the ceiling clamp.
pub fn normalize_list_limit(limit: Option<u32>, limits: ListLimits) -> u32 {
    let max_limit = limits.max_limit.max(1);
    let default_limit = limits.default_limit.clamp(1, max_limit);
    match limit {
        None | Some(0) => default_limit,
        Some(value) => value.min(max_limit),
    }
}

/// Effective 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>, limits: ListLimits) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: normalize_list_limit(limit, limits),
        }
    }

    /// Rows skipped before this window; page `0` reads as the first page.
    pub fn offset(&self) -> usize {
        (self.page as usize)
            .saturating_sub(1)
            .saturating_mul(self.limit as usize)
    }
}

/// One list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: PageFilter,
    pub sort: SortField,
    pub order: SortOrder,
    /// 1-based; `None` means the first page.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageList {
    pub items: Vec<Page>,
    /// Matching rows before pagination.
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

/// Pages sharing one category, in dashboard order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category: Category,
    pub label: String,
    pub pages: Vec<Page>,
}

/// Page ranked by the number of tags it shares with another page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedPage {
    pub page: Page,
    pub shared_tags: usize,
}

pub fn filter_pages(pages: Vec<Page>, filter: &PageFilter) -> Vec<Page> {
    pages.into_iter().filter(|page| filter.matches(page)).collect()
}

/// Sorts in place by `field`/`order`, ties by address ascending.
pub fn sort_pages(pages: &mut [Page], field: SortField, order: SortOrder) {
    pages.sort_by(|left, right| {
        let primary = compare_field(left, right, field);
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| compare_address(left, right))
    });
}

pub fn paginate(pages: Vec<Page>, pagination: Pagination) -> PageList {
    let total = pages.len();
    let items = pages
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.limit as usize)
        .collect();
    PageList {
        items,
        total,
        page: pagination.page,
        limit: pagination.limit,
    }
}

/// Filter, sort and paginate in one pass.
pub fn run_list_query(pages: Vec<Page>, query: &ListQuery, limits: ListLimits) -> PageList {
    let mut matched = filter_pages(pages, &query.filter);
    sort_pages(&mut matched, query.sort, query.order);
    paginate(matched, Pagination::new(query.page, query.limit, limits))
}

/// Groups pages by category, keeping the first-seen order of categories and
/// the input order within each group.
pub fn group_by_category(pages: Vec<Page>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for page in pages {
        match groups
            .iter_mut()
            .find(|group| group.category == page.category)
        {
            Some(group) => group.pages.push(page),
            None => groups.push(CategoryGroup {
                label: page.category.label(),
                category: page.category.clone(),
                pages: vec![page],
            }),
        }
    }
    groups
}

/// Most recently updated active pages.
pub fn recent_pages(pages: Vec<Page>, limit: usize) -> Vec<Page> {
    let mut active: Vec<Page> = pages.into_iter().filter(Page::is_active).collect();
    sort_pages(&mut active, SortField::UpdatedAt, SortOrder::Desc);
    active.truncate(limit);
    active
}

/// Pages of the same project sharing at least one tag with `current`.
///
/// Ranked by shared tag count, then address.
pub fn related_pages(current: &Page, candidates: Vec<Page>, limit: usize) -> Vec<RelatedPage> {
    if current.tags.is_empty() {
        return Vec::new();
    }
    let own_tags: HashSet<&str> = current.tags.iter().map(String::as_str).collect();

    let mut related: Vec<RelatedPage> = candidates
        .into_iter()
        .filter(|page| {
            page.id != current.id && page.is_active() && page.project_id == current.project_id
        })
        .filter_map(|page| {
            let shared_tags = page
                .tags
                .iter()
                .filter(|tag| own_tags.contains(tag.as_str()))
                .count();
            (shared_tags > 0).then_some(RelatedPage { page, shared_tags })
        })
        .collect();

    related.sort_by(|left, right| {
        right
            .shared_tags
            .cmp(&left.shared_tags)
            .then_with(|| compare_address(&left.page, &right.page))
    });
    related.truncate(limit);
    related
}

fn compare_field(left: &Page, right: &Page, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => left.created_at.cmp(&right.created_at),
        SortField::UpdatedAt => left.updated_at.cmp(&right.updated_at),
        SortField::Title => left
            .title
            .to_lowercase()
            .cmp(&right.title.to_lowercase())
            .then_with(|| left.title.cmp(&right.title)),
        SortField::ViewCount => left.view_count.cmp(&right.view_count),
    }
}

fn compare_address(left: &Page, right: &Page) -> Ordering {
    left.project_id
        .cmp(&right.project_id)
        .then_with(|| left.category.cmp(&right.category))
        .then_with(|| left.slug.cmp(&right.slug))
}
