//! Page addressing: project/category/slug keys and slug derivation.
//!
//! # Responsibility
//! - Normalize human titles into URL-safe, script-aware slugs.
//! - Compose and decompose the external `category/slug` key.
//!
//! # Invariants
//! - `derive_slug` output is non-empty, whitespace-free and idempotent.
//! - `decompose` is the only way an address string enters the store; an
//!   address without a category prefix is rejected, never looked up as a
//!   bare slug.
//! - Lookups accept canonical halves only; creation normalizes both halves.
//!   A slug is canonical when deriving it again leaves it unchanged.
//! - `decompose(compose(c, s)) == (c, s)` for every valid pair.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Category used when a caller composes an address without one.
pub const DEFAULT_CATEGORY: &str = "general";
/// Storage default for rows written without a category.
pub const UNCATEGORIZED: &str = "uncategorized";

const SLUG_MAX_CHARS: usize = 200;

static WHITESPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static HYPHEN_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid hyphen regex"));
static DEFAULT_POLICY: Lazy<SlugPolicy> = Lazy::new(SlugPolicy::default);

/// Why an address string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressIssue {
    /// No `/` separator, i.e. a bare slug.
    MissingCategory,
    EmptyCategory,
    /// Category is not lowercase or contains `/`, whitespace or control
    /// characters.
    InvalidCategory,
    EmptySlug,
    /// Slug part is not in normalized form.
    InvalidSlug,
    EmptyProject,
    InvalidProject,
}

impl Display for AddressIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MissingCategory => "missing `category/` prefix",
            Self::EmptyCategory => "category must not be empty",
            Self::InvalidCategory => "category must be lowercase without `/`, whitespace or control characters",
            Self::EmptySlug => "slug must not be empty",
            Self::InvalidSlug => "slug is not in normalized form",
            Self::EmptyProject => "project id must not be empty",
            Self::InvalidProject => "project id must not contain `/` or whitespace",
        };
        f.write_str(text)
    }
}

/// Address parsing and slug derivation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address `{address}`: {issue}")]
    InvalidAddress { address: String, issue: AddressIssue },
    #[error("title `{title}` normalizes to an empty slug")]
    EmptySlug { title: String },
}

impl AddressError {
    fn invalid(address: &str, issue: AddressIssue) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            issue,
        }
    }
}

/// Unicode scripts whose letters survive slug normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Latin,
    Greek,
    Cyrillic,
    Hangul,
    Han,
    Hiragana,
    Katakana,
    Arabic,
    Hebrew,
    Thai,
    Devanagari,
}

impl Script {
    pub const ALL: [Script; 11] = [
        Script::Latin,
        Script::Greek,
        Script::Cyrillic,
        Script::Hangul,
        Script::Han,
        Script::Hiragana,
        Script::Katakana,
        Script::Arabic,
        Script::Hebrew,
        Script::Thai,
        Script::Devanagari,
    ];

    /// Stable config name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latin => "latin",
            Self::Greek => "greek",
            Self::Cyrillic => "cyrillic",
            Self::Hangul => "hangul",
            Self::Han => "han",
            Self::Hiragana => "hiragana",
            Self::Katakana => "katakana",
            Self::Arabic => "arabic",
            Self::Hebrew => "hebrew",
            Self::Thai => "thai",
            Self::Devanagari => "devanagari",
        }
    }

    /// Parses a config name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|script| script.as_str() == normalized)
    }

    fn regex_class(self) -> &'static str {
        match self {
            Self::Latin => r"\p{Latin}",
            Self::Greek => r"\p{Greek}",
            Self::Cyrillic => r"\p{Cyrillic}",
            Self::Hangul => r"\p{Hangul}",
            Self::Han => r"\p{Han}",
            Self::Hiragana => r"\p{Hiragana}",
            Self::Katakana => r"\p{Katakana}",
            Self::Arabic => r"\p{Arabic}",
            Self::Hebrew => r"\p{Hebrew}",
            Self::Thai => r"\p{Thai}",
            Self::Devanagari => r"\p{Devanagari}",
        }
    }
}

/// Slug normalization rules for one project.
///
/// ASCII `[a-z0-9]`, whitespace and `-` are always kept; letters of the
/// configured scripts are kept as well, everything else is stripped.
#[derive(Debug, Clone)]
pub struct SlugPolicy {
    scripts: Vec<Script>,
    disallowed: Regex,
}

impl SlugPolicy {
    /// Builds a policy preserving letters of `scripts`.
    pub fn new(scripts: &[Script]) -> Self {
        let mut unique: Vec<Script> = Vec::with_capacity(scripts.len());
        for script in scripts {
            if !unique.contains(script) {
                unique.push(*script);
            }
        }

        let classes: String = unique.iter().map(|script| script.regex_class()).collect();
        let pattern = format!(r"[^a-z0-9\s\-{classes}]");
        let disallowed = Regex::new(&pattern).expect("script classes form a valid regex");
        Self {
            scripts: unique,
            disallowed,
        }
    }

    /// Builds a policy from config names, skipping unknown entries.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let scripts: Vec<Script> = names
            .iter()
            .filter_map(|name| Script::parse(name.as_ref()))
            .collect();
        Self::new(&scripts)
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    /// Normalizes a title into a slug.
    ///
    /// # Errors
    /// - `EmptySlug` when nothing survives normalization.
    pub fn derive(&self, title: &str) -> Result<Slug, AddressError> {
        let lowered = title.to_lowercase();
        let stripped = self.disallowed.replace_all(&lowered, "");
        let hyphenated = WHITESPACE_RUN_RE.replace_all(stripped.trim(), "-");
        let collapsed = HYPHEN_RUN_RE.replace_all(&hyphenated, "-");
        let capped: String = collapsed
            .trim_matches('-')
            .chars()
            .take(SLUG_MAX_CHARS)
            .collect();
        let slug = capped.trim_end_matches('-');

        if slug.is_empty() {
            return Err(AddressError::EmptySlug {
                title: title.to_string(),
            });
        }
        Ok(Slug(slug.to_string()))
    }
}

impl Default for SlugPolicy {
    fn default() -> Self {
        Self::new(&Script::ALL)
    }
}

/// Normalizes a title into a slug using every supported script.
pub fn derive_slug(title: &str) -> Result<Slug, AddressError> {
    DEFAULT_POLICY.derive(title)
}

/// Owning workspace identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AddressError::invalid(value, AddressIssue::EmptyProject));
        }
        if trimmed.contains('/') || trimmed.chars().any(char::is_whitespace) {
            return Err(AddressError::invalid(value, AddressIssue::InvalidProject));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectId {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectId> for String {
    fn from(value: ProjectId) -> Self {
        value.0
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Open-ended topical bucket (`characters`, `locations`, `lore`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

const KNOWN_CATEGORY_LABELS: &[(&str, &str)] = &[
    ("characters", "Characters"),
    ("episodes", "Episodes"),
    ("locations", "Locations"),
    ("lore", "Lore"),
    ("nations", "Nations"),
    ("races", "Races"),
    ("religions", "Religions"),
    (DEFAULT_CATEGORY, "General"),
    (UNCATEGORIZED, "Uncategorized"),
];

impl Category {
    /// Accepts a canonical category name.
    ///
    /// Use [`Category::normalize`] for caller-typed names.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        if value.is_empty() {
            return Err(AddressError::invalid(value, AddressIssue::EmptyCategory));
        }
        let canonical = value.to_lowercase() == value
            && !value
                .chars()
                .any(|ch| ch == '/' || ch.is_whitespace() || ch.is_control());
        if !canonical {
            return Err(AddressError::invalid(value, AddressIssue::InvalidCategory));
        }
        Ok(Self(value.to_string()))
    }

    /// Trims and lowercases `value`, then parses it.
    pub fn normalize(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AddressError::invalid(value, AddressIssue::EmptyCategory));
        }
        Self::parse(&trimmed.to_lowercase()).map_err(|err| rebind_address(err, value))
    }

    /// The `general` category.
    pub fn general() -> Self {
        Self(DEFAULT_CATEGORY.to_string())
    }

    /// The `uncategorized` storage fallback.
    pub fn uncategorized() -> Self {
        Self(UNCATEGORIZED.to_string())
    }

    /// Parses `value`, falling back to `general` when absent or blank.
    pub fn or_default(value: Option<&str>) -> Result<Self, AddressError> {
        match value.map(str::trim) {
            Some(text) if !text.is_empty() => Self::normalize(text),
            _ => Ok(Self::general()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display label; unknown categories get their name capitalized.
    pub fn label(&self) -> String {
        if let Some((_, label)) = KNOWN_CATEGORY_LABELS.iter().find(|(key, _)| *key == self.0) {
            return (*label).to_string();
        }

        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized page slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Accepts an already-normalized slug, i.e. one [`derive_slug`] maps to
    /// itself.
    ///
    /// Use [`derive_slug`] to build one from free text.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        if value.is_empty() {
            return Err(AddressError::invalid(value, AddressIssue::EmptySlug));
        }
        match DEFAULT_POLICY.derive(value) {
            Ok(slug) if slug.0 == value => Ok(slug),
            _ => Err(AddressError::invalid(value, AddressIssue::InvalidSlug)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self {
        value.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the external `category/slug` key; category defaults to `general`.
pub fn compose(category: Option<&Category>, slug: &Slug) -> String {
    let category = category.map_or(DEFAULT_CATEGORY, Category::as_str);
    format!("{category}/{}", slug.as_str())
}

/// Splits an external key on its first `/`.
///
/// # Errors
/// - `InvalidAddress(MissingCategory)` for a bare slug.
/// - `InvalidAddress` when either half fails validation.
pub fn decompose(address: &str) -> Result<(Category, Slug), AddressError> {
    let Some((category_part, slug_part)) = address.split_once('/') else {
        return Err(AddressError::invalid(address, AddressIssue::MissingCategory));
    };

    let category = Category::parse(category_part)
        .map_err(|err| rebind_address(err, address))?;
    let slug = Slug::parse(slug_part).map_err(|err| rebind_address(err, address))?;
    Ok((category, slug))
}

fn rebind_address(err: AddressError, address: &str) -> AddressError {
    match err {
        AddressError::InvalidAddress { issue, .. } => AddressError::invalid(address, issue),
        other => other,
    }
}

/// Fully-qualified page key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageAddress {
    pub project_id: ProjectId,
    pub category: Category,
    pub slug: Slug,
}

impl PageAddress {
    pub fn new(project_id: ProjectId, category: Category, slug: Slug) -> Self {
        Self {
            project_id,
            category,
            slug,
        }
    }

    /// Resolves `project_id` + `category/slug` into a full address.
    pub fn parse(project_id: &str, address: &str) -> Result<Self, AddressError> {
        let project_id = ProjectId::parse(project_id)?;
        let (category, slug) = decompose(address)?;
        Ok(Self::new(project_id, category, slug))
    }

    /// Resolves a caller-chosen address for a new page.
    ///
    /// Unlike [`PageAddress::parse`], both halves are free text: the category
    /// is lowercased and the slug is normalized with `policy`, so
    /// `Lore/First Age` becomes `lore/first-age`.
    ///
    /// # Errors
    /// - `InvalidAddress` for a missing category, an empty half or a slug
    ///   half containing `/`.
    /// - `EmptySlug` when the slug half normalizes to nothing.
    pub fn for_create(
        project_id: &str,
        address: &str,
        policy: &SlugPolicy,
    ) -> Result<Self, AddressError> {
        let project_id = ProjectId::parse(project_id)?;
        let Some((category_part, slug_part)) = address.split_once('/') else {
            return Err(AddressError::invalid(address, AddressIssue::MissingCategory));
        };
        let category = Category::normalize(category_part)
            .map_err(|err| rebind_address(err, address))?;
        if slug_part.trim().is_empty() {
            return Err(AddressError::invalid(address, AddressIssue::EmptySlug));
        }
        if slug_part.contains('/') {
            return Err(AddressError::invalid(address, AddressIssue::InvalidSlug));
        }
        let slug = policy.derive(slug_part)?;
        Ok(Self::new(project_id, category, slug))
    }

    /// Resolves an address for a new page from its title.
    pub fn from_title(
        project_id: &str,
        category: Option<&str>,
        title: &str,
        policy: &SlugPolicy,
    ) -> Result<Self, AddressError> {
        let project_id = ProjectId::parse(project_id)?;
        let category = Category::or_default(category)?;
        let slug = policy.derive(title)?;
        Ok(Self::new(project_id, category, slug))
    }

    /// External `category/slug` key.
    pub fn path(&self) -> String {
        compose(Some(&self.category), &self.slug)
    }
}

impl Display for PageAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Gabriel Vance").unwrap().as_str(), "gabriel-vance");
        assert_eq!(
            derive_slug("  The   Fall -- of  Dagos!  ").unwrap().as_str(),
            "the-fall-of-dagos"
        );
    }

    #[test]
    fn derive_slug_keeps_configured_scripts() {
        assert_eq!(derive_slug("엘프 종족").unwrap().as_str(), "엘프-종족");
        assert_eq!(derive_slug("Москва").unwrap().as_str(), "москва");
        assert_eq!(derive_slug("Café Noir").unwrap().as_str(), "café-noir");
    }

    #[test]
    fn policy_without_script_strips_its_letters() {
        let policy = SlugPolicy::new(&[Script::Latin]);
        let err = policy.derive("엘프").unwrap_err();
        assert!(matches!(err, AddressError::EmptySlug { .. }));
        assert_eq!(policy.derive("엘프 Elf").unwrap().as_str(), "elf");
    }

    #[test]
    fn derive_slug_rejects_symbol_only_titles() {
        let err = derive_slug("!!! ??? ***").unwrap_err();
        assert_eq!(
            err,
            AddressError::EmptySlug {
                title: "!!! ??? ***".to_string()
            }
        );
    }

    #[test]
    fn derive_slug_caps_length_without_trailing_hyphen() {
        let title = "ab ".repeat(150);
        let slug = derive_slug(&title).unwrap();
        assert!(slug.as_str().chars().count() <= SLUG_MAX_CHARS);
        assert!(!slug.as_str().ends_with('-'));
        assert_eq!(derive_slug(slug.as_str()).unwrap(), slug);
    }

    #[test]
    fn script_names_parse_case_insensitively() {
        assert_eq!(Script::parse(" Hangul "), Some(Script::Hangul));
        assert_eq!(Script::parse("klingon"), None);
        let policy = SlugPolicy::from_names(&["latin", "latin", "klingon"]);
        assert_eq!(policy.scripts(), &[Script::Latin]);
    }

    #[test]
    fn category_labels_fall_back_to_capitalized_name() {
        assert_eq!(Category::parse("characters").unwrap().label(), "Characters");
        assert_eq!(Category::parse("artifacts").unwrap().label(), "Artifacts");
    }

    #[test]
    fn lookups_reject_non_canonical_halves_in_both_positions() {
        for input in ["Characters/gabriel", "characters/Gabriel", "characters/gab!riel", " lore/sun"] {
            match decompose(input).unwrap_err() {
                AddressError::InvalidAddress { address, .. } => assert_eq!(address, input),
                other => panic!("unexpected error for {input}: {other}"),
            }
        }
        assert!(decompose("characters/엘프-종족").is_ok());
    }

    #[test]
    fn category_normalize_lowercases_and_trims() {
        assert_eq!(Category::normalize(" Lore ").unwrap().as_str(), "lore");
        assert!(Category::parse("Lore").is_err());
        assert_eq!(
            Category::or_default(Some("Characters")).unwrap().as_str(),
            "characters"
        );
    }

    #[test]
    fn category_rejects_separator_and_blank() {
        assert!(Category::parse("characters/player").is_err());
        assert!(Category::parse("   ").is_err());
        assert_eq!(Category::or_default(None).unwrap(), Category::general());
        assert_eq!(Category::or_default(Some(" ")).unwrap(), Category::general());
    }

    #[test]
    fn decompose_splits_on_first_separator_only() {
        let err = decompose("characters/player/elon").unwrap_err();
        assert_eq!(
            err,
            AddressError::InvalidAddress {
                address: "characters/player/elon".to_string(),
                issue: AddressIssue::InvalidSlug,
            }
        );
    }

    #[test]
    fn decompose_rejects_bare_slug() {
        let err = decompose("gabriel").unwrap_err();
        assert_eq!(
            err,
            AddressError::InvalidAddress {
                address: "gabriel".to_string(),
                issue: AddressIssue::MissingCategory,
            }
        );
    }

    #[test]
    fn compose_defaults_to_general() {
        let slug = Slug::parse("gabriel").unwrap();
        assert_eq!(compose(None, &slug), "general/gabriel");
    }

    #[test]
    fn for_create_normalizes_free_text_slug() {
        let policy = SlugPolicy::default();
        let address = PageAddress::for_create("proj1", "Lore/First Age", &policy).unwrap();
        assert_eq!(address.path(), "lore/first-age");

        let err = PageAddress::for_create("proj1", "lore/a/b", &policy).unwrap_err();
        assert!(matches!(
            err,
            AddressError::InvalidAddress {
                issue: AddressIssue::InvalidSlug,
                ..
            }
        ));
        let err = PageAddress::for_create("proj1", "lore/!!!", &policy).unwrap_err();
        assert!(matches!(err, AddressError::EmptySlug { .. }));
    }
}
