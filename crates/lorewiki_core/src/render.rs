//! Markdown rendering seam and plain-text excerpts.
//!
//! The core never turns markdown into HTML itself; callers plug a
//! [`Renderer`] in. Excerpts and cover images are derived here because the
//! page detail view needs them without a renderer.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_EXCERPT_CHARS: usize = 100;

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`#>~\-\[\]\(\)!|]+"#).expect("valid markdown symbol regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Turns markdown into a presentation format. Must be pure.
pub trait Renderer {
    type Output;

    fn render(&self, markdown: &str) -> Self::Output;
}

/// Renderer that hands the markdown back untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    type Output = String;

    fn render(&self, markdown: &str) -> Self::Output {
        markdown.to_string()
    }
}

/// Plain-text excerpt of a markdown body, capped at `max_chars`.
///
/// Images are dropped, links keep their label, markup symbols and
/// whitespace runs collapse to single spaces. Returns `None` when nothing
/// readable remains.
pub fn derive_excerpt(content: &str, max_chars: usize) -> Option<String> {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(content, " ");
    let without_links = MARKDOWN_LINK_RE.replace_all(&without_images, "$1");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_links, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_symbols, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}

/// First image target in the body, used as a card cover.
pub fn first_image(content: &str) -> Option<String> {
    MARKDOWN_IMAGE_RE
        .captures(content)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty())
}
