//! Title/body split and markup cleanup for one chapter fragment.

use crate::book::Chapter;
use crate::dom::{ArenaDom, ArenaNodeId, inner_html, normalize_whitespace, parse_markup};
use crate::error::Result;
use crate::select::Selection;

use super::Fragment;

/// Elements removed together with their content.
const DISCARDED: &str = "h1, h2, h3, h4, h5, h6, head, a";

/// Elements rewritten to `<em>`.
const EMPHASIS: &str = "emphasis, i";

/// A sanitized chapter and the number of paragraphs it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedChapter {
    pub chapter: Chapter,
    /// Title paragraphs plus body paragraphs.
    pub items: usize,
}

/// Split a fragment into title and body.
///
/// The first paragraph inside anything named or classed "title" becomes the
/// title; every other paragraph is re-wrapped into the body. Without a title
/// paragraph the title comes from a `title` element, then the navigation
/// label, then a numbered placeholder in the book's language. `index` is the
/// 0-based position of the fragment.
pub fn sanitize(fragment: &Fragment, index: usize, language: Option<&str>) -> Result<SanitizedChapter> {
    let mut dom = parse_markup(fragment.markup.as_bytes());

    for id in Selection::document(&dom).select(DISCARDED).or_absent().nodes()? {
        dom.detach(id);
    }
    for id in Selection::document(&dom).select(EMPHASIS).or_absent().nodes()? {
        dom.rename(id, "em");
    }

    let paragraphs = Selection::document(&dom)
        .select("section p")
        .or_select("p")
        .or_absent()
        .nodes()?;

    let mut title = String::new();
    let mut body = String::new();
    for &p in &paragraphs {
        if title.is_empty() && in_title_context(&dom, p) {
            title = normalize_whitespace(&inner_html(&dom, p));
        } else {
            body.push_str("<p>");
            body.push_str(inner_html(&dom, p).trim());
            body.push_str("</p>");
        }
    }

    if title.is_empty() {
        title = Selection::document(&dom)
            .select("section title")
            .or_tag("title")
            .or_absent()
            .text()?;
    }
    if title.is_empty()
        && let Some(label) = &fragment.nav_label
    {
        title = normalize_whitespace(label);
    }
    if title.is_empty() {
        title = placeholder_title(index, language);
    }

    Ok(SanitizedChapter {
        chapter: Chapter {
            title,
            content: body,
        },
        items: paragraphs.len(),
    })
}

/// True if `p` or one of its ancestors mentions "title" in its tag name or
/// class.
fn in_title_context(dom: &ArenaDom, p: ArenaNodeId) -> bool {
    dom.ancestors_inclusive(p).any(|id| {
        let named = dom
            .element_name(id)
            .is_some_and(|name| name.to_ascii_lowercase().contains("title"));
        let classed = dom
            .get_attr(id, "class")
            .is_some_and(|class| class.to_lowercase().contains("title"));
        named || classed
    })
}

/// "Chapter N" for English books, "Глава N" otherwise.
fn placeholder_title(index: usize, language: Option<&str>) -> String {
    match language {
        Some("en") => format!("Chapter {}", index + 1),
        _ => format!("Глава {}", index + 1),
    }
}
