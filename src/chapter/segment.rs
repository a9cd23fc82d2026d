//! Splitting one aggregate fragment on inline chapter delimiters.
//!
//! Some producers emit a whole book as one document and mark chapter
//! boundaries with an element whose class mentions both "section" (or
//! "chapter") and "end".

use crate::dom::{inner_html, outer_html, parse_markup};
use crate::error::Result;
use crate::select::Selection;

use super::wrap_section;

const SECTION_END: &str = r#"[class*="section"][class*="end"]"#;
const CHAPTER_END: &str = r#"[class*="chapter"][class*="end"]"#;

/// Split `markup` into chapter fragments.
///
/// Without a delimiter the input comes back as the only element, unchanged.
/// Otherwise each run of the delimiter's siblings between delimiters becomes
/// one `<section>`; delimiters and whitespace-only children contribute
/// nothing and empty runs are dropped.
pub fn segment(markup: &str) -> Result<Vec<String>> {
    let dom = parse_markup(markup.as_bytes());

    let marker = Selection::document(&dom)
        .select(SECTION_END)
        .or_select(CHAPTER_END)
        .or_absent()
        .first()?;

    let Some((marker, separator)) = marker
        .and_then(|m| dom.get_attr(m, "class").map(|class| (m, class)))
        .filter(|(_, class)| !class.trim().is_empty())
    else {
        return Ok(vec![markup.to_string()]);
    };
    log::debug!("splitting single fragment on delimiter class {separator:?}");

    let Some(container) = dom.parent(marker).filter(|&p| dom.is_element(p)) else {
        return Ok(vec![markup.to_string()]);
    };

    let mut chapters: Vec<Vec<String>> = Vec::new();
    let mut current: Option<Vec<String>> = None;

    for child in dom.children(container) {
        let is_marker = dom
            .get_attr(child, "class")
            .is_some_and(|class| class.contains(separator));
        if is_marker {
            chapters.extend(current.take());
            continue;
        }

        let blank = if dom.is_element(child) {
            inner_html(&dom, child).trim().is_empty()
        } else {
            outer_html(&dom, child).trim().is_empty()
        };
        if blank {
            continue;
        }

        current
            .get_or_insert_with(Vec::new)
            .push(outer_html(&dom, child));
    }
    chapters.extend(current);

    Ok(chapters
        .into_iter()
        .filter(|parts| !parts.is_empty())
        .map(|parts| wrap_section(&parts.concat()))
        .collect())
}
