//! Turning raw content fragments into titled, sanitized chapters.
//!
//! Handlers hand over [`Fragment`]s in reading order. When fewer than two
//! arrive, the single fragment is split on inline delimiter markers
//! ([`segment`]). Every fragment is then split into a title and paragraph
//! body ([`sanitize`]), and chapters with too few text items are dropped.

pub mod sanitize;
pub mod segment;

use crate::book::Chapter;
use crate::error::Result;

pub use sanitize::{SanitizedChapter, sanitize};
pub use segment::segment;

/// One chapter candidate: markup wrapped in a `<section>`, plus the
/// navigation label pointing at it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub markup: String,
    pub nav_label: Option<String>,
}

impl Fragment {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            nav_label: None,
        }
    }

    pub fn with_nav_label(mut self, label: Option<String>) -> Self {
        self.nav_label = label.filter(|l| !l.trim().is_empty());
        self
    }
}

/// Wrap markup in a section container.
pub fn wrap_section(inner: &str) -> String {
    format!("<section>{inner}</section>")
}

/// Build the final chapter list.
///
/// `min_items` is the fewest paragraphs (title included) a chapter needs to
/// be kept; `0` keeps everything.
pub fn build_chapters(
    fragments: Vec<Fragment>,
    language: Option<&str>,
    min_items: usize,
) -> Result<Vec<Chapter>> {
    let fragments: Vec<Fragment> = fragments
        .into_iter()
        .filter(|f| !f.markup.trim().is_empty())
        .collect();

    let fragments = if fragments.len() < 2 {
        match fragments.into_iter().next() {
            Some(single) => {
                let parts = segment(&single.markup)?;
                if parts.len() == 1 {
                    vec![single]
                } else {
                    parts.into_iter().map(Fragment::new).collect()
                }
            }
            None => Vec::new(),
        }
    } else {
        fragments
    };

    let mut chapters = Vec::with_capacity(fragments.len());
    for (index, fragment) in fragments.iter().enumerate() {
        let sanitized = sanitize(fragment, index, language)?;
        if sanitized.items < min_items {
            log::warn!(
                "dropping chapter {} ({:?}): {} text item(s), need {min_items}",
                index + 1,
                sanitized.chapter.title,
                sanitized.items
            );
            continue;
        }
        chapters.push(sanitized.chapter);
    }

    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_fragments_skip_segmentation() {
        let fragments = vec![
            Fragment::new(
                r#"<section><p>a</p><div class="section-end"/><p>b</p></section>"#,
            )
            .with_nav_label(Some("One".to_string())),
            Fragment::new("<section><p>c</p><p>d</p></section>"),
        ];

        let chapters = build_chapters(fragments, Some("en"), 2).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "One");
        assert_eq!(chapters[0].content, "<p>a</p><p>b</p>");
        assert_eq!(chapters[1].title, "Chapter 2");
    }

    #[test]
    fn test_single_fragment_is_segmented() {
        let markup = r#"<section>
            <p class="title">First</p><p>one</p>
            <div class="chapter end"></div>
            <p class="title">Second</p><p>two</p>
        </section>"#;

        let chapters = build_chapters(vec![Fragment::new(markup)], Some("en"), 2).unwrap();
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(chapters[1].content, "<p>two</p>");
    }

    #[test]
    fn test_nav_label_ignored_after_segmentation() {
        let markup = r#"<section><p>one</p><p>1</p><hr class="section-end"/><p>two</p><p>2</p></section>"#;
        let fragment = Fragment::new(markup).with_nav_label(Some("Whole book".to_string()));

        let chapters = build_chapters(vec![fragment], None, 2).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Глава 1");
        assert_eq!(chapters[1].title, "Глава 2");
    }

    #[test]
    fn test_short_chapters_dropped_unless_disabled() {
        let fragments = vec![
            Fragment::new("<section><p>only one</p></section>"),
            Fragment::new("<section><p>one</p><p>two</p></section>"),
        ];

        let kept = build_chapters(fragments.clone(), Some("en"), 2).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Chapter 2");

        let all = build_chapters(fragments, Some("en"), 0).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_no_fragments() {
        assert!(build_chapters(Vec::new(), None, 2).unwrap().is_empty());
    }
}
