//! Content document fetch and chapter fragment extraction.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::archive::Archive;
use crate::chapter::{Fragment, wrap_section};
use crate::dom::{ArenaDom, ArenaNodeId, inner_html, outer_html, parse_markup};
use crate::error::{Error, Result};
use crate::select::Selection;

use super::nav::ChapterOrderEntry;

/// Fetch every referenced content document and cut one fragment per entry.
///
/// Every path is checked up front, so a dangling reference fails the whole
/// parse before any document is decompressed. Each distinct document is
/// read and parsed once, in parallel; the fragments come back in `entries`
/// order.
pub fn fetch_fragments(
    archive: &Archive,
    entries: &[ChapterOrderEntry],
    max_threads: Option<usize>,
) -> Result<Vec<Fragment>> {
    if let Some(missing) = entries.iter().find(|e| !archive.contains(&e.path)) {
        return Err(Error::ArchiveFileMissing(missing.path.clone()));
    }

    let mut seen = HashSet::new();
    let paths: Vec<&str> = entries
        .iter()
        .map(|e| e.path.as_str())
        .filter(|path| seen.insert(*path))
        .collect();

    let documents = load_documents(archive, &paths, max_threads)?;

    entries
        .iter()
        .map(|entry| {
            let dom = documents
                .get(entry.path.as_str())
                .ok_or_else(|| Error::ArchiveFileMissing(entry.path.clone()))?;
            let markup = extract(dom, entry)?;
            Ok(Fragment::new(markup).with_nav_label(entry.label.clone()))
        })
        .collect()
}

fn load_documents<'p>(
    archive: &Archive,
    paths: &[&'p str],
    max_threads: Option<usize>,
) -> Result<HashMap<&'p str, ArenaDom>> {
    let load = || {
        paths
            .par_iter()
            .map(|&path| -> Result<(&'p str, ArenaDom)> {
                let bytes = archive.read(path)?;
                Ok((path, parse_markup(&bytes)))
            })
            .collect::<Result<HashMap<_, _>>>()
    };

    match max_threads {
        Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(load),
            Err(e) => {
                log::warn!("cannot build a {threads}-thread fetch pool, using the global one: {e}");
                load()
            }
        },
        None => load(),
    }
}

/// The markup for one entry: from its anchor up to the next sibling of the
/// same kind, or the whole body.
fn extract(dom: &ArenaDom, entry: &ChapterOrderEntry) -> Result<String> {
    let body = Selection::document(dom)
        .select_tag("body")
        .or_absent()
        .first()?
        .or_else(|| dom.root_element());
    let Some(body) = body else {
        return Ok(String::new());
    };

    let Some(anchor) = entry.anchor.as_deref() else {
        return Ok(wrap_section(&inner_html(dom, body)));
    };

    match dom.get_by_id(anchor) {
        Some(start) => Ok(wrap_section(&anchored_run(dom, start))),
        None => {
            log::warn!("anchor #{anchor} not found in {}, using the whole document", entry.path);
            Ok(wrap_section(&inner_html(dom, body)))
        }
    }
}

/// `start` and its following siblings, stopping before the next sibling
/// with the same tag. An anchor with no text of its own (an empty `<a id>`
/// marker) stands for its parent.
fn anchored_run(dom: &ArenaDom, start: ArenaNodeId) -> String {
    let start = if dom.deep_text(start).trim().is_empty() {
        dom.parent(start).filter(|&p| dom.is_element(p)).unwrap_or(start)
    } else {
        start
    };
    let tag = dom.element_name(start).cloned();

    let Some(parent) = dom.parent(start) else {
        return outer_html(dom, start);
    };

    let mut out = String::new();
    let mut started = false;
    for sibling in dom.children(parent) {
        if sibling == start {
            started = true;
        } else if !started {
            continue;
        } else if dom.is_element(sibling) && dom.element_name(sibling).cloned() == tag {
            break;
        }
        out.push_str(&outer_html(dom, sibling));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::io::MemorySource;

    const CHAPTERS: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<h2 id="c1">One</h2><p>first</p>
<h2 id="c2">Two</h2><p>second</p><p>more</p>
<div><a id="c3"/></div><p>third</p>
</body></html>"#;

    fn archive() -> Archive {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let files = [
            ("a.xhtml", CHAPTERS),
            ("b.html", "<html><body><p>loose<br>html</body></html>"),
        ];
        for (name, content) in files {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();
        Archive::open(Arc::new(MemorySource::new(bytes))).unwrap()
    }

    fn entry(path: &str, anchor: Option<&str>) -> ChapterOrderEntry {
        ChapterOrderEntry {
            play_order: 0,
            path: path.to_string(),
            anchor: anchor.map(str::to_string),
            label: Some(format!("{path} label")),
        }
    }

    #[test]
    fn test_anchored_runs() {
        let fragments = fetch_fragments(
            &archive(),
            &[entry("a.xhtml", Some("c2")), entry("a.xhtml", Some("c1"))],
            None,
        )
        .unwrap();

        assert_eq!(
            fragments[0].markup,
            "<section><h2 id=\"c2\">Two</h2><p>second</p><p>more</p>\n<div><a id=\"c3\"></a></div><p>third</p>\n</section>"
        );
        assert_eq!(
            fragments[1].markup,
            "<section><h2 id=\"c1\">One</h2><p>first</p>\n</section>"
        );
        assert_eq!(fragments[1].nav_label.as_deref(), Some("a.xhtml label"));
    }

    #[test]
    fn test_empty_anchor_climbs_to_parent() {
        let fragments = fetch_fragments(&archive(), &[entry("a.xhtml", Some("c3"))], Some(2)).unwrap();
        assert_eq!(
            fragments[0].markup,
            "<section><div><a id=\"c3\"></a></div><p>third</p>\n</section>"
        );
    }

    #[test]
    fn test_whole_body_and_html_fallback() {
        let fragments = fetch_fragments(
            &archive(),
            &[entry("b.html", None), entry("a.xhtml", Some("missing"))],
            Some(1),
        )
        .unwrap();

        assert_eq!(fragments[0].markup, "<section><p>loose<br/>html</p></section>");
        assert!(fragments[1].markup.starts_with("<section>\n<h2 id=\"c1\">"));
    }

    #[test]
    fn test_missing_document_fails_whole_fetch() {
        let result = fetch_fragments(
            &archive(),
            &[entry("a.xhtml", None), entry("gone.xhtml", None)],
            None,
        );
        assert!(matches!(result, Err(Error::ArchiveFileMissing(p)) if p == "gone.xhtml"));
    }
}
