//! NCX navigation map to reading order.

use std::collections::HashSet;

use crate::archive::Archive;
use crate::dom::{ArenaDom, ArenaNodeId, normalize_whitespace, parse_xml};
use crate::error::{Error, Result};
use crate::select::Selection;
use crate::util::{decode_href, resolve_path, split_fragment};

/// One content reference in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOrderEntry {
    pub play_order: i64,
    /// Archive path of the content document.
    pub path: String,
    /// Element id the chapter starts at, if the reference carries one.
    pub anchor: Option<String>,
    pub label: Option<String>,
}

impl ChapterOrderEntry {
    /// A whole-document entry taken from the spine.
    pub fn from_spine(position: usize, path: String) -> Self {
        Self {
            play_order: position as i64,
            path,
            anchor: None,
            label: None,
        }
    }
}

/// Read the NCX at `path` and return its entries sorted by `playOrder`.
///
/// A navigation document listed by the package but absent from the archive
/// is an error. One that does not parse, or that has no usable entries,
/// yields `None` so the caller can fall back to the spine.
pub fn read_navigation(archive: &Archive, path: &str) -> Result<Option<Vec<ChapterOrderEntry>>> {
    if !archive.contains(path) {
        return Err(Error::ArchiveFileMissing(path.to_string()));
    }

    let text = archive.read_text(path)?;
    let dom = match parse_xml(&text) {
        Ok(dom) => dom,
        Err(e) => {
            log::warn!("navigation document {path} does not parse, using spine order: {e}");
            return Ok(None);
        }
    };

    let entries = parse_ncx(&dom, path)?;
    Ok((!entries.is_empty()).then_some(entries))
}

/// Collect every `navPoint` in the map, nested ones included.
///
/// Points without a `content src` are skipped. A missing or non-numeric
/// `playOrder` sorts last; ties keep document order. Repeated targets are
/// kept once.
pub fn parse_ncx(dom: &ArenaDom, ncx_path: &str) -> Result<Vec<ChapterOrderEntry>> {
    let points = Selection::document(dom)
        .select("navMap navPoint")
        .or_tag("navPoint")
        .or_absent()
        .nodes()?;

    let mut entries: Vec<ChapterOrderEntry> = points
        .into_iter()
        .filter_map(|point| entry(dom, point, ncx_path))
        .collect();
    entries.sort_by_key(|e| e.play_order);

    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert((e.path.clone(), e.anchor.clone())));

    Ok(entries)
}

fn entry(dom: &ArenaDom, point: ArenaNodeId, ncx_path: &str) -> Option<ChapterOrderEntry> {
    let Some(src) = child_named(dom, point, "content")
        .and_then(|content| dom.get_attr(content, "src"))
        .filter(|src| !src.trim().is_empty())
    else {
        log::warn!(
            "navPoint {:?} has no content src, skipping",
            dom.get_attr(point, "id").unwrap_or("")
        );
        return None;
    };

    let play_order = dom
        .get_attr(point, "playOrder")
        .and_then(|n| n.trim().parse::<i64>().ok())
        .unwrap_or(i64::MAX);

    let label = child_named(dom, point, "navLabel")
        .map(|nav_label| {
            let text = child_named(dom, nav_label, "text").unwrap_or(nav_label);
            normalize_whitespace(&dom.deep_text(text))
        })
        .filter(|l| !l.is_empty());

    let (file, anchor) = split_fragment(src.trim());

    Some(ChapterOrderEntry {
        play_order,
        path: resolve_path(ncx_path, &decode_href(file)),
        anchor: anchor.map(str::to_string),
        label,
    })
}

fn child_named(dom: &ArenaDom, parent: ArenaNodeId, name: &str) -> Option<ArenaNodeId> {
    dom.child_elements(parent)
        .find(|&c| dom.element_name(c).is_some_and(|n| n.as_ref() == name))
}
