//! FB2 `body/section` extraction.

use crate::chapter::{Fragment, wrap_section};
use crate::dom::{ArenaDom, ArenaNodeId, inner_html, outer_html};
use crate::error::{Error, Result};
use crate::select::Selection;

/// Bodies with these `name` attributes hold footnotes, not text.
const AUXILIARY_BODIES: &[&str] = &["notes", "comments"];

/// One fragment per leaf `section` of every text body, in document order.
///
/// Nested sections are flattened: a parent's own content (usually just its
/// title) becomes a fragment of its own, followed by its subsections. A body
/// without any section is taken whole.
pub fn body_fragments(dom: &ArenaDom) -> Result<Vec<Fragment>> {
    let bodies: Vec<ArenaNodeId> = Selection::document(dom)
        .select_tag("body")
        .or_absent()
        .nodes()?
        .into_iter()
        .filter(|&body| {
            !dom.get_attr(body, "name")
                .is_some_and(|name| AUXILIARY_BODIES.contains(&name.trim()))
        })
        .collect();

    if bodies.is_empty() {
        return Err(Error::CorruptedData("FB2 document has no text body".to_string()));
    }

    let mut fragments = Vec::new();
    for body in bodies {
        let sections: Vec<_> = child_sections(dom, body).collect();
        if sections.is_empty() {
            fragments.push(Fragment::new(wrap_section(&inner_html(dom, body))));
            continue;
        }
        for section in sections {
            flatten_section(dom, section, &mut fragments);
        }
    }

    Ok(fragments)
}

fn child_sections(dom: &ArenaDom, parent: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
    dom.child_elements(parent).filter(|&c| is_section(dom, c))
}

fn is_section(dom: &ArenaDom, id: ArenaNodeId) -> bool {
    dom.element_name(id).is_some_and(|n| n.as_ref() == "section")
}

fn flatten_section(dom: &ArenaDom, section: ArenaNodeId, out: &mut Vec<Fragment>) {
    let subsections: Vec<_> = child_sections(dom, section).collect();
    if subsections.is_empty() {
        out.push(Fragment::new(outer_html(dom, section)));
        return;
    }

    let own: String = dom
        .children(section)
        .filter(|&c| !is_section(dom, c))
        .map(|c| outer_html(dom, c))
        .collect();
    if !own.trim().is_empty() {
        out.push(Fragment::new(wrap_section(own.trim())));
    }

    for sub in subsections {
        flatten_section(dom, sub, out);
    }
}
