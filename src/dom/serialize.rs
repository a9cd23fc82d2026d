//! Markup serialization for arena nodes.

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

/// Elements written as `<name/>` when they have no children.
const VOID_ELEMENTS: &[&str] = &[
    "area",
    "base",
    "br",
    "col",
    "embed",
    "empty-line",
    "hr",
    "image",
    "img",
    "input",
    "link",
    "meta",
    "source",
    "track",
    "wbr",
];

/// Serialize the children of `id`.
pub fn inner_html(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    for child in dom.children(id) {
        write_node(dom, child, &mut out);
    }
    out
}

/// Serialize `id` itself, tag included.
pub fn outer_html(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, &mut out);
    out
}

fn write_node(dom: &ArenaDom, id: ArenaNodeId, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        ArenaNodeData::Text(text) => escape_into(text, false, out),
        ArenaNodeData::Element { name, attrs, .. } => {
            let tag = match &name.prefix {
                Some(prefix) => format!("{}:{}", prefix.as_ref(), name.local.as_ref()),
                None => name.local.to_string(),
            };

            out.push('<');
            out.push_str(&tag);
            for attr in attrs {
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix.as_ref());
                    out.push(':');
                }
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }

            if node.first_child.is_none() && VOID_ELEMENTS.contains(&name.local.as_ref()) {
                out.push_str("/>");
                return;
            }

            out.push('>');
            for child in dom.children(id) {
                write_node(dom, child, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, out);
            }
        }
        ArenaNodeData::Comment(_) | ArenaNodeData::Doctype => {}
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Drop line breaks, collapse runs of two or more whitespace characters to
/// one space, and trim.
pub fn normalize_whitespace(text: &str) -> String {
    let flat: Vec<char> = text.chars().filter(|&c| c != '\r' && c != '\n').collect();

    let mut out = String::with_capacity(flat.len());
    let mut i = 0;
    while i < flat.len() {
        let c = flat[i];
        if !c.is_whitespace() {
            out.push(c);
            i += 1;
            continue;
        }

        let run = flat[i..].iter().take_while(|c| c.is_whitespace()).count();
        out.push(if run > 1 { ' ' } else { c });
        i += run;
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_xml;

    #[test]
    fn test_inner_and_outer_html() {
        let dom = parse_xml(r#"<section id="s"><p class="a">x &amp; y</p><empty-line/><div></div></section>"#)
            .unwrap();
        let section = dom.root_element().unwrap();

        assert_eq!(
            inner_html(&dom, section),
            r#"<p class="a">x &amp; y</p><empty-line/><div></div>"#
        );
        assert!(outer_html(&dom, section).starts_with(r#"<section id="s"><p"#));
    }

    #[test]
    fn test_prefixed_names_round_trip() {
        let dom = parse_xml(r##"<p><image l:href="#a"/></p>"##).unwrap();
        let p = dom.root_element().unwrap();
        assert_eq!(inner_html(&dom, p), r##"<image l:href="#a"/>"##);
    }

    #[test]
    fn test_attribute_quotes_escaped() {
        let dom = parse_xml(r#"<p title='say "hi"'/>"#).unwrap();
        let p = dom.root_element().unwrap();
        assert_eq!(outer_html(&dom, p), r#"<p title="say &quot;hi&quot;"></p>"#);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Hello,\n   World  "), "Hello, World");
        assert_eq!(normalize_whitespace("a\r\nb"), "ab");
        assert_eq!(normalize_whitespace("a \t b"), "a b");
        assert_eq!(normalize_whitespace("a\tb"), "a\tb");
        assert_eq!(normalize_whitespace(" \n "), "");
    }
}
