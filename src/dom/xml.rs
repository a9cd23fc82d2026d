//! quick-xml event loop that builds an XML-mode ArenaDom.
//!
//! Namespaces are not resolved: a prefixed name such as `dc:title` keeps its
//! prefix and answers to its local part.

use html5ever::data::NAMED_ENTITIES;
use html5ever::{LocalName, Prefix, QualName, ns};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::arena::{ArenaDom, ArenaNodeId, Attribute};

/// Parse a well-formed XML document.
///
/// Mismatched end tags are errors; elements left open at end of input are
/// closed implicitly.
pub fn parse_xml(text: &str) -> Result<ArenaDom, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut dom = ArenaDom::new();
    let mut stack: Vec<ArenaNodeId> = vec![dom.document()];

    loop {
        let parent = stack.last().copied().unwrap_or(dom.document());
        match reader.read_event()? {
            Event::Start(e) => {
                let elem = create_element(&mut dom, &e);
                dom.append(parent, elem);
                stack.push(elem);
            }
            Event::Empty(e) => {
                let elem = create_element(&mut dom, &e);
                dom.append(parent, elem);
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Event::Text(e) => {
                if stack.len() > 1 {
                    dom.append_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if stack.len() > 1 {
                    dom.append_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if stack.len() > 1 {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    dom.append_text(parent, &expand_entity(&entity));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(dom)
}

fn create_element(dom: &mut ArenaDom, start: &BytesStart<'_>) -> ArenaNodeId {
    let name = qual_name(start.name().as_ref());

    let attrs = start
        .attributes()
        .with_checks(false)
        .flatten()
        .filter(|attr| {
            let key = attr.key.as_ref();
            key != b"xmlns" && !key.starts_with(b"xmlns:")
        })
        .map(|attr| {
            let raw = String::from_utf8_lossy(&attr.value);
            Attribute {
                name: qual_name(attr.key.as_ref()),
                value: unescape_attr(&raw),
            }
        })
        .collect();

    dom.create_element(name, attrs)
}

fn qual_name(raw: &[u8]) -> QualName {
    let raw = String::from_utf8_lossy(raw);
    match raw.split_once(':') {
        Some((prefix, local)) => QualName::new(
            Some(Prefix::from(prefix)),
            ns!(),
            LocalName::from(local),
        ),
        None => QualName::new(None, ns!(), LocalName::from(raw.as_ref())),
    }
}

/// Resolve an entity or character reference.
///
/// Names come from the HTML5 named character references, which cover the
/// five XML ones.
fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(code) = entity.strip_prefix('#') {
        let code = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| c.to_string());
    }

    let &(first, second) = NAMED_ENTITIES.get(format!("{entity};").as_str())?;
    if first == 0 {
        return None;
    }
    [first, second]
        .into_iter()
        .filter(|&c| c != 0)
        .map(char::from_u32)
        .collect()
}

/// Resolve a reference, or keep it as literal text when it is unknown.
fn expand_entity(entity: &str) -> String {
    resolve_entity(entity).unwrap_or_else(|| {
        log::debug!("unknown entity &{entity}; kept as text");
        format!("&{entity};")
    })
}

/// Expand every `&name;` in an attribute value.
fn unescape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        match tail.find(';') {
            Some(semi) if semi > 0 && !tail[..semi].contains(['&', ' ']) => {
                out.push_str(&expand_entity(&tail[..semi]));
                rest = &tail[semi + 1..];
            }
            _ => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_names_keep_prefix() {
        let dom = parse_xml(
            r#"<package xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></package>"#,
        )
        .unwrap();

        let title = dom.find_by_tag("title").unwrap();
        let name = dom.element_qual_name(title).unwrap();
        assert_eq!(name.prefix.as_ref().map(|p| p.as_ref()), Some("dc"));
        assert_eq!(dom.deep_text(title), "T");

        let root = dom.root_element().unwrap();
        assert!(dom.attributes(root).is_empty());
    }

    #[test]
    fn test_entities_resolved() {
        let dom = parse_xml("<p a=\"x &amp; y&nbsp;z\">A &amp; B&#8212;C&#x41;&hellip;</p>").unwrap();
        let p = dom.root_element().unwrap();
        assert_eq!(dom.deep_text(p), "A & B\u{2014}CA\u{2026}");
        assert_eq!(dom.get_attr(p, "a"), Some("x & y\u{a0}z"));
    }

    #[test]
    fn test_prefixed_attribute_answers_to_local_name() {
        let dom = parse_xml(r##"<image l:href="#cover.jpg"/>"##).unwrap();
        let image = dom.root_element().unwrap();
        assert_eq!(dom.get_attr(image, "href"), Some("#cover.jpg"));
    }

    #[test]
    fn test_cdata_and_whitespace_kept() {
        let dom = parse_xml("<a> <b>x</b> <![CDATA[1 < 2]]></a>").unwrap();
        let a = dom.root_element().unwrap();
        assert_eq!(dom.deep_text(a), " x 1 < 2");
    }

    #[test]
    fn test_mismatched_end_tag_is_error() {
        assert!(parse_xml("<a><b></a>").is_err());
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("quot"), Some("\"".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2019"), Some("\u{2019}".to_string()));
        assert_eq!(resolve_entity("eacute"), Some("\u{e9}".to_string()));
        assert_eq!(resolve_entity("NotEqualTilde"), Some("\u{2242}\u{338}".to_string()));
        assert_eq!(resolve_entity("eacut"), None);
        assert_eq!(resolve_entity("bogus"), None);
    }

    #[test]
    fn test_html_entities_kept_in_text() {
        let dom = parse_xml("<p>Caf&eacute; &agrave; &auml;&THORN; &bogus; end</p>").unwrap();
        let p = dom.root_element().unwrap();
        assert_eq!(dom.deep_text(p), "Caf\u{e9} \u{e0} \u{e4}\u{de} &bogus; end");
    }

    #[test]
    fn test_attribute_entities() {
        assert_eq!(unescape_attr("a &amp; b &eacute;"), "a & b \u{e9}");
        assert_eq!(unescape_attr("R&D &unknown; x"), "R&D &unknown; x");
    }
}
