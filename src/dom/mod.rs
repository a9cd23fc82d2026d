//! Document trees for every markup file in a book.
//!
//! Well-formed XML goes through the quick-xml builder; content documents that
//! fail to parse as XML are rebuilt with the HTML5 algorithm. Both produce the
//! same [`ArenaDom`], so selectors and serialization do not care which path
//! built a tree.

pub mod arena;
pub mod element_ref;
pub mod serialize;
pub mod tree_sink;
pub mod xml;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

pub use arena::{ArenaDom, ArenaNodeData, ArenaNodeId, Attribute};
pub use element_ref::{DomSelectors, ElementRef};
pub use serialize::{inner_html, normalize_whitespace, outer_html};
pub use tree_sink::ArenaSink;
pub use xml::parse_xml;

use crate::util::decode_xml;

/// Parse bytes with the HTML5 algorithm.
pub fn parse_html(bytes: &[u8]) -> ArenaDom {
    parse_document(ArenaSink::new(), ParseOpts::default())
        .from_utf8()
        .one(bytes)
        .into_dom()
}

/// Parse a content document: XML first, HTML5 when that fails.
pub fn parse_markup(bytes: &[u8]) -> ArenaDom {
    let text = decode_xml(bytes);
    match parse_xml(&text) {
        Ok(dom) if dom.root_element().is_some() => dom,
        Ok(_) => parse_html(text.as_bytes()),
        Err(e) => {
            log::debug!("content document is not well-formed XML ({e}), using HTML parser");
            parse_html(text.as_bytes())
        }
    }
}
