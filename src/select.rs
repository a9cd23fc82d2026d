//! Fallback-chaining node queries.
//!
//! Every extractor in the crate reads documents whose structure varies
//! between producers. A [`Selection`] runs one query and then any number of
//! recoveries, each of which fires only while the selection is still
//! unresolved:
//!
//! ```
//! use folio::dom::parse_xml;
//! use folio::select::Selection;
//!
//! let dom = parse_xml("<book><info><lang>ru</lang></info></book>").unwrap();
//! let lang = Selection::document(&dom)
//!     .select("title-info lang")
//!     .or_select("info lang")
//!     .or_absent()
//!     .text()
//!     .unwrap();
//! assert_eq!(lang, "ru");
//! ```
//!
//! Reading an unresolved selection is an [`Error::UnresolvedSelection`];
//! a selection that explicitly accepted absence reads as a single `None`.

use std::fmt;

use selectors::context::{MatchingContext, SelectorCaches};
use selectors::matching::{MatchingForInvalidation, MatchingMode, NeedsSelectorFlags};
use selectors::parser::{ParseRelative, Selector, SelectorList};

use crate::dom::{ArenaDom, ArenaNodeId, DomSelectors, ElementRef, inner_html, normalize_whitespace};
use crate::error::{Error, Result};

// ============================================================================
// Queries
// ============================================================================

/// How to find nodes below a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeQuery {
    /// A CSS selector list. Unparsable selectors match nothing.
    Selector(String),
    /// An element name. Names containing `:` match the prefixed name
    /// exactly; plain names match the local part of any element.
    TagName(String),
}

impl NodeQuery {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::TagName(name.into())
    }

    /// Elements below `root` that match, in document order. `root` itself
    /// is never included.
    pub fn query(&self, dom: &ArenaDom, root: ArenaNodeId) -> Vec<ArenaNodeId> {
        let elements = dom
            .descendants(root)
            .into_iter()
            .filter(|&id| dom.is_element(id));

        match self {
            Self::Selector(selector) => {
                let Some(selectors) = parse_selectors(selector) else {
                    return Vec::new();
                };

                let mut caches = SelectorCaches::default();
                let mut context = MatchingContext::new(
                    MatchingMode::Normal,
                    None,
                    &mut caches,
                    selectors::context::QuirksMode::NoQuirks,
                    NeedsSelectorFlags::No,
                    MatchingForInvalidation::No,
                );

                elements
                    .filter(|&id| {
                        let elem = ElementRef::new(dom, id);
                        selectors.iter().any(|s| {
                            selectors::matching::matches_selector(s, 0, None, &elem, &mut context)
                        })
                    })
                    .collect()
            }
            Self::TagName(name) => elements
                .filter(|&id| tag_matches(dom, id, name))
                .collect(),
        }
    }
}

impl fmt::Display for NodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(s) => write!(f, "selector `{s}`"),
            Self::TagName(t) => write!(f, "tag `{t}`"),
        }
    }
}

fn parse_selectors(selector: &str) -> Option<Vec<Selector<DomSelectors>>> {
    let mut input = cssparser::ParserInput::new(selector);
    let mut parser = cssparser::Parser::new(&mut input);
    match SelectorList::parse(&DomSelectors, &mut parser, ParseRelative::No) {
        Ok(list) => Some(list.slice().to_vec()),
        Err(e) => {
            log::warn!("ignoring unparsable selector `{selector}`: {:?}", e.kind);
            None
        }
    }
}

fn tag_matches(dom: &ArenaDom, id: ArenaNodeId, name: &str) -> bool {
    let Some(qual) = dom.element_qual_name(id) else {
        return false;
    };

    match name.split_once(':') {
        Some((prefix, local)) => {
            qual.local.as_ref() == local
                && qual.prefix.as_ref().is_some_and(|p| p.as_ref() == prefix)
        }
        None if dom.is_html() => qual.local.as_ref().eq_ignore_ascii_case(name),
        None => qual.local.as_ref() == name,
    }
}

// ============================================================================
// Recoveries
// ============================================================================

/// Replacement applied while a selection is unresolved.
pub enum Recovery<'a> {
    /// Re-query against the selection's root.
    Query(NodeQuery),
    /// Use these nodes. An empty list leaves the selection unresolved.
    Nodes(Vec<ArenaNodeId>),
    /// Compute nodes from the document and root; `None` or an empty list
    /// leaves the selection unresolved.
    With(Box<dyn FnOnce(&ArenaDom, ArenaNodeId) -> Option<Vec<ArenaNodeId>> + 'a>),
    /// Stop failing: reads return a single `None`.
    AcceptAbsent,
}

impl fmt::Debug for Recovery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(q) => f.debug_tuple("Query").field(q).finish(),
            Self::Nodes(n) => f.debug_tuple("Nodes").field(n).finish(),
            Self::With(_) => f.write_str("With(..)"),
            Self::AcceptAbsent => f.write_str("AcceptAbsent"),
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Found(Vec<ArenaNodeId>),
    /// Holds a description of the last failed query.
    Unresolved(String),
    AcceptedAbsent,
}

/// The result of a query plus its recoveries, bound to one root.
#[derive(Debug, Clone)]
pub struct Selection<'d> {
    dom: &'d ArenaDom,
    root: ArenaNodeId,
    state: State,
}

impl<'d> Selection<'d> {
    /// Start an empty, unresolved selection under `root`.
    pub fn new(dom: &'d ArenaDom, root: ArenaNodeId) -> Self {
        Self {
            dom,
            root,
            state: State::Unresolved("no query".to_string()),
        }
    }

    /// Start a selection under the document node.
    pub fn document(dom: &'d ArenaDom) -> Self {
        Self::new(dom, dom.document())
    }

    /// Replace the current result with `query`'s matches.
    pub fn query(mut self, query: NodeQuery) -> Self {
        self.state = self.run(&query);
        self
    }

    pub fn select(self, selector: &str) -> Self {
        self.query(NodeQuery::selector(selector))
    }

    pub fn select_tag(self, tag: &str) -> Self {
        self.query(NodeQuery::tag(tag))
    }

    /// Apply `recovery` if the selection is unresolved; otherwise no-op.
    pub fn recover(mut self, recovery: Recovery<'_>) -> Self {
        if !self.is_unresolved() {
            return self;
        }

        match recovery {
            Recovery::Query(query) => self.state = self.run(&query),
            Recovery::Nodes(nodes) => {
                if !nodes.is_empty() {
                    self.state = State::Found(nodes);
                }
            }
            Recovery::With(f) => {
                if let Some(nodes) = f(self.dom, self.root).filter(|n| !n.is_empty()) {
                    self.state = State::Found(nodes);
                }
            }
            Recovery::AcceptAbsent => self.state = State::AcceptedAbsent,
        }
        self
    }

    pub fn or_select(self, selector: &str) -> Self {
        self.recover(Recovery::Query(NodeQuery::selector(selector)))
    }

    pub fn or_tag(self, tag: &str) -> Self {
        self.recover(Recovery::Query(NodeQuery::tag(tag)))
    }

    pub fn or_nodes(self, nodes: Vec<ArenaNodeId>) -> Self {
        self.recover(Recovery::Nodes(nodes))
    }

    pub fn or_else<F>(self, f: F) -> Self
    where
        F: FnOnce(&ArenaDom, ArenaNodeId) -> Option<Vec<ArenaNodeId>> + 'd,
    {
        self.recover(Recovery::With(Box::new(f)))
    }

    pub fn or_absent(self) -> Self {
        self.recover(Recovery::AcceptAbsent)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self.state, State::Unresolved(_))
    }

    fn run(&self, query: &NodeQuery) -> State {
        let nodes = query.query(self.dom, self.root);
        if nodes.is_empty() {
            State::Unresolved(query.to_string())
        } else {
            State::Found(nodes)
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Every selected node, or `[None]` for an accepted absence.
    pub fn all(&self) -> Result<Vec<Option<ArenaNodeId>>> {
        match &self.state {
            State::Found(nodes) => Ok(nodes.iter().copied().map(Some).collect()),
            State::AcceptedAbsent => Ok(vec![None]),
            State::Unresolved(what) => Err(Error::UnresolvedSelection(what.clone())),
        }
    }

    /// Like [`all`](Self::all), mapping each node through `f`. A node that
    /// maps to `None` makes the whole read unresolved.
    pub fn all_with<F>(&self, f: F) -> Result<Vec<Option<ArenaNodeId>>>
    where
        F: Fn(&ArenaDom, ArenaNodeId) -> Option<ArenaNodeId>,
    {
        self.all()?
            .into_iter()
            .map(|entry| match entry {
                Some(id) => f(self.dom, id).map(Some).ok_or_else(|| {
                    Error::UnresolvedSelection(format!(
                        "node <{}> rejected by transform",
                        self.dom
                            .element_name(id)
                            .map(|n| n.as_ref())
                            .unwrap_or("#text")
                    ))
                }),
                None => Ok(None),
            })
            .collect()
    }

    /// Selected nodes with the absence sentinel dropped.
    pub fn nodes(&self) -> Result<Vec<ArenaNodeId>> {
        Ok(self.all()?.into_iter().flatten().collect())
    }

    /// The first selected node.
    pub fn first(&self) -> Result<Option<ArenaNodeId>> {
        self.nth(0)
    }

    /// The node at `index`; `None` past the end or for an accepted absence.
    pub fn nth(&self, index: usize) -> Result<Option<ArenaNodeId>> {
        Ok(self.all()?.get(index).copied().flatten())
    }

    /// [`nth`](Self::nth) after mapping every node through `f`.
    pub fn nth_with<F>(&self, index: usize, f: F) -> Result<Option<ArenaNodeId>>
    where
        F: Fn(&ArenaDom, ArenaNodeId) -> Option<ArenaNodeId>,
    {
        Ok(self.all_with(f)?.get(index).copied().flatten())
    }

    /// Normalized inner markup of the first node; empty for an absence.
    pub fn text(&self) -> Result<String> {
        self.text_at(0)
    }

    pub fn text_at(&self, index: usize) -> Result<String> {
        Ok(self
            .nth(index)?
            .map(|id| normalize_whitespace(&inner_html(self.dom, id)))
            .unwrap_or_default())
    }

    /// Normalized text content of the first node, markup dropped and
    /// entities decoded; empty for an absence.
    pub fn plain_text(&self) -> Result<String> {
        self.plain_text_at(0)
    }

    pub fn plain_text_at(&self, index: usize) -> Result<String> {
        Ok(self
            .nth(index)?
            .map(|id| normalize_whitespace(&self.dom.deep_text(id)))
            .unwrap_or_default())
    }

    /// Attribute of the first node; `None` for an absence or a missing
    /// attribute.
    pub fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.attribute_at(name, 0)
    }

    pub fn attribute_at(&self, name: &str, index: usize) -> Result<Option<String>> {
        Ok(self
            .nth(index)?
            .and_then(|id| self.dom.get_attr(id, name))
            .map(str::to_string))
    }
}
