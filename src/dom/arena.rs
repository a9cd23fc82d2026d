//! Arena-based DOM shared by the XML builder and the HTML fallback parser.
//!
//! All nodes live in one vector; parent/child/sibling links are indices into
//! it. Detached nodes stay allocated but are unreachable from the document.

use std::collections::HashMap;

use html5ever::{LocalName, Namespace, QualName};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaNodeId(pub u32);

impl ArenaNodeId {
    /// Sentinel value for no node.
    pub const NONE: ArenaNodeId = ArenaNodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum ArenaNodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-extracted id for fast lookup.
        id: Option<String>,
        /// Pre-extracted classes for selector matching.
        classes: Vec<String>,
    },
    /// Decoded text; escaping happens on serialization.
    Text(String),
    Comment(String),
    Doctype,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

#[derive(Debug)]
pub struct ArenaNode {
    pub data: ArenaNodeData,
    pub parent: ArenaNodeId,
    pub first_child: ArenaNodeId,
    pub last_child: ArenaNodeId,
    pub prev_sibling: ArenaNodeId,
    pub next_sibling: ArenaNodeId,
}

impl ArenaNode {
    fn new(data: ArenaNodeData) -> Self {
        Self {
            data,
            parent: ArenaNodeId::NONE,
            first_child: ArenaNodeId::NONE,
            last_child: ArenaNodeId::NONE,
            prev_sibling: ArenaNodeId::NONE,
            next_sibling: ArenaNodeId::NONE,
        }
    }
}

/// Arena-based DOM tree.
#[derive(Debug)]
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
    document: ArenaNodeId,
    /// First element carrying each id attribute.
    id_map: HashMap<String, ArenaNodeId>,
    /// HTML documents match tag names case-insensitively; XML ones do not.
    is_html: bool,
}

impl ArenaDom {
    /// Create an empty XML document.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: ArenaNodeId::NONE,
            id_map: HashMap::new(),
            is_html: false,
        };
        dom.document = dom.alloc(ArenaNode::new(ArenaNodeData::Document));
        dom
    }

    /// Create an empty HTML document.
    pub fn new_html() -> Self {
        let mut dom = Self::new();
        dom.is_html = true;
        dom
    }

    pub fn is_html(&self) -> bool {
        self.is_html
    }

    fn alloc(&mut self, node: ArenaNode) -> ArenaNodeId {
        let id = ArenaNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn document(&self) -> ArenaNodeId {
        self.document
    }

    pub fn get(&self, id: ArenaNodeId) -> Option<&ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ArenaNodeId) -> Option<&mut ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> ArenaNodeId {
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            match attr.name.local.as_ref() {
                "id" if attr.name.prefix.is_none() => id = Some(attr.value.clone()),
                "class" => {
                    classes = attr
                        .value
                        .split_whitespace()
                        .map(|s| s.to_string())
                        .collect();
                }
                _ => {}
            }
        }

        let node_id = self.alloc(ArenaNode::new(ArenaNodeData::Element {
            name,
            attrs,
            id: id.clone(),
            classes,
        }));

        if let Some(id_str) = id {
            self.id_map.entry(id_str).or_insert(node_id);
        }

        node_id
    }

    pub fn create_text(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Comment(text)))
    }

    pub fn create_doctype(&mut self) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Doctype))
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = ArenaNodeId::NONE;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert `new_node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: ArenaNodeId, new_node: ArenaNodeId) {
        let (parent, prev) = match self.get(sibling) {
            Some(n) => (n.parent, n.prev_sibling),
            None => return,
        };

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Append text to the last child if it is a text node, else create one.
    pub fn append_text(&mut self, parent: ArenaNodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let ArenaNodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Unlink a node (and its subtree) from its parent.
    pub fn detach(&mut self, target: ArenaNodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = ArenaNodeId::NONE;
            node.prev_sibling = ArenaNodeId::NONE;
            node.next_sibling = ArenaNodeId::NONE;
        }
    }

    /// Move every child of `node` to the end of `new_parent`.
    pub fn reparent_children(&mut self, node: ArenaNodeId, new_parent: ArenaNodeId) {
        let children: Vec<_> = self.children(node).collect();
        for child in children {
            self.detach(child);
            self.append(new_parent, child);
        }
    }

    /// Replace an element's tag with an unprefixed `local` name, keeping
    /// attributes and children.
    pub fn rename(&mut self, id: ArenaNodeId, local: &str) {
        if let Some(node) = self.get_mut(id)
            && let ArenaNodeData::Element { name, .. } = &mut node.data
        {
            *name = QualName::new(None, name.ns.clone(), LocalName::from(local));
        }
    }

    /// Look up the first element carrying `id`.
    pub fn get_by_id(&self, id: &str) -> Option<ArenaNodeId> {
        self.id_map.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the document holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, parent: ArenaNodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(ArenaNodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Element children only.
    pub fn child_elements(&self, parent: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    /// All nodes below `root` in document order, `root` excluded.
    pub fn descendants(&self, root: ArenaNodeId) -> Vec<ArenaNodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<ArenaNodeId> = self.children(root).collect();
        stack.reverse();

        while let Some(id) = stack.pop() {
            out.push(id);
            let mut children: Vec<_> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }

        out
    }

    /// `id` itself followed by its ancestors up to the document.
    pub fn ancestors_inclusive(&self, id: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
        std::iter::successors(Some(id).filter(|i| i.is_some()), move |&current| {
            self.get(current).map(|n| n.parent).filter(|p| p.is_some())
        })
    }

    pub fn parent(&self, id: ArenaNodeId) -> Option<ArenaNodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_some())
    }

    /// The first element child of the document.
    pub fn root_element(&self) -> Option<ArenaNodeId> {
        self.child_elements(self.document).next()
    }

    /// First descendant element whose local name is `tag`, in document order.
    #[cfg(test)]
    pub fn find_by_tag(&self, tag: &str) -> Option<ArenaNodeId> {
        self.descendants(self.document)
            .into_iter()
            .find(|&id| self.element_name(id).is_some_and(|n| n.as_ref() == tag))
    }
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChildrenIter<'a> {
    dom: &'a ArenaDom,
    current: ArenaNodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(ArenaNodeId::NONE);
        Some(id)
    }
}

/// Convenience accessors for element nodes.
impl ArenaDom {
    /// Local name, without any prefix.
    pub fn element_name(&self, id: ArenaNodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    pub fn element_qual_name(&self, id: ArenaNodeId) -> Option<&QualName> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(name),
            _ => None,
        })
    }

    pub fn element_namespace(&self, id: ArenaNodeId) -> Option<&Namespace> {
        self.element_qual_name(id).map(|name| &name.ns)
    }

    /// Attribute value by local name; a prefixed attribute such as `l:href`
    /// answers to `href`.
    pub fn get_attr(&self, id: ArenaNodeId, attr_name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name.local.as_ref() == attr_name)
            .map(|a| a.value.as_str())
    }

    pub fn attributes(&self, id: ArenaNodeId) -> &[Attribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                ArenaNodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn element_id(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: ArenaNodeId) -> &[String] {
        self.get(id)
            .and_then(|n| match &n.data {
                ArenaNodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn is_element(&self, id: ArenaNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, ArenaNodeData::Element { .. }))
    }

    pub fn is_text(&self, id: ArenaNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, ArenaNodeData::Text(_)))
    }

    /// Content of a text node.
    pub fn text_content(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of every text node below `id` (or `id` itself).
    pub fn deep_text(&self, id: ArenaNodeId) -> String {
        if let Some(text) = self.text_content(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.text_content(d))
            .collect()
    }
}
