//! Arena-based DOM for the reading surface.
//!
//! The parsed document lives in a contiguous vector of nodes linked by
//! indices. Besides the tree-building primitives html5ever needs, the arena
//! supports the handful of live mutations the reader performs: wrapping text
//! in highlight marks, unwrapping them again, splitting and merging text
//! nodes, and patching attributes.
//!
//! Every structural or attribute mutation bumps [`ArenaDom::generation`], so
//! derived data (layout, heading indexes) can tell when it is stale.

use std::collections::HashMap;

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaNodeId(pub u32);

impl ArenaNodeId {
    /// Sentinel value for no node.
    pub const NONE: ArenaNodeId = ArenaNodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }

    fn into_option(self) -> Option<ArenaNodeId> {
        if self.is_some() { Some(self) } else { None }
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum ArenaNodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-extracted id for fast matching.
        id: Option<String>,
        /// Pre-extracted classes for fast matching.
        classes: Vec<String>,
    },
    /// Text content.
    Text(String),
    /// Comment (kept so child indices match the source document).
    Comment(String),
    /// Document type declaration.
    Doctype { name: String },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node in the arena DOM.
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

/// Record of one text node folded into a preceding sibling by
/// [`ArenaDom::normalize`]: character `n` of `from` now lives at
/// `shift + n` inside `into`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMerge {
    pub from: ArenaNodeId,
    pub into: ArenaNodeId,
    pub shift: usize,
}

/// Arena-based DOM tree.
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
    document: ArenaNodeId,
    /// Map from id attribute to node ID for fast lookup.
    id_map: HashMap<String, ArenaNodeId>,
    generation: u64,
}

impl ArenaDom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: ArenaNodeId::NONE,
            id_map: HashMap::new(),
            generation: 0,
        };
        dom.document = dom.alloc(ArenaNode::new(ArenaNodeData::Document));
        dom
    }

    fn alloc(&mut self, node: ArenaNode) -> ArenaNodeId {
        let id = ArenaNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Get the document root ID.
    pub fn document(&self) -> ArenaNodeId {
        self.document
    }

    /// Mutation counter, bumped by every tree or attribute change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Get a node by ID.
    pub fn get(&self, id: ArenaNodeId) -> Option<&ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: ArenaNodeId) -> Option<&mut ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> ArenaNodeId {
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            if attr.name.local.as_ref() == "id" {
                id = Some(attr.value.clone());
            } else if attr.name.local.as_ref() == "class" {
                classes = split_classes(&attr.value);
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

    /// Create an HTML element from a tag name and attribute pairs.
    pub fn create_html_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> ArenaNodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: html_qname(name),
                value: (*value).to_string(),
            })
            .collect();
        let qname = QualName::new(None, ns!(html), LocalName::from(tag));
        self.create_element(qname, attrs)
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Text(text)))
    }

    /// Create a new comment node.
    pub fn create_comment(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Comment(text)))
    }

    /// Create a doctype node.
    pub fn create_doctype(&mut self, name: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Doctype { name }))
    }

    /// Append a child to a parent node.
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
        self.touch();
    }

    /// Insert a node before a sibling.
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
        self.touch();
    }

    /// Insert a node after a sibling.
    pub fn insert_after(&mut self, sibling: ArenaNodeId, new_node: ArenaNodeId) {
        let (parent, next) = match self.get(sibling) {
            Some(n) => (n.parent, n.next_sibling),
            None => return,
        };
        if next.is_some() {
            self.insert_before(next, new_node);
        } else if parent.is_some() {
            self.append(parent, new_node);
        }
    }

    /// Remove a node from its parent, keeping its own subtree intact.
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
        self.touch();
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: ArenaNodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let ArenaNodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            self.touch();
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Get element by id attribute. Only attached elements still carrying the
    /// id are returned.
    pub fn get_by_id(&self, id: &str) -> Option<ArenaNodeId> {
        let found = self.id_map.get(id).copied()?;
        if self.element_id(found) == Some(id) && self.is_attached(found) {
            return Some(found);
        }
        // Stale entry: fall back to a scan.
        self.descendants(self.document)
            .find(|&n| self.element_id(n) == Some(id))
    }

    /// Get the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the DOM is empty (only has document root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node.
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

    /// Iterate over the strict descendants of `root` in document order.
    pub fn descendants(&self, root: ArenaNodeId) -> Descendants<'_> {
        let first = self
            .get(root)
            .map(|n| n.first_child)
            .unwrap_or(ArenaNodeId::NONE);
        Descendants {
            dom: self,
            root,
            next: first,
        }
    }

    /// Next node after `id` in document order, staying inside `root`.
    pub fn next_in_order(&self, id: ArenaNodeId, root: ArenaNodeId) -> Option<ArenaNodeId> {
        let node = self.get(id)?;
        if node.first_child.is_some() {
            return Some(node.first_child);
        }
        self.next_skipping_children(id, root)
    }

    /// Next node after the subtree of `id` in document order, staying inside `root`.
    pub fn next_skipping_children(
        &self,
        id: ArenaNodeId,
        root: ArenaNodeId,
    ) -> Option<ArenaNodeId> {
        let mut current = id;
        while current != root {
            let node = self.get(current)?;
            if node.next_sibling.is_some() {
                return Some(node.next_sibling);
            }
            current = node.parent;
            if current.is_none() {
                return None;
            }
        }
        None
    }

    /// Find the first node matching a predicate (DFS from the document).
    pub fn find<F>(&self, predicate: F) -> Option<ArenaNodeId>
    where
        F: Fn(&ArenaNode) -> bool,
    {
        let document = self.document;
        if self.get(document).is_some_and(&predicate) {
            return Some(document);
        }
        self.descendants(document)
            .find(|&id| self.get(id).is_some_and(&predicate))
    }

    /// Find element by tag name (first match).
    pub fn find_by_tag(&self, tag: &str) -> Option<ArenaNodeId> {
        self.find(|node| {
            if let ArenaNodeData::Element { name, .. } = &node.data {
                name.local.as_ref() == tag
            } else {
                false
            }
        })
    }

    /// All elements under `root` (inclusive) with the given tag, in document order.
    pub fn elements_by_tag(&self, root: ArenaNodeId, tags: &[&str]) -> Vec<ArenaNodeId> {
        std::iter::once(root)
            .chain(self.descendants(root))
            .filter(|&id| {
                self.element_name(id)
                    .is_some_and(|n| tags.iter().any(|t| n.as_ref() == *t))
            })
            .collect()
    }
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
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

/// Pre-order iterator over the descendants of a node.
pub struct Descendants<'a> {
    dom: &'a ArenaDom,
    root: ArenaNodeId,
    next: ArenaNodeId,
}

impl Iterator for Descendants<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_none() {
            return None;
        }
        let id = self.next;
        self.next = self
            .dom
            .next_in_order(id, self.root)
            .unwrap_or(ArenaNodeId::NONE);
        Some(id)
    }
}

/// Tree relationships.
impl ArenaDom {
    /// Parent of a node, if attached.
    pub fn parent(&self, id: ArenaNodeId) -> Option<ArenaNodeId> {
        self.get(id).and_then(|n| n.parent.into_option())
    }

    /// The `index`-th child of `parent`.
    pub fn child_at(&self, parent: ArenaNodeId, index: usize) -> Option<ArenaNodeId> {
        self.children(parent).nth(index)
    }

    /// Position of a node among its parent's children.
    pub fn child_index(&self, id: ArenaNodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|c| c == id)
    }

    /// Number of children.
    pub fn child_count(&self, id: ArenaNodeId) -> usize {
        self.children(id).count()
    }

    /// True when `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: ArenaNodeId, node: ArenaNodeId) -> bool {
        let mut current = node;
        while current.is_some() {
            if current == ancestor {
                return true;
            }
            current = self.get(current).map_or(ArenaNodeId::NONE, |n| n.parent);
        }
        false
    }

    /// True when the node is still reachable from the document root.
    pub fn is_attached(&self, id: ArenaNodeId) -> bool {
        self.contains(self.document, id)
    }

    /// Nearest inclusive ancestor element matching `predicate`.
    pub fn closest<F>(&self, id: ArenaNodeId, predicate: F) -> Option<ArenaNodeId>
    where
        F: Fn(&ArenaDom, ArenaNodeId) -> bool,
    {
        let mut current = id;
        while current.is_some() {
            if self.is_element(current) && predicate(self, current) {
                return Some(current);
            }
            current = self.get(current)?.parent;
        }
        None
    }

    /// Nearest inclusive ancestor element with the given tag.
    pub fn closest_tag(&self, id: ArenaNodeId, tag: &str) -> Option<ArenaNodeId> {
        self.closest(id, |dom, n| dom.element_name(n).is_some_and(|name| name.as_ref() == tag))
    }

    /// Text nodes under `root` (inclusive) in document order.
    pub fn text_nodes(&self, root: ArenaNodeId) -> Vec<ArenaNodeId> {
        std::iter::once(root)
            .chain(self.descendants(root))
            .filter(|&id| self.is_text(id))
            .collect()
    }
}

/// Convenience methods for element and text nodes.
impl ArenaDom {
    /// Get element's local name (tag).
    pub fn element_name(&self, id: ArenaNodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// True when the node is an element with the given tag.
    pub fn is_tag(&self, id: ArenaNodeId, tag: &str) -> bool {
        self.element_name(id).is_some_and(|n| n.as_ref() == tag)
    }

    /// Get element's namespace.
    pub fn element_namespace(&self, id: ArenaNodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    /// Get an attribute value.
    pub fn get_attr(&self, id: ArenaNodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Set (or replace) an attribute value.
    pub fn set_attr(&mut self, id: ArenaNodeId, attr_name: &str, value: &str) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        let ArenaNodeData::Element {
            attrs,
            id: elem_id,
            classes,
            ..
        } = &mut node.data
        else {
            return;
        };
        match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr_name) {
            Some(attr) => attr.value = value.to_string(),
            None => attrs.push(Attribute {
                name: html_qname(attr_name),
                value: value.to_string(),
            }),
        }
        match attr_name {
            "id" => *elem_id = Some(value.to_string()),
            "class" => *classes = split_classes(value),
            _ => {}
        }
        if attr_name == "id" {
            self.id_map.insert(value.to_string(), id);
        }
        self.touch();
    }

    /// Remove an attribute.
    pub fn remove_attr(&mut self, id: ArenaNodeId, attr_name: &str) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        if let ArenaNodeData::Element {
            attrs,
            id: elem_id,
            classes,
            ..
        } = &mut node.data
        {
            attrs.retain(|a| a.name.local.as_ref() != attr_name);
            match attr_name {
                "id" => *elem_id = None,
                "class" => classes.clear(),
                _ => {}
            }
            self.touch();
        }
    }

    /// Get element's id attribute.
    pub fn element_id(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    /// Get element's classes.
    pub fn element_classes(&self, id: ArenaNodeId) -> &[String] {
        static EMPTY: &[String] = &[];
        self.get(id)
            .and_then(|n| match &n.data {
                ArenaNodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(EMPTY)
    }

    /// Check for a class on an element.
    pub fn has_class(&self, id: ArenaNodeId, class: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class)
    }

    /// Add a class to an element if missing.
    pub fn add_class(&mut self, id: ArenaNodeId, class: &str) {
        if !self.is_element(id) || self.has_class(id, class) {
            return;
        }
        let mut value = self.get_attr(id, "class").unwrap_or_default().to_string();
        if !value.is_empty() {
            value.push(' ');
        }
        value.push_str(class);
        self.set_attr(id, "class", &value);
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: ArenaNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, ArenaNodeData::Element { .. }))
    }

    /// Check if node is a text node.
    pub fn is_text(&self, id: ArenaNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, ArenaNodeData::Text(_)))
    }

    /// Get text content of a text node.
    pub fn text_content(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Length of a text node in characters (zero for other nodes).
    pub fn text_len(&self, id: ArenaNodeId) -> usize {
        self.text_content(id).map_or(0, |s| s.chars().count())
    }

    /// Concatenated text of every text node beneath `id`.
    pub fn deep_text(&self, id: ArenaNodeId) -> String {
        let mut out = String::new();
        for node in self.text_nodes(id) {
            if let Some(t) = self.text_content(node) {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace the contents of a text node.
    pub fn set_text(&mut self, id: ArenaNodeId, text: &str) {
        if let Some(node) = self.get_mut(id)
            && let ArenaNodeData::Text(existing) = &mut node.data
        {
            *existing = text.to_string();
            self.touch();
        }
    }
}

/// Live mutations used by the highlight render pass.
impl ArenaDom {
    /// Split a text node at a character offset. The original node keeps the
    /// head; the returned node holds the tail and follows it. Offsets at
    /// either end still split, producing an empty piece.
    pub fn split_text(&mut self, id: ArenaNodeId, offset: usize) -> Option<ArenaNodeId> {
        let text = self.text_content(id)?;
        let at = byte_index(text, offset);
        let tail = text[at..].to_string();
        let head = text[..at].to_string();
        self.set_text(id, &head);
        let tail_node = self.create_text(tail);
        self.insert_after(id, tail_node);
        Some(tail_node)
    }

    /// Move `node` into a freshly created `wrapper` placed where `node` was.
    pub fn wrap(&mut self, node: ArenaNodeId, wrapper: ArenaNodeId) {
        if self.parent(node).is_none() {
            return;
        }
        self.insert_before(node, wrapper);
        self.detach(node);
        self.append(wrapper, node);
    }

    /// Replace an element by its children. Returns the former parent.
    pub fn unwrap_element(&mut self, id: ArenaNodeId) -> Option<ArenaNodeId> {
        let parent = self.parent(id)?;
        let children: Vec<_> = self.children(id).collect();
        for child in children {
            self.detach(child);
            self.insert_before(id, child);
        }
        self.detach(id);
        Some(parent)
    }

    /// Merge adjacent text nodes beneath `root` (inclusive). Returns every
    /// merge performed, in order, so live positions can be remapped.
    pub fn normalize(&mut self, root: ArenaNodeId) -> Vec<TextMerge> {
        let mut merges = Vec::new();
        let mut stack = vec![root];
        while let Some(parent) = stack.pop() {
            let children: Vec<_> = self.children(parent).collect();
            let mut head: Option<ArenaNodeId> = None;
            for child in children {
                if let Some(text) = self.text_content(child) {
                    match head {
                        Some(into) => {
                            let text = text.to_string();
                            let shift = self.text_len(into);
                            if let Some(node) = self.get_mut(into)
                                && let ArenaNodeData::Text(existing) = &mut node.data
                            {
                                existing.push_str(&text);
                            }
                            self.detach(child);
                            merges.push(TextMerge {
                                from: child,
                                into,
                                shift,
                            });
                        }
                        None => head = Some(child),
                    }
                } else {
                    head = None;
                    if self.is_element(child) {
                        stack.push(child);
                    }
                }
            }
        }
        merges
    }
}

/// Build a namespace-less attribute name, as html5ever does for HTML attributes.
fn html_qname(local: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(local))
}

fn split_classes(value: &str) -> Vec<String> {
    value.split_whitespace().map(|s| s.to_string()).collect()
}

/// Byte index of the `offset`-th character, clamped to the string length.
pub fn byte_index(s: &str, offset: usize) -> usize {
    s.char_indices().nth(offset).map_or(s.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(dom: &mut ArenaDom, text: &str) -> (ArenaNodeId, ArenaNodeId) {
        let p = dom.create_html_element("p", &[]);
        dom.append(dom.document(), p);
        dom.append_text(p, text);
        let t = dom.children(p).next().unwrap();
        (p, t)
    }

    #[test]
    fn test_create_elements() {
        let mut dom = ArenaDom::new();
        let div = dom.create_html_element("div", &[("id", "main"), ("class", "a b")]);
        dom.append(dom.document(), div);

        assert_eq!(dom.element_name(div).unwrap().as_ref(), "div");
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.get_by_id("main"), Some(div));
        assert!(dom.has_class(div, "b"));
    }

    #[test]
    fn test_text_merging() {
        let mut dom = ArenaDom::new();
        let (p, _) = paragraph(&mut dom, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text_content(children[0]), Some("Hello, World!"));
    }

    #[test]
    fn test_split_wrap_unwrap_normalize_restores_shape() {
        let mut dom = ArenaDom::new();
        let (p, t) = paragraph(&mut dom, "alpha beta gamma");

        let tail = dom.split_text(t, 6).unwrap();
        let rest = dom.split_text(tail, 4).unwrap();
        assert_eq!(dom.text_content(t), Some("alpha "));
        assert_eq!(dom.text_content(tail), Some("beta"));
        assert_eq!(dom.text_content(rest), Some(" gamma"));

        let span = dom.create_html_element("span", &[("class", "mark")]);
        dom.wrap(tail, span);
        assert_eq!(dom.child_count(p), 3);
        assert_eq!(dom.child_index(span), Some(1));
        assert_eq!(dom.deep_text(p), "alpha beta gamma");

        dom.unwrap_element(span);
        let merges = dom.normalize(p);
        assert_eq!(dom.child_count(p), 1);
        assert_eq!(dom.deep_text(p), "alpha beta gamma");
        assert_eq!(
            merges,
            vec![
                TextMerge { from: tail, into: t, shift: 6 },
                TextMerge { from: rest, into: t, shift: 10 },
            ]
        );
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let mut dom = ArenaDom::new();
        let div = dom.create_html_element("div", &[]);
        let a = dom.create_html_element("p", &[]);
        let b = dom.create_html_element("p", &[]);
        dom.append(dom.document(), div);
        dom.append(div, a);
        dom.append_text(a, "one");
        dom.append(div, b);
        dom.append_text(b, "two");

        let order: Vec<_> = dom.descendants(div).collect();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], a);
        assert_eq!(order[2], b);
        assert_eq!(dom.deep_text(div), "onetwo");
        assert!(dom.contains(div, order[3]));
        assert!(!dom.contains(a, b));
    }

    #[test]
    fn test_set_attr_updates_caches_and_generation() {
        let mut dom = ArenaDom::new();
        let img = dom.create_html_element("img", &[]);
        dom.append(dom.document(), img);
        let before = dom.generation();

        dom.set_attr(img, "id", "cover");
        dom.add_class(img, "inline-image");
        assert_eq!(dom.get_by_id("cover"), Some(img));
        assert!(dom.has_class(img, "inline-image"));
        assert!(dom.generation() > before);

        dom.remove_attr(img, "id");
        assert_eq!(dom.get_by_id("cover"), None);
    }

    #[test]
    fn test_byte_index_handles_multibyte() {
        assert_eq!(byte_index("héllo", 2), 3);
        assert_eq!(byte_index("abc", 10), 3);
    }
}
