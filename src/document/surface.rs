use log::{debug, warn};

use super::{
    markup::{MarkupTree, NodeId},
    selector::Selector,
    DocumentSnapshot, DocumentSurface,
};

const MAX_UNDO_STEPS: usize = 100;

/// Caret position inside a text-bearing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

/// In-memory editable surface over a [`MarkupTree`]. Highlight markers are
/// kept beside the tree, so they show up in [`rendered_markup`] but never in
/// snapshots.
///
/// [`rendered_markup`]: MarkupSurface::rendered_markup
#[derive(Debug, Default)]
pub struct MarkupSurface {
    tree: MarkupTree,
    editable: bool,
    revision: u64,
    undo_stack: Vec<MarkupTree>,
    redo_stack: Vec<MarkupTree>,
    markers: Vec<(NodeId, String)>,
    caret: Option<Caret>,
}

impl MarkupSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &MarkupTree {
        &self.tree
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Elements matching `selector`; an unparseable selector matches nothing.
    pub fn query(&self, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(selector) => selector.select(&self.tree),
            Err(err) => {
                warn!("Ignoring selector '{selector}': {err}");
                Vec::new()
            }
        }
    }

    pub fn text_of(&self, node: NodeId) -> String {
        self.tree.text_content(node)
    }

    pub fn focus(&mut self, node: NodeId, offset: usize) -> bool {
        if !self.tree.is_attached(node) || self.tree.element(node).is_none() {
            return false;
        }
        self.caret = Some(Caret { node, offset });
        true
    }

    pub fn caret(&self) -> Option<Caret> {
        self.caret
    }

    /// Replace the text of an element, as typing into it would.
    pub fn replace_text(&mut self, node: NodeId, text: &str) -> bool {
        if !self.can_edit(node) {
            return false;
        }
        self.checkpoint();
        let changed = self.tree.replace_children_with_text(node, text);
        self.revision += 1;
        if let Some(caret) = self.caret.as_mut().filter(|caret| caret.node == node) {
            caret.offset = text.chars().count();
        }
        changed
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: Option<&str>) -> bool {
        if !self.can_edit(node) {
            return false;
        }
        self.checkpoint();
        if let Some(element) = self.tree.element_mut(node) {
            element.set_attr(&name.to_ascii_lowercase(), value.map(str::to_string));
        }
        self.revision += 1;
        true
    }

    /// Attached nodes currently carrying a marker, with their class.
    pub fn markers(&self) -> Vec<(NodeId, &str)> {
        self.markers
            .iter()
            .filter(|(node, _)| self.tree.is_attached(*node))
            .map(|(node, class)| (*node, class.as_str()))
            .collect()
    }

    /// Markup as displayed, with marker classes applied.
    pub fn rendered_markup(&self) -> String {
        if self.markers.is_empty() {
            return self.tree.serialize();
        }
        let mut rendered = self.tree.clone();
        for (node, class) in &self.markers {
            if let Some(element) = rendered.element_mut(*node) {
                let classes = match element.attr("class") {
                    Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
                    _ => class.clone(),
                };
                element.set_attr("class", Some(classes));
            }
        }
        rendered.serialize()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn can_edit(&self, node: NodeId) -> bool {
        self.editable && self.tree.is_attached(node) && self.tree.element(node).is_some()
    }

    fn checkpoint(&mut self) {
        self.undo_stack.push(self.tree.clone());
        if self.undo_stack.len() > MAX_UNDO_STEPS {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    fn restore(&mut self, tree: MarkupTree) {
        self.tree = tree;
        self.revision += 1;
        if let Some(caret) = self.caret {
            if !self.tree.is_attached(caret.node) {
                self.caret = None;
            }
        }
    }
}

impl DocumentSurface for MarkupSurface {
    fn load(&mut self, markup: &str) {
        let outcome = MarkupTree::parse(markup);
        if outcome.recovered > 0 {
            warn!(
                "Loaded markup with {} recovered structural errors",
                outcome.recovered
            );
        }
        self.tree = outcome.tree;
        self.editable = true;
        self.revision += 1;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.markers.clear();
        self.caret = None;
        debug!(
            "Surface loaded {} elements (revision {})",
            self.tree.elements().len(),
            self.revision
        );
    }

    fn capture_snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::new(self.tree.serialize(), self.revision)
    }

    fn highlight(&mut self, selector: &str, class: &str) -> usize {
        let matched = self.query(selector);
        for node in &matched {
            self.markers.push((*node, class.to_string()));
        }
        matched.len()
    }

    fn clear_highlights(&mut self) {
        self.markers.clear();
    }

    fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.tree, MarkupTree::default());
        self.redo_stack.push(current);
        self.restore(previous);
        true
    }

    fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.tree, MarkupTree::default());
        self.undo_stack.push(current);
        self.restore(next);
        true
    }
}
