/*
 * content.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The three shapes a node's body can take.

use crate::node::Node;
use std::collections::HashMap;

/// Body of a node.
#[derive(Debug, Clone)]
pub enum Content {
    /// Self-closing element; renders no body.
    Empty,

    /// Opaque markup with no directive-bearing children.
    Plain(String),

    /// Literal markup interleaved with child nodes.
    Rich(RichContent),
}

/// One entry of a [`RichContent`] sequence.
#[derive(Debug, Clone)]
pub enum Fragment {
    Text(String),
    Node(Node),
}

/// Interleaved sequence `[text, node, text, node, …, text]`.
///
/// The sequence always starts and ends with a text fragment and never holds
/// two adjacent nodes or two adjacent texts. `index` maps each child name
/// to its position in `fragments`.
#[derive(Debug, Clone)]
pub struct RichContent {
    fragments: Vec<Fragment>,
    index: HashMap<String, usize>,
}

impl Default for RichContent {
    fn default() -> Self {
        Self::new()
    }
}

impl RichContent {
    pub fn new() -> Self {
        Self {
            fragments: vec![Fragment::Text(String::new())],
            index: HashMap::new(),
        }
    }

    /// Append literal markup, merging with the trailing text fragment.
    pub(crate) fn push_text(&mut self, text: &str) {
        match self.fragments.last_mut() {
            Some(Fragment::Text(last)) => last.push_str(text),
            _ => self.fragments.push(Fragment::Text(text.to_string())),
        }
    }

    /// Append a child node followed by an empty text fragment.
    ///
    /// The caller guarantees the name is not yet present.
    pub(crate) fn push_node(&mut self, node: Node) {
        self.index.insert(node.name().to_string(), self.fragments.len());
        self.fragments.push(Fragment::Node(node));
        self.fragments.push(Fragment::Text(String::new()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        let i = *self.index.get(name)?;
        match &self.fragments[i] {
            Fragment::Node(node) => Some(node),
            Fragment::Text(_) => None,
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        let i = *self.index.get(name)?;
        match &mut self.fragments[i] {
            Fragment::Node(node) => Some(node),
            Fragment::Text(_) => None,
        }
    }

    /// Replace the node at `name`'s slot, returning the previous occupant.
    pub(crate) fn replace(&mut self, name: &str, node: Node) -> Option<Node> {
        let i = *self.index.get(name)?;
        match std::mem::replace(&mut self.fragments[i], Fragment::Node(node)) {
            Fragment::Node(old) => Some(old),
            Fragment::Text(_) => None,
        }
    }

    /// Child nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Node(node) => Some(node),
            Fragment::Text(_) => None,
        })
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.fragments.iter_mut().filter_map(|f| match f {
            Fragment::Node(node) => Some(node),
            Fragment::Text(_) => None,
        })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Number of fragments; a rich body with no children has length one.
    pub(crate) fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Take the single text fragment of a childless body.
    pub(crate) fn into_text(mut self) -> Option<String> {
        match (self.fragments.len(), self.fragments.pop()) {
            (1, Some(Fragment::Text(text))) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn render_into(&self, out: &mut String) {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::Node(node) => node.render_into(out),
            }
        }
    }
}

impl Content {
    /// Render the body without any wrapping tag.
    pub(crate) fn render_into(&self, out: &mut String) {
        match self {
            Content::Empty => {}
            Content::Plain(text) => out.push_str(text),
            Content::Rich(rich) => rich.render_into(out),
        }
    }
}
