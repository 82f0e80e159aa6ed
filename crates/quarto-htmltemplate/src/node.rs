/*
 * node.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template node object model.
//!
//! A [`Node`] is either the template root, a container (renders once) or a
//! repeater (renders once per [`Node::add`] call). Nodes own their children
//! outright: cloning a node deep-copies its attributes and subtree, so a
//! clone never shares mutable state with its origin.
//!
//! The compiled tree inside a [`Template`](crate::Template) is only ever
//! handed out by shared reference. All mutation happens on an owned copy
//! obtained with [`Template::copy`](crate::Template::copy) or
//! [`Clone::clone`].

use crate::attributes::Attributes;
use crate::content::{Content, RichContent};
use crate::error::{TemplateError, TemplateResult};
use crate::options::{Codec, TemplateOptions, VoidClosing};
use std::fmt;

/// Names a directive may not use: Rust keywords plus the public members of
/// [`Node`].
pub const RESERVED_NAMES: &[&str] = &[
    // keywords
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
    // node members
    "add", "atts", "atts_mut", "child", "child_mut", "children", "children_mut", "clone",
    "content", "has_child", "html", "is_empty_element", "is_omitted", "kind", "name", "omit",
    "omit_tags", "render", "repeat", "separator", "set_child", "set_html", "set_separator",
    "set_text", "structure", "tag", "tags_omitted", "text",
];

/// Structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The compiled root; has no tag of its own.
    Template,
    /// Renders zero or one time.
    Container,
    /// Renders once per accumulated instance.
    Repeater,
}

impl NodeKind {
    /// Short directive form (`tem`, `con`, `rep`).
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Template => "tem",
            NodeKind::Container => "con",
            NodeKind::Repeater => "rep",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum Role {
    Template,
    Container,
    Repeater(Repetition),
}

/// Repeater state: the separator and the instances rendered so far.
///
/// `rendered` alternates `[separator, instance, separator, instance, …]`;
/// the leading separator is dropped on render.
#[derive(Debug, Clone)]
struct Repetition {
    separator: String,
    rendered: Vec<String>,
}

impl Repetition {
    fn new() -> Self {
        Self {
            separator: "\n".to_string(),
            rendered: Vec::new(),
        }
    }
}

/// A node of a compiled template.
#[derive(Debug, Clone)]
pub struct Node {
    role: Role,
    name: String,
    tag: String,
    atts: Attributes,
    content: Content,
    omit_tags: bool,
    omitted: bool,
    void_closing: VoidClosing,
    codec: Codec,
}

impl Node {
    pub(crate) fn template(content: RichContent, options: &TemplateOptions) -> Self {
        Self {
            role: Role::Template,
            name: String::new(),
            tag: String::new(),
            atts: Attributes::new(options.codec),
            content: Content::Rich(content),
            omit_tags: true,
            omitted: false,
            void_closing: options.void_closing,
            codec: options.codec,
        }
    }

    pub(crate) fn container(
        name: String,
        tag: String,
        atts: Attributes,
        content: Content,
        options: &TemplateOptions,
    ) -> Self {
        Self {
            role: Role::Container,
            name,
            tag,
            atts,
            content,
            omit_tags: false,
            omitted: false,
            void_closing: options.void_closing,
            codec: options.codec,
        }
    }

    pub(crate) fn repeater(
        name: String,
        tag: String,
        atts: Attributes,
        content: Content,
        options: &TemplateOptions,
    ) -> Self {
        Self {
            role: Role::Repeater(Repetition::new()),
            ..Self::container(name, tag, atts, content, options)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        match self.role {
            Role::Template => NodeKind::Template,
            Role::Container => NodeKind::Container,
            Role::Repeater(_) => NodeKind::Repeater,
        }
    }

    /// Tag name of the element; empty for the template root.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn atts(&self) -> &Attributes {
        &self.atts
    }

    pub fn atts_mut(&mut self) -> &mut Attributes {
        &mut self.atts
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Whether the node was compiled from a self-closing tag.
    pub fn is_empty_element(&self) -> bool {
        matches!(self.content, Content::Empty)
    }

    // ---------------------------------------------------------------
    // Content
    // ---------------------------------------------------------------

    /// Body as raw markup.
    ///
    /// For a node with child nodes this is the rendered body.
    pub fn html(&self) -> String {
        match &self.content {
            Content::Empty => String::new(),
            Content::Plain(text) => text.clone(),
            Content::Rich(rich) => {
                let mut out = String::new();
                rich.render_into(&mut out);
                out
            }
        }
    }

    /// Body with entities decoded.
    pub fn text(&self) -> String {
        self.codec.decode(&self.html())
    }

    /// Replace the body with raw markup, discarding any child nodes.
    pub fn set_html(&mut self, html: impl Into<String>) -> TemplateResult<()> {
        if self.is_empty_element() {
            return Err(TemplateError::EmptyElement {
                name: self.name.clone(),
            });
        }
        self.content = Content::Plain(html.into());
        Ok(())
    }

    /// Replace the body with entity-encoded text, discarding any child nodes.
    pub fn set_text(&mut self, text: &str) -> TemplateResult<()> {
        let encoded = self.codec.encode(text);
        self.set_html(encoded)
    }

    // ---------------------------------------------------------------
    // Children
    // ---------------------------------------------------------------

    fn rich(&self) -> Option<&RichContent> {
        match &self.content {
            Content::Rich(rich) => Some(rich),
            _ => None,
        }
    }

    fn rich_mut(&mut self) -> Option<&mut RichContent> {
        match &mut self.content {
            Content::Rich(rich) => Some(rich),
            _ => None,
        }
    }

    /// Immediate child nodes in document order.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.rich().into_iter().flat_map(|rich| rich.nodes())
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.rich_mut().into_iter().flat_map(|rich| rich.nodes_mut())
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.rich().is_some_and(|rich| rich.contains(name))
    }

    /// Look up an immediate child by name.
    pub fn child(&self, name: &str) -> TemplateResult<&Node> {
        self.rich()
            .and_then(|rich| rich.get(name))
            .ok_or_else(|| TemplateError::UnknownChild {
                name: name.to_string(),
            })
    }

    pub fn child_mut(&mut self, name: &str) -> TemplateResult<&mut Node> {
        self.rich_mut()
            .and_then(|rich| rich.get_mut(name))
            .ok_or_else(|| TemplateError::UnknownChild {
                name: name.to_string(),
            })
    }

    /// Graft a copy of `node` into the child slot `name`.
    ///
    /// The node is cloned and renamed to `name` before installation. The
    /// caller's `node` and the grafted copy are independent afterwards:
    /// further changes to `node` do not reach this tree. Fetch the slot again
    /// with [`Node::child_mut`] to keep editing the grafted copy.
    ///
    /// A template root may be grafted too; it renders as its bare content.
    pub fn set_child(&mut self, name: &str, node: &Node) -> TemplateResult<()> {
        let unknown = || TemplateError::UnknownChild {
            name: name.to_string(),
        };
        let rich = self.rich_mut().ok_or_else(unknown)?;
        let mut graft = node.clone();
        graft.name = name.to_string();
        rich.replace(name, graft).map(|_| ()).ok_or_else(unknown)
    }

    // ---------------------------------------------------------------
    // Omission
    // ---------------------------------------------------------------

    /// Render nothing for this node.
    pub fn omit(&mut self) {
        self.omitted = true;
    }

    /// Render this node's content without its own tags.
    pub fn omit_tags(&mut self) {
        self.omit_tags = true;
    }

    pub fn is_omitted(&self) -> bool {
        self.omitted
    }

    pub fn tags_omitted(&self) -> bool {
        self.omit_tags
    }

    // ---------------------------------------------------------------
    // Repeaters
    // ---------------------------------------------------------------

    fn repetition(&self) -> TemplateResult<&Repetition> {
        match &self.role {
            Role::Repeater(rep) => Ok(rep),
            _ => Err(TemplateError::NotARepeater {
                name: self.name.clone(),
            }),
        }
    }

    fn repetition_mut(&mut self) -> TemplateResult<&mut Repetition> {
        match &mut self.role {
            Role::Repeater(rep) => Ok(rep),
            _ => Err(TemplateError::NotARepeater {
                name: self.name.clone(),
            }),
        }
    }

    /// Markup inserted between instances. Defaults to `"\n"`.
    pub fn separator(&self) -> TemplateResult<&str> {
        self.repetition().map(|rep| rep.separator.as_str())
    }

    pub fn set_separator(&mut self, separator: impl Into<String>) -> TemplateResult<()> {
        self.repetition_mut()?.separator = separator.into();
        Ok(())
    }

    /// A fresh copy of this repeater that does not carry its rendered
    /// instances.
    fn instance(&self) -> TemplateResult<Node> {
        let rep = self.repetition()?;
        Ok(Node {
            role: Role::Repeater(Repetition {
                separator: rep.separator.clone(),
                rendered: Vec::new(),
            }),
            name: self.name.clone(),
            tag: self.tag.clone(),
            atts: self.atts.clone(),
            content: self.content.clone(),
            omit_tags: self.omit_tags,
            omitted: self.omitted,
            void_closing: self.void_closing,
            codec: self.codec,
        })
    }

    /// Render one more instance of this repeater.
    ///
    /// `f` receives a fresh copy of the repeater to fill in. Unless `f`
    /// omits the copy, its rendering is appended after the separator.
    pub fn add<F>(&mut self, f: F) -> TemplateResult<()>
    where
        F: FnOnce(&mut Node) -> TemplateResult<()>,
    {
        let mut instance = self.instance()?;
        f(&mut instance)?;
        if instance.omitted {
            tracing::trace!(repeater = %self.name, "Instance omitted");
            return Ok(());
        }
        let mut rendered = String::new();
        instance.render_element_into(&mut rendered);

        let rep = self.repetition_mut()?;
        rep.rendered.push(rep.separator.clone());
        rep.rendered.push(rendered);
        let count = rep.rendered.len() / 2;
        tracing::trace!(repeater = %self.name, count, "Instance added");
        Ok(())
    }

    /// Call [`Node::add`] once per item, in order.
    pub fn repeat<I, F>(&mut self, items: I, mut f: F) -> TemplateResult<()>
    where
        I: IntoIterator,
        F: FnMut(&mut Node, I::Item) -> TemplateResult<()>,
    {
        for item in items {
            self.add(|node| f(node, item))?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------

    /// Render this node to markup.
    ///
    /// A repeater renders its accumulated instances; a compiled repeater
    /// that was never filled renders nothing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub(crate) fn render_into(&self, out: &mut String) {
        if self.omitted {
            return;
        }
        match &self.role {
            Role::Template => self.content.render_into(out),
            Role::Container => self.render_element_into(out),
            Role::Repeater(rep) => {
                for chunk in rep.rendered.iter().skip(1) {
                    out.push_str(chunk);
                }
            }
        }
    }

    /// Render the element itself: tags (unless omitted) around the content.
    pub(crate) fn render_element_into(&self, out: &mut String) {
        if self.omit_tags {
            self.content.render_into(out);
            return;
        }
        out.push('<');
        out.push_str(&self.tag);
        self.atts.render_into(out);
        match &self.content {
            Content::Empty => out.push_str(self.void_closing.terminator()),
            content => {
                out.push('>');
                content.render_into(out);
                out.push_str("</");
                out.push_str(&self.tag);
                out.push('>');
            }
        }
    }

    /// Diagnostic dump of the node tree: one `kind:name` line per node,
    /// indented with one tab per nesting level.
    pub fn structure(&self) -> String {
        let mut lines = Vec::new();
        self.collect_structure(0, &mut lines);
        lines.join("\n")
    }

    fn collect_structure(&self, depth: usize, lines: &mut Vec<String>) {
        lines.push(format!("{}{}:{}", "\t".repeat(depth), self.kind(), self.name));
        for child in self.children() {
            child.collect_structure(depth + 1, lines);
        }
    }
}
