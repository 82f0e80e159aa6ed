/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The compiled template.

use crate::error::TemplateResult;
use crate::node::Node;
use crate::options::TemplateOptions;
use crate::parser;

/// A compiled template.
///
/// The compiled tree is read-only: it is only exposed through shared
/// references. To fill in a template, take a [`Template::copy`] (or use
/// [`Template::render_with`]) and mutate the copy. Copies of copies are
/// fine too, which allows partially filling a template once and finishing
/// it many times.
#[derive(Debug)]
pub struct Template {
    root: Node,
    options: TemplateOptions,
}

impl Template {
    /// Compile markup with the default options.
    pub fn compile(source: &str) -> TemplateResult<Self> {
        Self::compile_with_options(source, TemplateOptions::default())
    }

    /// Compile markup with explicit options.
    pub fn compile_with_options(source: &str, options: TemplateOptions) -> TemplateResult<Self> {
        let root = parser::parse(source, &options)?;
        Ok(Self { root, options })
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// The compiled root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Shortcut for `self.root().child(name)`.
    pub fn child(&self, name: &str) -> TemplateResult<&Node> {
        self.root.child(name)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.root.children()
    }

    /// An independent, mutable copy of the root.
    pub fn copy(&self) -> Node {
        self.root.clone()
    }

    /// Render the template unchanged.
    pub fn render(&self) -> String {
        self.root.render()
    }

    /// Copy the template, let `f` fill in the copy, and render it.
    ///
    /// ```rust
    /// use quarto_htmltemplate::Template;
    ///
    /// let template = Template::compile(r#"<h1 node="con:title">TITLE</h1>"#)?;
    /// let html = template.render_with(|node| node.child_mut("title")?.set_text("Hello"))?;
    /// assert_eq!(html, "<h1>Hello</h1>");
    /// # Ok::<(), quarto_htmltemplate::TemplateError>(())
    /// ```
    pub fn render_with<F>(&self, f: F) -> TemplateResult<String>
    where
        F: FnOnce(&mut Node) -> TemplateResult<()>,
    {
        let mut node = self.copy();
        f(&mut node)?;
        Ok(node.render())
    }

    /// Diagnostic dump of the node tree. See [`Node::structure`].
    pub fn structure(&self) -> String {
        self.root.structure()
    }
}
