/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! HTML templates as mutable node trees.
//!
//! Markup is compiled into a tree of template nodes marked by a directive
//! attribute (`node` by default). There is no template language: the
//! calling code fills the tree in, repeats parts of it and renders it back
//! to markup.
//!
//! Directives have the form `[-]kind:name`:
//!
//! - `con:name`: a container, rendered zero or one time
//! - `rep:name`: a repeater, rendered once per added instance
//! - `sep:name`: the separator placed between instances of `rep:name`
//! - `del:`: mock-up content removed at compile time
//!
//! A leading `-` drops the element's own tags and keeps its content.
//!
//! # Example
//!
//! ```rust
//! use quarto_htmltemplate::Template;
//!
//! let template = Template::compile(
//!     r#"<ul><li node="rep:item"><a node="con:link">X</a></li></ul>"#,
//! )?;
//!
//! let links = [("/a", "A"), ("/b", "B")];
//! let html = template.render_with(|root| {
//!     root.child_mut("item")?.repeat(links, |item, (href, label)| {
//!         let link = item.child_mut("link")?;
//!         link.atts_mut().set("href", href)?;
//!         link.set_text(label)
//!     })
//! })?;
//!
//! assert_eq!(
//!     html,
//!     "<ul><li><a href=\"/a\">A</a></li>\n<li><a href=\"/b\">B</a></li></ul>"
//! );
//! # Ok::<(), quarto_htmltemplate::TemplateError>(())
//! ```
//!
//! # Copies
//!
//! A compiled [`Template`] is never modified. [`Template::copy`] returns an
//! owned [`Node`] that shares nothing with the original, and cloning any
//! node does the same for its subtree. [`Node::set_child`] grafts a copy of
//! its argument, so the caller's value and the grafted node are independent
//! afterwards.

pub mod attributes;
pub mod content;
pub mod error;
pub mod node;
pub mod options;
pub mod parser;
pub mod template;
pub mod tokenizer;

// Re-export main types at crate root
pub use attributes::Attributes;
pub use content::{Content, Fragment, RichContent};
pub use error::{TemplateError, TemplateResult};
pub use node::{Node, NodeKind};
pub use options::{Codec, TemplateOptions, VoidClosing, decode_entities, encode_entities};
pub use parser::TemplateParser;
pub use template::Template;
pub use tokenizer::{MarkupEvent, Tokenizer, tokenize};
