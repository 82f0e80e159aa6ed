/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive parser.
//!
//! Consumes the flat [`MarkupEvent`] stream and assembles the node tree.
//! Open directive elements are kept on an explicit stack of [`Frame`]s; the
//! root frame lives outside the stack and is never closed.
//!
//! A directive element is closed by the first end tag that brings its
//! same-tag depth back to zero. Only tags with the frame's own tag name are
//! counted, which is what lets `<div node="con:a"><div>…</div></div>` close
//! on the outer `</div>`.

use crate::attributes::Attributes;
use crate::content::{Content, RichContent};
use crate::error::{TemplateError, TemplateResult};
use crate::node::{Node, NodeKind, RESERVED_NAMES};
use crate::options::TemplateOptions;
use crate::tokenizer::{MarkupEvent, Tokenizer};
use regex::Regex;
use std::sync::LazyLock;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?(con|rep|sep|del):(.*)$").expect("Invalid regex pattern for directives")
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("Invalid regex pattern for identifiers")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Root,
    Container,
    Repeater,
    Separator,
    Delete,
}

impl Directive {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "con" => Some(Directive::Container),
            "rep" => Some(Directive::Repeater),
            "sep" => Some(Directive::Separator),
            "del" => Some(Directive::Delete),
            _ => None,
        }
    }
}

/// An open directive element.
struct Frame {
    directive: Directive,
    /// Directive text as written, e.g. `-con:title`.
    source: String,
    name: String,
    tag: String,
    atts: Attributes,
    self_closing: bool,
    omit_tags: bool,
    /// Open elements with this frame's tag name, itself included.
    depth: usize,
    content: RichContent,
    /// Separators seen in this element, resolved when it closes.
    separators: Vec<(String, String)>,
}

impl Frame {
    fn root(options: &TemplateOptions) -> Self {
        Self {
            directive: Directive::Root,
            source: String::new(),
            name: String::new(),
            tag: String::new(),
            atts: Attributes::new(options.codec),
            self_closing: false,
            omit_tags: true,
            depth: 1,
            content: RichContent::new(),
            separators: Vec::new(),
        }
    }

    /// Install pending separators on the same-named repeaters.
    fn resolve_separators(&mut self) -> TemplateResult<()> {
        for (name, markup) in self.separators.drain(..) {
            match self.content.get_mut(&name) {
                Some(node) if node.kind() == NodeKind::Repeater => node.set_separator(markup)?,
                Some(node) => {
                    return Err(TemplateError::UnresolvedSeparator {
                        name,
                        found: Some(node.kind().to_string()),
                    });
                }
                None => return Err(TemplateError::UnresolvedSeparator { name, found: None }),
            }
        }
        Ok(())
    }

    /// Turn a finished `con`, `rep` or `sep` frame into a node.
    fn into_node(mut self, options: &TemplateOptions) -> TemplateResult<Node> {
        self.resolve_separators()?;
        let content = if self.self_closing {
            Content::Empty
        } else if self.content.len() == 1 {
            Content::Plain(self.content.into_text().unwrap_or_default())
        } else {
            Content::Rich(self.content)
        };
        let mut node = match self.directive {
            Directive::Repeater => Node::repeater(self.name, self.tag, self.atts, content, options),
            _ => Node::container(self.name, self.tag, self.atts, content, options),
        };
        if self.omit_tags {
            node.omit_tags();
        }
        Ok(node)
    }
}

/// Incremental builder of a template tree from markup events.
pub struct TemplateParser<'o> {
    options: &'o TemplateOptions,
    root: Frame,
    stack: Vec<Frame>,
}

impl<'o> TemplateParser<'o> {
    pub fn new(options: &'o TemplateOptions) -> Self {
        Self {
            options,
            root: Frame::root(options),
            stack: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Frame {
        match self.stack.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }

    /// Consume one event.
    pub fn feed(&mut self, event: MarkupEvent) -> TemplateResult<()> {
        match event {
            MarkupEvent::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                self.start_tag(&name, attributes, self_closing)?;
                if self_closing {
                    self.end_tag(&name, true)?;
                }
                Ok(())
            }
            MarkupEvent::EndTag { name } => self.end_tag(&name, false),
            other => {
                if let Some(text) = other.literal() {
                    self.current().content.push_text(&text);
                }
                Ok(())
            }
        }
    }

    /// Finish parsing and return the template root.
    pub fn finish(mut self) -> TemplateResult<Node> {
        if let Some(frame) = self.stack.last() {
            return Err(TemplateError::UnterminatedElement {
                directive: frame.source.clone(),
                tag: frame.tag.clone(),
            });
        }
        self.root.resolve_separators()?;
        let root = Node::template(self.root.content, self.options);
        tracing::debug!(children = root.children().count(), "Template compiled");
        Ok(root)
    }

    fn start_tag(
        &mut self,
        tag: &str,
        mut attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    ) -> TemplateResult<()> {
        let options = self.options;
        let frame = self.current();

        if frame.directive == Directive::Delete {
            if frame.tag == tag {
                frame.depth += 1;
            }
            return Ok(());
        }

        let Some(position) = attributes.iter().position(|(k, _)| *k == options.attribute) else {
            if frame.tag == tag {
                frame.depth += 1;
            }
            let atts = Attributes::from_decoded(attributes, options.codec);
            frame
                .content
                .push_text(&open_tag(tag, &atts, self_closing, options));
            return Ok(());
        };

        let (_, value) = attributes.remove(position);
        let value = value.unwrap_or_default();
        let caps = DIRECTIVE
            .captures(&value)
            .ok_or_else(|| TemplateError::MalformedDirective {
                value: value.clone(),
            })?;
        let omit_tags = caps.get(1).is_some();
        let directive = Directive::from_prefix(&caps[2]).ok_or_else(|| {
            TemplateError::MalformedDirective {
                value: value.clone(),
            }
        })?;
        let name = caps[3].to_string();

        if directive != Directive::Delete
            && (!IDENTIFIER.is_match(&name) || RESERVED_NAMES.contains(&name.as_str()))
        {
            return Err(TemplateError::InvalidName { name });
        }
        if directive != Directive::Separator && frame.content.contains(&name) {
            return Err(TemplateError::DuplicateName { name });
        }

        tracing::debug!(directive = %value, tag, "Opening directive element");
        self.stack.push(Frame {
            directive,
            source: value,
            name,
            tag: tag.to_string(),
            atts: Attributes::from_decoded(attributes, options.codec),
            self_closing,
            omit_tags,
            depth: 1,
            content: RichContent::new(),
            separators: Vec::new(),
        });
        Ok(())
    }

    fn end_tag(&mut self, tag: &str, self_closing: bool) -> TemplateResult<()> {
        let frame = self.current();
        if frame.tag == tag {
            frame.depth -= 1;
            if frame.depth == 0 {
                if let Some(frame) = self.stack.pop() {
                    return self.close(frame);
                }
            }
        }
        if !self_closing {
            self.current().content.push_text(&format!("</{}>", tag));
        }
        Ok(())
    }

    /// Hand a completed frame to its parent.
    fn close(&mut self, frame: Frame) -> TemplateResult<()> {
        tracing::debug!(directive = %frame.source, tag = %frame.tag, "Closing directive element");
        match frame.directive {
            Directive::Delete | Directive::Root => Ok(()),
            Directive::Separator => {
                let name = frame.name.clone();
                let markup = frame.into_node(self.options)?.render();
                self.current().separators.push((name, markup));
                Ok(())
            }
            Directive::Container | Directive::Repeater => {
                let node = frame.into_node(self.options)?;
                self.current().content.push_node(node);
                Ok(())
            }
        }
    }
}

/// Markup for an ordinary start tag.
fn open_tag(tag: &str, atts: &Attributes, self_closing: bool, options: &TemplateOptions) -> String {
    let mut out = String::new();
    out.push('<');
    out.push_str(tag);
    atts.render_into(&mut out);
    if self_closing {
        out.push_str(options.void_closing.terminator());
    } else {
        out.push('>');
    }
    out
}

/// Compile `source` into a template root.
pub fn parse(source: &str, options: &TemplateOptions) -> TemplateResult<Node> {
    let mut parser = TemplateParser::new(options);
    for event in Tokenizer::new(source) {
        parser.feed(event?)?;
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> TemplateResult<Node> {
        parse(source, &TemplateOptions::default())
    }

    #[test]
    fn test_plain_markup_has_no_children() {
        let root = compile("<p>hello <b>world</b></p>").unwrap();
        assert_eq!(root.kind(), NodeKind::Template);
        assert_eq!(root.children().count(), 0);
        assert_eq!(root.render(), "<p>hello <b>world</b></p>");
    }

    #[test]
    fn test_content_shapes() {
        let root = compile(
            r#"<br node="con:empty"/><p node="con:plain">x</p><div node="con:rich"><i node="con:i">y</i></div>"#,
        )
        .unwrap();
        assert!(matches!(
            root.child("empty").unwrap().content(),
            Content::Empty
        ));
        assert!(matches!(
            root.child("plain").unwrap().content(),
            Content::Plain(_)
        ));
        assert!(matches!(
            root.child("rich").unwrap().content(),
            Content::Rich(_)
        ));
    }

    #[test]
    fn test_directive_attribute_stripped() {
        let root = compile(r#"<a href="x" node="con:link" class="c">L</a>"#).unwrap();
        let link = root.child("link").unwrap();
        assert!(!link.atts().contains("node"));
        assert_eq!(link.render(), r#"<a href="x" class="c">L</a>"#);
    }

    #[test]
    fn test_same_tag_nesting() {
        let root = compile(r#"<div node="con:outer"><div>inner</div>tail</div>after"#).unwrap();
        assert_eq!(
            root.child("outer").unwrap().html(),
            "<div>inner</div>tail"
        );
        assert_eq!(root.render(), "<div><div>inner</div>tail</div>after");
    }

    #[test]
    fn test_nested_directive_same_tag() {
        let root = compile(r#"<div node="con:a"><div node="con:b">B</div></div>"#).unwrap();
        assert_eq!(root.structure(), "tem:\n\tcon:a\n\t\tcon:b");
    }

    #[test]
    fn test_omit_tags_modifier() {
        let root = compile(r#"<p node="-con:x">hi</p>"#).unwrap();
        assert!(root.child("x").unwrap().tags_omitted());
        assert_eq!(root.render(), "hi");
    }

    #[test]
    fn test_delete_discards_subtree() {
        let root = compile(
            r#"<ul><li node="con:a">A</li><li node="del:"><li>nested</li></li><li node="del:x">X</li></ul>"#,
        )
        .unwrap();
        assert_eq!(root.render(), "<ul><li>A</li></ul>");
        assert_eq!(root.structure(), "tem:\n\tcon:a");
    }

    #[test]
    fn test_delete_after_name_is_duplicate() {
        let err = compile(r#"<p node="con:a">a</p><div node="del:a">mock</div>"#).unwrap_err();
        assert_eq!(
            err,
            TemplateError::DuplicateName {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_delete_does_not_reserve_name() {
        let root = compile(r#"<p node="del:a">x</p><p node="con:a">y</p>"#).unwrap();
        assert!(root.has_child("a"));
    }

    #[test]
    fn test_delete_ignores_directives_inside() {
        let root = compile(r#"<div node="del:"><p node="con:bad name">x</p></div>"#).unwrap();
        assert_eq!(root.render(), "");
    }

    #[test]
    fn test_separator_installed() {
        let root = compile(
            r#"<a node="rep:link">L</a><span node="-sep:link"> | </span><b node="sep:item"/><i node="rep:item"></i>"#,
        )
        .unwrap();
        assert_eq!(root.child("link").unwrap().separator().unwrap(), " | ");
        assert_eq!(root.child("item").unwrap().separator().unwrap(), "<b />");
    }

    #[test]
    fn test_separator_with_tags() {
        let root =
            compile(r#"<p node="rep:x">x</p><hr node="sep:x" class="s"></hr>"#).unwrap();
        assert_eq!(
            root.child("x").unwrap().separator().unwrap(),
            r#"<hr class="s"></hr>"#
        );
    }

    #[test]
    fn test_unresolved_separator() {
        let err = compile(r#"<span node="sep:x">,</span>"#).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnresolvedSeparator {
                name: "x".to_string(),
                found: None
            }
        );

        let err = compile(r#"<p node="con:x">a</p><span node="sep:x">,</span>"#).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnresolvedSeparator {
                name: "x".to_string(),
                found: Some("con".to_string())
            }
        );
    }

    #[test]
    fn test_separator_must_be_sibling() {
        let err = compile(r#"<p node="rep:x">a</p><div><span node="sep:x">,</span></div>"#);
        assert!(err.is_ok(), "ordinary wrappers do not create a scope");

        let err = compile(r#"<p node="rep:x">a</p><div node="con:d"><span node="sep:x">,</span></div>"#)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedSeparator { .. }));
    }

    #[test]
    fn test_duplicate_name() {
        let err = compile(r#"<p node="con:a">1</p><p node="rep:a">2</p>"#).unwrap_err();
        assert_eq!(
            err,
            TemplateError::DuplicateName {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_same_name_in_different_parents() {
        let root =
            compile(r#"<div node="con:a"><p node="con:x">1</p></div><p node="con:x">2</p>"#)
                .unwrap();
        assert_eq!(root.structure(), "tem:\n\tcon:a\n\t\tcon:x\n\tcon:x");
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["1abc", "_x", "a-b", "", "render", "fn", "text", "has_child"] {
            let source = format!(r#"<p node="con:{}">x</p>"#, bad);
            assert_eq!(
                compile(&source).unwrap_err(),
                TemplateError::InvalidName {
                    name: bad.to_string()
                },
                "name {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_malformed_directive() {
        let err = compile(r#"<p node="foo:x">x</p>"#).unwrap_err();
        assert!(matches!(err, TemplateError::MalformedDirective { .. }));
    }

    #[test]
    fn test_directive_attribute_without_grammar_is_rejected() {
        for value in ["foo", "con", "con-x", ""] {
            let source = format!(r#"<p node="{}">x</p>"#, value);
            assert_eq!(
                compile(&source).unwrap_err(),
                TemplateError::MalformedDirective {
                    value: value.to_string()
                },
                "value {:?}",
                value
            );
        }
        let err = compile("<p node>x</p>").unwrap_err();
        assert_eq!(
            err,
            TemplateError::MalformedDirective {
                value: String::new()
            }
        );
    }

    #[test]
    fn test_unterminated_element() {
        let err = compile(r#"<div><p node="-con:x">open"#).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnterminatedElement {
                directive: "-con:x".to_string(),
                tag: "p".to_string()
            }
        );
    }

    #[test]
    fn test_custom_attribute() {
        let options = TemplateOptions::default().with_attribute("tpl");
        let root = parse(r#"<p tpl="con:x" node="con:y">x</p>"#, &options).unwrap();
        assert_eq!(root.render(), r#"<p node="con:y">x</p>"#);
    }

    #[test]
    fn test_references_preserved() {
        let root = compile(r#"<p node="con:x">a &amp; b&#160;</p>"#).unwrap();
        assert_eq!(root.child("x").unwrap().html(), "a &amp; b&#160;");
        assert_eq!(root.child("x").unwrap().text(), "a & b\u{a0}");
    }

    #[test]
    fn test_text_decodes_named_and_numeric_references() {
        let root = compile(r#"<p node="con:x">&copy; 2024&nbsp;&#65;</p>"#).unwrap();
        assert_eq!(root.child("x").unwrap().text(), "\u{a9} 2024\u{a0}A");
        assert_eq!(root.render(), r#"<p>&copy; 2024&nbsp;&#65;</p>"#);
    }

    #[test]
    fn test_less_than_in_repeater_text() {
        let root = compile(r#"<ul><li node="rep:i">1 < 2</li></ul><p>a <= b</p>"#).unwrap();
        assert_eq!(root.structure(), "tem:\n\trep:i");
        let mut copy = root.clone();
        copy.child_mut("i").unwrap().add(|_| Ok(())).unwrap();
        assert_eq!(copy.render(), "<ul><li>1 < 2</li></ul><p>a <= b</p>");
    }

    #[test]
    fn test_incremental_feed() {
        let options = TemplateOptions::default();
        let mut parser = TemplateParser::new(&options);
        parser
            .feed(MarkupEvent::StartTag {
                name: "p".to_string(),
                attributes: vec![("node".to_string(), Some("con:x".to_string()))],
                self_closing: false,
            })
            .unwrap();
        parser.feed(MarkupEvent::Text("hi".to_string())).unwrap();
        parser
            .feed(MarkupEvent::EndTag {
                name: "p".to_string(),
            })
            .unwrap();
        let root = parser.finish().unwrap();
        assert_eq!(root.render(), "<p>hi</p>");
    }
}
