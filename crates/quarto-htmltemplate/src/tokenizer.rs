/*
 * tokenizer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Flat markup event stream on top of quick-xml.
//!
//! The reader is configured leniently so ordinary HTML gets through: end tag
//! names are not checked against start tags, stray end tags are allowed and
//! attributes are read in HTML mode (unquoted and valueless attributes).
//! A `<` that is not followed by a tag name is kept as text. Tag and
//! attribute names are lowercased. Attribute values are delivered
//! decoded; text is delivered raw, with character and entity references
//! split out as their own events so they can be written back verbatim.

use crate::error::{TemplateError, TemplateResult};
use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

/// A character or entity reference such as `&amp;` or `&#x41;`.
pub(crate) static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);")
        .expect("Invalid regex pattern for references")
});

/// One event of the markup stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    /// `<name …>` or, with `self_closing`, `<name …/>`.
    StartTag {
        name: String,
        /// Decoded values; `None` for an attribute written without a value.
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Raw character data.
    Text(String),
    /// Numeric reference without `&#`/`;`, e.g. `x41` or `65`.
    CharRef(String),
    /// Named reference without `&`/`;`, e.g. `amp`.
    EntityRef(String),
    Comment(String),
    /// `<!…>` content such as `DOCTYPE html` or `[CDATA[…]]`.
    Declaration(String),
    /// `<?…?>` content.
    ProcessingInstruction(String),
}

impl MarkupEvent {
    /// Markup for a non-tag event, reproducing its source form.
    pub fn literal(&self) -> Option<String> {
        match self {
            MarkupEvent::Text(text) => Some(text.clone()),
            MarkupEvent::CharRef(code) => Some(format!("&#{};", code)),
            MarkupEvent::EntityRef(name) => Some(format!("&{};", name)),
            MarkupEvent::Comment(text) => Some(format!("<!--{}-->", text)),
            MarkupEvent::Declaration(text) => Some(format!("<!{}>", text)),
            MarkupEvent::ProcessingInstruction(text) => Some(format!("<?{}?>", text)),
            MarkupEvent::StartTag { .. } | MarkupEvent::EndTag { .. } => None,
        }
    }
}

/// Iterator of [`MarkupEvent`]s over a source string.
pub struct Tokenizer<'a> {
    reader: Reader<&'a [u8]>,
    pending: VecDeque<MarkupEvent>,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.trim_text_start = false;
        config.trim_text_end = false;
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        Self {
            reader,
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn read_next(&mut self) -> TemplateResult<()> {
        match self.reader.read_event() {
            Ok(Event::Start(e)) if !is_tag_name(e.name().as_ref()) => {
                self.recover_text(&lossy(&e), ">")?;
            }
            Ok(Event::Empty(e)) if !is_tag_name(e.name().as_ref()) => {
                self.recover_text(&lossy(&e), "/>")?;
            }
            Ok(Event::Start(e)) => {
                let event = start_tag(&e, false)?;
                self.pending.push_back(event);
            }
            Ok(Event::Empty(e)) => {
                let event = start_tag(&e, true)?;
                self.pending.push_back(event);
            }
            Ok(Event::End(e)) => {
                let name = lossy(e.name().as_ref()).to_ascii_lowercase();
                self.pending.push_back(MarkupEvent::EndTag { name });
            }
            Ok(Event::Text(e)) => {
                split_references(&lossy(&e), &mut self.pending);
            }
            Ok(Event::CData(e)) => {
                let text = format!("[CDATA[{}]]", lossy(&e));
                self.pending.push_back(MarkupEvent::Declaration(text));
            }
            Ok(Event::Comment(e)) => {
                self.pending.push_back(MarkupEvent::Comment(lossy(&e)));
            }
            Ok(Event::DocType(e)) => {
                let text = format!("DOCTYPE {}", lossy(&e).trim());
                self.pending.push_back(MarkupEvent::Declaration(text));
            }
            Ok(Event::Decl(e)) => {
                self.pending
                    .push_back(MarkupEvent::ProcessingInstruction(lossy(&e)));
            }
            Ok(Event::PI(e)) => {
                self.pending
                    .push_back(MarkupEvent::ProcessingInstruction(lossy(&e)));
            }
            Ok(Event::Eof) => self.done = true,
            Err(e) => {
                self.done = true;
                return Err(TemplateError::Markup {
                    message: e.to_string(),
                    position: Some(self.reader.error_position()),
                });
            }
        }
        Ok(())
    }

    /// Re-read a `<` that does not open a tag as text.
    ///
    /// quick-xml has already consumed everything up to the next `>` as the
    /// body of a start tag; that body is scanned again so tags inside it
    /// are not lost.
    fn recover_text(&mut self, body: &str, close: &str) -> TemplateResult<()> {
        let rest = format!("{}{}", body, close);
        let mut events = VecDeque::from([MarkupEvent::Text("<".to_string())]);
        for event in Tokenizer::new(&rest) {
            let event = event?;
            if let (Some(MarkupEvent::Text(text)), MarkupEvent::Text(more)) =
                (events.back_mut(), &event)
            {
                text.push_str(more);
                continue;
            }
            events.push_back(event);
        }
        self.pending.extend(events);
        Ok(())
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = TemplateResult<MarkupEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.read_next() {
                return Some(Err(err));
            }
        }
    }
}

/// Scan the whole source into a vector of events.
pub fn tokenize(source: &str) -> TemplateResult<Vec<MarkupEvent>> {
    Tokenizer::new(source).collect()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// HTML tag names start with an ASCII letter; anything else after `<` is text.
fn is_tag_name(name: &[u8]) -> bool {
    name.first().is_some_and(u8::is_ascii_alphabetic)
}

fn start_tag(e: &BytesStart<'_>, self_closing: bool) -> TemplateResult<MarkupEvent> {
    let name = lossy(e.name().as_ref()).to_ascii_lowercase();
    let valued = valued_attribute_names(&lossy(e.attributes_raw()));

    let mut attributes = Vec::new();
    let mut iter = e.html_attributes();
    iter.with_checks(false);
    for attr in iter {
        let attr = attr?;
        let key = lossy(attr.key.as_ref()).to_ascii_lowercase();
        let raw = lossy(&attr.value);
        let value = if raw.is_empty() && !valued.contains(&key) {
            None
        } else {
            let decoded = unescape_with(&raw, resolve_html5_entity)
                .map(|v| v.into_owned())
                .unwrap_or(raw);
            Some(decoded)
        };
        attributes.push((key, value));
    }

    Ok(MarkupEvent::StartTag {
        name,
        attributes,
        self_closing,
    })
}

/// Lowercased names of the attributes in `raw` that are written with `=`.
///
/// quick-xml reports `checked` and `checked=""` identically, so boolean
/// attributes are recovered from the raw tag text.
fn valued_attribute_names(raw: &str) -> Vec<String> {
    let bytes = raw.as_bytes();
    let len = bytes.len();
    let mut names = Vec::new();
    let mut i = 0;

    while i < len {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        let name = &raw[start..i];
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < len && bytes[i] == b'=' {
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                while i < len && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            } else {
                while i < len && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
            }
            names.push(name.to_ascii_lowercase());
        }
    }
    names
}

/// Split raw text into text, character reference and entity reference events.
fn split_references(text: &str, out: &mut VecDeque<MarkupEvent>) {
    let mut last = 0;
    for caps in REFERENCE.captures_iter(text) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push_back(MarkupEvent::Text(text[last..whole.start()].to_string()));
        }
        let body = body.as_str();
        match body.strip_prefix('#') {
            Some(code) => out.push_back(MarkupEvent::CharRef(code.to_string())),
            None => out.push_back(MarkupEvent::EntityRef(body.to_string())),
        }
        last = whole.end();
    }
    if last < text.len() {
        out.push_back(MarkupEvent::Text(text[last..].to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, attributes: &[(&str, Option<&str>)], self_closing: bool) -> MarkupEvent {
        MarkupEvent::StartTag {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
            self_closing,
        }
    }

    #[test]
    fn test_tags_and_text() {
        let events = tokenize(r#"<P Class="x">hi</P>"#).unwrap();
        assert_eq!(
            events,
            vec![
                start("p", &[("class", Some("x"))], false),
                MarkupEvent::Text("hi".to_string()),
                MarkupEvent::EndTag {
                    name: "p".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_self_closing_tag() {
        let events = tokenize(r#"<br/><img src="a.png" />"#).unwrap();
        assert_eq!(
            events,
            vec![
                start("br", &[], true),
                start("img", &[("src", Some("a.png"))], true),
            ]
        );
    }

    #[test]
    fn test_boolean_and_unquoted_attributes() {
        let events = tokenize(r#"<input checked value="" size=3>"#).unwrap();
        assert_eq!(
            events,
            vec![start(
                "input",
                &[("checked", None), ("value", Some("")), ("size", Some("3"))],
                false
            )]
        );
    }

    #[test]
    fn test_attribute_values_decoded() {
        let events = tokenize(r#"<a title="a &amp; b&nbsp;&#65;">"#).unwrap();
        assert_eq!(
            events,
            vec![start("a", &[("title", Some("a & b\u{a0}A"))], false)]
        );
    }

    #[test]
    fn test_references_split_from_text() {
        let events = tokenize("a &amp; b &#160;c").unwrap();
        assert_eq!(
            events,
            vec![
                MarkupEvent::Text("a ".to_string()),
                MarkupEvent::EntityRef("amp".to_string()),
                MarkupEvent::Text(" b ".to_string()),
                MarkupEvent::CharRef("160".to_string()),
                MarkupEvent::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_comment_doctype_and_pi() {
        let events = tokenize("<!DOCTYPE html><!-- note --><?php echo 1 ?>").unwrap();
        let literals: Vec<String> = events.iter().filter_map(|e| e.literal()).collect();
        assert_eq!(
            literals,
            vec!["<!DOCTYPE html>", "<!-- note -->", "<?php echo 1 ?>"]
        );
    }

    #[test]
    fn test_unmatched_end_tags_allowed() {
        let events = tokenize("<p>one<br></p></div>").unwrap();
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_less_than_in_text() {
        let events = tokenize(r#"<p node="con:x">1 < 2</p><b>x</b>"#).unwrap();
        assert_eq!(
            events,
            vec![
                start("p", &[("node", Some("con:x"))], false),
                MarkupEvent::Text("1 ".to_string()),
                MarkupEvent::Text("< 2".to_string()),
                MarkupEvent::EndTag {
                    name: "p".to_string()
                },
                start("b", &[], false),
                MarkupEvent::Text("x".to_string()),
                MarkupEvent::EndTag {
                    name: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_less_than_before_digit_and_entity() {
        let events = tokenize("<i>a <3 &amp; b</i>").unwrap();
        let text: String = events.iter().filter_map(|e| e.literal()).collect();
        assert_eq!(text, "a <3 &amp; b");
        assert_eq!(
            events.last(),
            Some(&MarkupEvent::EndTag {
                name: "i".to_string()
            })
        );
    }

    #[test]
    fn test_valued_attribute_names() {
        assert_eq!(
            valued_attribute_names(r#" a="1" b c = 'x y' D=e f"#),
            vec!["a", "c", "d"]
        );
    }
}
