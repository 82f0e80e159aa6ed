/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile-time configuration.
//!
//! [`TemplateOptions`] selects the directive attribute, the closing style of
//! empty elements and the entity [`Codec`] used at the attribute and text
//! boundaries. The options are fixed when a template is compiled and are
//! carried by every node of the resulting tree.

use crate::tokenizer::REFERENCE;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::Captures;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an element without content is closed when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoidClosing {
    /// `<br />`
    #[default]
    SlashSpaceGt,
    /// `<br>`
    GtOnly,
}

impl VoidClosing {
    /// The characters that end an empty element's tag.
    pub fn terminator(self) -> &'static str {
        match self {
            VoidClosing::SlashSpaceGt => " />",
            VoidClosing::GtOnly => ">",
        }
    }
}

/// Entity encoder/decoder pair applied when text crosses the node API.
///
/// Values are stored encoded; [`Codec::decode`] runs on read and
/// [`Codec::encode`] on write.
#[derive(Clone, Copy)]
pub struct Codec {
    pub encode: fn(&str) -> String,
    pub decode: fn(&str) -> String,
}

impl Codec {
    pub fn new(encode: fn(&str) -> String, decode: fn(&str) -> String) -> Self {
        Self { encode, decode }
    }

    pub fn encode(&self, text: &str) -> String {
        (self.encode)(text)
    }

    pub fn decode(&self, text: &str) -> String {
        (self.decode)(text)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(encode_entities, decode_entities)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Codec")
    }
}

/// Escape `&`, `<`, `>` and `"`.
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolve HTML5 named and numeric character references.
///
/// References are resolved in a single pass, so `&amp;lt;` decodes to
/// `&lt;`. Unknown references are left as written.
pub fn decode_entities(text: &str) -> String {
    REFERENCE
        .replace_all(text, |caps: &Captures<'_>| {
            let reference = &caps[0];
            unescape_with(reference, resolve_html5_entity)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| reference.to_string())
        })
        .into_owned()
}

/// Options controlling how markup is compiled into a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TemplateOptions {
    /// Name of the attribute holding `[-]kind:name` directives.
    pub attribute: String,

    /// Closing style for empty elements.
    pub void_closing: VoidClosing,

    /// Entity codec for attribute values and text content.
    #[serde(skip)]
    pub codec: Codec,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            attribute: "node".to_string(),
            void_closing: VoidClosing::default(),
            codec: Codec::default(),
        }
    }
}

impl TemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn with_void_closing(mut self, void_closing: VoidClosing) -> Self {
        self.void_closing = void_closing;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_entities() {
        let raw = r#"Tom & "Jerry" <3"#;
        let encoded = encode_entities(raw);
        assert_eq!(encoded, "Tom &amp; &quot;Jerry&quot; &lt;3");
        assert_eq!(decode_entities(&encoded), raw);
    }

    #[test]
    fn test_decode_single_pass() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_decode_html5_and_numeric_references() {
        assert_eq!(
            decode_entities("&copy; 2024&nbsp;&#65;&#x42;"),
            "\u{a9} 2024\u{a0}AB"
        );
    }

    #[test]
    fn test_decode_leaves_unknown_references() {
        assert_eq!(decode_entities("a &bogus; & b"), "a &bogus; & b");
    }

    #[test]
    fn test_defaults() {
        let options = TemplateOptions::default();
        assert_eq!(options.attribute, "node");
        assert_eq!(options.void_closing, VoidClosing::SlashSpaceGt);
        assert_eq!(options.codec.encode("<"), "&lt;");
    }

    #[test]
    fn test_deserialize_partial_options() {
        let options: TemplateOptions =
            serde_json::from_str(r#"{"attribute": "tpl", "void-closing": "gt-only"}"#).unwrap();
        assert_eq!(options.attribute, "tpl");
        assert_eq!(options.void_closing, VoidClosing::GtOnly);

        let options: TemplateOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.attribute, "node");
    }

    #[test]
    fn test_void_closing_terminator() {
        assert_eq!(VoidClosing::SlashSpaceGt.terminator(), " />");
        assert_eq!(VoidClosing::GtOnly.terminator(), ">");
    }
}
