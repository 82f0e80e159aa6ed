/*
 * attributes.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Attribute view over a node's tag.
//!
//! Attributes are kept in document order with their values already
//! entity-encoded, so rendering is a plain concatenation. Reads decode and
//! writes encode through the node's [`Codec`].

use crate::error::{TemplateError, TemplateResult};
use crate::options::Codec;
use regex::Regex;
use std::sync::LazyLock;

static ATTRIBUTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_:][-A-Za-z0-9_:.]*$").expect("Invalid regex pattern for attribute names")
});

/// Ordered attribute mapping of one element.
///
/// A value of `None` is a boolean attribute written without a value
/// (`<input checked>`).
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<(String, Option<String>)>,
    codec: Codec,
}

impl Attributes {
    pub fn new(codec: Codec) -> Self {
        Self {
            entries: Vec::new(),
            codec,
        }
    }

    /// Build from scanner output, where values arrive decoded.
    pub(crate) fn from_decoded(pairs: Vec<(String, Option<String>)>, codec: Codec) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(name, value)| {
                let value = value.map(|v| codec.encode(&v));
                (name, value)
            })
            .collect();
        Self { entries, codec }
    }

    /// Decoded value of `name`.
    ///
    /// Returns `None` both when the attribute is missing and when it is a
    /// boolean attribute; use [`Attributes::contains`] to tell them apart.
    pub fn get(&self, name: &str) -> Option<String> {
        self.position(name)
            .and_then(|i| self.entries[i].1.as_deref())
            .map(|v| self.codec.decode(v))
    }

    /// Stored (encoded) value of `name`.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.position(name).and_then(|i| self.entries[i].1.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set `name` to `value`, encoding it for storage.
    ///
    /// An existing attribute keeps its position; a new one is appended.
    pub fn set(&mut self, name: &str, value: &str) -> TemplateResult<()> {
        check_name(name)?;
        let encoded = self.codec.encode(value);
        self.put(name, Some(encoded));
        Ok(())
    }

    /// Set `name` as a boolean attribute with no value.
    pub fn set_flag(&mut self, name: &str) -> TemplateResult<()> {
        check_name(name)?;
        self.put(name, None);
        Ok(())
    }

    /// Remove `name`, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Names and decoded values in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<String>)> + '_ {
        self.entries.iter().map(|(name, value)| {
            let decoded = value.as_deref().map(|v| self.codec.decode(v));
            (name.as_str(), decoded)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the attributes as markup, each preceded by a space.
    ///
    /// Values containing a double quote (possible only with a custom codec)
    /// are wrapped in single quotes.
    pub fn render_into(&self, out: &mut String) {
        for (name, value) in &self.entries {
            out.push(' ');
            out.push_str(name);
            match value {
                None => {}
                Some(v) if v.contains('"') => {
                    out.push_str("='");
                    out.push_str(v);
                    out.push('\'');
                }
                Some(v) => {
                    out.push_str("=\"");
                    out.push_str(v);
                    out.push('"');
                }
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn put(&mut self, name: &str, value: Option<String>) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }
}

fn check_name(name: &str) -> TemplateResult<()> {
    if ATTRIBUTE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(TemplateError::InvalidAttribute {
            name: name.to_string(),
            reason: "not a valid attribute name".to_string(),
        })
    }
}
