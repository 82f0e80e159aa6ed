/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and node manipulation.

use thiserror::Error;

/// Errors that can occur while compiling or manipulating a template.
///
/// Compilation errors abort the whole compile; no partial tree is returned.
/// Errors raised while mutating or rendering a node only abort that
/// operation and leave the node usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A directive name is not an identifier or collides with a reserved name.
    #[error("Invalid node name: {name:?}")]
    InvalidName { name: String },

    /// The directive attribute is present but its value is not `[-]kind:name`.
    #[error("Malformed directive: {value:?}")]
    MalformedDirective { value: String },

    /// A non-separator directive reuses a name already taken in its parent.
    #[error("Duplicate node name: {name:?}")]
    DuplicateName { name: String },

    /// A separator directive has no repeater of the same name beside it.
    #[error("Separator 'sep:{name}' has no matching repeater 'rep:{name}'{}", found_suffix(.found))]
    UnresolvedSeparator {
        name: String,
        /// Kind of the same-named sibling, when one exists but is not a repeater.
        found: Option<String>,
    },

    /// Input ended while a directive element was still open.
    #[error("Unterminated element: <{tag}> ({directive})")]
    UnterminatedElement { directive: String, tag: String },

    /// An attribute name or value was rejected by the attribute view.
    #[error("Invalid attribute {name:?}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    /// No child of the given name exists in the node's content.
    #[error("Unknown child node: {name:?}")]
    UnknownChild { name: String },

    /// A repeater-only operation was called on another kind of node.
    #[error("Node {name:?} is not a repeater")]
    NotARepeater { name: String },

    /// Content was set on a node compiled from a self-closing tag.
    #[error("Node {name:?} is an empty element and cannot hold content")]
    EmptyElement { name: String },

    /// The markup scanner rejected the input.
    #[error("Markup error: {message}{}", position_suffix(.position))]
    Markup {
        message: String,
        /// Byte offset where the scanner gave up.
        position: Option<u64>,
    },
}

fn found_suffix(found: &Option<String>) -> String {
    match found {
        Some(kind) => format!(" (found {})", kind),
        None => String::new(),
    }
}

fn position_suffix(position: &Option<u64>) -> String {
    match position {
        Some(pos) => format!(" at byte {}", pos),
        None => String::new(),
    }
}

impl From<quick_xml::Error> for TemplateError {
    fn from(err: quick_xml::Error) -> Self {
        TemplateError::Markup {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for TemplateError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        TemplateError::Markup {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_separator_message() {
        let err = TemplateError::UnresolvedSeparator {
            name: "item".to_string(),
            found: None,
        };
        assert_eq!(
            err.to_string(),
            "Separator 'sep:item' has no matching repeater 'rep:item'"
        );

        let err = TemplateError::UnresolvedSeparator {
            name: "item".to_string(),
            found: Some("con".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Separator 'sep:item' has no matching repeater 'rep:item' (found con)"
        );
    }

    #[test]
    fn test_markup_message_position() {
        let err = TemplateError::Markup {
            message: "bad".to_string(),
            position: Some(12),
        };
        assert_eq!(err.to_string(), "Markup error: bad at byte 12");
    }
}
