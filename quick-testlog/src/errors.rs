// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use smol_str::SmolStr;
use thiserror::Error;

/// An identifier (a marker class or a marker attribute name) was invalid.
///
/// Identifiers must be non-empty and consist only of letters, digits and underscores.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidIdentifier {
    /// The identifier was empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier contained a character other than a letter, digit or underscore.
    #[error("invalid identifier `{0}`: only letters, digits and underscores are allowed")]
    InvalidChar(SmolStr),
}

/// A stream, section or attachment name was invalid.
///
/// Names must be non-empty, and may only contain characters that XML 1.0 allows, so that they
/// are written out unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidName {
    /// The name was empty.
    #[error("name is empty")]
    Empty,

    /// The name contained a character that XML 1.0 does not allow.
    #[error("name {name:?} contains {ch:?}, which is not allowed in XML")]
    InvalidChar {
        /// The name.
        name: String,

        /// The first disallowed character.
        ch: char,
    },
}

/// An error that occurs while serializing a [`StructuredTestLog`](crate::StructuredTestLog).
///
/// Returned by [`StructuredTestLog::serialize`](crate::StructuredTestLog::serialize) and
/// [`StructuredTestLog::to_string`](crate::StructuredTestLog::to_string).
#[derive(Debug, Error)]
#[error("error serializing test log")]
pub struct SerializeError {
    #[from]
    inner: quick_xml::Error,
}

/// An error that occurs while reading a [`StructuredTestLog`](crate::StructuredTestLog) from XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeserializeError {
    /// The input was not well-formed XML.
    #[error("error reading test log XML")]
    Xml(#[from] quick_xml::Error),

    /// An element appeared where it is not allowed.
    #[error("unexpected element `{found}` inside `{parent}`")]
    UnexpectedElement {
        /// The element that was being read.
        parent: &'static str,

        /// The element that was found.
        found: String,
    },

    /// The input ended before the document was complete.
    #[error("unexpected end of input inside `{parent}`")]
    UnexpectedEof {
        /// The element that was being read.
        parent: &'static str,
    },

    /// A required attribute was missing.
    #[error("element `{element}` is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// The element.
        element: &'static str,

        /// The attribute that was missing.
        attribute: &'static str,
    },

    /// An attribute had a value that could not be parsed.
    #[error("invalid value `{value}` for attribute `{attribute}` of `{element}`")]
    InvalidAttributeValue {
        /// The element.
        element: &'static str,

        /// The attribute.
        attribute: &'static str,

        /// The value that was found.
        value: String,
    },

    /// A marker class or attribute name was invalid.
    #[error("invalid marker in test log")]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// Two streams or two attachments had the same name.
    #[error("duplicate {kind} named `{name}`")]
    DuplicateName {
        /// Either "stream" or "attachment".
        kind: &'static str,

        /// The duplicated name.
        name: String,
    },
}

/// An error that occurs while accessing the contents of an
/// [`AttachmentData`](crate::AttachmentData).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttachmentContentError {
    /// Text was requested from a binary attachment.
    #[error("attachment `{name}` is not text")]
    NotText {
        /// The attachment name.
        name: String,
    },

    /// Bytes were requested from a text attachment.
    #[error("attachment `{name}` is not binary")]
    NotBinary {
        /// The attachment name.
        name: String,
    },

    /// The attachment is linked and its contents are not inlined.
    #[error("contents of attachment `{name}` are not available")]
    NotAvailable {
        /// The attachment name.
        name: String,
    },

    /// The inlined Base64 contents could not be decoded.
    #[error("contents of attachment `{name}` are not valid Base64")]
    Base64 {
        /// The attachment name.
        name: String,

        /// The underlying error.
        #[source]
        error: base64::DecodeError,
    },
}

/// An error that occurs while serializing an object into an XML attachment.
#[derive(Debug, Error)]
#[error("error serializing object as XML for attachment `{name}`")]
pub struct ObjectXmlError {
    name: String,
    #[source]
    inner: quick_xml::DeError,
}

impl ObjectXmlError {
    pub(crate) fn new(name: impl Into<String>, inner: quick_xml::DeError) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Returns the name of the attachment that could not be created.
    pub fn name(&self) -> &str {
        &self.name
    }
}
