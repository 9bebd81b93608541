// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::InvalidIdentifier;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{borrow::Borrow, fmt, str::FromStr};

/// An identifier used as a marker class or a marker attribute name.
///
/// The identifier is validated to be non-empty and to consist only of letters, digits and
/// underscores.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MarkerIdent(SmolStr);

impl MarkerIdent {
    /// Validates and creates a new identifier.
    pub fn new(identifier: impl Into<SmolStr>) -> Result<Self, InvalidIdentifier> {
        let identifier = identifier.into();
        Self::validate(&identifier)?;
        Ok(Self(identifier))
    }

    // Only used for the well-known constants below, which are valid by construction.
    fn new_static(identifier: &'static str) -> Self {
        Self(SmolStr::new_static(identifier))
    }

    /// Checks that `identifier` is a valid identifier.
    pub fn validate(identifier: &str) -> Result<(), InvalidIdentifier> {
        if identifier.is_empty() {
            return Err(InvalidIdentifier::Empty);
        }
        if identifier
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_')
        {
            Ok(())
        } else {
            Err(InvalidIdentifier::InvalidChar(identifier.into()))
        }
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MarkerIdent {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for MarkerIdent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for MarkerIdent {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl<'de> Deserialize<'de> for MarkerIdent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let identifier = SmolStr::deserialize(deserializer)?;
        MarkerIdent::new(identifier).map_err(serde::de::Error::custom)
    }
}

/// A hidden semantic tag placed around content in a log stream.
///
/// A marker has a class, such as [`Marker::STACK_TRACE`], and an ordered set of attributes.
/// Two markers are equal if their classes are equal and they have the same attributes,
/// regardless of the order the attributes were added in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    class: MarkerIdent,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    attributes: IndexMap<MarkerIdent, String>,
}

impl Marker {
    /// Marks an assertion failure.
    pub const ASSERTION_FAILURE: &'static str = "AssertionFailure";
    /// Marks an exception.
    pub const EXCEPTION: &'static str = "Exception";
    /// Marks the type of an exception.
    pub const EXCEPTION_TYPE: &'static str = "ExceptionType";
    /// Marks the message of an exception.
    pub const EXCEPTION_MESSAGE: &'static str = "ExceptionMessage";
    /// Marks the name of an exception property.
    pub const EXCEPTION_PROPERTY_NAME: &'static str = "ExceptionPropertyName";
    /// Marks the value of an exception property.
    pub const EXCEPTION_PROPERTY_VALUE: &'static str = "ExceptionPropertyValue";
    /// Marks a stack trace.
    pub const STACK_TRACE: &'static str = "StackTrace";
    /// Marks a code location. Uses the [`PATH_ATTRIBUTE`](Self::PATH_ATTRIBUTE),
    /// [`LINE_ATTRIBUTE`](Self::LINE_ATTRIBUTE) and [`COLUMN_ATTRIBUTE`](Self::COLUMN_ATTRIBUTE)
    /// attributes.
    pub const CODE_LOCATION: &'static str = "CodeLocation";
    /// Marks a hyperlink. Uses the [`URL_ATTRIBUTE`](Self::URL_ATTRIBUTE) attribute.
    pub const LINK: &'static str = "Link";
    /// Marks text that was added in a diff.
    pub const DIFF_ADDITION: &'static str = "DiffAddition";
    /// Marks text that was deleted in a diff.
    pub const DIFF_DELETION: &'static str = "DiffDeletion";
    /// Marks text that was changed in a diff.
    pub const DIFF_CHANGE: &'static str = "DiffChange";
    /// Marks highlighted text.
    pub const HIGHLIGHT: &'static str = "Highlight";
    /// Marks an ellipsis standing in for elided text.
    pub const ELLIPSIS: &'static str = "Ellipsis";
    /// Marks text that should be displayed in a monospace font.
    pub const MONOSPACE: &'static str = "Monospace";
    /// Marks a label.
    pub const LABEL: &'static str = "Label";

    /// The path of a code location.
    pub const PATH_ATTRIBUTE: &'static str = "path";
    /// The 1-based line number of a code location.
    pub const LINE_ATTRIBUTE: &'static str = "line";
    /// The 1-based column number of a code location.
    pub const COLUMN_ATTRIBUTE: &'static str = "column";
    /// The URL of a link.
    pub const URL_ATTRIBUTE: &'static str = "url";

    /// Creates a marker with the given class and no attributes.
    pub fn new(class: impl Into<SmolStr>) -> Result<Self, InvalidIdentifier> {
        Ok(Self::from_ident(MarkerIdent::new(class)?))
    }

    /// Creates a marker from an already-validated class.
    pub fn from_ident(class: MarkerIdent) -> Self {
        Self {
            class,
            attributes: IndexMap::new(),
        }
    }

    fn well_known(class: &'static str) -> Self {
        Self::from_ident(MarkerIdent::new_static(class))
    }

    /// Returns a copy of this marker with the given attribute added or replaced.
    pub fn with_attribute(
        mut self,
        name: impl Into<SmolStr>,
        value: impl Into<String>,
    ) -> Result<Self, InvalidIdentifier> {
        self.set_attribute(name, value)?;
        Ok(self)
    }

    /// Adds or replaces an attribute on this marker.
    pub fn set_attribute(
        &mut self,
        name: impl Into<SmolStr>,
        value: impl Into<String>,
    ) -> Result<&mut Self, InvalidIdentifier> {
        let name = MarkerIdent::new(name)?;
        self.attributes.insert(name, value.into());
        Ok(self)
    }

    /// Returns the class of this marker.
    #[inline]
    pub fn class(&self) -> &str {
        self.class.as_str()
    }

    /// Returns the class of this marker as an identifier.
    #[inline]
    pub fn class_ident(&self) -> &MarkerIdent {
        &self.class
    }

    /// Returns the attributes of this marker.
    #[inline]
    pub fn attributes(&self) -> &IndexMap<MarkerIdent, String> {
        &self.attributes
    }

    /// Returns the value of the given attribute, if set.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns a marker for an assertion failure.
    pub fn assertion_failure() -> Self {
        Self::well_known(Self::ASSERTION_FAILURE)
    }

    /// Returns a marker for an exception.
    pub fn exception() -> Self {
        Self::well_known(Self::EXCEPTION)
    }

    /// Returns a marker for the type of an exception.
    pub fn exception_type() -> Self {
        Self::well_known(Self::EXCEPTION_TYPE)
    }

    /// Returns a marker for the message of an exception.
    pub fn exception_message() -> Self {
        Self::well_known(Self::EXCEPTION_MESSAGE)
    }

    /// Returns a marker for the name of an exception property.
    pub fn exception_property_name() -> Self {
        Self::well_known(Self::EXCEPTION_PROPERTY_NAME)
    }

    /// Returns a marker for the value of an exception property.
    pub fn exception_property_value() -> Self {
        Self::well_known(Self::EXCEPTION_PROPERTY_VALUE)
    }

    /// Returns a marker for a stack trace.
    pub fn stack_trace() -> Self {
        Self::well_known(Self::STACK_TRACE)
    }

    /// Returns a marker for diff additions.
    pub fn diff_addition() -> Self {
        Self::well_known(Self::DIFF_ADDITION)
    }

    /// Returns a marker for diff deletions.
    pub fn diff_deletion() -> Self {
        Self::well_known(Self::DIFF_DELETION)
    }

    /// Returns a marker for diff changes.
    pub fn diff_change() -> Self {
        Self::well_known(Self::DIFF_CHANGE)
    }

    /// Returns a marker for highlighted text.
    pub fn highlight() -> Self {
        Self::well_known(Self::HIGHLIGHT)
    }

    /// Returns a marker for an ellipsis.
    pub fn ellipsis() -> Self {
        Self::well_known(Self::ELLIPSIS)
    }

    /// Returns a marker for monospace text.
    pub fn monospace() -> Self {
        Self::well_known(Self::MONOSPACE)
    }

    /// Returns a marker for a label.
    pub fn label() -> Self {
        Self::well_known(Self::LABEL)
    }

    /// Returns a marker for a code location.
    ///
    /// The line and column are only recorded if known.
    pub fn code_location(path: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        let mut marker = Self::well_known(Self::CODE_LOCATION);
        marker.insert_well_known(Self::PATH_ATTRIBUTE, path.into());
        if let Some(line) = line {
            marker.insert_well_known(Self::LINE_ATTRIBUTE, line.to_string());
        }
        if let Some(column) = column {
            marker.insert_well_known(Self::COLUMN_ATTRIBUTE, column.to_string());
        }
        marker
    }

    /// Returns a marker for a hyperlink to `url`.
    pub fn link(url: impl Into<String>) -> Self {
        let mut marker = Self::well_known(Self::LINK);
        marker.insert_well_known(Self::URL_ATTRIBUTE, url.into());
        marker
    }

    fn insert_well_known(&mut self, name: &'static str, value: String) {
        self.attributes
            .insert(MarkerIdent::new_static(name), value);
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)?;
        for (name, value) in &self.attributes {
            write!(f, " {name}={value:?}")?;
        }
        Ok(())
    }
}
