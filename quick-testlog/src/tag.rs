// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tag tree making up the contents of a log stream.
//!
//! Each stream holds exactly one [`BodyTag`]. Containers ([`SectionTag`] and [`MarkerTag`]) own
//! an ordered list of child [`Tag`]s, and the leaves are runs of text ([`TextTag`]) and
//! references to attachments ([`EmbedTag`]). Walking the tree in pre-order reproduces the exact
//! sequence of writer calls that built it.

use crate::marker::Marker;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The root container of a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyTag {
    /// The contents of the body.
    #[serde(default)]
    pub contents: Vec<Tag>,
}

impl BodyTag {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the body has no contents.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Returns the total number of characters in all text runs of this body.
    pub fn text_length(&self) -> usize {
        let mut visitor = TextLengthVisitor { length: 0 };
        visitor.visit_body(self);
        visitor.length
    }

    /// Returns the names of attachments embedded in this body, in first-embedded order and
    /// without duplicates.
    pub fn embedded_attachment_names(&self) -> IndexSet<&str> {
        let mut visitor = EmbedNamesVisitor {
            names: IndexSet::new(),
        };
        visitor.visit_body(self);
        visitor.names
    }
}

/// A node in the tag tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tag {
    /// A named section.
    Section(SectionTag),

    /// A region carrying a [`Marker`].
    Marker(MarkerTag),

    /// A run of text.
    Text(TextTag),

    /// A reference to an attachment.
    Embed(EmbedTag),
}

impl Tag {
    /// Returns the children of this tag if it is a container.
    pub fn contents(&self) -> Option<&[Tag]> {
        match self {
            Tag::Section(section) => Some(&section.contents),
            Tag::Marker(marker) => Some(&marker.contents),
            Tag::Text(_) | Tag::Embed(_) => None,
        }
    }

    /// Returns the children of this tag mutably if it is a container.
    pub fn contents_mut(&mut self) -> Option<&mut Vec<Tag>> {
        match self {
            Tag::Section(section) => Some(&mut section.contents),
            Tag::Marker(marker) => Some(&mut marker.contents),
            Tag::Text(_) | Tag::Embed(_) => None,
        }
    }
}

/// A named container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTag {
    /// The name of the section.
    pub name: String,

    /// The contents of the section.
    #[serde(default)]
    pub contents: Vec<Tag>,
}

impl SectionTag {
    /// Creates an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: Vec::new(),
        }
    }
}

/// A container carrying a [`Marker`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerTag {
    /// The marker.
    pub marker: Marker,

    /// The contents of the marked region.
    #[serde(default)]
    pub contents: Vec<Tag>,
}

impl MarkerTag {
    /// Creates an empty marked region.
    pub fn new(marker: Marker) -> Self {
        Self {
            marker,
            contents: Vec::new(),
        }
    }
}

/// A run of text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTag {
    /// The text.
    pub text: String,
}

impl TextTag {
    /// Creates a run of text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A reference to an attachment by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTag {
    /// The name of the referenced attachment.
    pub attachment_name: String,
}

impl EmbedTag {
    /// Creates a reference to the named attachment.
    pub fn new(attachment_name: impl Into<String>) -> Self {
        Self {
            attachment_name: attachment_name.into(),
        }
    }
}

/// Visits the nodes of a tag tree.
///
/// The default methods walk the whole tree in pre-order; implementors override the methods for
/// the nodes they care about, calling [`visit_contents`](Self::visit_contents) to descend.
pub trait TagVisitor<'a> {
    /// Visits the root of a stream.
    fn visit_body(&mut self, body: &'a BodyTag) {
        self.visit_contents(&body.contents);
    }

    /// Visits each tag in `contents` in order.
    fn visit_contents(&mut self, contents: &'a [Tag]) {
        for tag in contents {
            self.visit_tag(tag);
        }
    }

    /// Dispatches to the method for the kind of `tag`.
    fn visit_tag(&mut self, tag: &'a Tag) {
        match tag {
            Tag::Section(section) => self.visit_section(section),
            Tag::Marker(marker) => self.visit_marker(marker),
            Tag::Text(text) => self.visit_text(text),
            Tag::Embed(embed) => self.visit_embed(embed),
        }
    }

    /// Visits a section.
    fn visit_section(&mut self, section: &'a SectionTag) {
        self.visit_contents(&section.contents);
    }

    /// Visits a marked region.
    fn visit_marker(&mut self, marker: &'a MarkerTag) {
        self.visit_contents(&marker.contents);
    }

    /// Visits a run of text.
    fn visit_text(&mut self, _text: &'a TextTag) {}

    /// Visits an attachment reference.
    fn visit_embed(&mut self, _embed: &'a EmbedTag) {}
}

struct TextLengthVisitor {
    length: usize,
}

impl TagVisitor<'_> for TextLengthVisitor {
    fn visit_text(&mut self, text: &TextTag) {
        self.length += text.text.chars().count();
    }
}

struct EmbedNamesVisitor<'a> {
    names: IndexSet<&'a str>,
}

impl<'a> TagVisitor<'a> for EmbedNamesVisitor<'a> {
    fn visit_embed(&mut self, embed: &'a EmbedTag) {
        self.names.insert(&embed.attachment_name);
    }
}

/// Formats a tag tree as plain text.
///
/// Sections are separated from surrounding text by blank lines and printed as their name
/// followed by their contents. Markers are transparent. Embedded attachments are printed as
/// `[Attachment: name]` on a line of their own. Carriage returns are dropped.
#[derive(Debug, Default)]
pub struct TagFormatter {
    output: String,
    pending_spacing: usize,
    actual_spacing: usize,
}

impl TagFormatter {
    /// Creates a new formatter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text formatted so far.
    pub fn into_string(self) -> String {
        self.output
    }

    fn request_minimum_spacing(&mut self, spacing: usize) {
        self.pending_spacing = self.pending_spacing.max(spacing);
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        if self.pending_spacing != 0 {
            if !self.output.is_empty() && self.pending_spacing > self.actual_spacing {
                let missing = self.pending_spacing - self.actual_spacing;
                self.output.extend(std::iter::repeat_n('\n', missing));
            }
            self.pending_spacing = 0;
        }

        for ch in text.chars() {
            match ch {
                '\r' => continue,
                '\n' => self.actual_spacing += 1,
                _ => self.actual_spacing = 0,
            }
            self.output.push(ch);
        }
    }
}

impl TagVisitor<'_> for TagFormatter {
    fn visit_body(&mut self, body: &BodyTag) {
        self.request_minimum_spacing(2);
        self.visit_contents(&body.contents);
        self.request_minimum_spacing(2);
    }

    fn visit_section(&mut self, section: &SectionTag) {
        self.request_minimum_spacing(2);
        self.append(&section.name);
        self.request_minimum_spacing(1);
        self.visit_contents(&section.contents);
        self.request_minimum_spacing(2);
    }

    fn visit_text(&mut self, text: &TextTag) {
        self.append(&text.text);
    }

    fn visit_embed(&mut self, embed: &EmbedTag) {
        self.request_minimum_spacing(1);
        self.append(&format!("[Attachment: {}]", embed.attachment_name));
        self.request_minimum_spacing(1);
    }
}

impl fmt::Display for BodyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatter = TagFormatter::new();
        formatter.visit_body(self);
        f.write_str(&formatter.into_string())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatter = TagFormatter::new();
        formatter.visit_tag(self);
        f.write_str(&formatter.into_string())
    }
}
