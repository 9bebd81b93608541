// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    SerializeError,
    attachment::AttachmentData,
    deserialize::deserialize_log,
    errors::{DeserializeError, InvalidName},
    serialize::{is_invalid_xml_char, serialize_log},
    tag::BodyTag,
};
use indexmap::{IndexMap, map::Entry};
use serde::{Deserialize, Serialize};
use std::{fmt, io};

/// Conventional names of log streams.
///
/// Consumers match on these names exactly.
pub mod stream_names {
    /// Text read from the console by the test.
    pub const CONSOLE_INPUT: &str = "ConsoleInput";

    /// Text written to standard output by the test.
    pub const CONSOLE_OUTPUT: &str = "ConsoleOutput";

    /// Text written to standard error by the test.
    pub const CONSOLE_ERROR: &str = "ConsoleError";

    /// Debug and trace messages.
    pub const DEBUG_TRACE: &str = "DebugTrace";

    /// Warnings.
    pub const WARNINGS: &str = "Warnings";

    /// Failures, such as assertion failures and exceptions.
    pub const FAILURES: &str = "Failures";

    /// Everything else.
    pub const DEFAULT: &str = "Log";
}

/// The default indentation width used by [`StructuredTestLog::serialize`].
pub const DEFAULT_INDENT: usize = 4;

/// Checks that a stream, section or attachment name is non-empty and can be written to XML
/// unchanged.
///
/// Text content has disallowed characters stripped when serialized, but names identify streams,
/// sections and attachments, so they must survive a round trip exactly.
pub fn validate_name(name: &str) -> Result<(), InvalidName> {
    if name.is_empty() {
        return Err(InvalidName::Empty);
    }
    match name.chars().find(|&ch| is_invalid_xml_char(ch)) {
        Some(ch) => Err(InvalidName::InvalidChar {
            name: name.to_owned(),
            ch,
        }),
        None => Ok(()),
    }
}

/// A named stream within a [`StructuredTestLog`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredTestLogStream {
    /// The name of the stream.
    pub name: String,

    /// The contents of the stream.
    #[serde(default)]
    pub body: BodyTag,
}

impl StructuredTestLogStream {
    /// Creates an empty stream.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: BodyTag::new(),
        }
    }
}

impl fmt::Display for StructuredTestLogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.body, f)
    }
}

/// A structured test log: a set of named streams and the attachments they refer to.
///
/// Streams and attachments are keyed by exact name. Iteration follows insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SerializedLog", try_from = "SerializedLog")]
pub struct StructuredTestLog {
    streams: IndexMap<String, StructuredTestLogStream>,
    attachments: IndexMap<String, AttachmentData>,
}

impl StructuredTestLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stream with the given name.
    pub fn stream(&self, name: &str) -> Option<&StructuredTestLogStream> {
        self.streams.get(name)
    }

    /// Returns the streams in this log.
    pub fn streams(&self) -> impl ExactSizeIterator<Item = &StructuredTestLogStream> {
        self.streams.values()
    }

    /// Adds a stream to this log, replacing any stream with the same name.
    pub fn add_stream(&mut self, stream: StructuredTestLogStream) -> &mut Self {
        self.streams.insert(stream.name.clone(), stream);
        self
    }

    /// Returns the attachment with the given name.
    pub fn attachment(&self, name: &str) -> Option<&AttachmentData> {
        self.attachments.get(name)
    }

    /// Returns the attachments in this log.
    pub fn attachments(&self) -> impl ExactSizeIterator<Item = &AttachmentData> {
        self.attachments.values()
    }

    /// Adds an attachment to this log, replacing any attachment with the same name.
    pub fn add_attachment(&mut self, attachment: AttachmentData) -> &mut Self {
        self.attachments.insert(attachment.name.clone(), attachment);
        self
    }

    /// Returns a mutable reference to the attachment with the given name.
    ///
    /// Used to switch attachments to linked disposition after saving their contents.
    pub fn attachment_mut(&mut self, name: &str) -> Option<&mut AttachmentData> {
        self.attachments.get_mut(name)
    }

    /// Serializes this log as XML to the given writer, indented by [`DEFAULT_INDENT`].
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        self.serialize_with_indent(writer, DEFAULT_INDENT)
    }

    /// Serializes this log as XML to the given writer.
    ///
    /// An indent of 0 produces compact output with no line breaks between elements.
    pub fn serialize_with_indent(
        &self,
        writer: impl io::Write,
        indent: usize,
    ) -> Result<(), SerializeError> {
        Ok(serialize_log(self, writer, indent)?)
    }

    /// Serializes this log as an XML string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        String::from_utf8(buf).map_err(|utf8_err| {
            quick_xml::Error::NonDecodable(Some(utf8_err.utf8_error())).into()
        })
    }

    /// Reads a log from an XML string produced by [`serialize`](Self::serialize).
    pub fn from_xml_str(xml: &str) -> Result<Self, DeserializeError> {
        deserialize_log(xml)
    }

    pub(crate) fn try_insert_stream(
        &mut self,
        stream: StructuredTestLogStream,
    ) -> Result<(), DeserializeError> {
        match self.streams.entry(stream.name.clone()) {
            Entry::Occupied(entry) => Err(DeserializeError::DuplicateName {
                kind: "stream",
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(stream);
                Ok(())
            }
        }
    }

    pub(crate) fn try_insert_attachment(
        &mut self,
        attachment: AttachmentData,
    ) -> Result<(), DeserializeError> {
        match self.attachments.entry(attachment.name.clone()) {
            Entry::Occupied(entry) => Err(DeserializeError::DuplicateName {
                kind: "attachment",
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(attachment);
                Ok(())
            }
        }
    }
}

// Streams and attachments are carried as lists, since each item already holds its name.
#[derive(Serialize, Deserialize)]
struct SerializedLog {
    #[serde(default)]
    streams: Vec<StructuredTestLogStream>,
    #[serde(default)]
    attachments: Vec<AttachmentData>,
}

impl From<StructuredTestLog> for SerializedLog {
    fn from(log: StructuredTestLog) -> Self {
        Self {
            streams: log.streams.into_values().collect(),
            attachments: log.attachments.into_values().collect(),
        }
    }
}

impl TryFrom<SerializedLog> for StructuredTestLog {
    type Error = DeserializeError;

    fn try_from(serialized: SerializedLog) -> Result<Self, Self::Error> {
        let mut log = StructuredTestLog::new();
        for stream in serialized.streams {
            log.try_insert_stream(stream)?;
        }
        for attachment in serialized.attachments {
            log.try_insert_attachment(attachment)?;
        }
        Ok(log)
    }
}
