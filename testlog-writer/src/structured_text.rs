// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Self-contained snapshots of structured text, and length-bounded replay.
//!
//! A [`StructuredText`] is a tag tree together with the attachments it embeds. It does not belong
//! to any log, and can be written into any stream, for example to include a formatted value with
//! highlights in an assertion failure.

use crate::{
    config::TestLogConfig,
    errors::LogWriteError,
    replay::replay_contents,
    sink::LogSink,
    structured::StructuredLogSink,
    writer::{TestLogStreamWriter, TestLogWriter},
};
use quick_testlog::{Attachment, BodyTag, Tag, TextTag, stream_names};
use std::fmt;

/// An immutable tag tree plus the attachments it embeds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredText {
    body: BodyTag,
    attachments: Vec<Attachment>,
}

impl StructuredText {
    /// Creates structured text from a body and the attachments it embeds.
    pub fn new(body: BodyTag, attachments: Vec<Attachment>) -> Self {
        Self { body, attachments }
    }

    /// Returns the body.
    pub fn body(&self) -> &BodyTag {
        &self.body
    }

    /// Returns the attachments.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns the number of characters of text in the body.
    pub fn text_length(&self) -> usize {
        self.body.text_length()
    }

    /// Writes the attachments, then the body, to `stream`.
    pub fn write_to<S: LogSink>(
        &self,
        stream: &TestLogStreamWriter<'_, S>,
    ) -> Result<(), LogWriteError> {
        self.attach_all(stream)?;
        replay_contents(stream, &self.body.contents)
    }

    /// Writes the attachments, then at most `max_length` characters of text of the body, to
    /// `stream`.
    ///
    /// The text run that crosses the limit is cut, and nothing after it is written. Sections and
    /// markers that were entered are still ended, so the written tree is always well-formed.
    ///
    /// Returns true if anything was left out.
    pub fn truncated_write_to<S: LogSink>(
        &self,
        stream: &TestLogStreamWriter<'_, S>,
        max_length: usize,
    ) -> Result<bool, LogWriteError> {
        self.attach_all(stream)?;
        let mut state = TruncationState {
            remaining: max_length,
            truncated: false,
        };
        state.write_contents(stream, &self.body.contents)?;
        Ok(state.truncated)
    }

    /// Like [`truncated_write_to`](Self::truncated_write_to), with the limit set by
    /// [`TestLogConfig::max_structured_text_length`].
    pub fn truncated_write_to_with_config<S: LogSink>(
        &self,
        stream: &TestLogStreamWriter<'_, S>,
        config: &TestLogConfig,
    ) -> Result<bool, LogWriteError> {
        self.truncated_write_to(stream, config.max_structured_text_length())
    }

    fn attach_all<S: LogSink>(
        &self,
        stream: &TestLogStreamWriter<'_, S>,
    ) -> Result<(), LogWriteError> {
        let writer = stream.log_writer();
        for attachment in &self.attachments {
            writer.attach(attachment)?;
        }
        Ok(())
    }
}

struct TruncationState {
    remaining: usize,
    truncated: bool,
}

impl TruncationState {
    fn write_contents<S: LogSink>(
        &mut self,
        stream: &TestLogStreamWriter<'_, S>,
        contents: &[Tag],
    ) -> Result<(), LogWriteError> {
        for tag in contents {
            if self.truncated {
                break;
            }
            match tag {
                Tag::Section(section) => {
                    let region = stream.begin_section(&section.name)?;
                    self.write_contents(&*region, &section.contents)?;
                    region.end()?;
                }
                Tag::Marker(marker) => {
                    let region = stream.begin_marker(&marker.marker)?;
                    self.write_contents(&*region, &marker.contents)?;
                    region.end()?;
                }
                Tag::Text(text) => self.write_text(stream, &text.text)?,
                Tag::Embed(embed) => stream.embed_existing(&embed.attachment_name)?,
            }
        }
        Ok(())
    }

    fn write_text<S: LogSink>(
        &mut self,
        stream: &TestLogStreamWriter<'_, S>,
        text: &str,
    ) -> Result<(), LogWriteError> {
        match text.char_indices().nth(self.remaining) {
            Some((end, _)) => {
                stream.write(&text[..end])?;
                self.remaining = 0;
                self.truncated = true;
            }
            None => {
                stream.write(text)?;
                self.remaining -= text.chars().count();
            }
        }
        Ok(())
    }
}

impl From<&str> for StructuredText {
    fn from(text: &str) -> Self {
        Self::from(text.to_owned())
    }
}

impl From<String> for StructuredText {
    fn from(text: String) -> Self {
        let mut body = BodyTag::new();
        if !text.is_empty() {
            body.contents.push(Tag::Text(TextTag { text }));
        }
        Self::new(body, Vec::new())
    }
}

impl fmt::Display for StructuredText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.body, f)
    }
}

/// A single-stream writer that produces a [`StructuredText`].
///
/// Everything is written to the [default](stream_names::DEFAULT) stream of an in-memory log.
#[derive(Debug)]
pub struct StructuredTextWriter {
    writer: TestLogWriter<StructuredLogSink>,
}

impl StructuredTextWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self {
            writer: TestLogWriter::new(StructuredLogSink::new()),
        }
    }

    /// Returns the stream to write to.
    pub fn stream(&self) -> TestLogStreamWriter<'_, StructuredLogSink> {
        self.writer.default_stream()
    }

    /// Returns a snapshot of what has been written so far.
    ///
    /// Only attachments that are embedded in the text are included.
    pub fn to_structured_text(&self) -> StructuredText {
        self.writer.with_sink(|sink| {
            let body = sink.stream_body(stream_names::DEFAULT).unwrap_or_default();
            let attachments = body
                .embedded_attachment_names()
                .into_iter()
                .filter_map(|name| sink.attachment(name).cloned())
                .collect();
            StructuredText::new(body, attachments)
        })
    }
}

impl Default for StructuredTextWriter {
    fn default() -> Self {
        Self::new()
    }
}
