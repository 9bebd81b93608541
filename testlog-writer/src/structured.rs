// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory sink that builds a [`StructuredTestLog`].

use crate::{
    config::TestLogConfig, errors::LogWriteError, sink::LogSink, writer::TestLogWriter,
};
use indexmap::IndexMap;
use quick_testlog::{
    Attachment, BodyTag, EmbedTag, Marker, MarkerTag, SectionTag, SerializeError,
    StructuredTestLog, StructuredTestLogStream, Tag, TextTag,
};
use std::io;
use tracing::debug;

/// A sink that builds the tag tree of every stream in memory.
///
/// Consecutive writes to a stream are batched, and only become a [`TextTag`] when the stream is
/// flushed or some other tag is added to it. Carriage returns are normalized away at that point.
#[derive(Clone, Debug, Default)]
pub struct StructuredLogSink {
    streams: IndexMap<String, StreamState>,
    attachments: IndexMap<String, Attachment>,
}

#[derive(Clone, Debug, Default)]
struct StreamState {
    body: BodyTag,
    // Child indexes from the body down to the innermost open container.
    open: Vec<usize>,
    pending: String,
}

impl StreamState {
    fn current_contents(&mut self) -> &mut Vec<Tag> {
        let mut contents = &mut self.body.contents;
        for &index in &self.open {
            contents = contents[index]
                .contents_mut()
                .expect("open regions always index containers");
        }
        contents
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut text = std::mem::take(&mut self.pending);
        text.retain(|ch| ch != '\r');
        if text.is_empty() {
            return;
        }

        let contents = self.current_contents();
        match contents.last_mut() {
            // Text split by an explicit flush still forms a single run.
            Some(Tag::Text(last)) => last.text.push_str(&text),
            _ => contents.push(Tag::Text(TextTag { text })),
        }
    }

    fn push(&mut self, tag: Tag) {
        self.flush();
        self.current_contents().push(tag);
    }

    fn open(&mut self, tag: Tag) {
        self.flush();
        let contents = self.current_contents();
        contents.push(tag);
        let index = contents.len() - 1;
        self.open.push(index);
    }

    fn end(&mut self) -> bool {
        if self.open.is_empty() {
            return false;
        }
        self.flush();
        self.open.pop();
        true
    }
}

impl StructuredLogSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the log built so far.
    ///
    /// Buffered text is included in the snapshot but left buffered in the sink.
    pub fn to_log(&self) -> StructuredTestLog {
        let mut log = StructuredTestLog::new();
        for (name, state) in &self.streams {
            log.add_stream(StructuredTestLogStream {
                name: name.clone(),
                body: Self::snapshot_body(state),
            });
        }
        for attachment in self.attachments.values() {
            log.add_attachment(attachment.to_data());
        }
        log
    }

    /// Returns a snapshot of the named stream's body, if the stream exists.
    pub fn stream_body(&self, name: &str) -> Option<BodyTag> {
        self.streams.get(name).map(Self::snapshot_body)
    }

    /// Returns the attachment with the given name.
    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.get(name)
    }

    /// Returns the attachments stored so far, in the order they were attached.
    pub fn attachments(&self) -> impl ExactSizeIterator<Item = &Attachment> {
        self.attachments.values()
    }

    fn snapshot_body(state: &StreamState) -> BodyTag {
        let mut state = state.clone();
        state.flush();
        state.body
    }

    fn stream_state(&mut self, name: &str) -> &mut StreamState {
        let index = match self.streams.get_index_of(name) {
            Some(index) => index,
            None => {
                debug!(stream = name, "creating log stream");
                self.streams
                    .insert_full(name.to_owned(), StreamState::default())
                    .0
            }
        };
        &mut self.streams[index]
    }
}

impl LogSink for StructuredLogSink {
    fn attach(&mut self, attachment: &Attachment) -> Result<(), LogWriteError> {
        self.attachments
            .entry(attachment.name().to_owned())
            .or_insert_with(|| attachment.clone());
        Ok(())
    }

    fn stream_write(&mut self, stream: &str, text: &str) -> Result<(), LogWriteError> {
        self.stream_state(stream).pending.push_str(text);
        Ok(())
    }

    fn stream_embed(&mut self, stream: &str, attachment_name: &str) -> Result<(), LogWriteError> {
        self.stream_state(stream)
            .push(Tag::Embed(EmbedTag::new(attachment_name)));
        Ok(())
    }

    fn stream_begin_section(&mut self, stream: &str, name: &str) -> Result<(), LogWriteError> {
        self.stream_state(stream)
            .open(Tag::Section(SectionTag::new(name)));
        Ok(())
    }

    fn stream_begin_marker(&mut self, stream: &str, marker: &Marker) -> Result<(), LogWriteError> {
        self.stream_state(stream)
            .open(Tag::Marker(MarkerTag::new(marker.clone())));
        Ok(())
    }

    fn stream_end(&mut self, stream: &str) -> Result<(), LogWriteError> {
        if self.stream_state(stream).end() {
            Ok(())
        } else {
            Err(LogWriteError::NoOpenRegion {
                stream: stream.to_owned(),
            })
        }
    }

    fn stream_flush(&mut self, stream: &str) -> Result<(), LogWriteError> {
        if let Some(state) = self.streams.get_mut(stream) {
            state.flush();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogWriteError> {
        for state in self.streams.values_mut() {
            state.flush();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), LogWriteError> {
        self.flush()?;
        debug!(
            streams = self.streams.len(),
            attachments = self.attachments.len(),
            "structured test log complete"
        );
        Ok(())
    }
}

impl TestLogWriter<StructuredLogSink> {
    /// Returns a snapshot of the log written so far.
    pub fn to_log(&self) -> StructuredTestLog {
        self.with_sink(StructuredLogSink::to_log)
    }

    /// Serializes a snapshot of the log as XML, indented as `config` specifies.
    pub fn serialize_with_config(
        &self,
        writer: impl io::Write,
        config: &TestLogConfig,
    ) -> Result<(), SerializeError> {
        self.to_log().serialize_with_indent(writer, config.xml_indent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(text: &str) -> Tag {
        Tag::Text(TextTag::new(text))
    }

    #[test]
    fn builds_tree_and_batches_text() {
        let mut sink = StructuredLogSink::new();
        sink.stream_write("Log", "a").unwrap();
        sink.stream_write("Log", "b\r\n").unwrap();
        sink.stream_begin_section("Log", "S").unwrap();
        sink.stream_write("Log", "c\r").unwrap();
        sink.stream_begin_marker("Log", &Marker::highlight()).unwrap();
        sink.stream_write("Log", "d").unwrap();
        sink.stream_end("Log").unwrap();
        sink.stream_embed("Log", "shot").unwrap();
        sink.stream_end("Log").unwrap();
        sink.stream_write("Log", "tail").unwrap();

        let expected = BodyTag {
            contents: vec![
                text("ab\n"),
                Tag::Section(SectionTag {
                    name: "S".to_owned(),
                    contents: vec![
                        text("c"),
                        Tag::Marker(MarkerTag {
                            marker: Marker::highlight(),
                            contents: vec![text("d")],
                        }),
                        Tag::Embed(EmbedTag::new("shot")),
                    ],
                }),
                text("tail"),
            ],
        };
        assert_eq!(sink.stream_body("Log"), Some(expected.clone()));

        // The snapshot flushed a copy; the live stream still has the text pending.
        assert_eq!(sink.streams["Log"].pending, "tail");
        sink.close().unwrap();
        assert_eq!(sink.streams["Log"].body, expected);
    }

    #[test]
    fn end_without_open_region() {
        let mut sink = StructuredLogSink::new();
        sink.stream_write("Log", "x").unwrap();
        assert!(matches!(
            sink.stream_end("Log"),
            Err(LogWriteError::NoOpenRegion { stream }) if stream == "Log"
        ));
        assert_eq!(sink.streams["Log"].pending, "x", "nothing was flushed");
    }

    #[test]
    fn flush_merges_adjacent_text() {
        let mut sink = StructuredLogSink::new();
        sink.stream_write("Log", "one ").unwrap();
        sink.stream_flush("Log").unwrap();
        sink.stream_write("Log", "two").unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.stream_body("Log").unwrap().contents, vec![text("one two")]);
    }

    #[test]
    fn to_log_includes_attachments_in_order() {
        let mut sink = StructuredLogSink::new();
        sink.attach(&Attachment::plain_text(Some("b"), "2")).unwrap();
        sink.attach(&Attachment::plain_text(Some("a"), "1")).unwrap();
        sink.stream_write("Warnings", "careful").unwrap();

        let log = sink.to_log();
        let names: Vec<_> = log.attachments().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(
            log.stream("Warnings").unwrap().body.contents,
            vec![text("careful")]
        );
    }

    #[test]
    fn serialize_with_config_uses_configured_indent() {
        let writer = TestLogWriter::new(StructuredLogSink::new());
        writer.stream("Log").unwrap().write("hello").unwrap();
        writer.close().unwrap();

        let config = TestLogConfig::from_toml_str("[xml]\nindent = 0").unwrap();
        let mut compact = Vec::new();
        writer.serialize_with_config(&mut compact, &config).unwrap();
        let compact = String::from_utf8(compact).unwrap();
        assert!(!compact.contains('\n'), "compact output: {compact}");

        let config = TestLogConfig::from_toml_str("[xml]\nindent = 2").unwrap();
        let mut indented = Vec::new();
        writer.serialize_with_config(&mut indented, &config).unwrap();
        let indented = String::from_utf8(indented).unwrap();
        assert!(indented.contains("\n  <streams>"), "indented output: {indented}");

        for xml in [&compact, &indented] {
            assert_eq!(StructuredTestLog::from_xml_str(xml).unwrap(), writer.to_log());
        }
    }
}
