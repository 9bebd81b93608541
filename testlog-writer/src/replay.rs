// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replays recorded tag trees and logs into a writer.
//!
//! Replaying walks a tree in pre-order and issues the same `write`, `begin_*`, `embed` and `end`
//! calls that built it, so a tree recorded with one sink can be rendered through any other.

use crate::{
    errors::LogWriteError,
    sink::LogSink,
    textual::{FlattenMode, TextualLogSink},
    writer::{TestLogStreamWriter, TestLogWriter},
};
use quick_testlog::{BodyTag, StructuredTestLog, Tag};

/// Replays a stream body into `stream`.
///
/// Every attachment embedded in `body` must already be attached to the stream's log writer.
pub fn replay_body<S: LogSink>(
    stream: &TestLogStreamWriter<'_, S>,
    body: &BodyTag,
) -> Result<(), LogWriteError> {
    replay_contents(stream, &body.contents)
}

pub(crate) fn replay_contents<S: LogSink>(
    stream: &TestLogStreamWriter<'_, S>,
    contents: &[Tag],
) -> Result<(), LogWriteError> {
    for tag in contents {
        match tag {
            Tag::Section(section) => {
                let region = stream.begin_section(&section.name)?;
                replay_contents(&*region, &section.contents)?;
                region.end()?;
            }
            Tag::Marker(marker) => {
                let region = stream.begin_marker(&marker.marker)?;
                replay_contents(&*region, &marker.contents)?;
                region.end()?;
            }
            Tag::Text(text) => stream.write(&text.text)?,
            Tag::Embed(embed) => stream.embed_existing(&embed.attachment_name)?,
        }
    }
    Ok(())
}

/// Replays a whole log into `writer`: every attachment first, then every stream in order.
///
/// Fails with [`LogWriteError::AttachmentContent`] if an attachment is linked rather than
/// inline, since its contents are not part of the log.
pub fn replay_log<S: LogSink>(
    log: &StructuredTestLog,
    writer: &TestLogWriter<S>,
) -> Result<(), LogWriteError> {
    for data in log.attachments() {
        writer.attach(&data.to_attachment()?)?;
    }
    for stream in log.streams() {
        replay_body(&writer.stream(&stream.name)?, &stream.body)?;
    }
    Ok(())
}

/// Flattens a log to text.
pub fn flatten_log(log: &StructuredTestLog, mode: FlattenMode) -> Result<String, LogWriteError> {
    let writer = TestLogWriter::new(TextualLogSink::new(String::new(), mode));
    replay_log(log, &writer)?;
    writer.close()?;
    Ok(writer.into_sink().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::StructuredLogSink;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use quick_testlog::{
        Attachment, AttachmentContentError, Marker, MarkerTag, TextTag, stream_names,
    };

    fn sample_log() -> StructuredTestLog {
        let writer = TestLogWriter::new(StructuredLogSink::new());
        let log = writer.default_stream();
        log.write_line("starting").unwrap();
        {
            let section = log.begin_section("Steps").unwrap();
            section.write("step ").unwrap();
            section.write_highlighted("one").unwrap();
            section
                .embed(&Attachment::plain_text(Some("notes"), "n"))
                .unwrap();
        }
        writer.warnings().write("careful").unwrap();
        writer.close().unwrap();
        writer.to_log()
    }

    #[test]
    fn replay_reproduces_log() {
        let log = sample_log();
        let writer = TestLogWriter::new(StructuredLogSink::new());
        replay_log(&log, &writer).unwrap();
        writer.close().unwrap();
        assert_eq!(writer.to_log(), log);
    }

    #[test]
    fn flatten_modes() {
        let log = sample_log();
        assert_eq!(
            flatten_log(&log, FlattenMode::Condensed).unwrap(),
            indoc! {"
                starting
                Steps
                step one
                careful"}
        );
        assert_eq!(
            flatten_log(&log, FlattenMode::Verbose).unwrap(),
            indoc! {"
                [Attachment 'notes': text/plain]
                starting
                [Section 'Steps']
                step [Marker 'Highlight']one[End][Embedded Attachment 'notes']
                [End]
                careful"}
        );
    }

    #[test]
    fn linked_attachments_cannot_be_replayed() {
        let mut log = StructuredTestLog::new();
        log.add_attachment(
            Attachment::plain_text(Some("big"), "contents")
                .to_data()
                .into_linked("big.txt"),
        );
        let error = flatten_log(&log, FlattenMode::Condensed).unwrap_err();
        assert!(
            matches!(
                error,
                LogWriteError::AttachmentContent(AttachmentContentError::NotAvailable { .. })
            ),
            "{error:?}"
        );
    }

    #[test]
    fn replayed_body_keeps_marker_attributes() {
        let mut body = BodyTag::new();
        let marker = Marker::code_location("src/lib.rs", Some(12), None);
        body.contents.push(Tag::Marker(MarkerTag {
            marker,
            contents: vec![Tag::Text(TextTag::new("src/lib.rs:12"))],
        }));

        let writer = TestLogWriter::new(StructuredLogSink::new());
        replay_body(&writer.failures(), &body).unwrap();
        let log = writer.to_log();
        assert_eq!(log.stream(stream_names::FAILURES).unwrap().body, body);
    }
}
