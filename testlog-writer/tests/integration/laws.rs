// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::capture::capture_logs;
use pretty_assertions::assert_eq;
use quick_testlog::{
    Attachment, BodyTag, EmbedTag, InvalidIdentifier, InvalidName, Marker, MarkerTag, SectionTag,
    StructuredTestLog, Tag, TextTag, stream_names,
};
use testlog_writer::{
    errors::{LogWriteError, LogWriteErrorKind},
    structured::StructuredLogSink,
    writer::{Region, TestLogWriter},
};

fn new_writer() -> TestLogWriter<StructuredLogSink> {
    TestLogWriter::new(StructuredLogSink::new())
}

fn body(writer: &TestLogWriter<StructuredLogSink>, stream: &str) -> BodyTag {
    writer
        .with_sink(|sink| sink.stream_body(stream))
        .unwrap_or_default()
}

#[test]
fn extra_end_fails_and_leaves_tree_unchanged() {
    let writer = new_writer();
    let log = writer.default_stream();

    let outer = log.begin_section("outer").unwrap();
    let inner = outer.begin_marker(&Marker::stack_trace()).unwrap();
    inner.write("frame 0").unwrap();
    inner.end().unwrap();
    outer.end().unwrap();

    let before = body(&writer, stream_names::DEFAULT);
    let error = log.end().unwrap_err();
    assert_eq!(error.kind(), LogWriteErrorKind::InvalidState);
    assert_eq!(body(&writer, stream_names::DEFAULT), before);

    assert_eq!(
        before.contents,
        vec![Tag::Section(SectionTag {
            name: "outer".to_owned(),
            contents: vec![Tag::Marker(MarkerTag {
                marker: Marker::stack_trace(),
                contents: vec![Tag::Text(TextTag::new("frame 0"))],
            })],
        })]
    );
}

#[test]
fn ends_close_the_innermost_region() {
    let writer = new_writer();
    let log = writer.default_stream();

    // Ending through the stream writer rather than the guards still closes regions in LIFO order.
    log.begin_section("a").unwrap().keep_open();
    log.begin_section("b").unwrap().keep_open();
    log.write("in b").unwrap();
    log.end().unwrap();
    log.write("in a").unwrap();
    log.end().unwrap();

    assert_eq!(
        body(&writer, stream_names::DEFAULT).contents,
        vec![Tag::Section(SectionTag {
            name: "a".to_owned(),
            contents: vec![
                Tag::Section(SectionTag {
                    name: "b".to_owned(),
                    contents: vec![Tag::Text(TextTag::new("in b"))],
                }),
                Tag::Text(TextTag::new("in a")),
            ],
        })]
    );
}

#[test]
fn attachment_shared_between_streams_is_stored_once() {
    let writer = new_writer();
    let shot = Attachment::plain_text(Some("shot"), "pixels");

    writer.console_output().embed(&shot).unwrap();
    writer.failures().embed(&shot).unwrap();

    let error = writer
        .attach(&Attachment::plain_text(Some("shot"), "other pixels"))
        .unwrap_err();
    assert!(matches!(error, LogWriteError::DuplicateAttachment { ref name } if name == "shot"));
    assert_eq!(error.kind(), LogWriteErrorKind::InvalidState);

    writer.close().unwrap();
    let log = writer.to_log();
    assert_eq!(log.attachments().len(), 1);
    assert_eq!(log.attachment("shot").unwrap().text().unwrap(), "pixels");

    let embed = vec![Tag::Embed(EmbedTag::new("shot"))];
    assert_eq!(
        log.stream(stream_names::CONSOLE_OUTPUT).unwrap().body.contents,
        embed
    );
    assert_eq!(
        log.stream(stream_names::FAILURES).unwrap().body.contents,
        embed
    );
}

#[test]
fn close_twice_is_a_no_op() {
    let writer = new_writer();
    writer.default_stream().write("text").unwrap();
    writer.close().unwrap();
    let after_first = writer.to_log();

    writer.close().unwrap();
    assert!(writer.is_closed());
    assert_eq!(writer.to_log(), after_first);

    let error = writer.default_stream().write("late").unwrap_err();
    assert!(matches!(error, LogWriteError::Closed));
    assert_eq!(writer.to_log(), after_first);
}

#[test]
fn identifiers_are_validated() {
    assert!(matches!(
        Marker::new("bad class!"),
        Err(InvalidIdentifier::InvalidChar(_))
    ));
    assert!(Marker::new("valid_123").is_ok());

    let writer = new_writer();
    let error = writer
        .default_stream()
        .begin_section("")
        .map(|region| region.keep_open())
        .unwrap_err();
    assert_eq!(error.kind(), LogWriteErrorKind::InvalidArgument);

    let error = LogWriteError::from(Marker::new("").unwrap_err());
    assert_eq!(error.kind(), LogWriteErrorKind::InvalidArgument);

    writer.close().unwrap();
    assert_eq!(writer.to_log().streams().len(), 0, "nothing was written");
}

#[test]
fn names_round_trip_through_xml() {
    let writer = new_writer();
    writer.attach_plain_text(Some("shot"), "one").unwrap();

    // A name that differs only by a character XML cannot carry would collide once written out.
    let error = writer
        .attach(&Attachment::plain_text(Some("shot\u{7}"), "two"))
        .unwrap_err();
    assert!(matches!(
        error,
        LogWriteError::InvalidName {
            kind: "attachment",
            error: InvalidName::InvalidChar { ch: '\u{7}', .. },
        }
    ));
    assert_eq!(error.kind(), LogWriteErrorKind::InvalidArgument);

    let error = writer
        .default_stream()
        .begin_section("a\u{1}b")
        .map(Region::keep_open)
        .unwrap_err();
    assert!(matches!(error, LogWriteError::InvalidName { kind: "section", .. }));

    let error = writer.stream("out\u{0}").unwrap_err();
    assert!(matches!(error, LogWriteError::InvalidName { kind: "stream", .. }));

    // An empty attachment name is replaced with a generated one.
    let unnamed = writer
        .default_stream()
        .embed_plain_text(Some(""), "contents")
        .unwrap();
    assert!(!unnamed.name().is_empty());

    writer
        .stream("step 1: setup")
        .unwrap()
        .begin_section("résumé <draft>")
        .unwrap()
        .end()
        .unwrap();
    writer.close().unwrap();

    let log = writer.to_log();
    assert_eq!(log.attachments().len(), 2);
    let xml = log.to_string().unwrap();
    assert_eq!(StructuredTestLog::from_xml_str(&xml).unwrap(), log);
}

#[test]
fn close_reports_unterminated_regions() {
    let writer = new_writer();
    let log = writer.default_stream();

    let ((), logged) = capture_logs(|| {
        log.begin_section("open").unwrap().keep_open();
        log.write("inside").unwrap();
        writer.close().unwrap();
    });
    assert!(
        logged.contains("test log closed with unterminated sections or markers"),
        "unexpected output: {logged}"
    );

    // Pending text is flushed into the region that was left open.
    assert_eq!(
        body(&writer, stream_names::DEFAULT).contents,
        vec![Tag::Section(SectionTag {
            name: "open".to_owned(),
            contents: vec![Tag::Text(TextTag::new("inside"))],
        })]
    );
}

#[test]
fn dropped_region_that_was_already_ended() {
    let writer = new_writer();
    let log = writer.failures();

    let ((), logged) = capture_logs(|| {
        let region = log.begin_section("ended early").unwrap();
        log.end().unwrap();
        drop(region);
    });
    assert!(
        logged.contains("failed to end region on drop"),
        "unexpected output: {logged}"
    );

    // Nothing else was ended: the next end still fails.
    assert!(matches!(log.end(), Err(LogWriteError::NoOpenRegion { .. })));
}

#[test]
fn unknown_embed_target_is_rejected() {
    let writer = new_writer();
    let log = writer.warnings();
    log.write("see ").unwrap();
    let error = log.embed_existing("missing").unwrap_err();
    assert!(matches!(error, LogWriteError::UnknownAttachment { ref name } if name == "missing"));

    writer.attach_plain_text(Some("present"), "p").unwrap();
    log.embed_existing("present").unwrap();
    assert_eq!(
        body(&writer, stream_names::WARNINGS).contents,
        vec![
            Tag::Text(TextTag::new("see ")),
            Tag::Embed(EmbedTag::new("present")),
        ]
    );
}

#[test]
fn concurrent_streams() {
    const THREADS: usize = 4;
    const LINES: usize = 50;

    let writer = new_writer();
    let shared = Attachment::plain_text(Some("shared"), "shared contents");

    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            let writer = &writer;
            let shared = &shared;
            scope.spawn(move || {
                let stream = writer.stream(&format!("worker-{thread}")).unwrap();
                for line in 0..LINES {
                    let section = stream.begin_section(&format!("line {line}")).unwrap();
                    section.write_line(&format!("{thread}:{line}")).unwrap();
                    section.embed(shared).unwrap();
                    section.end().unwrap();
                }
            });
        }
    });

    writer.close().unwrap();
    let log = writer.to_log();
    assert_eq!(log.attachments().len(), 1);
    assert_eq!(log.streams().len(), THREADS);

    for thread in 0..THREADS {
        let stream = log.stream(&format!("worker-{thread}")).unwrap();
        let expected: Vec<_> = (0..LINES)
            .map(|line| {
                Tag::Section(SectionTag {
                    name: format!("line {line}"),
                    contents: vec![
                        Tag::Text(TextTag::new(format!("{thread}:{line}\n"))),
                        Tag::Embed(EmbedTag::new("shared")),
                    ],
                })
            })
            .collect();
        assert_eq!(stream.body.contents, expected);
    }
}
