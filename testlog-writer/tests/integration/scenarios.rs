// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;
use camino_tempfile::tempdir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use quick_testlog::{
    AttachmentContent, ImageFormat, Marker, StructuredTestLog, Tag, TextTag, stream_names,
};
use serde::Serialize;
use std::{fs::File, io::BufWriter, sync::Arc};
use testlog_writer::{
    config::TestLogConfig,
    errors::LogWriteError,
    fallback::FallbackSink,
    replay::flatten_log,
    sink::LogSink,
    structured::StructuredLogSink,
    structured_text::StructuredTextWriter,
    textual::{FlattenMode, TextualLogSink},
    writer::TestLogWriter,
};

#[test]
fn condensed_section_heading() {
    let writer = TestLogWriter::new(TextualLogSink::new(String::new(), FlattenMode::Condensed));
    {
        let steps = writer.default_stream().begin_section("Steps").unwrap();
        steps.write("ok").unwrap();
    }
    writer.close().unwrap();
    assert_eq!(writer.into_sink().into_inner(), "Steps\nok\n");
}

#[test]
fn textual_sink_writes_to_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    let file = BufWriter::new(File::create(&path).unwrap());
    let writer = TestLogWriter::new(TextualLogSink::new(file, FlattenMode::Verbose));
    let stream = writer.console_error();
    stream.write_line("error: boom").unwrap();
    {
        let trace = stream.begin_marker(&Marker::stack_trace()).unwrap();
        trace.write("at main").unwrap();
    }
    writer.close().unwrap();
    drop(writer);

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "error: boom\n[Marker 'StackTrace']at main[End]"
    );
}

#[derive(Serialize)]
struct Failure {
    expected: u32,
    actual: u32,
}

#[test]
fn assertion_failure_log() {
    let config = TestLogConfig::from_toml_str(indoc! {r#"
        [structured-text]
        max-length = 12

        [xml]
        indent = 2
    "#})
    .unwrap();

    // Format a value with highlights, then write it truncated into the log.
    let formatted = StructuredTextWriter::new();
    {
        let value = formatted.stream();
        value.write("[1, 2, ").unwrap();
        value.write_highlighted("3").unwrap();
        value.write(", 4, 5, 6, 7]").unwrap();
    }
    let formatted = formatted.to_structured_text();

    let writer = TestLogWriter::new(StructuredLogSink::new());
    let failures = writer.failures();
    {
        let failure = failures.begin_marker(&Marker::assertion_failure()).unwrap();
        {
            let label = failure.begin_marker(&Marker::label()).unwrap();
            label.write("Actual Value").unwrap();
        }
        failure.write(": ").unwrap();
        if formatted
            .truncated_write_to_with_config(&*failure, &config)
            .unwrap()
        {
            failure.write_ellipsis().unwrap();
        }
        failure
            .embed_object_as_xml(
                Some("values"),
                &Failure {
                    expected: 4,
                    actual: 3,
                },
            )
            .unwrap();
        let location = failure
            .begin_marker(&Marker::code_location("tests/math.rs", Some(10), Some(5)))
            .unwrap();
        location.write("\ntests/math.rs:10").unwrap();
        location.end().unwrap();
    }
    failures
        .embed_image(Some("screenshot"), ImageFormat::Png, b"\x89PNG")
        .unwrap();
    writer.close().unwrap();

    let mut xml = Vec::new();
    writer.serialize_with_config(&mut xml, &config).unwrap();
    let xml = String::from_utf8(xml).unwrap();

    assert_eq!(
        xml,
        indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <testLog>
              <streams>
                <stream name="Failures">
                  <body>
                    <contents>
                      <marker class="AssertionFailure">
                        <contents>
                          <marker class="Label">
                            <contents>
                              <text>Actual Value</text>
                            </contents>
                          </marker>
                          <text>: [1, 2, </text>
                          <marker class="Highlight">
                            <contents>
                              <text>3</text>
                            </contents>
                          </marker>
                          <text>, 4,</text>
                          <marker class="Ellipsis">
                            <contents>
                              <text>...</text>
                            </contents>
                          </marker>
                          <embed attachmentName="values"/>
                          <marker class="CodeLocation">
                            <attributes>
                              <attribute name="path" value="tests/math.rs"/>
                              <attribute name="line" value="10"/>
                              <attribute name="column" value="5"/>
                            </attributes>
                            <contents>
                              <text>
            tests/math.rs:10</text>
                            </contents>
                          </marker>
                        </contents>
                      </marker>
                      <embed attachmentName="screenshot"/>
                    </contents>
                  </body>
                </stream>
              </streams>
              <attachments>
                <attachment name="values" contentType="text/xml" encoding="Text" contentDisposition="Inline">&lt;Failure&gt;&lt;expected&gt;4&lt;/expected&gt;&lt;actual&gt;3&lt;/actual&gt;&lt;/Failure&gt;</attachment>
                <attachment name="screenshot" contentType="image/png" encoding="Binary" contentDisposition="Inline">iVBORw==</attachment>
              </attachments>
            </testLog>
        "#}
    );

    let read = StructuredTestLog::from_xml_str(&xml).unwrap();
    assert_eq!(read, writer.to_log());
    let screenshot = read.attachment("screenshot").unwrap().to_attachment().unwrap();
    assert_eq!(
        screenshot.content(),
        &AttachmentContent::Binary(Bytes::from_static(b"\x89PNG"))
    );
}

#[test]
fn flattening_a_recorded_log() {
    let writer = TestLogWriter::new(StructuredLogSink::new());
    writer.console_output().write_line("running 1 test").unwrap();
    {
        let steps = writer.default_stream().begin_section("Steps").unwrap();
        steps.write_line("open the door").unwrap();
        steps
            .embed_plain_text(Some("door.txt"), "the door")
            .unwrap();
    }
    writer.close().unwrap();
    let log = writer.to_log();

    let mode = TestLogConfig::default_config().flatten_mode();
    assert_eq!(
        flatten_log(&log, mode).unwrap(),
        indoc! {"
            running 1 test
            Steps
            open the door
        "}
    );
    assert_eq!(
        flatten_log(&log, FlattenMode::Verbose).unwrap(),
        indoc! {"
            [Attachment 'door.txt': text/plain]
            running 1 test
            [Section 'Steps']
            open the door
            [Embedded Attachment 'door.txt']
            [End]
        "}
    );
}

#[test]
fn boxed_sinks_behind_a_fallback() {
    let sink: Box<dyn LogSink> = Box::new(StructuredLogSink::new());
    let primary = Arc::new(TestLogWriter::new(sink));
    let console = Arc::new(TestLogWriter::new(TextualLogSink::new(
        String::new(),
        FlattenMode::Condensed,
    )));
    let writer = TestLogWriter::new(FallbackSink::new(primary.clone(), console.clone()));

    let output = writer.console_output();
    output.write_line("during the test").unwrap();
    primary.close().unwrap();
    output.write_line("after the test").unwrap();
    output.flush().unwrap();
    writer.close().unwrap();

    // The fallback sink holds the other reference to each writer.
    drop(writer);
    let console = Arc::into_inner(console).unwrap();
    console.close().unwrap();
    assert_eq!(console.into_sink().into_inner(), "after the test\n");

    assert!(primary.is_closed());
    let error = primary.console_output().write("late").unwrap_err();
    assert!(matches!(error, LogWriteError::Closed));
}

#[test]
fn log_json_form() {
    let writer = TestLogWriter::new(StructuredLogSink::new());
    writer.debug_trace().write("trace").unwrap();
    writer.close().unwrap();
    let log = writer.to_log();

    let json = serde_json::to_value(&log).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "streams": [
                {
                    "name": "DebugTrace",
                    "body": { "contents": [ { "text": { "text": "trace" } } ] },
                },
            ],
            "attachments": [],
        })
    );
    let read: StructuredTestLog = serde_json::from_value(json).unwrap();
    assert_eq!(
        read.stream(stream_names::DEBUG_TRACE).unwrap().body.contents,
        vec![Tag::Text(TextTag::new("trace"))]
    );
}
