// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::capture::capture_logs;
use camino_tempfile::tempdir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use quick_testlog::Marker;
use testlog_writer::{
    config::TestLogConfig,
    replay::flatten_log,
    structured::StructuredLogSink,
    structured_text::StructuredText,
    textual::FlattenMode,
    writer::TestLogWriter,
};

#[test]
fn explicit_config_file_drives_the_writers() {
    let dir = tempdir().unwrap();
    let config_file = dir.path().join("custom.toml");
    std::fs::write(
        &config_file,
        indoc! {r#"
            [flatten]
            mode = "verbose"

            [structured-text]
            max-length = 4
        "#},
    )
    .unwrap();

    let config = TestLogConfig::from_sources(dir.path(), Some(&config_file)).unwrap();
    assert_eq!(config.flatten_mode(), FlattenMode::Verbose);
    assert_eq!(config.max_structured_text_length(), 4);
    assert_eq!(config.xml_indent(), 4);

    let writer = TestLogWriter::new(StructuredLogSink::new());
    {
        let trace = writer
            .default_stream()
            .begin_marker(&Marker::stack_trace())
            .unwrap();
        let truncated = StructuredText::from("at main()")
            .truncated_write_to_with_config(&*trace, &config)
            .unwrap();
        assert!(truncated);
        trace.write_ellipsis().unwrap();
    }
    writer.close().unwrap();

    assert_eq!(
        flatten_log(&writer.to_log(), config.flatten_mode()).unwrap(),
        "[Marker 'StackTrace']at m[Marker 'Ellipsis']...[End][End]"
    );
}

#[test]
fn unknown_keys_are_logged() {
    let (config, logged) = capture_logs(|| {
        TestLogConfig::from_toml_str(indoc! {r#"
            [xml]
            indent = 2
            pretty = true
        "#})
    });
    assert_eq!(config.unwrap().xml_indent(), 2);

    assert!(
        logged.contains("ignoring unknown configuration keys in config file <inline>: xml.pretty"),
        "unexpected output: {logged}"
    );
}
