// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

// ---
// Replay and truncation laws over arbitrary tag trees.
// ---

use pretty_assertions::assert_eq;
use proptest::{collection::vec, prelude::*};
use quick_testlog::{
    Attachment, BodyTag, EmbedTag, Marker, MarkerTag, SectionTag, StructuredTestLog, Tag, TextTag,
};
use test_strategy::proptest;
use testlog_writer::{
    replay::replay_body,
    structured::StructuredLogSink,
    structured_text::{StructuredText, StructuredTextWriter},
    writer::TestLogWriter,
};

const ATTACHMENT_NAMES: [&str; 3] = ["first", "second", "third"];

fn attachments() -> Vec<Attachment> {
    ATTACHMENT_NAMES
        .iter()
        .map(|&name| Attachment::plain_text(Some(name), format!("contents of {name}")))
        .collect()
}

fn arb_marker() -> impl Strategy<Value = Marker> {
    prop_oneof![
        Just(Marker::highlight()),
        Just(Marker::stack_trace()),
        Just(Marker::link("https://example.com/log")),
        Just(Marker::code_location("src/lib.rs", Some(4), Some(2))),
    ]
}

fn arb_tag() -> impl Strategy<Value = Tag> {
    let leaf = prop_oneof![
        "[a-zé \\r\\n]{0,8}".prop_map(|text| Tag::Text(TextTag::new(text))),
        proptest::sample::select(ATTACHMENT_NAMES.to_vec())
            .prop_map(|name| Tag::Embed(EmbedTag::new(name))),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            ("[A-Za-z][A-Za-z ]{0,6}", vec(inner.clone(), 0..4)).prop_map(|(name, contents)| {
                Tag::Section(SectionTag { name, contents })
            }),
            (arb_marker(), vec(inner, 0..4))
                .prop_map(|(marker, contents)| Tag::Marker(MarkerTag { marker, contents })),
        ]
    })
}

fn arb_body() -> impl Strategy<Value = BodyTag> {
    vec(arb_tag(), 0..6).prop_map(|contents| BodyTag { contents })
}

/// Drops carriage returns and empty text runs, and merges adjacent text runs: the shape a tree
/// has after being written through a structured sink.
fn normalize(contents: &[Tag]) -> Vec<Tag> {
    let mut out: Vec<Tag> = Vec::new();
    for tag in contents {
        match tag {
            Tag::Text(text) => {
                let text: String = text.text.chars().filter(|&ch| ch != '\r').collect();
                if text.is_empty() {
                    continue;
                }
                match out.last_mut() {
                    Some(Tag::Text(last)) => last.text.push_str(&text),
                    _ => out.push(Tag::Text(TextTag { text })),
                }
            }
            Tag::Section(section) => out.push(Tag::Section(SectionTag {
                name: section.name.clone(),
                contents: normalize(&section.contents),
            })),
            Tag::Marker(marker) => out.push(Tag::Marker(MarkerTag {
                marker: marker.marker.clone(),
                contents: normalize(&marker.contents),
            })),
            Tag::Embed(embed) => out.push(Tag::Embed(embed.clone())),
        }
    }
    out
}

fn normalized_text(body: &BodyTag) -> StructuredText {
    StructuredText::new(
        BodyTag {
            contents: normalize(&body.contents),
        },
        attachments(),
    )
}

#[proptest(cases = 64)]
fn replay_rebuilds_the_tree(#[strategy(arb_body())] body: BodyTag) {
    let writer = TestLogWriter::new(StructuredLogSink::new());
    for attachment in attachments() {
        writer.attach(&attachment).unwrap();
    }
    replay_body(&writer.default_stream(), &body).unwrap();
    writer.close().unwrap();

    let actual = writer
        .with_sink(|sink| sink.stream_body("Log"))
        .unwrap_or_default();
    assert_eq!(actual.contents, normalize(&body.contents));
}

#[proptest(cases = 64)]
fn xml_preserves_replayed_logs(#[strategy(arb_body())] body: BodyTag) {
    let writer = TestLogWriter::new(StructuredLogSink::new());
    normalized_text(&body)
        .write_to(&writer.debug_trace())
        .unwrap();
    writer.close().unwrap();
    let log = writer.to_log();

    let xml = log.to_string().unwrap();
    assert_eq!(StructuredTestLog::from_xml_str(&xml).unwrap(), log);
}

#[proptest(cases = 64)]
fn truncation_respects_the_limit(
    #[strategy(arb_body())] body: BodyTag,
    #[strategy(0usize..40)] max_length: usize,
) {
    let input = normalized_text(&body);
    let output = StructuredTextWriter::new();
    let truncated = input
        .truncated_write_to(&output.stream(), max_length)
        .unwrap();
    let output = output.to_structured_text();

    assert!(output.text_length() <= max_length);
    assert_eq!(truncated, input.text_length() > max_length);
    if !truncated {
        assert_eq!(output.body(), input.body());
    }
}

#[proptest(cases = 64)]
fn truncated_text_is_a_prefix(
    #[strategy(arb_body())] body: BodyTag,
    #[strategy(0usize..40)] max_length: usize,
) {
    let input = normalized_text(&body);
    let output = StructuredTextWriter::new();
    input
        .truncated_write_to(&output.stream(), max_length)
        .unwrap();
    let output = output.to_structured_text();

    let full = collect_text(&input.body().contents);
    let cut = collect_text(&output.body().contents);
    assert!(full.starts_with(&cut), "{cut:?} is not a prefix of {full:?}");
}

fn collect_text(contents: &[Tag]) -> String {
    let mut out = String::new();
    for tag in contents {
        match tag {
            Tag::Text(text) => out.push_str(&text.text),
            Tag::Section(SectionTag { contents, .. }) | Tag::Marker(MarkerTag { contents, .. }) => {
                out.push_str(&collect_text(contents));
            }
            Tag::Embed(_) => {}
        }
    }
    out
}
