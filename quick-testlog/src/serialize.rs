// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `StructuredTestLog` as XML.

use crate::{
    AttachmentData, BodyTag, Marker, MarkerTag, SectionTag, StructuredTestLog,
    StructuredTestLogStream, Tag,
};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{borrow::Cow, io};

pub(crate) static TEST_LOG_TAG: &str = "testLog";
pub(crate) static STREAMS_TAG: &str = "streams";
pub(crate) static STREAM_TAG: &str = "stream";
pub(crate) static BODY_TAG: &str = "body";
pub(crate) static CONTENTS_TAG: &str = "contents";
pub(crate) static SECTION_TAG: &str = "section";
pub(crate) static MARKER_TAG: &str = "marker";
pub(crate) static MARKER_ATTRIBUTES_TAG: &str = "attributes";
pub(crate) static MARKER_ATTRIBUTE_TAG: &str = "attribute";
pub(crate) static TEXT_TAG: &str = "text";
pub(crate) static EMBED_TAG: &str = "embed";
pub(crate) static ATTACHMENTS_TAG: &str = "attachments";
pub(crate) static ATTACHMENT_TAG: &str = "attachment";

pub(crate) static NAME_ATTR: &str = "name";
pub(crate) static VALUE_ATTR: &str = "value";
pub(crate) static CLASS_ATTR: &str = "class";
pub(crate) static ATTACHMENT_NAME_ATTR: &str = "attachmentName";
pub(crate) static CONTENT_TYPE_ATTR: &str = "contentType";
pub(crate) static ENCODING_ATTR: &str = "encoding";
pub(crate) static CONTENT_DISPOSITION_ATTR: &str = "contentDisposition";
pub(crate) static CONTENT_PATH_ATTR: &str = "contentPath";

pub(crate) fn serialize_log(
    log: &StructuredTestLog,
    writer: impl io::Write,
    indent: usize,
) -> quick_xml::Result<()> {
    let mut writer = if indent == 0 {
        Writer::new(writer)
    } else {
        Writer::new_with_indent(writer, b' ', indent)
    };

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    serialize_log_impl(log, &mut writer)?;

    // Add a trailing newline.
    writer.write_indent()
}

fn serialize_log_impl(
    log: &StructuredTestLog,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    serialize_empty_start_tag(TEST_LOG_TAG, writer)?;

    let streams: Vec<_> = log.streams().collect();
    if streams.is_empty() {
        serialize_empty_tag(STREAMS_TAG, writer)?;
    } else {
        serialize_empty_start_tag(STREAMS_TAG, writer)?;
        for stream in streams {
            serialize_stream(stream, writer)?;
        }
        serialize_end_tag(STREAMS_TAG, writer)?;
    }

    let attachments: Vec<_> = log.attachments().collect();
    if attachments.is_empty() {
        serialize_empty_tag(ATTACHMENTS_TAG, writer)?;
    } else {
        serialize_empty_start_tag(ATTACHMENTS_TAG, writer)?;
        for attachment in attachments {
            serialize_attachment(attachment, writer)?;
        }
        serialize_end_tag(ATTACHMENTS_TAG, writer)?;
    }

    serialize_end_tag(TEST_LOG_TAG, writer)
}

fn serialize_stream(
    stream: &StructuredTestLogStream,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    // Use the destructuring syntax to ensure that all fields are handled.
    let StructuredTestLogStream { name, body } = stream;

    let mut stream_tag = BytesStart::new(STREAM_TAG);
    stream_tag.push_attribute((NAME_ATTR, &*xml_safe(name)));
    writer.write_event(Event::Start(stream_tag))?;
    serialize_body(body, writer)?;
    serialize_end_tag(STREAM_TAG, writer)
}

fn serialize_body(body: &BodyTag, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    let BodyTag { contents } = body;

    if contents.is_empty() {
        return serialize_empty_tag(BODY_TAG, writer);
    }
    serialize_empty_start_tag(BODY_TAG, writer)?;
    serialize_contents(contents, writer)?;
    serialize_end_tag(BODY_TAG, writer)
}

// Callers skip this for empty containers.
fn serialize_contents(
    contents: &[Tag],
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    serialize_empty_start_tag(CONTENTS_TAG, writer)?;
    for tag in contents {
        serialize_tag(tag, writer)?;
    }
    serialize_end_tag(CONTENTS_TAG, writer)
}

fn serialize_tag(tag: &Tag, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    match tag {
        Tag::Section(section) => serialize_section(section, writer),
        Tag::Marker(marker) => serialize_marker(marker, writer),
        Tag::Text(text) => {
            let text = xml_safe(&text.text);
            if text.is_empty() {
                serialize_empty_tag(TEXT_TAG, writer)
            } else {
                serialize_empty_start_tag(TEXT_TAG, writer)?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                serialize_end_tag(TEXT_TAG, writer)
            }
        }
        Tag::Embed(embed) => {
            let mut embed_tag = BytesStart::new(EMBED_TAG);
            embed_tag.push_attribute((ATTACHMENT_NAME_ATTR, &*xml_safe(&embed.attachment_name)));
            writer.write_event(Event::Empty(embed_tag))
        }
    }
}

fn serialize_section(
    section: &SectionTag,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let SectionTag { name, contents } = section;

    let mut section_tag = BytesStart::new(SECTION_TAG);
    section_tag.push_attribute((NAME_ATTR, &*xml_safe(name)));
    if contents.is_empty() {
        return writer.write_event(Event::Empty(section_tag));
    }
    writer.write_event(Event::Start(section_tag))?;
    serialize_contents(contents, writer)?;
    serialize_end_tag(SECTION_TAG, writer)
}

fn serialize_marker(
    marker_tag: &MarkerTag,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let MarkerTag { marker, contents } = marker_tag;

    let mut start_tag = BytesStart::new(MARKER_TAG);
    start_tag.push_attribute((CLASS_ATTR, marker.class()));
    if marker.attributes().is_empty() && contents.is_empty() {
        return writer.write_event(Event::Empty(start_tag));
    }
    writer.write_event(Event::Start(start_tag))?;
    serialize_marker_attributes(marker, writer)?;
    if !contents.is_empty() {
        serialize_contents(contents, writer)?;
    }
    serialize_end_tag(MARKER_TAG, writer)
}

fn serialize_marker_attributes(
    marker: &Marker,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    if marker.attributes().is_empty() {
        return Ok(());
    }

    serialize_empty_start_tag(MARKER_ATTRIBUTES_TAG, writer)?;
    for (name, value) in marker.attributes() {
        let mut attribute_tag = BytesStart::new(MARKER_ATTRIBUTE_TAG);
        attribute_tag.push_attribute((NAME_ATTR, name.as_str()));
        attribute_tag.push_attribute((VALUE_ATTR, &*xml_safe(value)));
        writer.write_event(Event::Empty(attribute_tag))?;
    }
    serialize_end_tag(MARKER_ATTRIBUTES_TAG, writer)
}

fn serialize_attachment(
    attachment: &AttachmentData,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let AttachmentData {
        name,
        content_type,
        encoding,
        content_disposition,
        contents,
        content_path,
    } = attachment;

    let mut attachment_tag = BytesStart::new(ATTACHMENT_TAG);
    attachment_tag.push_attribute((NAME_ATTR, &*xml_safe(name)));
    attachment_tag.push_attribute((CONTENT_TYPE_ATTR, &*xml_safe(content_type)));
    attachment_tag.push_attribute((ENCODING_ATTR, encoding.as_str()));
    attachment_tag.push_attribute((CONTENT_DISPOSITION_ATTR, content_disposition.as_str()));
    if let Some(content_path) = content_path {
        let content_path = xml_safe(content_path.as_str());
        attachment_tag.push_attribute((CONTENT_PATH_ATTR, &*content_path));
    }

    let contents = contents.as_deref().map(xml_safe).unwrap_or_default();
    if contents.is_empty() {
        return writer.write_event(Event::Empty(attachment_tag));
    }
    writer.write_event(Event::Start(attachment_tag))?;
    writer.write_event(Event::Text(BytesText::new(&contents)))?;
    serialize_end_tag(ATTACHMENT_TAG, writer)
}

fn serialize_empty_start_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag_name)))
}

fn serialize_empty_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Empty(BytesStart::new(tag_name)))
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

/// Returns true for characters that XML 1.0 does not allow, such as most control characters.
pub(crate) fn is_invalid_xml_char(ch: char) -> bool {
    matches!(ch, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f')
}

/// Removes characters that XML 1.0 does not allow.
pub(crate) fn xml_safe(input: &str) -> Cow<'_, str> {
    if input.contains(is_invalid_xml_char) {
        Cow::Owned(input.chars().filter(|&ch| !is_invalid_xml_char(ch)).collect())
    } else {
        Cow::Borrowed(input)
    }
}
