// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read a `StructuredTestLog` back from XML.

use crate::{
    AttachmentData, AttachmentEncoding, BodyTag, ContentDisposition, DeserializeError, EmbedTag,
    Marker, MarkerTag, SectionTag, StructuredTestLog, StructuredTestLogStream, Tag, TextTag,
    serialize::*,
};
use camino::Utf8PathBuf;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

type XmlReader<'a> = Reader<&'a [u8]>;

static DOCUMENT: &str = "document";

pub(crate) fn deserialize_log(xml: &str) -> Result<StructuredTestLog, DeserializeError> {
    let mut reader = Reader::from_str(xml);
    match next_child(&mut reader, DOCUMENT)? {
        Child::Start(start) if is_named(&start, TEST_LOG_TAG) => {
            let log = deserialize_test_log(&mut reader)?;
            expect_eof(&mut reader)?;
            Ok(log)
        }
        Child::Empty(start) if is_named(&start, TEST_LOG_TAG) => {
            expect_eof(&mut reader)?;
            Ok(StructuredTestLog::new())
        }
        Child::Start(start) | Child::Empty(start) => Err(unexpected(DOCUMENT, &start)),
        Child::End => Err(DeserializeError::UnexpectedEof { parent: DOCUMENT }),
    }
}

fn deserialize_test_log(
    reader: &mut XmlReader<'_>,
) -> Result<StructuredTestLog, DeserializeError> {
    let mut log = StructuredTestLog::new();
    loop {
        match next_child(reader, TEST_LOG_TAG)? {
            Child::Start(start) if is_named(&start, STREAMS_TAG) => {
                deserialize_streams(reader, &mut log)?;
            }
            Child::Start(start) if is_named(&start, ATTACHMENTS_TAG) => {
                deserialize_attachments(reader, &mut log)?;
            }
            Child::Empty(start)
                if is_named(&start, STREAMS_TAG) || is_named(&start, ATTACHMENTS_TAG) => {}
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(TEST_LOG_TAG, &start));
            }
            Child::End => return Ok(log),
        }
    }
}

fn deserialize_streams(
    reader: &mut XmlReader<'_>,
    log: &mut StructuredTestLog,
) -> Result<(), DeserializeError> {
    loop {
        match next_child(reader, STREAMS_TAG)? {
            Child::Start(start) if is_named(&start, STREAM_TAG) => {
                let name = required_attribute(&start, STREAM_TAG, NAME_ATTR)?;
                let body = deserialize_stream_body(reader)?;
                log.try_insert_stream(StructuredTestLogStream { name, body })?;
            }
            Child::Empty(start) if is_named(&start, STREAM_TAG) => {
                let name = required_attribute(&start, STREAM_TAG, NAME_ATTR)?;
                log.try_insert_stream(StructuredTestLogStream::new(name))?;
            }
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(STREAMS_TAG, &start));
            }
            Child::End => return Ok(()),
        }
    }
}

fn deserialize_stream_body(reader: &mut XmlReader<'_>) -> Result<BodyTag, DeserializeError> {
    let mut body = BodyTag::new();
    loop {
        match next_child(reader, STREAM_TAG)? {
            Child::Start(start) if is_named(&start, BODY_TAG) => {
                body.contents = deserialize_container(reader, BODY_TAG)?;
            }
            Child::Empty(start) if is_named(&start, BODY_TAG) => {}
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(STREAM_TAG, &start));
            }
            Child::End => return Ok(body),
        }
    }
}

/// Reads the children of a body or section, which consist of at most one `contents` element.
fn deserialize_container(
    reader: &mut XmlReader<'_>,
    parent: &'static str,
) -> Result<Vec<Tag>, DeserializeError> {
    let mut contents = Vec::new();
    loop {
        match next_child(reader, parent)? {
            Child::Start(start) if is_named(&start, CONTENTS_TAG) => {
                contents.extend(deserialize_contents(reader)?);
            }
            Child::Empty(start) if is_named(&start, CONTENTS_TAG) => {}
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(parent, &start));
            }
            Child::End => return Ok(contents),
        }
    }
}

fn deserialize_contents(reader: &mut XmlReader<'_>) -> Result<Vec<Tag>, DeserializeError> {
    let mut contents = Vec::new();
    loop {
        let tag = match next_child(reader, CONTENTS_TAG)? {
            Child::Start(start) if is_named(&start, SECTION_TAG) => {
                let name = required_attribute(&start, SECTION_TAG, NAME_ATTR)?;
                let contents = deserialize_container(reader, SECTION_TAG)?;
                Tag::Section(SectionTag { name, contents })
            }
            Child::Empty(start) if is_named(&start, SECTION_TAG) => {
                let name = required_attribute(&start, SECTION_TAG, NAME_ATTR)?;
                Tag::Section(SectionTag::new(name))
            }
            Child::Start(start) if is_named(&start, MARKER_TAG) => {
                let marker = Marker::new(required_attribute(&start, MARKER_TAG, CLASS_ATTR)?)?;
                Tag::Marker(deserialize_marker(reader, marker)?)
            }
            Child::Empty(start) if is_named(&start, MARKER_TAG) => {
                let marker = Marker::new(required_attribute(&start, MARKER_TAG, CLASS_ATTR)?)?;
                Tag::Marker(MarkerTag::new(marker))
            }
            Child::Start(start) if is_named(&start, TEXT_TAG) => {
                Tag::Text(TextTag::new(deserialize_text(reader, TEXT_TAG)?))
            }
            Child::Empty(start) if is_named(&start, TEXT_TAG) => Tag::Text(TextTag::new("")),
            Child::Start(start) if is_named(&start, EMBED_TAG) => {
                let name = required_attribute(&start, EMBED_TAG, ATTACHMENT_NAME_ATTR)?;
                expect_end(reader, EMBED_TAG)?;
                Tag::Embed(EmbedTag::new(name))
            }
            Child::Empty(start) if is_named(&start, EMBED_TAG) => {
                let name = required_attribute(&start, EMBED_TAG, ATTACHMENT_NAME_ATTR)?;
                Tag::Embed(EmbedTag::new(name))
            }
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(CONTENTS_TAG, &start));
            }
            Child::End => return Ok(contents),
        };
        contents.push(tag);
    }
}

fn deserialize_marker(
    reader: &mut XmlReader<'_>,
    marker: Marker,
) -> Result<MarkerTag, DeserializeError> {
    let mut marker_tag = MarkerTag::new(marker);
    loop {
        match next_child(reader, MARKER_TAG)? {
            Child::Start(start) if is_named(&start, MARKER_ATTRIBUTES_TAG) => {
                deserialize_marker_attributes(reader, &mut marker_tag.marker)?;
            }
            Child::Start(start) if is_named(&start, CONTENTS_TAG) => {
                marker_tag.contents.extend(deserialize_contents(reader)?);
            }
            Child::Empty(start)
                if is_named(&start, MARKER_ATTRIBUTES_TAG) || is_named(&start, CONTENTS_TAG) => {}
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(MARKER_TAG, &start));
            }
            Child::End => return Ok(marker_tag),
        }
    }
}

fn deserialize_marker_attributes(
    reader: &mut XmlReader<'_>,
    marker: &mut Marker,
) -> Result<(), DeserializeError> {
    loop {
        match next_child(reader, MARKER_ATTRIBUTES_TAG)? {
            Child::Start(start) if is_named(&start, MARKER_ATTRIBUTE_TAG) => {
                deserialize_marker_attribute(&start, marker)?;
                expect_end(reader, MARKER_ATTRIBUTE_TAG)?;
            }
            Child::Empty(start) if is_named(&start, MARKER_ATTRIBUTE_TAG) => {
                deserialize_marker_attribute(&start, marker)?;
            }
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(MARKER_ATTRIBUTES_TAG, &start));
            }
            Child::End => return Ok(()),
        }
    }
}

fn deserialize_marker_attribute(
    start: &BytesStart<'_>,
    marker: &mut Marker,
) -> Result<(), DeserializeError> {
    let name = required_attribute(start, MARKER_ATTRIBUTE_TAG, NAME_ATTR)?;
    let value = required_attribute(start, MARKER_ATTRIBUTE_TAG, VALUE_ATTR)?;
    marker.set_attribute(name, value)?;
    Ok(())
}

fn deserialize_attachments(
    reader: &mut XmlReader<'_>,
    log: &mut StructuredTestLog,
) -> Result<(), DeserializeError> {
    loop {
        let (start, has_contents) = match next_child(reader, ATTACHMENTS_TAG)? {
            Child::Start(start) if is_named(&start, ATTACHMENT_TAG) => (start, true),
            Child::Empty(start) if is_named(&start, ATTACHMENT_TAG) => (start, false),
            Child::Start(start) | Child::Empty(start) => {
                return Err(unexpected(ATTACHMENTS_TAG, &start));
            }
            Child::End => return Ok(()),
        };

        let name = required_attribute(&start, ATTACHMENT_TAG, NAME_ATTR)?;
        let content_type = required_attribute(&start, ATTACHMENT_TAG, CONTENT_TYPE_ATTR)?;
        let encoding = match required_attribute(&start, ATTACHMENT_TAG, ENCODING_ATTR)?.as_str() {
            "Text" => AttachmentEncoding::Text,
            "Binary" => AttachmentEncoding::Binary,
            other => return Err(invalid_value(ENCODING_ATTR, other)),
        };
        let content_disposition = match attribute(&start, CONTENT_DISPOSITION_ATTR)?.as_deref() {
            None | Some("Inline") => ContentDisposition::Inline,
            Some("Linked") => ContentDisposition::Linked,
            Some(other) => return Err(invalid_value(CONTENT_DISPOSITION_ATTR, other)),
        };
        let content_path = attribute(&start, CONTENT_PATH_ATTR)?.map(Utf8PathBuf::from);

        let text = if has_contents {
            deserialize_text(reader, ATTACHMENT_TAG)?
        } else {
            String::new()
        };
        // Linked attachments only carry contents if they were written inline as well.
        let contents = match content_disposition {
            ContentDisposition::Inline => Some(text),
            ContentDisposition::Linked if text.is_empty() => None,
            ContentDisposition::Linked => Some(text),
        };

        log.try_insert_attachment(AttachmentData {
            name,
            content_type,
            encoding,
            content_disposition,
            contents,
            content_path,
        })?;
    }
}

/// Reads all text up to the end of the current element.
fn deserialize_text(
    reader: &mut XmlReader<'_>,
    parent: &'static str,
) -> Result<String, DeserializeError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(cdata) => text.push_str(&reader.decoder().decode(&cdata)?),
            Event::Comment(_) | Event::PI(_) => {}
            Event::Start(start) | Event::Empty(start) => return Err(unexpected(parent, &start)),
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(DeserializeError::UnexpectedEof { parent }),
            Event::Decl(_) | Event::DocType(_) => {
                return Err(DeserializeError::UnexpectedElement {
                    parent,
                    found: "declaration".to_owned(),
                });
            }
        }
    }
}

enum Child<'a> {
    Start(BytesStart<'a>),
    Empty(BytesStart<'a>),
    End,
}

/// Returns the next structural child of `parent`, skipping whitespace and comments.
fn next_child<'a>(
    reader: &mut XmlReader<'a>,
    parent: &'static str,
) -> Result<Child<'a>, DeserializeError> {
    loop {
        match reader.read_event()? {
            Event::Start(start) => return Ok(Child::Start(start)),
            Event::Empty(start) => return Ok(Child::Empty(start)),
            Event::End(_) => return Ok(Child::End),
            Event::Eof if parent == DOCUMENT => return Ok(Child::End),
            Event::Eof => return Err(DeserializeError::UnexpectedEof { parent }),
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            Event::Text(_) | Event::CData(_) => {
                return Err(DeserializeError::UnexpectedElement {
                    parent,
                    found: "text".to_owned(),
                });
            }
        }
    }
}

fn expect_end(reader: &mut XmlReader<'_>, parent: &'static str) -> Result<(), DeserializeError> {
    match next_child(reader, parent)? {
        Child::End => Ok(()),
        Child::Start(start) | Child::Empty(start) => Err(unexpected(parent, &start)),
    }
}

fn expect_eof(reader: &mut XmlReader<'_>) -> Result<(), DeserializeError> {
    match next_child(reader, DOCUMENT)? {
        Child::End => Ok(()),
        Child::Start(start) | Child::Empty(start) => Err(unexpected(DOCUMENT, &start)),
    }
}

fn is_named(start: &BytesStart<'_>, name: &str) -> bool {
    start.local_name().as_ref() == name.as_bytes()
}

fn unexpected(parent: &'static str, start: &BytesStart<'_>) -> DeserializeError {
    DeserializeError::UnexpectedElement {
        parent,
        found: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
    }
}

fn invalid_value(attribute: &'static str, value: &str) -> DeserializeError {
    DeserializeError::InvalidAttributeValue {
        element: ATTACHMENT_TAG,
        attribute,
        value: value.to_owned(),
    }
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, DeserializeError> {
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(
    start: &BytesStart<'_>,
    element: &'static str,
    name: &'static str,
) -> Result<String, DeserializeError> {
    attribute(start, name)?.ok_or(DeserializeError::MissingAttribute {
        element,
        attribute: name,
    })
}
