// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AttachmentContentError, ObjectXmlError};
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::{fmt, io, sync::Arc};
use uuid::Uuid;

/// A named, content-typed blob stored once per log and referenced by name from any stream.
///
/// Attachments are immutable. Cloning an attachment shares its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    content_type: String,
    content: AttachmentContent,
}

/// The payload of an [`Attachment`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentContent {
    /// UTF-8 text.
    Text(Arc<str>),

    /// Arbitrary bytes.
    Binary(Bytes),
}

impl AttachmentContent {
    /// Returns the encoding of this payload.
    pub fn encoding(&self) -> AttachmentEncoding {
        match self {
            Self::Text(_) => AttachmentEncoding::Text,
            Self::Binary(_) => AttachmentEncoding::Binary,
        }
    }
}

/// Image formats supported by [`Attachment::image`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// `image/png`
    Png,
    /// `image/jpeg`
    Jpeg,
    /// `image/gif`
    Gif,
    /// `image/bmp`
    Bmp,
}

impl ImageFormat {
    /// Returns the MIME type of this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }
}

impl Attachment {
    /// `text/plain`
    pub const PLAIN_TEXT: &'static str = "text/plain";
    /// `text/html`
    pub const HTML: &'static str = "text/html";
    /// `application/xhtml+xml`
    pub const XHTML: &'static str = "application/xhtml+xml";
    /// `text/xml`
    pub const XML: &'static str = "text/xml";

    /// Creates a text attachment.
    ///
    /// If `name` is `None` or empty, a unique name is generated.
    pub fn text(
        name: Option<&str>,
        content_type: impl Into<String>,
        text: impl Into<Arc<str>>,
    ) -> Self {
        Self::new(name, content_type, AttachmentContent::Text(text.into()))
    }

    /// Creates a binary attachment.
    ///
    /// If `name` is `None` or empty, a unique name is generated.
    pub fn binary(
        name: Option<&str>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self::new(name, content_type, AttachmentContent::Binary(bytes.into()))
    }

    fn new(
        name: Option<&str>,
        content_type: impl Into<String>,
        content: AttachmentContent,
    ) -> Self {
        // An empty name is treated as absent.
        let name = match name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => Self::generate_name(),
        };
        Self {
            name,
            content_type: content_type.into(),
            content,
        }
    }

    /// Creates a `text/plain` attachment.
    pub fn plain_text(name: Option<&str>, text: impl Into<Arc<str>>) -> Self {
        Self::text(name, Self::PLAIN_TEXT, text)
    }

    /// Creates a `text/html` attachment.
    pub fn html(name: Option<&str>, html: impl Into<Arc<str>>) -> Self {
        Self::text(name, Self::HTML, html)
    }

    /// Creates an `application/xhtml+xml` attachment.
    pub fn xhtml(name: Option<&str>, xhtml: impl Into<Arc<str>>) -> Self {
        Self::text(name, Self::XHTML, xhtml)
    }

    /// Creates a `text/xml` attachment.
    pub fn xml(name: Option<&str>, xml: impl Into<Arc<str>>) -> Self {
        Self::text(name, Self::XML, xml)
    }

    /// Creates an image attachment.
    pub fn image(name: Option<&str>, format: ImageFormat, bytes: impl Into<Bytes>) -> Self {
        Self::binary(name, format.content_type(), bytes)
    }

    /// Creates a `text/xml` attachment holding `value` serialized as XML.
    pub fn object_as_xml<T>(name: Option<&str>, value: &T) -> Result<Self, ObjectXmlError>
    where
        T: Serialize + ?Sized,
    {
        // An empty name is treated as absent.
        let name = match name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => Self::generate_name(),
        };
        match quick_xml::se::to_string(value) {
            Ok(xml) => Ok(Self::xml(Some(&name), xml)),
            Err(error) => Err(ObjectXmlError::new(name, error)),
        }
    }

    /// Generates a unique attachment name.
    pub fn generate_name() -> String {
        Uuid::new_v4().to_string()
    }

    /// Returns the name of this attachment.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the MIME content type of this attachment.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the payload of this attachment.
    #[inline]
    pub fn content(&self) -> &AttachmentContent {
        &self.content
    }

    /// Returns the encoding of this attachment.
    #[inline]
    pub fn encoding(&self) -> AttachmentEncoding {
        self.content.encoding()
    }

    /// Returns the text payload, if this is a text attachment.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            AttachmentContent::Text(text) => Some(text),
            AttachmentContent::Binary(_) => None,
        }
    }

    /// Returns the binary payload, if this is a binary attachment.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.content {
            AttachmentContent::Text(_) => None,
            AttachmentContent::Binary(bytes) => Some(bytes),
        }
    }

    /// Converts this attachment into its serializable form, with inline contents.
    pub fn to_data(&self) -> AttachmentData {
        let contents = match &self.content {
            AttachmentContent::Text(text) => text.to_string(),
            AttachmentContent::Binary(bytes) => STANDARD.encode(bytes),
        };
        AttachmentData {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            encoding: self.encoding(),
            content_disposition: ContentDisposition::Inline,
            contents: Some(contents),
            content_path: None,
        }
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.content_type)
    }
}

/// How the contents of an attachment are encoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentEncoding {
    /// The contents are text.
    Text,

    /// The contents are binary. Inline contents are Base64-encoded.
    Binary,
}

impl AttachmentEncoding {
    /// Returns the string used for this encoding in serialized logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Binary => "Binary",
        }
    }
}

impl fmt::Display for AttachmentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the contents of an attachment are stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentDisposition {
    /// The contents are stored in the log itself.
    #[default]
    Inline,

    /// The contents are stored in an external file.
    Linked,
}

impl ContentDisposition {
    /// Returns the string used for this disposition in serialized logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "Inline",
            Self::Linked => "Linked",
        }
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The serializable form of an [`Attachment`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentData {
    /// The name of the attachment.
    pub name: String,

    /// The MIME content type of the attachment.
    pub content_type: String,

    /// How the contents are encoded.
    pub encoding: AttachmentEncoding,

    /// Where the contents are stored.
    #[serde(default)]
    pub content_disposition: ContentDisposition,

    /// The inline contents. Binary contents are Base64-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,

    /// The path of the contents, for linked attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_path: Option<Utf8PathBuf>,
}

impl AttachmentData {
    /// Switches this attachment to linked disposition, dropping any inline contents.
    ///
    /// The contents are expected to be saved to `path` separately, for example with
    /// [`save_contents`](Self::save_contents) before calling this.
    pub fn into_linked(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.content_disposition = ContentDisposition::Linked;
        self.contents = None;
        self.content_path = Some(path.into());
        self
    }

    /// Returns the path of the contents, if linked.
    pub fn content_path(&self) -> Option<&Utf8Path> {
        self.content_path.as_deref()
    }

    /// Returns true if this is a text attachment.
    #[inline]
    pub fn is_text(&self) -> bool {
        self.encoding == AttachmentEncoding::Text
    }

    /// Returns the inline text contents.
    pub fn text(&self) -> Result<&str, AttachmentContentError> {
        if !self.is_text() {
            return Err(AttachmentContentError::NotText {
                name: self.name.clone(),
            });
        }
        self.inline_contents()
    }

    /// Returns the inline binary contents, decoding them from Base64.
    pub fn bytes(&self) -> Result<Vec<u8>, AttachmentContentError> {
        if self.is_text() {
            return Err(AttachmentContentError::NotBinary {
                name: self.name.clone(),
            });
        }
        let contents = self.inline_contents()?;
        STANDARD
            .decode(contents.trim())
            .map_err(|error| AttachmentContentError::Base64 {
                name: self.name.clone(),
                error,
            })
    }

    /// Converts this back into an [`Attachment`].
    ///
    /// Fails if the attachment is linked or if binary contents are not valid Base64.
    pub fn to_attachment(&self) -> Result<Attachment, AttachmentContentError> {
        let content = if self.is_text() {
            AttachmentContent::Text(self.text()?.into())
        } else {
            AttachmentContent::Binary(self.bytes()?.into())
        };
        Ok(Attachment {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            content,
        })
    }

    /// Writes the decoded contents to `writer`.
    pub fn save_contents(&self, mut writer: impl io::Write) -> Result<(), io::Error> {
        if self.is_text() {
            let text = self.text().map_err(io::Error::other)?;
            writer.write_all(text.as_bytes())
        } else {
            let bytes = self.bytes().map_err(io::Error::other)?;
            writer.write_all(&bytes)
        }
    }

    /// Reads contents from `reader` and stores them inline, encoding binary contents as Base64.
    ///
    /// This switches the attachment to inline disposition.
    pub fn load_contents(&mut self, mut reader: impl io::Read) -> Result<(), io::Error> {
        let contents = if self.is_text() {
            let mut text = String::new();
            reader.read_to_string(&mut text)?;
            text
        } else {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            STANDARD.encode(bytes)
        };
        self.content_disposition = ContentDisposition::Inline;
        self.contents = Some(contents);
        self.content_path = None;
        Ok(())
    }

    fn inline_contents(&self) -> Result<&str, AttachmentContentError> {
        self.contents
            .as_deref()
            .ok_or_else(|| AttachmentContentError::NotAvailable {
                name: self.name.clone(),
            })
    }
}
