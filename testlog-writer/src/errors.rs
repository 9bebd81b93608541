// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testlog-writer.

use crate::textual::FlattenMode;
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use quick_testlog::{AttachmentContentError, InvalidIdentifier, InvalidName, ObjectXmlError};
use std::io;
use thiserror::Error;

/// An error that occurs while writing to a test log.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogWriteError {
    /// The writer has been closed.
    #[error("test log writer is closed")]
    Closed,

    /// An attachment with the same name but different contents was already attached.
    #[error("attachment `{name}` was already attached with different contents")]
    DuplicateAttachment {
        /// The attachment name.
        name: String,
    },

    /// An embed referred to an attachment that has not been attached.
    #[error("attachment `{name}` has not been attached")]
    UnknownAttachment {
        /// The attachment name.
        name: String,
    },

    /// `end` was called on a stream with no open section or marker.
    #[error("stream `{stream}` has no open section or marker to end")]
    NoOpenRegion {
        /// The stream name.
        stream: String,
    },

    /// A stream, section or attachment name was empty or could not be written to XML unchanged.
    #[error("invalid {kind} name")]
    InvalidName {
        /// What the name is for: `"stream"`, `"section"` or `"attachment"`.
        kind: &'static str,

        /// The underlying error.
        #[source]
        error: InvalidName,
    },

    /// A marker class or attribute name was invalid.
    #[error("invalid marker")]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// An object could not be serialized into an XML attachment.
    #[error("error creating attachment")]
    ObjectXml(#[from] ObjectXmlError),

    /// The contents of a serialized attachment could not be read back.
    #[error("error reading attachment contents")]
    AttachmentContent(#[from] AttachmentContentError),

    /// The underlying sink failed to write.
    #[error("error writing test log")]
    Sink(#[from] io::Error),
}

impl LogWriteError {
    pub(crate) fn check_name(kind: &'static str, name: &str) -> Result<(), Self> {
        quick_testlog::validate_name(name).map_err(|error| Self::InvalidName { kind, error })
    }

    /// Classifies this error.
    pub fn kind(&self) -> LogWriteErrorKind {
        match self {
            Self::InvalidName { .. }
            | Self::InvalidIdentifier(_)
            | Self::ObjectXml(_)
            | Self::AttachmentContent(_) => LogWriteErrorKind::InvalidArgument,
            Self::Closed
            | Self::DuplicateAttachment { .. }
            | Self::UnknownAttachment { .. }
            | Self::NoOpenRegion { .. } => LogWriteErrorKind::InvalidState,
            Self::Sink(_) => LogWriteErrorKind::Io,
        }
    }
}

/// The broad category of a [`LogWriteError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogWriteErrorKind {
    /// An argument was invalid, such as a malformed identifier.
    InvalidArgument,

    /// The call is not allowed in the writer's current state.
    InvalidState,

    /// The underlying sink failed.
    Io,
}

/// An error that occurred while reading test log configuration.
#[derive(Debug, Error)]
#[error("failed to parse test log config at `{config_file}`")]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of configuration error that occurred.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// Error returned while parsing a [`FlattenMode`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for flatten mode: {input}\n(known values: {})",
    FlattenMode::variants().join(", "),
)]
pub struct FlattenModeParseError {
    input: String,
}

impl FlattenModeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}
