// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The contract between a [`TestLogWriter`](crate::writer::TestLogWriter) and the backend that
//! stores or renders what is written.

use crate::errors::LogWriteError;
use quick_testlog::{Attachment, Marker};

/// A backend for a [`TestLogWriter`](crate::writer::TestLogWriter).
///
/// Sinks receive calls only after the writer has validated them: attachment names are unique,
/// embeds refer to attached names, every `stream_end` matches an earlier `stream_begin_*` on the
/// same stream, and nothing is called after `close`. Sinks may still return errors of their own,
/// for example if the underlying output fails.
///
/// Streams are identified by name and come into existence on first use.
pub trait LogSink: Send {
    /// Stores an attachment.
    fn attach(&mut self, attachment: &Attachment) -> Result<(), LogWriteError>;

    /// Appends text to a stream.
    fn stream_write(&mut self, stream: &str, text: &str) -> Result<(), LogWriteError>;

    /// Adds a reference to an attachment to a stream.
    fn stream_embed(&mut self, stream: &str, attachment_name: &str) -> Result<(), LogWriteError>;

    /// Opens a section in a stream.
    fn stream_begin_section(&mut self, stream: &str, name: &str) -> Result<(), LogWriteError>;

    /// Opens a marked region in a stream.
    fn stream_begin_marker(&mut self, stream: &str, marker: &Marker) -> Result<(), LogWriteError>;

    /// Closes the most recently opened section or marker in a stream.
    fn stream_end(&mut self, stream: &str) -> Result<(), LogWriteError>;

    /// Flushes any buffered text for a stream.
    fn stream_flush(&mut self, _stream: &str) -> Result<(), LogWriteError> {
        Ok(())
    }

    /// Flushes all buffered text.
    fn flush(&mut self) -> Result<(), LogWriteError> {
        Ok(())
    }

    /// Finishes writing. Called at most once.
    fn close(&mut self) -> Result<(), LogWriteError> {
        self.flush()
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn attach(&mut self, attachment: &Attachment) -> Result<(), LogWriteError> {
        (**self).attach(attachment)
    }

    fn stream_write(&mut self, stream: &str, text: &str) -> Result<(), LogWriteError> {
        (**self).stream_write(stream, text)
    }

    fn stream_embed(&mut self, stream: &str, attachment_name: &str) -> Result<(), LogWriteError> {
        (**self).stream_embed(stream, attachment_name)
    }

    fn stream_begin_section(&mut self, stream: &str, name: &str) -> Result<(), LogWriteError> {
        (**self).stream_begin_section(stream, name)
    }

    fn stream_begin_marker(&mut self, stream: &str, marker: &Marker) -> Result<(), LogWriteError> {
        (**self).stream_begin_marker(stream, marker)
    }

    fn stream_end(&mut self, stream: &str) -> Result<(), LogWriteError> {
        (**self).stream_end(stream)
    }

    fn stream_flush(&mut self, stream: &str) -> Result<(), LogWriteError> {
        (**self).stream_flush(stream)
    }

    fn flush(&mut self) -> Result<(), LogWriteError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), LogWriteError> {
        (**self).close()
    }
}
