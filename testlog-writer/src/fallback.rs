// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A sink that keeps text flowing after its primary writer closes.

use crate::{
    errors::LogWriteError,
    sink::LogSink,
    writer::{Region, TestLogWriter},
};
use quick_testlog::{Attachment, Marker};
use std::sync::Arc;
use tracing::trace;

/// Writes to a primary log writer, redirecting plain text to a fallback writer once the primary
/// is closed.
///
/// Only text is redirected. Attachments, embeds, sections and markers go to the primary, and are
/// dropped without error once it is closed: the fallback never saw the calls that came before,
/// so replaying structure into it would unbalance its tree.
///
/// Closing this sink flushes both writers but closes neither of them.
#[derive(Debug)]
pub struct FallbackSink<P, F> {
    primary: Arc<TestLogWriter<P>>,
    fallback: Arc<TestLogWriter<F>>,
}

impl<P: LogSink, F: LogSink> FallbackSink<P, F> {
    /// Creates a new fallback sink.
    pub fn new(primary: Arc<TestLogWriter<P>>, fallback: Arc<TestLogWriter<F>>) -> Self {
        Self { primary, fallback }
    }

    /// Returns the primary writer.
    pub fn primary(&self) -> &Arc<TestLogWriter<P>> {
        &self.primary
    }

    /// Returns the fallback writer.
    pub fn fallback(&self) -> &Arc<TestLogWriter<F>> {
        &self.fallback
    }
}

// Structural calls are dropped once the primary is closed.
fn drop_if_closed(
    what: &'static str,
    stream: Option<&str>,
    result: Result<(), LogWriteError>,
) -> Result<(), LogWriteError> {
    match result {
        Err(LogWriteError::Closed) => {
            trace!(stream, "primary test log closed, dropping {what}");
            Ok(())
        }
        other => other,
    }
}

impl<P: LogSink, F: LogSink> LogSink for FallbackSink<P, F> {
    fn attach(&mut self, attachment: &Attachment) -> Result<(), LogWriteError> {
        drop_if_closed("attachment", None, self.primary.attach(attachment))
    }

    fn stream_write(&mut self, stream: &str, text: &str) -> Result<(), LogWriteError> {
        match self.primary.stream(stream)?.write(text) {
            Err(LogWriteError::Closed) => {
                trace!(stream, "primary test log closed, writing text to fallback");
                self.fallback.stream(stream)?.write(text)
            }
            other => other,
        }
    }

    fn stream_embed(&mut self, stream: &str, attachment_name: &str) -> Result<(), LogWriteError> {
        let result = self.primary.stream(stream)?.embed_existing(attachment_name);
        drop_if_closed("embed", Some(stream), result)
    }

    fn stream_begin_section(&mut self, stream: &str, name: &str) -> Result<(), LogWriteError> {
        // The matching stream_end ends the region in the primary.
        let result = self
            .primary
            .stream(stream)?
            .begin_section(name)
            .map(Region::keep_open);
        drop_if_closed("section", Some(stream), result)
    }

    fn stream_begin_marker(&mut self, stream: &str, marker: &Marker) -> Result<(), LogWriteError> {
        let result = self
            .primary
            .stream(stream)?
            .begin_marker(marker)
            .map(Region::keep_open);
        drop_if_closed("marker", Some(stream), result)
    }

    fn stream_end(&mut self, stream: &str) -> Result<(), LogWriteError> {
        let result = self.primary.stream(stream)?.end();
        drop_if_closed("end", Some(stream), result)
    }

    fn stream_flush(&mut self, stream: &str) -> Result<(), LogWriteError> {
        match self.primary.stream(stream)?.flush() {
            Err(LogWriteError::Closed) => match self.fallback.stream(stream)?.flush() {
                Err(LogWriteError::Closed) => Ok(()),
                other => other,
            },
            other => other,
        }
    }

    fn flush(&mut self) -> Result<(), LogWriteError> {
        for result in [self.primary.flush(), self.fallback.flush()] {
            match result {
                Ok(()) | Err(LogWriteError::Closed) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}
