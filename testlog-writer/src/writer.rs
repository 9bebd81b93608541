// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The validating log writer, its per-stream writers, and scoped region guards.
//!
//! A [`TestLogWriter`] wraps a [`LogSink`] and checks every call before passing it on:
//!
//! * nothing is accepted once the writer is closed;
//! * an attachment name may only be attached once (re-attaching identical contents is a no-op);
//! * embeds must refer to an attached name;
//! * `end` must match an earlier `begin_section` or `begin_marker` on the same stream.
//!
//! A failed call never reaches the sink, so the log is left exactly as it was.
//!
//! All state is guarded by a single mutex per writer. Writes to different streams of the same
//! writer are serialized against each other.

use crate::{
    error_data::ErrorData, errors::LogWriteError, sink::LogSink, structured_text::StructuredText,
};
use quick_testlog::{Attachment, ImageFormat, Marker, stream_names};
use serde::Serialize;
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    error::Error,
    fmt,
    ops::Deref,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// A validating, thread-safe writer for a structured test log.
///
/// Obtain per-stream writers with [`stream`](Self::stream) or one of the conventional stream
/// accessors such as [`console_output`](Self::console_output).
pub struct TestLogWriter<S> {
    state: Mutex<WriterState<S>>,
}

struct WriterState<S> {
    sink: S,
    // None once the writer is closed.
    tracking: Option<Tracking>,
}

#[derive(Default)]
struct Tracking {
    attachments: HashMap<String, Attachment>,
    stream_depths: HashMap<String, u32>,
}

impl<S: LogSink> TestLogWriter<S> {
    /// Creates a new writer over the given sink.
    pub fn new(sink: S) -> Self {
        Self {
            state: Mutex::new(WriterState {
                sink,
                tracking: Some(Tracking::default()),
            }),
        }
    }

    /// Returns a writer for the named stream. The stream is created when first written to.
    ///
    /// Writers returned for the same name all write to the same stream. Fails with
    /// [`LogWriteError::InvalidName`] if the name is empty or contains characters that XML does
    /// not allow.
    pub fn stream(&self, name: &str) -> Result<TestLogStreamWriter<'_, S>, LogWriteError> {
        LogWriteError::check_name("stream", name)?;
        Ok(TestLogStreamWriter::new(self, SmolStr::new(name)))
    }

    /// Returns a writer for the [default](stream_names::DEFAULT) stream.
    pub fn default_stream(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::DEFAULT))
    }

    /// Returns a writer for the [console input](stream_names::CONSOLE_INPUT) stream.
    pub fn console_input(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::CONSOLE_INPUT))
    }

    /// Returns a writer for the [console output](stream_names::CONSOLE_OUTPUT) stream.
    pub fn console_output(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::CONSOLE_OUTPUT))
    }

    /// Returns a writer for the [console error](stream_names::CONSOLE_ERROR) stream.
    pub fn console_error(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::CONSOLE_ERROR))
    }

    /// Returns a writer for the [debug trace](stream_names::DEBUG_TRACE) stream.
    pub fn debug_trace(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::DEBUG_TRACE))
    }

    /// Returns a writer for the [warnings](stream_names::WARNINGS) stream.
    pub fn warnings(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::WARNINGS))
    }

    /// Returns a writer for the [failures](stream_names::FAILURES) stream.
    pub fn failures(&self) -> TestLogStreamWriter<'_, S> {
        TestLogStreamWriter::new(self, SmolStr::new_static(stream_names::FAILURES))
    }

    /// Attaches an attachment to the log without embedding it in any stream.
    ///
    /// Attaching an attachment whose name is already attached is accepted without effect if the
    /// contents are identical, and is an error otherwise. Attachment names follow the same rules
    /// as stream names.
    pub fn attach(&self, attachment: &Attachment) -> Result<(), LogWriteError> {
        LogWriteError::check_name("attachment", attachment.name())?;
        self.with_tracking(|sink, tracking| {
            match tracking.attachments.get(attachment.name()) {
                Some(existing) if existing == attachment => return Ok(()),
                Some(_) => {
                    return Err(LogWriteError::DuplicateAttachment {
                        name: attachment.name().to_owned(),
                    });
                }
                None => {}
            }
            sink.attach(attachment)?;
            tracking
                .attachments
                .insert(attachment.name().to_owned(), attachment.clone());
            Ok(())
        })
    }

    /// Attaches a `text/plain` attachment and returns it.
    pub fn attach_plain_text(
        &self,
        name: Option<&str>,
        text: &str,
    ) -> Result<Attachment, LogWriteError> {
        self.attach_new(Attachment::plain_text(name, text))
    }

    /// Attaches a `text/html` attachment and returns it.
    pub fn attach_html(&self, name: Option<&str>, html: &str) -> Result<Attachment, LogWriteError> {
        self.attach_new(Attachment::html(name, html))
    }

    /// Attaches an `application/xhtml+xml` attachment and returns it.
    pub fn attach_xhtml(
        &self,
        name: Option<&str>,
        xhtml: &str,
    ) -> Result<Attachment, LogWriteError> {
        self.attach_new(Attachment::xhtml(name, xhtml))
    }

    /// Attaches a `text/xml` attachment and returns it.
    pub fn attach_xml(&self, name: Option<&str>, xml: &str) -> Result<Attachment, LogWriteError> {
        self.attach_new(Attachment::xml(name, xml))
    }

    /// Attaches an image and returns it.
    pub fn attach_image(
        &self,
        name: Option<&str>,
        format: ImageFormat,
        bytes: &[u8],
    ) -> Result<Attachment, LogWriteError> {
        self.attach_new(Attachment::image(name, format, bytes.to_vec()))
    }

    /// Serializes `value` as XML, attaches it and returns the attachment.
    pub fn attach_object_as_xml<T>(
        &self,
        name: Option<&str>,
        value: &T,
    ) -> Result<Attachment, LogWriteError>
    where
        T: Serialize + ?Sized,
    {
        self.attach_new(Attachment::object_as_xml(name, value)?)
    }

    fn attach_new(&self, attachment: Attachment) -> Result<Attachment, LogWriteError> {
        self.attach(&attachment)?;
        Ok(attachment)
    }

    /// Flushes buffered text in every stream.
    pub fn flush(&self) -> Result<(), LogWriteError> {
        self.with_tracking(|sink, _| sink.flush())
    }

    /// Closes the writer.
    ///
    /// Closing an already-closed writer does nothing. Regions that are still open are left open
    /// in the sink, and a warning is logged for each affected stream.
    pub fn close(&self) -> Result<(), LogWriteError> {
        let mut state = self.lock();
        let Some(tracking) = state.tracking.take() else {
            return Ok(());
        };

        for (stream, depth) in &tracking.stream_depths {
            warn!(
                stream = stream.as_str(),
                depth, "test log closed with unterminated sections or markers"
            );
        }
        debug!(
            attachments = tracking.attachments.len(),
            "closing test log writer"
        );
        state.sink.close()
    }

    /// Returns true if the writer has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().tracking.is_none()
    }

    /// Calls `f` with a shared reference to the sink.
    pub fn with_sink<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.lock().sink)
    }

    /// Consumes the writer and returns the sink.
    ///
    /// The sink is not closed by this method: call [`close`](Self::close) first if required.
    pub fn into_sink(self) -> S {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
    }

    fn lock(&self) -> MutexGuard<'_, WriterState<S>> {
        // Writer state is consistent between calls, so a panic elsewhere does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_tracking<T>(
        &self,
        f: impl FnOnce(&mut S, &mut Tracking) -> Result<T, LogWriteError>,
    ) -> Result<T, LogWriteError> {
        let mut state = self.lock();
        let WriterState { sink, tracking } = &mut *state;
        let tracking = tracking.as_mut().ok_or(LogWriteError::Closed)?;
        f(sink, tracking)
    }
}

impl<S> fmt::Debug for TestLogWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLogWriter").finish_non_exhaustive()
    }
}

/// A writer for a single stream of a [`TestLogWriter`].
///
/// Stream writers are cheap to create and clone, and any number of them may refer to the same
/// stream.
pub struct TestLogStreamWriter<'w, S> {
    writer: &'w TestLogWriter<S>,
    name: SmolStr,
}

impl<'w, S: LogSink> TestLogStreamWriter<'w, S> {
    fn new(writer: &'w TestLogWriter<S>, name: SmolStr) -> Self {
        Self { writer, name }
    }

    /// Returns the name of this stream.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the log writer this stream belongs to.
    pub fn log_writer(&self) -> &'w TestLogWriter<S> {
        self.writer
    }

    /// Writes text to the stream. Empty text is ignored.
    pub fn write(&self, text: &str) -> Result<(), LogWriteError> {
        if text.is_empty() {
            return Ok(());
        }
        self.writer
            .with_tracking(|sink, _| sink.stream_write(&self.name, text))
    }

    /// Writes text followed by a newline.
    pub fn write_line(&self, text: &str) -> Result<(), LogWriteError> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.write(&line)
    }

    /// Writes formatted text, so that `write!` and `writeln!` can be used with stream writers.
    pub fn write_fmt(&self, args: fmt::Arguments<'_>) -> Result<(), LogWriteError> {
        match args.as_str() {
            Some(text) => self.write(text),
            None => self.write(&args.to_string()),
        }
    }

    /// Writes text inside a [highlight](Marker::highlight) marker.
    pub fn write_highlighted(&self, text: &str) -> Result<(), LogWriteError> {
        let region = self.begin_marker(&Marker::highlight())?;
        region.write(text)?;
        region.end()
    }

    /// Writes an ellipsis inside an [ellipsis](Marker::ellipsis) marker, to show that text was
    /// elided.
    pub fn write_ellipsis(&self) -> Result<(), LogWriteError> {
        let region = self.begin_marker(&Marker::ellipsis())?;
        region.write("...")?;
        region.end()
    }

    /// Writes an error and its chain of causes, inside a section if `section` is set.
    ///
    /// See [`ErrorData::write_to`] for the layout. The output does not end with a newline.
    pub fn write_error(
        &self,
        error: &(dyn Error + 'static),
        section: Option<&str>,
    ) -> Result<(), LogWriteError> {
        self.write_error_data(&ErrorData::new(error), section)
    }

    /// Writes a captured error, inside a section if `section` is set.
    pub fn write_error_data(
        &self,
        error: &ErrorData,
        section: Option<&str>,
    ) -> Result<(), LogWriteError> {
        match section {
            Some(name) => {
                let region = self.begin_section(name)?;
                error.write_to(&*region)?;
                region.end()
            }
            None => error.write_to(self),
        }
    }

    /// Opens a named section. The section ends when the returned region is ended or dropped.
    ///
    /// Section names follow the same rules as stream names.
    pub fn begin_section(&self, name: &str) -> Result<Region<'w, S>, LogWriteError> {
        LogWriteError::check_name("section", name)?;
        self.begin_region(|sink, stream| sink.stream_begin_section(stream, name))
    }

    /// Opens a marked region. The region ends when the returned guard is ended or dropped.
    pub fn begin_marker(&self, marker: &Marker) -> Result<Region<'w, S>, LogWriteError> {
        self.begin_region(|sink, stream| sink.stream_begin_marker(stream, marker))
    }

    fn begin_region(
        &self,
        begin: impl FnOnce(&mut S, &str) -> Result<(), LogWriteError>,
    ) -> Result<Region<'w, S>, LogWriteError> {
        self.writer.with_tracking(|sink, tracking| {
            begin(sink, &self.name)?;
            *tracking
                .stream_depths
                .entry(self.name.to_string())
                .or_default() += 1;
            Ok(())
        })?;
        Ok(Region {
            stream: self.clone(),
            ended: false,
        })
    }

    /// Ends the most recently opened section or marker on this stream.
    ///
    /// Prefer [`Region::end`], or letting the region go out of scope.
    pub fn end(&self) -> Result<(), LogWriteError> {
        self.writer.with_tracking(|sink, tracking| {
            let Some(depth) = tracking.stream_depths.get_mut(self.name.as_str()) else {
                return Err(LogWriteError::NoOpenRegion {
                    stream: self.name.to_string(),
                });
            };
            sink.stream_end(&self.name)?;
            *depth -= 1;
            if *depth == 0 {
                tracking.stream_depths.remove(self.name.as_str());
            }
            Ok(())
        })
    }

    /// Embeds an attachment that was already attached to the log.
    pub fn embed_existing(&self, attachment_name: &str) -> Result<(), LogWriteError> {
        self.writer.with_tracking(|sink, tracking| {
            if !tracking.attachments.contains_key(attachment_name) {
                return Err(LogWriteError::UnknownAttachment {
                    name: attachment_name.to_owned(),
                });
            }
            sink.stream_embed(&self.name, attachment_name)
        })
    }

    /// Attaches an attachment to the log and embeds it in this stream.
    pub fn embed(&self, attachment: &Attachment) -> Result<(), LogWriteError> {
        self.writer.attach(attachment)?;
        self.embed_existing(attachment.name())
    }

    /// Attaches and embeds a `text/plain` attachment, returning it.
    pub fn embed_plain_text(
        &self,
        name: Option<&str>,
        text: &str,
    ) -> Result<Attachment, LogWriteError> {
        self.embed_new(Attachment::plain_text(name, text))
    }

    /// Attaches and embeds a `text/html` attachment, returning it.
    pub fn embed_html(&self, name: Option<&str>, html: &str) -> Result<Attachment, LogWriteError> {
        self.embed_new(Attachment::html(name, html))
    }

    /// Attaches and embeds an `application/xhtml+xml` attachment, returning it.
    pub fn embed_xhtml(
        &self,
        name: Option<&str>,
        xhtml: &str,
    ) -> Result<Attachment, LogWriteError> {
        self.embed_new(Attachment::xhtml(name, xhtml))
    }

    /// Attaches and embeds a `text/xml` attachment, returning it.
    pub fn embed_xml(&self, name: Option<&str>, xml: &str) -> Result<Attachment, LogWriteError> {
        self.embed_new(Attachment::xml(name, xml))
    }

    /// Attaches and embeds an image, returning it.
    pub fn embed_image(
        &self,
        name: Option<&str>,
        format: ImageFormat,
        bytes: &[u8],
    ) -> Result<Attachment, LogWriteError> {
        self.embed_new(Attachment::image(name, format, bytes.to_vec()))
    }

    /// Serializes `value` as XML, then attaches and embeds it, returning the attachment.
    pub fn embed_object_as_xml<T>(
        &self,
        name: Option<&str>,
        value: &T,
    ) -> Result<Attachment, LogWriteError>
    where
        T: Serialize + ?Sized,
    {
        self.embed_new(Attachment::object_as_xml(name, value)?)
    }

    fn embed_new(&self, attachment: Attachment) -> Result<Attachment, LogWriteError> {
        self.embed(&attachment)?;
        Ok(attachment)
    }

    /// Writes a structured text snapshot, including its attachments, to this stream.
    pub fn write_structured_text(&self, text: &StructuredText) -> Result<(), LogWriteError> {
        text.write_to(self)
    }

    /// Flushes buffered text in this stream.
    pub fn flush(&self) -> Result<(), LogWriteError> {
        self.writer
            .with_tracking(|sink, _| sink.stream_flush(&self.name))
    }
}

impl<S> Clone for TestLogStreamWriter<'_, S> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer,
            name: self.name.clone(),
        }
    }
}

impl<S> fmt::Debug for TestLogStreamWriter<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLogStreamWriter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An open section or marker on a stream.
///
/// The region is ended exactly once: either explicitly through [`end`](Self::end), which reports
/// errors, or when the guard is dropped, which logs them. Dereferences to the stream writer so
/// that nested content can be written through the guard.
#[must_use = "dropping a region ends it immediately"]
pub struct Region<'w, S: LogSink> {
    stream: TestLogStreamWriter<'w, S>,
    ended: bool,
}

impl<S: LogSink> Region<'_, S> {
    /// Ends the region.
    pub fn end(mut self) -> Result<(), LogWriteError> {
        self.ended = true;
        self.stream.end()
    }

    /// Consumes the guard without ending the region.
    ///
    /// The region must later be ended with [`TestLogStreamWriter::end`]; if it never is, the
    /// writer logs a warning when it is closed.
    pub fn keep_open(mut self) {
        self.ended = true;
    }
}

impl<'w, S: LogSink> Deref for Region<'w, S> {
    type Target = TestLogStreamWriter<'w, S>;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl<S: LogSink> Drop for Region<'_, S> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        match self.stream.end() {
            Ok(()) | Err(LogWriteError::Closed) => {}
            Err(error) => {
                warn!(
                    stream = self.stream.name(),
                    "failed to end region on drop: {error}"
                );
            }
        }
    }
}

impl<S: LogSink> fmt::Debug for Region<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("stream", &self.stream.name)
            .field("ended", &self.ended)
            .finish()
    }
}
