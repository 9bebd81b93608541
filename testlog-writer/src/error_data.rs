// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A loggable description of an error and its chain of causes.

use crate::{errors::LogWriteError, sink::LogSink, writer::TestLogStreamWriter};
use quick_testlog::Marker;
use std::{any, error::Error, fmt};

/// An error, captured as text so that it can be written to a test log.
///
/// An [`ErrorData`] records the message of an error along with an optional type name and stack
/// trace, and the error that caused it, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorData {
    type_name: Option<String>,
    message: String,
    stack_trace: Option<String>,
    source: Option<Box<ErrorData>>,
}

impl ErrorData {
    /// Captures `error` and its [`source`](Error::source) chain.
    ///
    /// Type names are not available through a trait object, so none are recorded.
    pub fn new(error: &(dyn Error + 'static)) -> Self {
        Self {
            type_name: None,
            message: error.to_string(),
            stack_trace: None,
            source: error.source().map(|source| Box::new(Self::new(source))),
        }
    }

    /// Captures `error` and its source chain, recording the type name of the outermost error.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        Self::new(error).with_type_name(any::type_name::<E>())
    }

    /// Sets the type name.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Sets the stack trace, such as a formatted [`std::backtrace::Backtrace`].
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Returns the type name, if known.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the stack trace, if known.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    /// Returns the error that caused this one.
    pub fn source(&self) -> Option<&ErrorData> {
        self.source.as_deref()
    }

    /// Writes the error to `stream` inside an [exception](Marker::exception) marker.
    ///
    /// The type name and message are each wrapped in their own markers, followed by the stack
    /// trace on a new line and then each cause. The output does not end with a newline.
    pub fn write_to<S: LogSink>(
        &self,
        stream: &TestLogStreamWriter<'_, S>,
    ) -> Result<(), LogWriteError> {
        let exception = stream.begin_marker(&Marker::exception())?;
        if let Some(type_name) = &self.type_name {
            let region = exception.begin_marker(&Marker::exception_type())?;
            region.write(type_name)?;
            region.end()?;
            exception.write(": ")?;
        }
        {
            let region = exception.begin_marker(&Marker::exception_message())?;
            region.write(&self.message)?;
            region.end()?;
        }
        if let Some(stack_trace) = &self.stack_trace {
            exception.write("\n")?;
            let region = exception.begin_marker(&Marker::stack_trace())?;
            region.write(stack_trace)?;
            region.end()?;
        }
        if let Some(source) = &self.source {
            exception.write("\ncaused by: ")?;
            source.write_to(&*exception)?;
        }
        exception.end()
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(type_name) = &self.type_name {
            write!(f, "{type_name}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(stack_trace) = &self.stack_trace {
            write!(f, "\n{stack_trace}")?;
        }
        if let Some(source) = &self.source {
            write!(f, "\ncaused by: {source}")?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> From<&E> for ErrorData {
    fn from(error: &E) -> Self {
        Self::from_error(error)
    }
}
