// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Writers for [structured test logs](quick_testlog::StructuredTestLog).
//!
//! A [`TestLogWriter`](writer::TestLogWriter) validates and serializes every call made through
//! its stream writers, then passes it on to a [`LogSink`](sink::LogSink):
//!
//! * [`StructuredLogSink`](structured::StructuredLogSink) builds the tag tree of every stream in
//!   memory;
//! * [`TextualLogSink`](textual::TextualLogSink) flattens everything to plain text;
//! * [`FallbackSink`](fallback::FallbackSink) writes to one writer, and keeps text flowing to
//!   another once the first is closed.
//!
//! [`StructuredText`](structured_text::StructuredText) captures a tree with its attachments so it
//! can be written, in full or truncated, into any stream.

pub mod config;
pub mod error_data;
pub mod errors;
pub mod fallback;
pub mod replay;
pub mod sink;
pub mod structured;
pub mod structured_text;
pub mod textual;
pub mod write_str;
pub mod writer;
