// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flattens test logs into plain text.
//!
//! The main structure in this module is [`TextualLogSink`].

use crate::{
    errors::{FlattenModeParseError, LogWriteError},
    sink::LogSink,
    write_str::WriteStr,
};
use quick_testlog::{Attachment, Marker};
use serde::Deserialize;
use std::{collections::HashMap, fmt, str::FromStr};

/// How much structure to keep when flattening a test log to text.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlattenMode {
    /// Annotate every section, marker, attachment and embed inline.
    Verbose,

    /// Print only section names as headings.
    Condensed,
}

impl FlattenMode {
    /// Returns string representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["verbose", "condensed"]
    }
}

impl FromStr for FlattenMode {
    type Err = FlattenModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "verbose" => FlattenMode::Verbose,
            "condensed" => FlattenMode::Condensed,
            other => return Err(FlattenModeParseError::new(other)),
        };
        Ok(val)
    }
}

impl fmt::Display for FlattenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenMode::Verbose => write!(f, "verbose"),
            FlattenMode::Condensed => write!(f, "condensed"),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum RegionKind {
    Section,
    Marker,
}

/// A sink that renders everything written to it as plain text.
///
/// All streams are interleaved into the same output in the order they are written to. Sections
/// are block regions: they always start and end on a fresh line. Markers are inline.
#[derive(Debug)]
pub struct TextualLogSink<W> {
    writer: W,
    mode: FlattenMode,
    at_line_start: bool,
    regions: HashMap<String, Vec<RegionKind>>,
}

impl<W: WriteStr> TextualLogSink<W> {
    /// Creates a new sink writing to `writer`.
    pub fn new(writer: W, mode: FlattenMode) -> Self {
        Self {
            writer,
            mode,
            at_line_start: true,
            regions: HashMap::new(),
        }
    }

    /// Returns the flattening mode.
    pub fn mode(&self) -> FlattenMode {
        self.mode
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_raw(&mut self, text: &str) -> Result<(), LogWriteError> {
        if text.is_empty() {
            return Ok(());
        }
        self.writer.write_str(text)?;
        self.at_line_start = text.ends_with('\n');
        Ok(())
    }

    // Annotations always end with `]`, so they never leave the output at the start of a line.
    fn write_annotation(&mut self, args: fmt::Arguments<'_>) -> Result<(), LogWriteError> {
        self.writer.write_fmt(args)?;
        self.at_line_start = false;
        Ok(())
    }

    fn ensure_newline(&mut self) -> Result<(), LogWriteError> {
        if !self.at_line_start {
            self.write_raw("\n")?;
        }
        Ok(())
    }
}

impl<W: WriteStr> LogSink for TextualLogSink<W> {
    fn attach(&mut self, attachment: &Attachment) -> Result<(), LogWriteError> {
        if self.mode == FlattenMode::Verbose {
            self.ensure_newline()?;
            self.write_annotation(format_args!(
                "[Attachment '{}': {}]",
                attachment.name(),
                attachment.content_type()
            ))?;
            self.write_raw("\n")?;
        }
        Ok(())
    }

    fn stream_write(&mut self, _stream: &str, text: &str) -> Result<(), LogWriteError> {
        self.write_raw(text)
    }

    fn stream_embed(&mut self, _stream: &str, attachment_name: &str) -> Result<(), LogWriteError> {
        if self.mode == FlattenMode::Verbose {
            self.write_annotation(format_args!("[Embedded Attachment '{attachment_name}']"))?;
        }
        Ok(())
    }

    fn stream_begin_section(&mut self, stream: &str, name: &str) -> Result<(), LogWriteError> {
        self.ensure_newline()?;
        match self.mode {
            FlattenMode::Verbose => {
                self.write_annotation(format_args!("[Section '{name}']"))?;
                self.write_raw("\n")?;
            }
            FlattenMode::Condensed => {
                self.write_raw(name)?;
                self.write_raw("\n")?;
            }
        }
        self.regions
            .entry(stream.to_owned())
            .or_default()
            .push(RegionKind::Section);
        Ok(())
    }

    fn stream_begin_marker(&mut self, stream: &str, marker: &Marker) -> Result<(), LogWriteError> {
        if self.mode == FlattenMode::Verbose {
            self.write_annotation(format_args!("[Marker '{}']", marker.class()))?;
        }
        self.regions
            .entry(stream.to_owned())
            .or_default()
            .push(RegionKind::Marker);
        Ok(())
    }

    fn stream_end(&mut self, stream: &str) -> Result<(), LogWriteError> {
        let kind = self
            .regions
            .get_mut(stream)
            .and_then(|regions| regions.pop())
            .ok_or_else(|| LogWriteError::NoOpenRegion {
                stream: stream.to_owned(),
            })?;

        match (kind, self.mode) {
            (RegionKind::Section, FlattenMode::Verbose) => {
                self.ensure_newline()?;
                self.write_raw("[End]\n")
            }
            (RegionKind::Section, FlattenMode::Condensed) => self.ensure_newline(),
            (RegionKind::Marker, FlattenMode::Verbose) => self.write_raw("[End]"),
            (RegionKind::Marker, FlattenMode::Condensed) => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), LogWriteError> {
        self.writer.write_str_flush()?;
        Ok(())
    }
}
