// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Generate and read structured test execution logs in Rust.
//!
//! A [`StructuredTestLog`] holds any number of named streams, each of which is a tree of
//! [`Tag`]s rooted at a [`BodyTag`], together with the [`AttachmentData`] referenced by
//! [`EmbedTag`]s in those trees.

mod attachment;
mod deserialize;
mod errors;
mod log;
mod marker;
mod serialize;
mod tag;

pub use attachment::*;
pub use errors::*;
pub use log::*;
pub use marker::*;
pub use tag::*;

// Re-export `quick_xml::Result` so it can be used by downstream consumers.
pub use quick_xml::Result;
