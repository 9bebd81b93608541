// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the test log writer stack.
//!
//! These go through the public API only, building logs the way a test harness would and checking
//! the resulting trees, flattened text and XML.

mod capture;
mod config;
mod laws;
mod properties;
mod scenarios;
