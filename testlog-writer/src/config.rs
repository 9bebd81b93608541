// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for flattening, truncating and serializing test logs.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    textual::FlattenMode,
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Test log settings, layered from the built-in defaults and an optional user config file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestLogConfig {
    flatten_mode: FlattenMode,
    max_structured_text_length: usize,
    xml_indent: usize,
}

impl TestLogConfig {
    /// The default location of the config within a directory: `.config/testlog.toml`.
    pub const CONFIG_PATH: &'static str = ".config/testlog.toml";

    /// Contains the default config as a TOML file.
    ///
    /// User configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/testlog.toml`
    /// under `root`.
    ///
    /// An explicitly specified file must exist. If it is not specified and `root` does not have
    /// `.config/testlog.toml`, uses the default config options. Unknown keys are reported as
    /// warnings.
    pub fn from_sources(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(root, config_file, warn_unknown)
    }

    // A custom unknown_callback can be passed in while testing.
    fn from_sources_impl(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        Self::build_config(&config_file, &builder, &mut unknown_callback)
    }

    /// Parses config from a TOML string, layered over the defaults.
    ///
    /// Errors and warnings refer to the source as `<inline>`.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigParseError> {
        let builder =
            Self::make_default_config().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build_config(Utf8Path::new("<inline>"), &builder, &mut warn_unknown)
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");
        let deserialized: TestLogConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                panic!("found unknown key in default config: {path}");
            })
            .expect("default config is always valid");
        deserialized.into_config()
    }

    /// Returns the mode used to flatten logs to text.
    pub fn flatten_mode(&self) -> FlattenMode {
        self.flatten_mode
    }

    /// Returns the maximum number of text characters kept when truncating structured text.
    pub fn max_structured_text_length(&self) -> usize {
        self.max_structured_text_length
    }

    /// Returns the indentation width for XML output. 0 means compact output.
    pub fn xml_indent(&self) -> usize {
        self.xml_indent
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_config(
        config_file: &Utf8Path,
        builder: &ConfigBuilder<DefaultState>,
        unknown_callback: &mut impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (config, unknown) = Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))?;
        if !unknown.is_empty() {
            unknown_callback(config_file, &unknown);
        }
        Ok(config.into_config())
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(TestLogConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: TestLogConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already tracks the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

impl Default for TestLogConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

fn warn_unknown(config_file: &Utf8Path, unknown: &BTreeSet<String>) {
    let mut unknown_str = String::new();
    if unknown.len() == 1 {
        // Print this on the same line.
        unknown_str.push(' ');
        unknown_str.extend(unknown.iter().map(String::as_str));
    } else {
        for ignored_key in unknown {
            unknown_str.push_str("\n  - ");
            unknown_str.push_str(ignored_key);
        }
    }

    warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}");
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TestLogConfigDeserialize {
    flatten: FlattenConfig,
    structured_text: StructuredTextConfig,
    xml: XmlConfig,
}

impl TestLogConfigDeserialize {
    fn into_config(self) -> TestLogConfig {
        TestLogConfig {
            flatten_mode: self.flatten.mode,
            max_structured_text_length: self.structured_text.max_length,
            xml_indent: self.xml.indent,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FlattenConfig {
    mode: FlattenMode,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StructuredTextConfig {
    max_length: usize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct XmlConfig {
    indent: usize,
}
