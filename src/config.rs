// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional `cldenv.toml` file at the top-level of
//! the context store. The file only tunes how cldenv behaves at startup. The
//! file system layout of contexts and links is fixed, and cannot be changed
//! through configuration.
//!
//! # General Layout
//!
//! ```toml
//! [startup]
//! migrate = true
//! ensure_default = true
//! strict = false
//! ```
//!
//! Every field is optional. Missing fields, or a missing file, fall back to
//! the defaults shown above.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Cldenv settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Settings for what happens before any command runs.
    pub startup: StartupSettings,
}

impl Settings {
    /// Load settings from target path.
    ///
    /// Returns default settings if nothing exists at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !crate::fs::exists(path) {
            debug!("no settings at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.into(),
            })?
            .parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Startup behavior settings.
///
/// Startup runs first-run migration, and then makes sure that the default
/// context exists and that both links resolve. Failures are reported as
/// warnings so that ordinary commands keep working, unless `strict` is set.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartupSettings {
    /// Adopt plain link files into the default context.
    pub migrate: bool,

    /// Create default context and repair broken links.
    pub ensure_default: bool,

    /// Abort instead of warning when a startup step fails.
    pub strict: bool,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            migrate: true,
            ensure_default: true,
            strict: false,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
