// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for the files that cldenv manages.
//! Nothing in here touches the file system. Every path is derived from the
//! user's home directory.
//!
//! # Layout
//!
//! ```text
//! ~/.claude/CLAUDE.md      -> ~/.cldenv/<context>/CLAUDE.md
//! ~/.claude/settings.json  -> ~/.cldenv/<context>/settings.json
//! ~/.cldenv/cldenv.toml       optional settings for cldenv itself
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path, PathBuf},
};

/// Name of context that always exists, and that migration adopts files into.
pub const DEFAULT_CONTEXT: &str = "default";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// One of the two well-known files exposed through a symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkFile {
    /// The `CLAUDE.md` memory file.
    Claude,

    /// The `settings.json` configuration file.
    Settings,
}

impl LinkFile {
    /// Both link files, in the order they get switched.
    pub const ALL: [LinkFile; 2] = [LinkFile::Claude, LinkFile::Settings];

    /// Fixed file name of link file.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Claude => "CLAUDE.md",
            Self::Settings => "settings.json",
        }
    }

    /// Content written when a placeholder needs to be created.
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Claude => "",
            Self::Settings => "{}\n",
        }
    }
}

impl Display for LinkFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.file_name())
    }
}

/// Well-known paths used by cldenv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    claude_dir: PathBuf,
    store_dir: PathBuf,
}

impl Layout {
    /// Construct layout rooted at target home directory.
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            claude_dir: home.as_ref().join(".claude"),
            store_dir: home.as_ref().join(".cldenv"),
        }
    }

    /// Construct layout rooted at user's home directory.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory path cannot be determined.
    pub fn try_default() -> Result<Self> {
        home_dir().map(Self::new)
    }

    /// Directory holding the two well-known link paths.
    pub fn claude_dir(&self) -> &Path {
        &self.claude_dir
    }

    /// Directory holding every context.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Consumer-facing path of a link file.
    pub fn link_path(&self, file: LinkFile) -> PathBuf {
        self.claude_dir.join(file.file_name())
    }

    /// Directory of a context.
    pub fn context_dir(&self, name: impl AsRef<str>) -> PathBuf {
        self.store_dir.join(name.as_ref())
    }

    /// Storage path of a link file inside a context.
    pub fn context_file(&self, name: impl AsRef<str>, file: LinkFile) -> PathBuf {
        self.context_dir(name).join(file.file_name())
    }

    /// Name of context that target path lives in, if it lives in the store.
    ///
    /// Only the first path component after the store directory counts.
    pub fn context_of(&self, target: impl AsRef<Path>) -> Option<String> {
        match target
            .as_ref()
            .strip_prefix(&self.store_dir)
            .ok()?
            .components()
            .next()?
        {
            Component::Normal(name) => name.to_str().map(ToString::to_string),
            _ => None,
        }
    }

    /// Path to optional cldenv settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.store_dir.join("cldenv.toml")
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
