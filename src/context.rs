// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Context domain representation.
//!
//! A __context__ is a named directory in the context store that holds its own
//! copy of the two well-known files: `CLAUDE.md` and `settings.json`. Exactly
//! one context is exposed at a time by symlinking the well-known paths in
//! `~/.claude` into that context's directory.
//!
//! # Active Context
//!
//! Cldenv never records which context is active. The active context is
//! derived every time it is needed by reading where the two link paths
//! point. Both links must resolve into the same context for that context to
//! count as active. When they disagree, e.g., because a switch was cut short,
//! the state is reported as [`ActiveState::Inconsistent`] instead of picking
//! one link's answer.

pub mod name;

use crate::path::LinkFile;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

/// A context in the context store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Name of context, also the base name of its directory.
    pub name: String,

    /// Absolute path to context directory.
    pub path: PathBuf,

    /// Link files currently present inside context directory.
    pub files: Vec<LinkFile>,

    /// Both link paths resolve into this context.
    pub is_active: bool,
}

impl Context {
    /// Check if context directory contains target link file.
    pub fn has_file(&self, file: LinkFile) -> bool {
        self.files.contains(&file)
    }
}

/// Which context the link pair currently exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveState {
    /// Neither link resolves into a context.
    None,

    /// Both links resolve into the same context.
    Active(String),

    /// Links resolve into different contexts, or only one resolves at all.
    Inconsistent {
        claude: Option<String>,
        settings: Option<String>,
    },
}

impl ActiveState {
    /// Derive state from the context each link resolves into.
    pub fn from_links(claude: Option<String>, settings: Option<String>) -> Self {
        match (claude, settings) {
            (None, None) => Self::None,
            (Some(claude), Some(settings)) if claude == settings => Self::Active(claude),
            (claude, settings) => Self::Inconsistent { claude, settings },
        }
    }

    /// Name of active context, if both links agree.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Active(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Check if either link resolves into target context.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::Active(active) => active == name,
            Self::Inconsistent { claude, settings } => {
                claude.as_deref() == Some(name) || settings.as_deref() == Some(name)
            }
        }
    }
}

impl Display for ActiveState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::None => fmt.write_str("no active context"),
            Self::Active(name) => write!(fmt, "active context {name:?}"),
            Self::Inconsistent { claude, settings } => write!(
                fmt,
                "inconsistent: {} -> {}, {} -> {}",
                LinkFile::Claude,
                claude.as_deref().unwrap_or("<none>"),
                LinkFile::Settings,
                settings.as_deref().unwrap_or("<none>"),
            ),
        }
    }
}

/// What currently sits at a link path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at link path.
    Absent,

    /// Regular file that has not been migrated into a context yet.
    PlainFile,

    /// Symlink whose target does not exist.
    Dangling(PathBuf),

    /// Symlink that resolves into a context.
    Context(String),

    /// Symlink that resolves somewhere outside the context store.
    Foreign(PathBuf),
}

impl Display for LinkState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Absent => fmt.write_str("absent"),
            Self::PlainFile => fmt.write_str("plain file (not migrated)"),
            Self::Dangling(target) => write!(fmt, "dangling symlink to {:?}", target.display()),
            Self::Context(name) => write!(fmt, "linked into context {name:?}"),
            Self::Foreign(target) => write!(fmt, "symlink outside store to {:?}", target.display()),
        }
    }
}

/// Link diagnostics of the whole link pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    /// State of `CLAUDE.md` link path.
    pub claude: LinkState,

    /// State of `settings.json` link path.
    pub settings: LinkState,

    /// Active context derived from both links.
    pub active: ActiveState,
}

impl Diagnosis {
    /// State of target link path.
    pub fn link(&self, file: LinkFile) -> &LinkState {
        match file {
            LinkFile::Claude => &self.claude,
            LinkFile::Settings => &self.settings,
        }
    }

    /// Check that both links point into the same existing context.
    pub fn is_healthy(&self) -> bool {
        matches!(self.active, ActiveState::Active(_))
    }
}
