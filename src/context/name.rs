// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Context name validation.
//!
//! A context name doubles as the name of its directory in the context store,
//! and as a positional argument on the command line. So names are restricted
//! to a small portable character set, and can never collide with a command
//! verb.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Longest allowed context name.
pub const MAX_NAME_LEN: usize = 50;

/// Command verbs that cannot be used as context names.
pub const RESERVED_NAMES: [&str; 7] = [
    "help", "version", "use", "create", "remove", "list", "switch",
];

/// Validate context name.
///
/// Rules are checked in the order they appear in [`NameRule`]. The first
/// rule that is violated gets reported.
///
/// # Errors
///
/// - Return [`InvalidContextName`] describing the violated rule.
pub fn validate_name(name: impl AsRef<str>) -> Result<()> {
    let name = name.as_ref();
    let invalid = |rule| {
        Err(InvalidContextName {
            name: name.into(),
            rule,
        })
    };

    if name.is_empty() {
        return invalid(NameRule::Empty);
    }

    if name.len() > MAX_NAME_LEN {
        return invalid(NameRule::TooLong);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return invalid(NameRule::Charset);
    }

    if name.starts_with('-') || name.ends_with('-') {
        return invalid(NameRule::DashEdge);
    }

    if name.starts_with('_') || name.ends_with('_') {
        return invalid(NameRule::UnderscoreEdge);
    }

    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return invalid(NameRule::Reserved);
    }

    Ok(())
}

/// Rule that a context name violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    Empty,
    TooLong,
    Charset,
    DashEdge,
    UnderscoreEdge,
    Reserved,
}

impl Display for NameRule {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Empty => fmt.write_str("context name cannot be empty"),
            Self::TooLong => write!(fmt, "context name too long (max {MAX_NAME_LEN} characters)"),
            Self::Charset => fmt.write_str(
                "context name can only contain letters, numbers, dashes, and underscores",
            ),
            Self::DashEdge => fmt.write_str("context name cannot start or end with dash"),
            Self::UnderscoreEdge => {
                fmt.write_str("context name cannot start or end with underscore")
            }
            Self::Reserved => fmt.write_str("context name is reserved"),
        }
    }
}

/// Context name failed validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid context name {name:?}: {rule}")]
pub struct InvalidContextName {
    pub name: String,
    pub rule: NameRule,
}

/// Friendly result alias :3
pub type Result<T, E = InvalidContextName> = std::result::Result<T, E>;
