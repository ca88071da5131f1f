// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Switch between sets of Claude configuration files.
//!
//! Claude only reads its configuration from `~/.claude/CLAUDE.md` and
//! `~/.claude/settings.json`. Cldenv keeps any number of named __contexts__
//! in `~/.cldenv`, each holding its own copy of those two files, and exposes
//! exactly one of them by symlinking the two well-known paths into it.
//!
//! # State
//!
//! Cldenv keeps no state file. Which context is active is read straight off
//! the symlink targets every time it is needed. See [`context`] for how
//! disagreeing links are handled, and [`store`] for how switching keeps both
//! links in agreement.
//!
//! # See Also
//!
//! 1. [`migrate`] for how existing plain files get adopted on first run.

pub mod config;
pub mod context;
pub mod fs;
pub mod migrate;
pub mod path;
pub mod store;
pub mod symlink;

pub use crate::{
    config::Settings,
    context::{ActiveState, Context, Diagnosis, LinkState},
    path::{Layout, LinkFile, DEFAULT_CONTEXT},
    store::ContextStore,
};
