// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink primitives.
//!
//! Create, replace, remove, and inspect the symlinks that expose a context
//! at the well-known link paths.
//!
//! # Replacement Strategies
//!
//! [`create`] removes whatever sits at the link path, and then creates the
//! new symlink. Anyone reading the link path between those two steps will
//! find nothing there.
//!
//! [`replace`] avoids that window. The new symlink is first created under a
//! hidden staging name next to the link path, and then renamed over the link
//! path. Renames within a directory are atomic, so readers observe either
//! the old target or the new one. Staging and committing are exposed
//! separately through [`stage`] and [`Staged`] so that a pair of links can
//! be staged together before either one goes live.

use std::{
    ffi::OsString,
    fs,
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
};
use tracing::debug;

/// Create symlink at `link` pointing to `target`.
///
/// Removes any existing entry at `link` first. Not atomic.
///
/// # Errors
///
/// - Return [`Error::Remove`] if existing entry cannot be removed.
/// - Return [`Error::Create`] if symlink cannot be created.
pub fn create(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let (target, link) = (target.as_ref(), link.as_ref());
    remove(link)?;
    symlink_file(target, link).map_err(|err| Error::Create {
        source: err,
        target: target.into(),
        link: link.into(),
    })?;
    debug!("linked {:?} -> {:?}", link.display(), target.display());

    Ok(())
}

/// Atomically replace whatever sits at `link` with a symlink to `target`.
///
/// # Errors
///
/// - Return [`Error::Create`] if staging symlink cannot be created.
/// - Return [`Error::Rename`] if staging symlink cannot be moved into place.
pub fn replace(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    stage(target, link)?.commit()
}

/// Stage symlink to `target` under a hidden name next to `link`.
///
/// Nothing at `link` itself is touched until [`Staged::commit`] is called.
/// Leftover staging entries from earlier runs are cleared first.
///
/// # Errors
///
/// - Return [`Error::Remove`] if stale staging entry cannot be removed.
/// - Return [`Error::Create`] if staging symlink cannot be created.
pub fn stage(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<Staged> {
    let (target, link) = (target.as_ref(), link.as_ref());
    let staging = staging_path(link);
    remove(&staging)?;
    symlink_file(target, &staging).map_err(|err| Error::Create {
        source: err,
        target: target.into(),
        link: staging.clone(),
    })?;
    debug!("staged {:?} -> {:?}", staging.display(), target.display());

    Ok(Staged {
        staging,
        link: link.into(),
    })
}

/// Symlink staged next to its final link path.
#[derive(Debug)]
#[must_use = "staged symlinks must be committed or discarded"]
pub struct Staged {
    staging: PathBuf,
    link: PathBuf,
}

impl Staged {
    /// Final link path this staged symlink will be moved to.
    pub fn link(&self) -> &Path {
        &self.link
    }

    /// Move staged symlink over final link path.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Rename`] if rename fails. The staged symlink is
    ///   removed on a best-effort basis in that case.
    pub fn commit(self) -> Result<()> {
        if let Err(err) = fs::rename(&self.staging, &self.link) {
            let _ = remove(&self.staging);
            return Err(Error::Rename {
                source: err,
                from: self.staging,
                to: self.link,
            });
        }
        debug!("committed {:?}", self.link.display());

        Ok(())
    }

    /// Throw away staged symlink without touching final link path.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Remove`] if staged symlink cannot be removed.
    pub fn discard(self) -> Result<()> {
        remove(&self.staging)
    }
}

/// Remove entry at `link`. Does nothing if nothing exists there.
///
/// # Errors
///
/// - Return [`Error::Remove`] on any I/O error besides "not found".
pub fn remove(link: impl AsRef<Path>) -> Result<()> {
    match fs::remove_file(link.as_ref()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::Remove {
            source: err,
            link: link.as_ref().into(),
        }),
    }
}

/// Read target of symlink at `link`.
///
/// Relative targets are resolved against the directory containing `link`,
/// and lexically normalized.
///
/// # Errors
///
/// - Return [`Error::Read`] if `link` is not a symlink or cannot be read.
pub fn read_target(link: impl AsRef<Path>) -> Result<PathBuf> {
    let link = link.as_ref();
    let target = fs::read_link(link).map_err(|err| Error::Read {
        source: err,
        link: link.into(),
    })?;

    if target.is_absolute() {
        return Ok(normalize(&target));
    }

    let base = link.parent().unwrap_or_else(|| Path::new(""));
    Ok(normalize(&base.join(target)))
}

/// Check that `link` is a symlink whose target exists.
pub fn is_valid(link: impl AsRef<Path>) -> bool {
    if !crate::fs::is_symlink(link.as_ref()) {
        return false;
    }

    read_target(link.as_ref())
        .map(|target| crate::fs::exists(target))
        .unwrap_or(false)
}

fn staging_path(link: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(link.file_name().unwrap_or_default());
    name.push(".cldenv-staged");
    link.with_file_name(name)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                if !normal.pop() {
                    normal.push(component);
                }
            }
            other => normal.push(other),
        }
    }

    normal
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Symlink operation error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Existing entry at link path cannot be removed.
    #[error("failed to remove existing entry at {:?}", link.display())]
    Remove {
        #[source]
        source: io::Error,
        link: PathBuf,
    },

    /// Symlink cannot be created.
    #[error("failed to create symlink {:?} -> {:?}", link.display(), target.display())]
    Create {
        #[source]
        source: io::Error,
        target: PathBuf,
        link: PathBuf,
    },

    /// Symlink target cannot be read.
    #[error("failed to read symlink {:?}", link.display())]
    Read {
        #[source]
        source: io::Error,
        link: PathBuf,
    },

    /// Staged symlink cannot be moved into place.
    #[error("failed to move {:?} to {:?}", from.display(), to.display())]
    Rename {
        #[source]
        source: io::Error,
        from: PathBuf,
        to: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
