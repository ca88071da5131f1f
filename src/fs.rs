// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File system primitives.
//!
//! Thin wrappers around [`std::fs`] that attach the paths involved to any
//! error that occurs. Probes like [`exists`] and [`is_symlink`] never fail,
//! they collapse errors into `false`.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Check if path exists, following symlinks.
pub fn exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref()).is_ok()
}

/// Check if path is a symlink without following it.
pub fn is_symlink(path: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(path.as_ref())
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Check if path is a regular file without following symlinks.
pub fn is_file(path: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(path.as_ref())
        .map(|meta| meta.file_type().is_file())
        .unwrap_or(false)
}

/// Recursively create directory. Does nothing if it already exists.
///
/// # Errors
///
/// - Return [`Error::CreateDir`] if directory cannot be created.
pub fn create_dir(path: impl AsRef<Path>) -> Result<()> {
    mkdirp::mkdirp(path.as_ref()).map_err(|err| Error::CreateDir {
        source: err,
        path: path.as_ref().into(),
    })?;

    Ok(())
}

/// Create parent directory of target file path.
///
/// # Errors
///
/// - Return [`Error::CreateDir`] if parent directory cannot be created.
pub fn ensure_dir_for(file: impl AsRef<Path>) -> Result<()> {
    match file.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir(parent),
        _ => Ok(()),
    }
}

/// Copy file content from source to destination.
///
/// A failed copy may leave a partially written destination behind.
///
/// # Errors
///
/// - Return [`Error::Copy`] if copy fails.
pub fn copy(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    debug!("copy {:?} to {:?}", src.as_ref().display(), dst.as_ref().display());
    fs::copy(src.as_ref(), dst.as_ref()).map_err(|err| Error::Copy {
        source: err,
        src: src.as_ref().into(),
        dst: dst.as_ref().into(),
    })?;

    Ok(())
}

/// Move file from source to destination.
///
/// Tries a rename first. If that fails, e.g., source and destination live on
/// different devices, then the file is copied and the source deleted.
///
/// # Errors
///
/// - Return [`Error::Copy`] if fallback copy fails.
/// - Return [`Error::Remove`] if source cannot be removed after copy.
pub fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    match fs::rename(src, dst) {
        Ok(()) => {
            debug!("renamed {:?} to {:?}", src.display(), dst.display());
            return Ok(());
        }
        Err(err) => debug!("rename of {:?} failed, falling back to copy: {err}", src.display()),
    }

    copy(src, dst)?;
    fs::remove_file(src).map_err(|err| Error::Remove {
        source: err,
        path: src.into(),
    })?;

    Ok(())
}

/// Create file with given contents only if nothing exists at target path.
///
/// Never truncates an existing file. Returns `true` if the file was created.
///
/// # Errors
///
/// - Return [`Error::Write`] if file cannot be created or written.
pub fn create_file_if_missing(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<bool> {
    let path = path.as_ref();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => {
            return Err(Error::Write {
                source: err,
                path: path.into(),
            })
        }
    };

    file.write_all(contents.as_ref()).map_err(|err| Error::Write {
        source: err,
        path: path.into(),
    })?;
    debug!("created placeholder {:?}", path.display());

    Ok(true)
}

/// Recursively remove directory and everything inside it.
///
/// # Errors
///
/// - Return [`Error::Remove`] if removal fails.
pub fn remove_dir_all(path: impl AsRef<Path>) -> Result<()> {
    fs::remove_dir_all(path.as_ref()).map_err(|err| Error::Remove {
        source: err,
        path: path.as_ref().into(),
    })
}

/// File system error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", src.display(), dst.display())]
    Copy {
        #[source]
        source: std::io::Error,
        src: PathBuf,
        dst: PathBuf,
    },

    /// File or directory cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
