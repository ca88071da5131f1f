// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! First-run migration and default context upkeep.
//!
//! Before cldenv manages anything, `~/.claude/CLAUDE.md` and
//! `~/.claude/settings.json` are plain files owned by the user. The first
//! time cldenv runs, those files are adopted into the "default" context and
//! replaced by symlinks to their new home. Files that do not exist are left
//! absent.
//!
//! After migration, [`ensure_default_context`] makes sure that the default
//! context exists with both files, and that both link paths resolve. This is
//! what makes a fresh install usable without an explicit create and switch.
//!
//! Both steps run on every invocation through [`startup`]. Their failures
//! are downgraded to warnings so that a broken migration never blocks
//! ordinary commands, unless strict startup is configured.

use crate::{
    config::StartupSettings,
    fs,
    path::{Layout, LinkFile, DEFAULT_CONTEXT},
    symlink,
};

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// Check if any link path still holds a plain file.
pub fn needs_migration(layout: &Layout) -> bool {
    LinkFile::ALL.into_iter().any(|file| {
        let link = layout.link_path(file);
        fs::exists(&link) && !fs::is_symlink(&link)
    })
}

/// Adopt plain link files into the default context.
///
/// Each plain file is moved into the default context, and its original path
/// is replaced with a symlink to it. If the default context already holds a
/// file of the same name, that file is kept as a `.backup` sibling first. An
/// older backup is never overwritten, the next free `.backup.<n>` is used.
///
/// Returns the link files that were migrated.
///
/// # Errors
///
/// - Return [`Error::Fs`] if default context cannot be created, or a file
///   cannot be moved.
/// - Return [`Error::Symlink`] if a symlink cannot be created.
#[instrument(skip(layout), level = "debug")]
pub fn migrate_to_default(layout: &Layout) -> Result<Vec<LinkFile>> {
    fs::create_dir(layout.context_dir(DEFAULT_CONTEXT))?;

    let mut migrated = Vec::new();
    for file in LinkFile::ALL {
        let link = layout.link_path(file);
        if !fs::exists(&link) || fs::is_symlink(&link) {
            continue;
        }

        let destination = layout.context_file(DEFAULT_CONTEXT, file);
        if fs::exists(&destination) {
            let backup = backup_path(&destination);
            warn!(
                "default context already has {file}, keeping it as {:?}",
                backup.display()
            );
            fs::move_file(&destination, &backup)?;
        }

        fs::move_file(&link, &destination)?;
        symlink::create(&destination, &link)?;
        info!("migrated {:?} into default context", link.display());
        migrated.push(file);
    }

    Ok(migrated)
}

/// Make sure that the default context exists, and that both links resolve.
///
/// Missing files in the default context are created as placeholders. A link
/// that does not resolve is pointed into the context its partner link
/// resolves into, or into the default context if the partner does not
/// resolve either. Running this twice in a row changes nothing the second
/// time.
///
/// # Errors
///
/// - Return [`Error::Fs`] if directories or placeholders cannot be created.
/// - Return [`Error::Unmigrated`] if a link path holds a regular file.
/// - Return [`Error::Symlink`] if a symlink cannot be created.
#[instrument(skip(layout), level = "debug")]
pub fn ensure_default_context(layout: &Layout) -> Result<()> {
    fs::create_dir(layout.context_dir(DEFAULT_CONTEXT))?;
    for file in LinkFile::ALL {
        let path = layout.context_file(DEFAULT_CONTEXT, file);
        fs::ensure_dir_for(&path)?;
        fs::create_file_if_missing(&path, file.placeholder())?;
    }
    fs::create_dir(layout.claude_dir())?;

    let resolved = |file| {
        let link = layout.link_path(file);
        if !symlink::is_valid(&link) {
            return None;
        }
        symlink::read_target(&link)
            .ok()
            .and_then(|target| layout.context_of(target))
    };
    let claude = resolved(LinkFile::Claude);
    let settings = resolved(LinkFile::Settings);

    for (file, partner) in [
        (LinkFile::Claude, settings),
        (LinkFile::Settings, claude),
    ] {
        let link = layout.link_path(file);
        if symlink::is_valid(&link) {
            continue;
        }

        if fs::is_file(&link) {
            return Err(Error::Unmigrated { path: link });
        }

        let context = partner.unwrap_or_else(|| DEFAULT_CONTEXT.into());
        let target = layout.context_file(&context, file);
        fs::create_file_if_missing(&target, file.placeholder())?;
        symlink::create(&target, &link)?;
        info!("linked {:?} into context {context:?}", link.display());
    }

    Ok(())
}

/// Run startup steps according to settings.
///
/// # Errors
///
/// - Return first step error if `strict` is set. Otherwise errors are
///   collected as warnings in the returned report.
pub fn startup(layout: &Layout, settings: &StartupSettings) -> Result<StartupReport> {
    let mut report = StartupReport::default();

    if settings.migrate && needs_migration(layout) {
        match migrate_to_default(layout) {
            Ok(migrated) => report.migrated = migrated,
            Err(error) => report.record(StartupStep::Migrate, error, settings.strict)?,
        }
    } else {
        debug!("nothing to migrate");
    }

    if settings.ensure_default {
        if let Err(error) = ensure_default_context(layout) {
            report.record(StartupStep::EnsureDefault, error, settings.strict)?;
        }
    }

    Ok(report)
}

/// Outcome of startup steps.
#[derive(Debug, Default)]
pub struct StartupReport {
    /// Link files adopted into the default context.
    pub migrated: Vec<LinkFile>,

    /// Steps that failed without aborting startup.
    pub warnings: Vec<StartupWarning>,
}

impl StartupReport {
    fn record(&mut self, step: StartupStep, error: Error, strict: bool) -> Result<()> {
        if strict {
            return Err(error);
        }

        let warning = StartupWarning { step, error };
        warn!("{warning}");
        self.warnings.push(warning);

        Ok(())
    }
}

/// Startup step that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStep {
    Migrate,
    EnsureDefault,
}

impl Display for StartupStep {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Migrate => fmt.write_str("failed to migrate existing files"),
            Self::EnsureDefault => fmt.write_str("failed to ensure default context"),
        }
    }
}

/// Startup step failure downgraded to a warning.
#[derive(Debug)]
pub struct StartupWarning {
    pub step: StartupStep,
    pub error: Error,
}

impl Display for StartupWarning {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.step, self.error)?;
        let mut source = self.error.source();
        while let Some(cause) = source {
            write!(fmt, ": {cause}")?;
            source = cause.source();
        }

        Ok(())
    }
}

/// First free backup sibling of `path`: `<file>.backup`, then
/// `<file>.backup.1`, `<file>.backup.2`, and so on.
fn backup_path(path: &std::path::Path) -> PathBuf {
    let name = path.file_name().unwrap_or_default();
    (0..)
        .map(|n| {
            let mut backup = name.to_os_string();
            backup.push(".backup");
            if n > 0 {
                backup.push(format!(".{n}"));
            }
            path.with_file_name(backup)
        })
        .find(|backup| !fs::exists(backup) && !fs::is_symlink(backup))
        .unwrap_or_else(|| path.with_extension("backup"))
}

/// Migration error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Link path holds a regular file that would be lost.
    #[error("refusing to replace regular file {:?}, it has not been migrated", path.display())]
    Unmigrated { path: PathBuf },

    /// File system operation fails.
    #[error(transparent)]
    Fs(#[from] crate::fs::Error),

    /// Symlink operation fails.
    #[error(transparent)]
    Symlink(#[from] crate::symlink::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn home() -> anyhow::Result<Layout> {
        Ok(Layout::new(std::env::current_dir()?))
    }

    #[sealed_test]
    fn migration_preserves_content() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".claude")?;
        std::fs::write(".claude/CLAUDE.md", "be nice")?;

        assert!(needs_migration(&layout));
        assert_eq!(migrate_to_default(&layout)?, vec![LinkFile::Claude]);
        assert!(!needs_migration(&layout));

        assert!(fs::is_symlink(".claude/CLAUDE.md"));
        assert_eq!(std::fs::read_to_string(".claude/CLAUDE.md")?, "be nice");
        assert_eq!(std::fs::read_to_string(".cldenv/default/CLAUDE.md")?, "be nice");

        // Absent files stay absent.
        assert!(!fs::exists(".claude/settings.json"));
        assert!(!fs::exists(".cldenv/default/settings.json"));

        Ok(())
    }

    #[sealed_test]
    fn migration_backs_up_existing_default_file() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".claude")?;
        fs::create_dir(".cldenv/default")?;
        std::fs::write(".claude/settings.json", "{\"new\": 1}")?;
        std::fs::write(".cldenv/default/settings.json", "{\"old\": 1}")?;

        migrate_to_default(&layout)?;
        assert_eq!(
            std::fs::read_to_string(".cldenv/default/settings.json")?,
            "{\"new\": 1}"
        );
        assert_eq!(
            std::fs::read_to_string(".cldenv/default/settings.json.backup")?,
            "{\"old\": 1}"
        );

        Ok(())
    }

    #[sealed_test]
    fn repeated_migration_keeps_older_backups() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".claude")?;
        fs::create_dir(".cldenv/default")?;
        std::fs::write(".cldenv/default/CLAUDE.md", "first")?;

        std::fs::write(".claude/CLAUDE.md", "second")?;
        migrate_to_default(&layout)?;

        // User replaces the link with a plain file again.
        std::fs::remove_file(".claude/CLAUDE.md")?;
        std::fs::write(".claude/CLAUDE.md", "third")?;
        migrate_to_default(&layout)?;

        assert_eq!(std::fs::read_to_string(".cldenv/default/CLAUDE.md")?, "third");
        assert_eq!(
            std::fs::read_to_string(".cldenv/default/CLAUDE.md.backup")?,
            "first"
        );
        assert_eq!(
            std::fs::read_to_string(".cldenv/default/CLAUDE.md.backup.1")?,
            "second"
        );

        Ok(())
    }

    #[sealed_test]
    fn nothing_to_migrate_on_fresh_home() -> anyhow::Result<()> {
        let layout = home()?;
        assert!(!needs_migration(&layout));

        Ok(())
    }

    #[sealed_test]
    fn ensure_default_links_fresh_home() -> anyhow::Result<()> {
        let layout = home()?;
        ensure_default_context(&layout)?;

        for file in LinkFile::ALL {
            let link = layout.link_path(file);
            assert!(symlink::is_valid(&link));
            assert_eq!(
                symlink::read_target(&link)?,
                layout.context_file(DEFAULT_CONTEXT, file)
            );
        }
        assert_eq!(std::fs::read_to_string(".claude/settings.json")?, "{}\n");
        assert_eq!(std::fs::read_to_string(".claude/CLAUDE.md")?, "");

        Ok(())
    }

    #[sealed_test]
    fn ensure_default_is_idempotent() -> anyhow::Result<()> {
        let layout = home()?;
        ensure_default_context(&layout)?;
        std::fs::write(".cldenv/default/CLAUDE.md", "edited")?;
        let first = snapshot(&layout)?;

        ensure_default_context(&layout)?;
        assert_eq!(snapshot(&layout)?, first);

        Ok(())
    }

    #[sealed_test]
    fn ensure_default_repairs_into_partner_context() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".cldenv/work")?;
        fs::create_dir(".claude")?;
        std::fs::write(".cldenv/work/CLAUDE.md", "work")?;
        symlink::create(layout.context_file("work", LinkFile::Claude), ".claude/CLAUDE.md")?;

        ensure_default_context(&layout)?;
        assert_eq!(
            symlink::read_target(layout.link_path(LinkFile::Settings))?,
            layout.context_file("work", LinkFile::Settings)
        );

        Ok(())
    }

    #[sealed_test]
    fn ensure_default_refuses_plain_files() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".claude")?;
        std::fs::write(".claude/CLAUDE.md", "precious")?;

        let result = ensure_default_context(&layout);
        assert!(matches!(result, Err(Error::Unmigrated { .. })));
        assert_eq!(std::fs::read_to_string(".claude/CLAUDE.md")?, "precious");

        Ok(())
    }

    #[sealed_test]
    fn startup_collects_warnings() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".claude")?;
        std::fs::write(".claude/CLAUDE.md", "precious")?;
        let settings = StartupSettings {
            migrate: false,
            ..Default::default()
        };

        let report = startup(&layout, &settings)?;
        assert!(report.migrated.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].step, StartupStep::EnsureDefault);

        let strict = StartupSettings {
            strict: true,
            ..settings
        };
        assert!(matches!(
            startup(&layout, &strict),
            Err(Error::Unmigrated { .. })
        ));

        Ok(())
    }

    #[sealed_test]
    fn startup_migrates_then_ensures() -> anyhow::Result<()> {
        let layout = home()?;
        fs::create_dir(".claude")?;
        std::fs::write(".claude/CLAUDE.md", "mine")?;

        let report = startup(&layout, &StartupSettings::default())?;
        assert_eq!(report.migrated, vec![LinkFile::Claude]);
        assert!(report.warnings.is_empty());
        assert_eq!(std::fs::read_to_string(".claude/CLAUDE.md")?, "mine");
        assert!(symlink::is_valid(layout.link_path(LinkFile::Settings)));

        Ok(())
    }

    fn snapshot(layout: &Layout) -> anyhow::Result<Vec<(PathBuf, String)>> {
        let mut entries = Vec::new();
        for file in LinkFile::ALL {
            let link = layout.link_path(file);
            entries.push((symlink::read_target(&link)?, std::fs::read_to_string(&link)?));
        }

        Ok(entries)
    }
}
