// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Context store management and manipulation.
//!
//! Cldenv groups contexts together into one place called the __context
//! store__, located at `~/.cldenv`. Each context is a top-level directory in
//! the context store whose name is the name of the context itself. So,
//! `~/.cldenv/work` means that the context store contains a context named
//! "work".
//!
//! Cldenv only evaluates the top-level of the context store. Hidden entries
//! are skipped, which also keeps a `.git` directory out of the listing when
//! the user tracks the context store with Git. Plain files at the top-level,
//! like `cldenv.toml`, are never contexts.
//!
//! # Switching
//!
//! Switching contexts re-points both link paths in `~/.claude`. Both new
//! symlinks are staged first, and only then renamed into place one after the
//! other. If the second rename fails, the first link is rolled back to its
//! previous target. The only way to end up with a split link pair is for the
//! rollback itself to fail, which is reported as [`Error::SplitState`].

use crate::{
    context::{
        name::{validate_name, InvalidContextName},
        ActiveState, Context, Diagnosis, LinkState,
    },
    fs,
    path::{Layout, LinkFile, DEFAULT_CONTEXT},
    symlink,
};

use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Collection of contexts inside the context store.
#[derive(Debug, Clone)]
pub struct ContextStore {
    layout: Layout,
    contexts: Vec<Context>,
}

impl ContextStore {
    /// Load all contexts from context store.
    ///
    /// A missing context store directory is not an error, it simply means
    /// that there are no contexts yet.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadStore`] if context store cannot be read.
    pub fn load(layout: Layout) -> Result<Self> {
        let mut store = Self {
            layout,
            contexts: Vec::new(),
        };
        store.reload()?;

        Ok(store)
    }

    /// Re-read contexts from disk.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadStore`] if context store cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        let store_dir = self.layout.store_dir();
        self.contexts.clear();
        if !fs::exists(store_dir) {
            debug!("no context store at {:?}", store_dir.display());
            return Ok(());
        }

        let read_err = |err| Error::ReadStore {
            source: err,
            path: store_dir.into(),
        };
        let active = self.active_state();
        let mut contexts = Vec::new();
        for entry in std::fs::read_dir(store_dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            if !entry.file_type().map_err(read_err)?.is_dir() {
                continue;
            }

            // INVARIANT: Skip hidden entries, e.g., ".git".
            let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
                warn!("skipping non UTF-8 entry {:?}", entry.path().display());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let files = LinkFile::ALL
                .into_iter()
                .filter(|file| fs::exists(self.layout.context_file(&name, *file)))
                .collect();
            contexts.push(Context {
                is_active: active.name() == Some(name.as_str()),
                path: entry.path(),
                files,
                name,
            });
        }
        contexts.sort_by(|a, b| a.name.cmp(&b.name));
        self.contexts = contexts;

        Ok(())
    }

    /// Layout this store was loaded from.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// All loaded contexts, sorted by name.
    pub fn list_all(&self) -> &[Context] {
        &self.contexts
    }

    /// Look up loaded context by name.
    pub fn get(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|context| context.name == name)
    }

    /// Check if context is part of the loaded set.
    pub fn context_exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Derive which context the link pair currently exposes.
    pub fn active_state(&self) -> ActiveState {
        self.diagnose().active
    }

    /// Name of active context.
    ///
    /// Returns `None` when no context is active, or when the links disagree.
    pub fn active_context_name(&self) -> Option<String> {
        self.active_state().name().map(ToString::to_string)
    }

    /// Inspect both link paths.
    pub fn diagnose(&self) -> Diagnosis {
        let claude = self.link_state(LinkFile::Claude);
        let settings = self.link_state(LinkFile::Settings);
        let context_of = |state: &LinkState| match state {
            LinkState::Context(name) => Some(name.clone()),
            _ => None,
        };
        let active = ActiveState::from_links(context_of(&claude), context_of(&settings));

        Diagnosis {
            claude,
            settings,
            active,
        }
    }

    /// Inspect what currently sits at a link path.
    pub fn link_state(&self, file: LinkFile) -> LinkState {
        let link = self.layout.link_path(file);
        if !fs::is_symlink(&link) {
            return match std::fs::symlink_metadata(&link) {
                Ok(_) => LinkState::PlainFile,
                Err(_) => LinkState::Absent,
            };
        }

        let target = match symlink::read_target(&link) {
            Ok(target) => target,
            Err(_) => return LinkState::Dangling(link),
        };

        if !fs::exists(&target) {
            return LinkState::Dangling(target);
        }

        match self.layout.context_of(&target) {
            Some(name) => LinkState::Context(name),
            None => LinkState::Foreign(target),
        }
    }

    /// Create new empty context.
    ///
    /// # Errors
    ///
    /// - Return [`Error::InvalidName`] if name fails validation.
    /// - Return [`Error::AlreadyExists`] if context directory already exists.
    /// - Return [`Error::Fs`] if context directory cannot be created.
    #[instrument(skip(self), level = "debug")]
    pub fn create_context(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;

        let path = self.layout.context_dir(name);
        if fs::exists(&path) || fs::is_symlink(&path) {
            return Err(Error::AlreadyExists { name: name.into() });
        }

        fs::create_dir(&path)?;
        info!("created context {name:?}");
        self.reload()
    }

    /// Remove context and everything inside it.
    ///
    /// # Errors
    ///
    /// - Return [`Error::RemoveDefault`] if target is the default context.
    /// - Return [`Error::NotFound`] if context does not exist.
    /// - Return [`Error::RemoveActive`] if either link resolves into context.
    /// - Return [`Error::Fs`] if context directory cannot be removed.
    #[instrument(skip(self), level = "debug")]
    pub fn remove_context(&mut self, name: &str) -> Result<()> {
        let path = self.check_removable(name)?;
        fs::remove_dir_all(&path)?;
        info!("removed context {name:?}");
        self.reload()
    }

    /// Check that context could be removed, without removing anything.
    ///
    /// Returns path to context directory.
    ///
    /// # Errors
    ///
    /// Return the same policy errors as [`ContextStore::remove_context`].
    pub fn check_removable(&self, name: &str) -> Result<PathBuf> {
        if name == DEFAULT_CONTEXT {
            return Err(Error::RemoveDefault);
        }

        let path = self.locate(name)?;
        if self.active_state().references(name) {
            return Err(Error::RemoveActive { name: name.into() });
        }

        Ok(path)
    }

    /// Expose target context at both link paths.
    ///
    /// Missing link files inside the context are created as placeholders so
    /// that both links resolve after the switch.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotFound`] if context does not exist.
    /// - Return [`Error::Unmigrated`] if a link path holds a regular file.
    /// - Return [`Error::Fs`] if placeholders cannot be created.
    /// - Return [`Error::Symlink`] if links cannot be staged or committed.
    ///   Both links are left as they were.
    /// - Return [`Error::SplitState`] if the second link failed and the first
    ///   could not be rolled back.
    #[instrument(skip(self), level = "debug")]
    pub fn switch_context(&mut self, name: &str) -> Result<()> {
        self.locate(name)?;

        for file in LinkFile::ALL {
            fs::create_file_if_missing(self.layout.context_file(name, file), file.placeholder())?;

            let link = self.layout.link_path(file);
            if fs::is_file(&link) {
                return Err(Error::Unmigrated { path: link });
            }
        }
        fs::create_dir(self.layout.claude_dir())?;

        let claude_link = self.layout.link_path(LinkFile::Claude);
        let previous = if fs::is_symlink(&claude_link) {
            Some(symlink::read_target(&claude_link)?)
        } else {
            None
        };

        let claude = symlink::stage(
            self.layout.context_file(name, LinkFile::Claude),
            &claude_link,
        )?;
        let settings = match symlink::stage(
            self.layout.context_file(name, LinkFile::Settings),
            self.layout.link_path(LinkFile::Settings),
        ) {
            Ok(staged) => staged,
            Err(err) => {
                discard(claude);
                return Err(err.into());
            }
        };

        if let Err(err) = claude.commit() {
            discard(settings);
            return Err(err.into());
        }

        if let Err(err) = settings.commit() {
            warn!("failed to switch {}, rolling back {}", LinkFile::Settings, LinkFile::Claude);
            let rollback = match previous {
                Some(target) => symlink::replace(target, &claude_link),
                None => symlink::remove(&claude_link),
            };

            return match rollback {
                Ok(()) => Err(err.into()),
                Err(rollback) => Err(Error::SplitState {
                    name: name.into(),
                    source: err,
                    rollback,
                }),
            };
        }

        info!("switched to context {name:?}");
        self.reload()
    }

    /// Resolve existing context directory, refusing anything that is not a
    /// plain top-level directory name.
    ///
    /// The name must be its own single path component, so forms like
    /// `work/` or `work/.` that only normalize to one are refused too.
    fn locate(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        let is_plain = !name.contains(std::path::is_separator)
            && matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(part)), None) if part == name
            );
        let path = self.layout.context_dir(name);
        if !is_plain || name.starts_with('.') || !path.is_dir() {
            return Err(Error::NotFound { name: name.into() });
        }

        Ok(path)
    }
}

fn discard(staged: symlink::Staged) {
    let link = staged.link().to_path_buf();
    if let Err(err) = staged.discard() {
        warn!("failed to discard staged link for {:?}: {err}", link.display());
    }
}

/// All possible error types for context store interaction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Context name failed validation.
    #[error(transparent)]
    InvalidName(#[from] InvalidContextName),

    /// Context does not exist.
    #[error("context {name:?} not found")]
    NotFound { name: String },

    /// Context already exists.
    #[error("context {name:?} already exists")]
    AlreadyExists { name: String },

    /// Default context can never be removed.
    #[error("cannot remove default context")]
    RemoveDefault,

    /// Context is exposed through a link path.
    #[error("cannot remove active context {name:?}")]
    RemoveActive { name: String },

    /// Link path holds a regular file that would be lost.
    #[error("refusing to replace regular file {:?}, it has not been migrated", path.display())]
    Unmigrated { path: PathBuf },

    /// Switch failed half way, and rollback failed too.
    #[error("failed to switch to {name:?}, link pair left split (rollback failed: {rollback})")]
    SplitState {
        name: String,
        #[source]
        source: symlink::Error,
        rollback: symlink::Error,
    },

    /// Context store directory cannot be read.
    #[error("failed to read context store at {:?}", path.display())]
    ReadStore {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

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
    use crate::context::name::NameRule;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn home_store() -> anyhow::Result<ContextStore> {
        let layout = Layout::new(std::env::current_dir()?);
        Ok(ContextStore::load(layout)?)
    }

    #[sealed_test]
    fn load_without_store_is_empty() -> anyhow::Result<()> {
        let store = home_store()?;

        assert!(store.list_all().is_empty());
        assert_eq!(store.active_state(), ActiveState::None);
        assert_eq!(store.active_context_name(), None);

        Ok(())
    }

    #[sealed_test]
    fn load_skips_hidden_entries_and_files() -> anyhow::Result<()> {
        fs::create_dir(".cldenv/.git")?;
        fs::create_dir(".cldenv/.hidden")?;
        fs::create_dir(".cldenv/work")?;
        std::fs::write(".cldenv/cldenv.toml", "")?;
        std::fs::write(".cldenv/work/CLAUDE.md", "# work")?;

        let store = home_store()?;
        let names: Vec<_> = store.list_all().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["work"]);

        let work = store.get("work").unwrap();
        assert!(work.has_file(LinkFile::Claude));
        assert!(!work.has_file(LinkFile::Settings));
        assert!(!work.is_active);

        Ok(())
    }

    #[sealed_test]
    fn create_then_exists() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("work")?;

        assert!(store.context_exists("work"));
        assert!(store.get("work").unwrap().files.is_empty());
        assert!(matches!(
            store.create_context("work"),
            Err(Error::AlreadyExists { .. })
        ));

        Ok(())
    }

    #[sealed_test]
    fn create_rejects_invalid_name() -> anyhow::Result<()> {
        let mut store = home_store()?;
        let result = store.create_context("list");

        assert!(matches!(
            result,
            Err(Error::InvalidName(InvalidContextName {
                rule: NameRule::Reserved,
                ..
            }))
        ));
        assert!(!fs::exists(".cldenv/list"));

        Ok(())
    }

    #[sealed_test]
    fn switch_activates_context() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("work")?;
        store.switch_context("work")?;

        assert_eq!(store.active_context_name(), Some("work".into()));
        assert!(store.get("work").unwrap().is_active);
        for file in LinkFile::ALL {
            let link = store.layout().link_path(file);
            assert!(symlink::is_valid(&link));
            assert_eq!(
                symlink::read_target(&link)?,
                store.layout().context_file("work", file)
            );
        }

        Ok(())
    }

    #[sealed_test]
    fn switch_keeps_existing_context_files() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("work")?;
        std::fs::write(".cldenv/work/settings.json", "{\"model\": \"big\"}")?;
        store.switch_context("work")?;

        assert_eq!(
            std::fs::read_to_string(".claude/settings.json")?,
            "{\"model\": \"big\"}"
        );
        assert_eq!(std::fs::read_to_string(".claude/CLAUDE.md")?, "");

        Ok(())
    }

    #[sealed_test]
    fn switch_to_missing_context_fails() -> anyhow::Result<()> {
        let mut store = home_store()?;
        assert!(matches!(
            store.switch_context("nope"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            store.switch_context("../escape"),
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[sealed_test]
    fn switch_refuses_plain_link_file() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("work")?;
        fs::create_dir(".claude")?;
        std::fs::write(".claude/CLAUDE.md", "precious")?;

        assert!(matches!(
            store.switch_context("work"),
            Err(Error::Unmigrated { .. })
        ));
        assert_eq!(std::fs::read_to_string(".claude/CLAUDE.md")?, "precious");

        Ok(())
    }

    #[sealed_test]
    fn failed_second_link_rolls_back_first() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("home")?;
        store.create_context("work")?;
        store.switch_context("home")?;

        // A directory at the settings link path makes its rename fail.
        std::fs::remove_file(".claude/settings.json")?;
        fs::create_dir(".claude/settings.json/blocker")?;

        let result = store.switch_context("work");
        assert!(matches!(result, Err(Error::Symlink(_))));
        assert_eq!(
            symlink::read_target(store.layout().link_path(LinkFile::Claude))?,
            store.layout().context_file("home", LinkFile::Claude)
        );
        assert!(!fs::is_symlink(".claude/.settings.json.cldenv-staged"));

        Ok(())
    }

    #[sealed_test]
    fn failed_second_link_removes_fresh_first_link() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("work")?;

        // No previous claude link exists, so rollback has to remove it.
        fs::create_dir(".claude/settings.json/blocker")?;

        let result = store.switch_context("work");
        assert!(matches!(result, Err(Error::Symlink(_))));
        assert!(!fs::is_symlink(".claude/CLAUDE.md"));
        assert!(!fs::exists(".claude/CLAUDE.md"));
        assert!(!fs::is_symlink(".claude/.settings.json.cldenv-staged"));
        assert_eq!(store.active_state(), ActiveState::None);

        Ok(())
    }

    #[sealed_test]
    fn failed_staging_leaves_links_untouched() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("home")?;
        store.create_context("work")?;
        store.switch_context("home")?;

        // A non-empty directory at the staging path cannot be cleared.
        fs::create_dir(".claude/.settings.json.cldenv-staged/blocker")?;

        assert!(store.switch_context("work").is_err());
        assert_eq!(store.active_context_name(), Some("home".into()));
        assert!(!fs::is_symlink(".claude/.CLAUDE.md.cldenv-staged"));

        Ok(())
    }

    #[sealed_test]
    fn remove_policies() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("default")?;
        store.create_context("work")?;
        store.switch_context("work")?;

        assert!(matches!(
            store.remove_context("default"),
            Err(Error::RemoveDefault)
        ));
        assert!(matches!(
            store.remove_context("work"),
            Err(Error::RemoveActive { .. })
        ));
        assert!(matches!(
            store.remove_context("missing"),
            Err(Error::NotFound { .. })
        ));

        store.switch_context("default")?;
        store.remove_context("work")?;
        assert!(!store.context_exists("work"));
        assert!(!fs::exists(".cldenv/work"));

        Ok(())
    }

    #[sealed_test]
    fn remove_refuses_names_with_separators() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("default")?;
        store.create_context("work")?;
        store.switch_context("work")?;

        for name in ["work/", "work/.", "default/", "default/.", "./work"] {
            assert!(
                matches!(store.remove_context(name), Err(Error::NotFound { .. })),
                "{name:?} should not resolve to a context"
            );
            assert!(matches!(
                store.switch_context(name),
                Err(Error::NotFound { .. })
            ));
        }

        assert!(fs::exists(".cldenv/work"));
        assert!(fs::exists(".cldenv/default"));
        assert_eq!(store.active_context_name(), Some("work".into()));

        Ok(())
    }

    #[sealed_test]
    fn check_removable_matches_remove() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("default")?;
        store.create_context("work")?;
        store.create_context("spare")?;
        store.switch_context("work")?;

        assert!(matches!(
            store.check_removable("default"),
            Err(Error::RemoveDefault)
        ));
        assert!(matches!(
            store.check_removable("work"),
            Err(Error::RemoveActive { .. })
        ));
        assert_eq!(
            store.check_removable("spare")?,
            store.layout().context_dir("spare")
        );
        assert!(fs::exists(".cldenv/spare"));

        Ok(())
    }

    #[sealed_test]
    fn remove_default_fails_even_when_missing() -> anyhow::Result<()> {
        let mut store = home_store()?;
        assert!(matches!(
            store.remove_context("default"),
            Err(Error::RemoveDefault)
        ));

        Ok(())
    }

    #[sealed_test]
    fn split_links_are_inconsistent() -> anyhow::Result<()> {
        let mut store = home_store()?;
        store.create_context("home")?;
        store.create_context("work")?;
        store.switch_context("home")?;

        // Simulate a switch that was cut short after the first link.
        symlink::replace(
            store.layout().context_file("work", LinkFile::Claude),
            store.layout().link_path(LinkFile::Claude),
        )?;
        std::fs::write(".cldenv/work/CLAUDE.md", "")?;
        store.reload()?;

        assert_eq!(
            store.active_state(),
            ActiveState::Inconsistent {
                claude: Some("work".into()),
                settings: Some("home".into()),
            }
        );
        assert_eq!(store.active_context_name(), None);
        assert!(store.list_all().iter().all(|context| !context.is_active));
        assert!(matches!(
            store.remove_context("work"),
            Err(Error::RemoveActive { .. })
        ));

        Ok(())
    }

    #[sealed_test]
    fn diagnose_reports_each_link() -> anyhow::Result<()> {
        let store = home_store()?;
        fs::create_dir(".claude")?;
        std::fs::write(".claude/CLAUDE.md", "legacy")?;
        symlink::create("/nowhere/settings.json", ".claude/settings.json")?;

        let diagnosis = store.diagnose();
        assert_eq!(diagnosis.claude, LinkState::PlainFile);
        assert_eq!(
            diagnosis.settings,
            LinkState::Dangling(PathBuf::from("/nowhere/settings.json"))
        );
        assert_eq!(diagnosis.active, ActiveState::None);
        assert!(!diagnosis.is_healthy());

        Ok(())
    }
}
