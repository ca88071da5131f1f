// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use cldenv::{
    migrate::{self, StartupReport},
    ActiveState, ContextStore, Diagnosis, Layout, LinkFile, Settings,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use inquire::Confirm;
use std::process::exit;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    long_about = "Manage multiple Claude environments by switching ~/.claude/CLAUDE.md and \
                  ~/.claude/settings.json between contexts through symbolic links.",
    override_usage = "\n  cldenv [options]\n  cldenv [options] <cldenv-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self, store: ContextStore, report: StartupReport) -> Result<()> {
        match self.command {
            Some(Command::Use(opts)) => run_use(store, opts),
            Some(Command::Create(opts)) => run_create(store, opts),
            Some(Command::Remove(opts)) => run_remove(store, opts),
            Some(Command::List(opts)) => run_list(&store, &report, opts),
            None => run_list(&store, &report, ListOptions::default()),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Switch to a different context.
    #[command(visible_alias = "switch", override_usage = "cldenv use <context>")]
    Use(UseOptions),

    /// Create a new empty context.
    #[command(override_usage = "cldenv create <context>")]
    Create(CreateOptions),

    /// Remove a context and all of its files.
    #[command(override_usage = "cldenv remove [options] <context>")]
    Remove(RemoveOptions),

    /// List contexts, and optionally check the state of both links.
    #[command(override_usage = "cldenv list [options]")]
    List(ListOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UseOptions {
    /// Name of context to switch to.
    #[arg(value_name = "context")]
    pub context_name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CreateOptions {
    /// Name of context to create.
    #[arg(value_name = "context")]
    pub context_name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Name of context to remove.
    #[arg(value_name = "context")]
    pub context_name: String,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug, Default)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Show link diagnostics and startup warnings.
    #[arg(short, long)]
    pub check: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let layout = Layout::try_default()?;
    let settings = Settings::load(layout.settings_file())?;
    let report = migrate::startup(&layout, &settings.startup)?;
    let store = ContextStore::load(layout)?;

    cli.run(store, report)
}

fn run_use(mut store: ContextStore, opts: UseOptions) -> Result<()> {
    let name = opts.context_name;
    if !store.context_exists(&name) {
        println!("Context '{name}' not found.\n");
        print_available(&store);
        return Ok(());
    }

    if store.active_context_name().as_deref() == Some(name.as_str()) {
        println!("Already using context '{name}'");
        return Ok(());
    }

    store.switch_context(&name)?;
    println!("✓ Switched to context '{name}'");

    Ok(())
}

fn run_create(mut store: ContextStore, opts: CreateOptions) -> Result<()> {
    let name = opts.context_name;
    if store.context_exists(&name) {
        println!("Context '{name}' already exists.\n");
        print_available(&store);
        return Ok(());
    }

    store.create_context(&name)?;
    println!("✓ Created context '{name}'");
    println!("Use 'cldenv use {name}' to switch to this context");

    Ok(())
}

fn run_remove(mut store: ContextStore, opts: RemoveOptions) -> Result<()> {
    let name = opts.context_name;
    if !store.context_exists(&name) {
        println!("Context '{name}' not found.\n");
        print_available(&store);
        return Ok(());
    }

    store.check_removable(&name)?;
    if !opts.yes {
        let confirmed = Confirm::new(&format!("Remove context '{name}' and all of its files?"))
            .with_default(false)
            .prompt()?;
        if !confirmed {
            println!("Kept context '{name}'");
            return Ok(());
        }
    }

    store.remove_context(&name)?;
    println!("✓ Removed context '{name}'");

    Ok(())
}

fn run_list(store: &ContextStore, report: &StartupReport, opts: ListOptions) -> Result<()> {
    let contexts = store.list_all();
    if contexts.is_empty() {
        println!("No contexts available.");
        println!("Use 'cldenv create <context>' to create a new context");
    } else {
        println!("Available contexts:");
        for context in contexts {
            if context.is_active {
                println!("* {} (active)", context.name);
            } else {
                println!("  {}", context.name);
            }
        }

        println!();
        println!("Use 'cldenv use <context>' to switch context");
        println!("Use 'cldenv create <context>' to create new context");
        println!("Use 'cldenv remove <context>' to remove context");
    }

    let diagnosis = store.diagnose();
    if opts.check {
        print_diagnosis(&diagnosis, report);
    } else if let ActiveState::Inconsistent { .. } = diagnosis.active {
        warn!("links disagree on the active context, run 'cldenv list --check'");
    }

    Ok(())
}

fn print_available(store: &ContextStore) {
    let contexts = store.list_all();
    if contexts.is_empty() {
        println!("No contexts available.");
        println!("Use 'cldenv create <context>' to create a new context");
        return;
    }

    println!("Available contexts:");
    for context in contexts {
        let marker = if context.is_active { "* " } else { "  " };
        println!("{marker}{}", context.name);
    }
}

fn print_diagnosis(diagnosis: &Diagnosis, report: &StartupReport) {
    println!();
    println!("Links:");
    for file in LinkFile::ALL {
        println!("  {file}: {}", diagnosis.link(file));
    }
    println!("State: {}", diagnosis.active);

    if !report.migrated.is_empty() {
        let files: Vec<_> = report.migrated.iter().map(ToString::to_string).collect();
        println!("Migrated into default context: {}", files.join(", "));
    }

    if report.warnings.is_empty() {
        println!("Startup: ok");
    } else {
        println!("Startup warnings:");
        for warning in &report.warnings {
            println!("  {warning}");
        }
    }
}
