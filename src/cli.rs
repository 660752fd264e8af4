use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{CommandFactory, Parser, Subcommand};

pub use crate::cli_ops::*;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "vst")]
#[command(bin_name = "vst")]
#[command(version)]
#[command(about = "Track note statuses stored in markdown front-matter")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'C',
        long,
        global = true,
        env = "VST_VAULT_ROOT",
        default_value = ".",
        help = "Vault root that contains the notes and .vault-status/."
    )]
    pub vault: PathBuf,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Log debug output to stderr (VST_LOG overrides)."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Show the status bar line for one file.")]
    Show(ShowArgs),
    #[command(about = "Set, add, remove or toggle statuses on files.")]
    Change(ChangeArgs),
    #[command(about = "Move a file to the next status in the catalog.")]
    Cycle(FileArgs),
    #[command(about = "Clear a file's statuses.")]
    Clear(FileArgs),
    #[command(about = "Copy a file's statuses to the vault clipboard.")]
    Copy(FileArgs),
    #[command(about = "Replace a file's statuses with the clipboard's.")]
    Paste(FileArgs),
    #[command(about = "Toggle a configured quick status, or list them.")]
    Quick(QuickArgs),
    #[command(about = "Toggle between single and multiple statuses per file.")]
    Multi,
    #[command(about = "Find files by status name.")]
    Search(SearchArgs),
    #[command(about = "List the status catalog.")]
    Statuses(JsonArgs),
    #[command(about = "Inspect and enable built-in status templates.")]
    Templates(TemplatesArgs),
    #[command(about = "Manage custom statuses.")]
    Custom(CustomArgs),
    #[command(about = "Read and change vault settings.")]
    Config(ConfigArgs),
    #[command(about = "Group vault files by status.")]
    Group(GroupArgs),
    #[command(about = "Summarize status counts across the vault.")]
    Dashboard(JsonArgs),
    #[command(about = "Print the file tree with explorer status icons.")]
    Tree,
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
