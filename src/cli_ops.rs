use clap::{Args, Subcommand, ValueEnum};

use crate::mutator::Operation;

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FileArgs {
    #[arg(help = "Vault-relative path of the file.")]
    pub file: String,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Vault-relative path of the file.")]
    pub file: String,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Set,
    Add,
    Remove,
    Toggle,
}

impl From<OperationArg> for Operation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Set => Operation::Set,
            OperationArg::Add => Operation::Add,
            OperationArg::Remove => Operation::Remove,
            OperationArg::Toggle => Operation::Toggle,
        }
    }
}

#[derive(Debug, Args)]
#[command(
    about = "Change statuses on one or more files.",
    long_about = "Change statuses on one or more files. Without --op a single file is \
                  toggled and a selection of several files follows the majority rule: \
                  the first status is removed when most files already carry it, and \
                  added otherwise."
)]
pub struct ChangeArgs {
    #[arg(required = true, help = "Vault-relative paths of the files.")]
    pub files: Vec<String>,

    #[arg(
        short = 's',
        long = "status",
        value_delimiter = ',',
        help = "Status name; repeat or comma-separate for several."
    )]
    pub statuses: Vec<String>,

    #[arg(short = 'o', long = "op", value_enum, help = "Operation to apply.")]
    pub operation: Option<OperationArg>,

    #[arg(long, help = "Skip the summary notice after the change.")]
    pub no_notice: bool,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct QuickArgs {
    #[arg(help = "Vault-relative path of the file.")]
    pub file: Option<String>,

    #[arg(help = "Quick status to toggle.")]
    pub status: Option<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(help = "Status name or fragment.")]
    pub query: String,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplateSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum TemplateSubcommands {
    #[command(about = "List built-in templates; enabled ones are starred.")]
    List(JsonArgs),
    #[command(about = "Enable a template.")]
    Enable(TemplateIdArgs),
    #[command(about = "Disable a template.")]
    Disable(TemplateIdArgs),
}

#[derive(Debug, Args)]
pub struct TemplateIdArgs {
    #[arg(help = "Template id.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct CustomArgs {
    #[command(subcommand)]
    pub command: CustomSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum CustomSubcommands {
    #[command(about = "Add or replace a custom status.")]
    Add(CustomAddArgs),
    #[command(about = "Remove a custom status.")]
    Remove(CustomRemoveArgs),
}

#[derive(Debug, Args)]
pub struct CustomAddArgs {
    #[arg(help = "Status name.")]
    pub name: String,

    #[arg(help = "Icon shown next to the status.")]
    pub icon: String,

    #[arg(short = 'c', long, help = "Color as #rrggbb.")]
    pub color: Option<String>,

    #[arg(short = 'd', long = "desc", help = "Optional description.")]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct CustomRemoveArgs {
    #[arg(help = "Status name.")]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommands {
    #[command(about = "Print every setting.")]
    List(JsonArgs),
    #[command(about = "Print one setting.")]
    Get(ConfigGetArgs),
    #[command(about = "Change one setting.")]
    Set(ConfigSetArgs),
}

#[derive(Debug, Args)]
pub struct ConfigGetArgs {
    #[arg(help = "Setting key, camelCase or snake_case.")]
    pub key: String,
}

#[derive(Debug, Args)]
pub struct ConfigSetArgs {
    #[arg(help = "Setting key, camelCase or snake_case.")]
    pub key: String,

    #[arg(
        help = "New value: true/false, text, a comma list, name=value pairs, or a JSON status array."
    )]
    pub value: String,
}

#[derive(Debug, Args)]
pub struct GroupArgs {
    #[arg(long, help = "Turn off excludeUnknownStatus to show files without a status.")]
    pub show_unassigned: bool,

    #[arg(short = 'q', long, help = "Only include files whose path contains this text.")]
    pub search: Option<String>,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Generate or install shell completions.")]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}
