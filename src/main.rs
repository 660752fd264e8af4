mod app;
mod cli;
mod cli_ops;
mod commands;
mod completions;
mod context;
mod domain;
mod events;
mod explorer;
mod grouping;
mod logging;
mod mutator;
mod registry;
mod resolver;
mod settings;
mod templates;
mod ui;
mod vault;

use std::sync::Arc;

use app::{App, AppError, HostEvent};
use cli::{Commands, ConfigSubcommands, CustomSubcommands, TemplateSubcommands};
use commands::{outcome_notice, Notice};
use domain::status::{status_key, Status};
use events::ModalKind;
use explorer::{ExplorerIconScheduler, SchedulerConfig, TextExplorer};
use grouping::GroupFilter;
use mutator::{MutationOutcome, MutationRequest};
use settings::{SettingKey, SettingValue};
use templates::normalize_template_id;
use vault::VaultFile;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let app = App::open(cli.vault)?;
    let result = runtime.block_on(dispatch(&app, cli.command));
    app.close();
    result
}

fn focus(app: &App, path: &str) -> VaultFile {
    app.handle_host_event(HostEvent::ActiveFileChanged(Some(VaultFile::new(path))));
    app.active_file().unwrap_or_else(|| VaultFile::new(path))
}

fn report(outcome: &MutationOutcome, json: bool) -> Result<(), AppError> {
    if json {
        return print_json(outcome);
    }
    ui::print_outcome(outcome, outcome_notice(outcome).as_ref());
    Ok(())
}

async fn dispatch(app: &App, command: Commands) -> Result<(), AppError> {
    let context = Arc::clone(app.context());
    match command {
        Commands::Show(args) => {
            let file = focus(app, &args.file);
            let statuses = context.resolver.file_statuses(&file).await?;
            if args.json {
                return print_json(&statuses);
            }
            let compact = context.settings.snapshot().compact_view;
            ui::print_status_bar(file.path(), &statuses, &context.registry, compact);
        }
        Commands::Change(args) => {
            if args.statuses.is_empty() && args.operation.is_none() {
                app.commands()
                    .request_modal(ModalKind::StatusSelector, args.files.clone());
                return Err(AppError::InvalidArgument(
                    "no status given; pass one or more with --status".to_string(),
                ));
            }
            let files = args.files.iter().map(VaultFile::new).collect::<Vec<_>>();
            let mut request = MutationRequest::new(files, args.statuses);
            request.operation = args.operation.map(Into::into);
            if args.no_notice {
                request = request.quiet();
            }
            let outcome = app.commands().submit(request).await?;
            for file in outcome.files.iter().filter(|file| file.changed) {
                app.handle_host_event(HostEvent::MetadataChanged(VaultFile::new(&file.path)));
            }
            report(&outcome, args.json)?;
        }
        Commands::Cycle(args) => {
            let file = focus(app, &args.file);
            let outcome = app.commands().cycle_status(Some(&file)).await?;
            report(&outcome, args.json)?;
        }
        Commands::Clear(args) => {
            let file = focus(app, &args.file);
            let outcome = app.commands().clear_status(Some(&file)).await?;
            report(&outcome, args.json)?;
        }
        Commands::Copy(args) => {
            let file = focus(app, &args.file);
            let clipboard = app.clipboard()?;
            let text = app.commands().copy_status(Some(&file), &clipboard).await?;
            if args.json {
                return print_json(&text);
            }
            ui::print_notice(&Notice::info(format!("copied '{text}'")));
        }
        Commands::Paste(args) => {
            let file = focus(app, &args.file);
            let clipboard = app.clipboard()?;
            let outcome = app.commands().paste_status(Some(&file), &clipboard).await?;
            report(&outcome, args.json)?;
        }
        Commands::Quick(args) => match (args.file, args.status) {
            (Some(path), Some(name)) => {
                let file = focus(app, &path);
                let outcome = app.commands().quick_status(Some(&file), &name).await?;
                report(&outcome, false)?;
            }
            (None, None) => {
                for name in app.commands().quick_commands() {
                    println!("{} {}", context.registry.status_icon(&name), name);
                }
            }
            _ => {
                return Err(AppError::InvalidArgument(
                    "quick takes both FILE and STATUS, or neither".to_string(),
                ))
            }
        },
        Commands::Multi => {
            let enabled = app.commands().toggle_multiple_statuses()?;
            let mode = if enabled { "multiple" } else { "single" };
            ui::print_notice(&Notice::info(format!("{mode} statuses per file")));
        }
        Commands::Search(args) => {
            let hits = app.commands().search_by_status(&args.query).await?;
            if args.json {
                return print_json(&hits);
            }
            ui::print_search(&args.query, &hits);
        }
        Commands::Statuses(args) => {
            let statuses = context.registry.all_statuses();
            if args.json {
                return print_json(&statuses);
            }
            ui::print_catalog(&statuses, &context.registry);
        }
        Commands::Templates(args) => run_templates(app, args.command)?,
        Commands::Custom(args) => run_custom(app, args.command)?,
        Commands::Config(args) => run_config(app, args.command)?,
        Commands::Group(args) => {
            if args.show_unassigned {
                grouping::show_unassigned(&context)?;
            }
            let filter = GroupFilter {
                search: args.search,
            };
            app.commands().request_modal(ModalKind::GroupedView, Vec::new());
            let view = grouping::grouped_view(&context, &filter).await?;
            if args.json {
                return print_json(&view);
            }
            ui::print_groups(&view);
        }
        Commands::Dashboard(args) => {
            app.commands().request_modal(ModalKind::Dashboard, Vec::new());
            let dashboard = grouping::dashboard(&context).await?;
            if args.json {
                return print_json(&dashboard);
            }
            ui::print_dashboard(&dashboard);
        }
        Commands::Tree => run_tree(app).await?,
        Commands::Completions(_) => {}
    }
    Ok(())
}

fn run_templates(app: &App, command: TemplateSubcommands) -> Result<(), AppError> {
    let context = app.context();
    let enabled = context.settings.snapshot().enabled_templates.clone();
    let (id, enable) = match command {
        TemplateSubcommands::List(args) => {
            let templates = context.templates.list();
            if args.json {
                return print_json(&templates);
            }
            ui::print_templates(&templates, &enabled);
            return Ok(());
        }
        TemplateSubcommands::Enable(args) => (args.id, true),
        TemplateSubcommands::Disable(args) => (args.id, false),
    };

    let id = normalize_template_id(&id)
        .ok_or_else(|| AppError::InvalidArgument("template id is required".to_string()))?;
    let template = context.templates.require(&id)?;
    let mut next = enabled
        .into_iter()
        .filter(|existing| *existing != template.id)
        .collect::<Vec<_>>();
    if enable {
        next.push(template.id.clone());
    }
    context
        .settings
        .on_settings_change(SettingKey::EnabledTemplates, SettingValue::List(next))?;
    let verb = if enable { "enabled" } else { "disabled" };
    ui::print_notice(&Notice::info(format!("{verb} template '{}'", template.id)));
    Ok(())
}

fn run_custom(app: &App, command: CustomSubcommands) -> Result<(), AppError> {
    let context = app.context();
    let mut statuses = context.settings.snapshot().custom_statuses.clone();
    let message = match command {
        CustomSubcommands::Add(args) => {
            let mut status = Status::new(args.name.trim(), args.icon.trim());
            if let Some(color) = args.color {
                status = status.with_color(color);
            }
            if let Some(description) = args.description {
                status = status.with_description(description);
            }
            let key = status.key();
            let message = format!("saved custom status '{}'", status.name);
            match statuses.iter_mut().find(|existing| existing.key() == key) {
                Some(existing) => *existing = status,
                None => statuses.push(status),
            }
            message
        }
        CustomSubcommands::Remove(args) => {
            let key = status_key(&args.name);
            let before = statuses.len();
            statuses.retain(|status| status.key() != key);
            if statuses.len() == before {
                return Err(AppError::InvalidArgument(format!(
                    "no custom status named '{}'",
                    args.name.trim()
                )));
            }
            format!("removed custom status '{}'", args.name.trim())
        }
    };
    context
        .settings
        .on_settings_change(SettingKey::CustomStatuses, SettingValue::Statuses(statuses))?;
    ui::print_notice(&Notice::info(message));
    Ok(())
}

fn run_config(app: &App, command: ConfigSubcommands) -> Result<(), AppError> {
    let settings = &app.context().settings;
    match command {
        ConfigSubcommands::List(args) => {
            let snapshot = settings.snapshot();
            if args.json {
                return print_json(&*snapshot);
            }
            ui::print_settings(&snapshot);
        }
        ConfigSubcommands::Get(args) => {
            let key = args.key.parse::<SettingKey>()?;
            println!("{}", settings.snapshot().get(key));
        }
        ConfigSubcommands::Set(args) => {
            let key = args.key.parse::<SettingKey>()?;
            let value = key.parse_value(&args.value)?;
            let snapshot = settings.on_settings_change(key, value)?;
            println!("{key} = {}", snapshot.get(key));
        }
    }
    Ok(())
}

async fn run_tree(app: &App) -> Result<(), AppError> {
    let context = Arc::clone(app.context());
    let surface = Arc::new(TextExplorer::new());
    let scheduler =
        ExplorerIconScheduler::new(Arc::clone(&context), surface.clone(), SchedulerConfig::default())?;
    app.handle_host_event(HostEvent::LayoutChanged);
    scheduler.queue_all().await?;
    scheduler.drain().await;
    scheduler.on_idle().await;
    scheduler.shutdown();

    let files = context
        .store
        .list_files()
        .await?
        .into_iter()
        .filter(VaultFile::is_markdown)
        .map(|file| file.path().to_string())
        .collect::<Vec<_>>();
    ui::print_tree(&surface.snapshot(), &files);
    Ok(())
}
