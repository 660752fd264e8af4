use std::collections::BTreeMap;
use std::io::{self, IsTerminal};

use crate::commands::{Notice, SearchHit};
use crate::domain::status::Status;
use crate::explorer::RenderedIcon;
use crate::grouping::{Dashboard, GroupedView};
use crate::mutator::MutationOutcome;
use crate::registry::StatusRegistry;
use crate::settings::{SettingKey, Settings};
use crate::templates::StatusTemplate;

pub fn print_status_bar(path: &str, statuses: &[String], registry: &StatusRegistry, compact: bool) {
    let palette = Palette::auto();
    println!("{}", format_status_bar(path, statuses, registry, compact, &palette));
}

fn format_status_bar(
    path: &str,
    statuses: &[String],
    registry: &StatusRegistry,
    compact: bool,
    palette: &Palette,
) -> String {
    let chips = statuses
        .iter()
        .map(|status| {
            let icon = registry.status_icon(status);
            let color = registry.status_color(status);
            if compact {
                palette.hex(color.as_deref(), &icon)
            } else {
                palette.hex(color.as_deref(), &format!("{icon} {status}"))
            }
        })
        .collect::<Vec<_>>();
    let separator = if compact { " " } else { "  " };
    format!("{} {}", palette.id(path), chips.join(separator))
}

pub fn print_catalog(statuses: &[Status], registry: &StatusRegistry) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Statuses"));
    if statuses.is_empty() {
        println!("{}", palette.dim("catalog is empty"));
        return;
    }
    for status in statuses {
        println!("{}", format_catalog_row(status, registry, &palette));
    }
}

fn format_catalog_row(status: &Status, registry: &StatusRegistry, palette: &Palette) -> String {
    let color = registry.status_color(&status.name);
    let mut line = format!(
        "{} {}",
        status.icon,
        palette.hex(color.as_deref(), &status.name)
    );
    if let Some(template_id) = status.template_id.as_deref() {
        line.push(' ');
        line.push_str(&palette.template(&format!("({template_id})")));
    }
    if let Some(description) = status.description.as_deref() {
        line.push(' ');
        line.push_str(&palette.dim(&format!("- {description}")));
    }
    line
}

pub fn print_templates(templates: &[&StatusTemplate], enabled: &[String]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Templates"));
    for template in templates {
        let marker = if enabled.contains(&template.id) { "*" } else { " " };
        let icons = template
            .statuses
            .iter()
            .map(|status| status.icon.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{marker} {} {} {}",
            palette.id(&template.id),
            template.name,
            palette.dim(&icons)
        );
    }
}

pub fn print_groups(view: &GroupedView) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Grouped by status"));
    if view.groups.is_empty() {
        println!("{}", palette.dim("no files matched"));
    }
    for group in &view.groups {
        let marker = if group.collapsed { "▸" } else { "▾" };
        println!(
            "{marker} {} {} {}",
            group.icon,
            palette.hex(group.color.as_deref(), &group.status),
            palette.dim(&format!("({})", group.files.len()))
        );
        if group.collapsed {
            continue;
        }
        for file in &group.files {
            println!("    {file}");
        }
    }
    if view.hidden_unassigned > 0 {
        println!(
            "{}",
            palette.dim(&format!(
                "{} file(s) without a status hidden; use --show-unassigned",
                view.hidden_unassigned
            ))
        );
    }
}

pub fn print_dashboard(dashboard: &Dashboard) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Status dashboard"));
    println!(
        "{} file(s), {} with status ({:.0}%), {} unassigned",
        dashboard.total_files,
        dashboard.with_status,
        dashboard.share_with_status * 100.0,
        dashboard.unassigned
    );
    let widest = dashboard
        .counts
        .iter()
        .map(|count| count.status.chars().count())
        .max()
        .unwrap_or(0);
    for count in &dashboard.counts {
        println!(
            "  {} {:<widest$} {}",
            count.icon,
            count.status,
            palette.dim(&count.count.to_string())
        );
    }
}

pub fn print_tree(icons: &BTreeMap<String, Vec<RenderedIcon>>, files: &[String]) {
    let palette = Palette::auto();
    for file in files {
        println!("{}", format_tree_row(file, icons.get(file), &palette));
    }
}

fn format_tree_row(file: &str, icons: Option<&Vec<RenderedIcon>>, palette: &Palette) -> String {
    let depth = file.matches('/').count();
    let name = file.rsplit('/').next().unwrap_or(file);
    let indent = "  ".repeat(depth);
    let glyphs = icons
        .map(|icons| {
            icons
                .iter()
                .map(|icon| palette.hex(icon.color.as_deref(), &icon.icon))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if glyphs.is_empty() {
        format!("{indent}{name}")
    } else {
        format!("{indent}{name} {glyphs}")
    }
}

pub fn print_outcome(outcome: &MutationOutcome, notice: Option<&Notice>) {
    let palette = Palette::auto();
    for file in &outcome.files {
        let marker = if file.changed { "~" } else { "=" };
        println!(
            "{marker} {} {} -> {}",
            palette.id(&file.path),
            palette.dim(&file.before.join(", ")),
            file.after.join(", ")
        );
    }
    for path in &outcome.skipped {
        println!("{}", palette.dim(&format!("skipped {path}")));
    }
    if let Some(notice) = notice {
        print_notice(notice);
    }
}

pub fn print_notice(notice: &Notice) {
    let palette = Palette::auto();
    if notice.is_error() {
        eprintln!("{}", palette.error(&notice.message));
    } else {
        println!("{}", palette.dim(&notice.message));
    }
}

pub fn print_search(query: &str, hits: &[SearchHit]) {
    let palette = Palette::auto();
    println!("{}", palette.heading(&format!("Files with status matching '{query}'")));
    if hits.is_empty() {
        println!("{}", palette.dim("no files matched"));
        return;
    }
    for hit in hits {
        println!("{} {}", palette.id(&hit.path), palette.dim(&hit.statuses.join(", ")));
    }
}

pub fn print_settings(settings: &Settings) {
    for key in SettingKey::ALL {
        println!("{key} = {}", settings.get(key));
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn template(&self, text: &str) -> String {
        self.paint("35", text)
    }

    fn error(&self, text: &str) -> String {
        self.paint("1;31", text)
    }

    /// Paints `text` with a `#rrggbb` color as 24-bit foreground.
    fn hex(&self, color: Option<&str>, text: &str) -> String {
        match color.and_then(hex_to_rgb) {
            Some((r, g, b)) => self.paint(&format!("38;2;{r};{g};{b}"), text),
            None => text.to_string(),
        }
    }
}

fn hex_to_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(expanded.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
#[path = "ui_tests_ext.rs"]
mod tests_ext;
