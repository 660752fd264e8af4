use std::collections::BTreeMap;
use std::sync::Arc;

use super::{format_catalog_row, format_status_bar, format_tree_row, hex_to_rgb, Palette};
use crate::context::fixtures::context_with;
use crate::domain::status::Status;
use crate::explorer::RenderedIcon;
use crate::settings::Settings;
use crate::vault::MemoryVault;

fn plain() -> Palette {
    Palette { enabled: false }
}

#[test]
fn hex_colors_parse_in_short_and_long_form() {
    assert_eq!(hex_to_rgb("#00ff00"), Some((0, 255, 0)));
    assert_eq!(hex_to_rgb("#fa0"), Some((255, 170, 0)));
    assert_eq!(hex_to_rgb("orange"), None);
    assert_eq!(hex_to_rgb("#12345"), None);
}

#[test]
fn colored_palette_emits_truecolor_sequences() {
    let palette = Palette { enabled: true };
    assert_eq!(
        palette.hex(Some("#0000ff"), "done"),
        "\x1b[38;2;0;0;255mdone\x1b[0m"
    );
    assert_eq!(palette.hex(None, "done"), "done");
}

#[test]
fn status_bar_shows_names_unless_compact() {
    let context = context_with(Settings::default(), Arc::new(MemoryVault::new()));
    let statuses = vec!["active".to_string(), "mystery".to_string()];
    assert_eq!(
        format_status_bar("a.md", &statuses, &context.registry, false, &plain()),
        "a.md ▶️ active  ❓ mystery"
    );
    assert_eq!(
        format_status_bar("a.md", &statuses, &context.registry, true, &plain()),
        "a.md ▶️ ❓"
    );
}

#[test]
fn catalog_rows_mention_template_and_description() {
    let context = context_with(Settings::default(), Arc::new(MemoryVault::new()));
    let status = Status::new("draft", "📝")
        .with_template("academic")
        .with_description("First pass");
    assert_eq!(
        format_catalog_row(&status, &context.registry, &plain()),
        "📝 draft (academic) - First pass"
    );
}

#[test]
fn tree_rows_indent_by_depth_and_append_icons() {
    let icons = BTreeMap::from([(
        "notes/a.md".to_string(),
        vec![RenderedIcon {
            status: "active".to_string(),
            icon: "▶️".to_string(),
            color: None,
            tooltip: "active".to_string(),
        }],
    )]);
    assert_eq!(
        format_tree_row("notes/a.md", icons.get("notes/a.md"), &plain()),
        "  a.md ▶️"
    );
    assert_eq!(format_tree_row("top.md", None, &plain()), "top.md");
}
