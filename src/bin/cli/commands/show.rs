use anyhow::Result;

use lumen_lib::sync::Reconciler;

use crate::app::find_note;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(reconciler: &Reconciler, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let note = find_note(reconciler.notes(), query)?;
    let stats = note.stats();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "note": note,
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", terminal::paint(&note.title, Color::BOLD, use_color));
            if !note.tags.is_empty() {
                let tags = note.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ");
                println!("{}", terminal::paint(&tags, Color::DIM, use_color));
            }
            let meta = format!(
                "created {} · updated {} · {} words · {} chars",
                terminal::format_millis(note.created_at),
                terminal::format_millis(note.updated_at),
                stats.words,
                stats.chars,
            );
            println!("{}", terminal::paint(&meta, Color::DIM, use_color));
            println!();
            println!("{}", note.content);
        }
    }

    Ok(())
}
