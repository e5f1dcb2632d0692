use anyhow::Result;

use lumen_lib::sync::Reconciler;

use crate::render::terminal;
use crate::OutputFormat;

pub fn run(reconciler: &Reconciler, search: Option<&str>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let notes = match search {
        Some(query) => reconciler.search(query),
        None => reconciler.notes().iter().collect(),
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "notes": notes,
                "activeId": reconciler.active_id(),
                "sync": reconciler.sync_status(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if notes.is_empty() {
                println!("(no notes)");
            }
            for note in &notes {
                let active = reconciler.active_id() == Some(note.id.as_str());
                println!("{}", terminal::note_line(note, active, use_color));
            }
            println!();
            println!("sync: {}", terminal::sync_label(&reconciler.sync_status(), use_color));
        }
    }

    Ok(())
}
