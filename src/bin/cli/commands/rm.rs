use anyhow::Result;

use lumen_lib::sync::{Mutation, Reconciler};

use crate::app::find_note;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(reconciler: &mut Reconciler, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let note = find_note(reconciler.notes(), query)?.clone();
    reconciler.apply(Mutation::Delete { id: note.id.clone() }).await?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "deleted": note.id,
                "activeId": reconciler.active_id(),
                "sync": reconciler.sync_status(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Deleted note \"{}\"", note.title);
            println!("sync: {}", terminal::sync_label(&reconciler.sync_status(), use_color));
        }
    }

    Ok(())
}
