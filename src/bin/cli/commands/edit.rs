use anyhow::{bail, Result};

use lumen_lib::sync::{Mutation, Reconciler};

use crate::app::find_note;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(
    reconciler: &mut Reconciler,
    query: &str,
    title: Option<String>,
    content: Option<String>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    if title.is_none() && content.is_none() {
        bail!("Nothing to change: pass --title and/or --content");
    }

    let id = find_note(reconciler.notes(), query)?.id.clone();
    reconciler.select(&id)?;

    let mut note = None;
    if let Some(title) = title {
        note = reconciler.apply(Mutation::UpdateTitle { id: id.clone(), title }).await?;
    }
    if let Some(content) = content {
        note = reconciler.apply(Mutation::UpdateContent { id: id.clone(), content }).await?;
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "note": note,
                "sync": reconciler.sync_status(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if let Some(note) = note {
                println!("Updated note \"{}\"", note.title);
            }
            println!("sync: {}", terminal::sync_label(&reconciler.sync_status(), use_color));
        }
    }

    Ok(())
}
