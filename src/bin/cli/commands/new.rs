use anyhow::Result;

use lumen_lib::notes::{NoteDraft, UNTITLED_TITLE};
use lumen_lib::sync::{Mutation, Reconciler};

use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(
    reconciler: &mut Reconciler,
    title: Option<&str>,
    tags: Option<&str>,
    content: Option<String>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let draft = NoteDraft {
        title: title.unwrap_or(UNTITLED_TITLE).to_string(),
        content: content.unwrap_or_default(),
        tags: tags
            .map(|tag_str| {
                tag_str
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let note = reconciler.apply(Mutation::Create(draft)).await?;

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
                println!("Created note \"{}\"", note.title);
                println!("  ID: {}", note.id);
            }
            println!("sync: {}", terminal::sync_label(&reconciler.sync_status(), use_color));
        }
    }

    Ok(())
}
