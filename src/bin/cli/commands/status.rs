use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let reconciler = app.connect().await?;
    let user = reconciler.user().map(|u| u.to_string());

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "backend": app.backend.as_ref().map(|b| b.url.clone()),
                "user": user,
                "dataDir": app.data_dir.to_string_lossy(),
                "notes": reconciler.notes().len(),
                "sync": reconciler.sync_status(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            match &app.backend {
                Some(backend) => println!("backend: {}", backend.url),
                None => println!("backend: (none, local-only)"),
            }
            println!("user:    {}", user.as_deref().unwrap_or("(signed out)"));
            println!("data:    {}", app.data_dir.display());
            println!("notes:   {}", reconciler.notes().len());
            println!("sync:    {}", terminal::sync_label(&reconciler.sync_status(), use_color));
        }
    }

    Ok(())
}
