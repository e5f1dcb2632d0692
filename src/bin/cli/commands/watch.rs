use anyhow::{bail, Result};

use lumen_lib::sync::Reconciler;

use crate::render::terminal;

/// Follow remote changes until interrupted
pub async fn run(reconciler: &mut Reconciler, use_color: bool) -> Result<()> {
    let Some(mut signals) = reconciler.watch() else {
        bail!("Not signed in. Run `lumen-cli login` first.");
    };

    println!(
        "Watching {} notes (sync: {}). Press Ctrl-C to stop.",
        reconciler.notes().len(),
        terminal::sync_label(&reconciler.sync_status(), use_color)
    );

    loop {
        tokio::select! {
            signal = signals.recv() => {
                if signal.is_none() {
                    log::info!("Change feed closed");
                    break;
                }
                reconciler.refresh_from_remote().await;
                println!(
                    "[{}] {} notes, sync: {}",
                    chrono::Local::now().format("%H:%M:%S"),
                    reconciler.notes().len(),
                    terminal::sync_label(&reconciler.sync_status(), use_color)
                );
                if let Some(active) = reconciler.active_note() {
                    println!("{}", terminal::note_line(active, true, use_color));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}
