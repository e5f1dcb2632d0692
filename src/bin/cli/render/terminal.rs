use chrono::{Local, TimeZone};

use lumen_lib::notes::Note;
use lumen_lib::sync::{SyncState, SyncStatus};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Wrap `text` in a color when colors are enabled
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Sync indicator, colored like the status icon of the web client
pub fn sync_label(status: &SyncStatus, use_color: bool) -> String {
    let color = match status.status {
        SyncState::Synced => Color::GREEN,
        SyncState::Syncing => Color::YELLOW,
        SyncState::Offline => Color::GRAY,
        SyncState::Error => Color::RED,
    };
    let mut label = paint(&status.status.to_string(), color, use_color);
    if let Some(error) = &status.error {
        label.push_str(&format!(" ({})", error));
    }
    label
}

/// Epoch millis as local date and time
pub fn format_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}

/// One line of a note listing
pub fn note_line(note: &Note, active: bool, use_color: bool) -> String {
    let marker = if active { "* " } else { "  " };
    let title = if note.title.is_empty() { "(untitled)" } else { note.title.as_str() };
    let mut line = format!(
        "{}{}  {}",
        marker,
        paint(title, Color::BOLD, use_color),
        paint(&format_millis(note.updated_at), Color::DIM, use_color),
    );
    if !note.tags.is_empty() {
        let tags = note.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ");
        line.push_str(&format!("  {}", paint(&tags, Color::DIM, use_color)));
    }
    line
}
