mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lumen-cli", about = "Lumen notes from the command line", version)]
struct Cli {
    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        email: String,
        /// Password (prompted from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        email: String,
        #[arg(long)]
        password: Option<String>,
        /// Display name (defaults to the part of the email before '@')
        #[arg(long)]
        name: Option<String>,
    },

    /// Sign out and clear the local cache
    Logout,

    /// Send a password reset email
    ResetPassword { email: String },

    /// List notes, newest first
    List {
        /// Only notes whose title or content contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Show a note
    Show {
        /// Note id or title (case-insensitive prefix match)
        note: String,
    },

    /// Create a new note
    New {
        /// Title (defaults to "Untitled Entry")
        title: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Body text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
    },

    /// Change a note's title or content
    Edit {
        /// Note id or title (case-insensitive prefix match)
        note: String,
        #[arg(long)]
        title: Option<String>,
        /// New body text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
    },

    /// Delete a note
    Rm {
        /// Note id or title (case-insensitive prefix match)
        note: String,
    },

    /// Show backend, session and sync status
    Status,

    /// Follow changes made from other devices
    Watch,
}

/// Read content from stdin if piped, or resolve "-" as stdin
fn resolve_content(content: Option<String>) -> Option<String> {
    match content.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
            Some(buf)
        }
        Some(_) => content,
        None => {
            // Auto-detect piped stdin
            if !stdin_is_tty() {
                let mut buf = String::new();
                std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
                if buf.is_empty() { None } else { Some(buf) }
            } else {
                None
            }
        }
    }
}

/// Use the given password, or read one line from stdin
fn resolve_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    if stdin_is_tty() {
        eprint!("Password: ");
    }
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("A password is required");
    }
    Ok(password)
}

/// Check if stdin is a terminal (not piped)
fn stdin_is_tty() -> bool {
    unsafe { libc_isatty(0) != 0 }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.config.as_deref())?;

    match cli.command {
        Command::Login { email, password } => {
            let password = resolve_password(password)?;
            commands::auth::run_login(&app, &email, &password).await?;
        }
        Command::Signup { email, password, name } => {
            let password = resolve_password(password)?;
            commands::auth::run_signup(&app, &email, &password, name.as_deref()).await?;
        }
        Command::Logout => {
            commands::auth::run_logout(&app).await?;
        }
        Command::ResetPassword { email } => {
            commands::auth::run_reset_password(&app, &email).await?;
        }
        Command::List { search } => {
            let reconciler = app.connect().await?;
            commands::list::run(&reconciler, search.as_deref(), &cli.format, use_color)?;
        }
        Command::Show { note } => {
            let reconciler = app.connect().await?;
            commands::show::run(&reconciler, &note, &cli.format, use_color)?;
        }
        Command::New { title, tags, content } => {
            let mut reconciler = app.connect_signed_in().await?;
            let content = resolve_content(content);
            commands::new::run(
                &mut reconciler,
                title.as_deref(),
                tags.as_deref(),
                content,
                &cli.format,
                use_color,
            )
            .await?;
        }
        Command::Edit { note, title, content } => {
            let mut reconciler = app.connect_signed_in().await?;
            let content = resolve_content(content);
            commands::edit::run(&mut reconciler, &note, title, content, &cli.format, use_color).await?;
        }
        Command::Rm { note } => {
            let mut reconciler = app.connect_signed_in().await?;
            commands::rm::run(&mut reconciler, &note, &cli.format, use_color).await?;
        }
        Command::Status => {
            commands::status::run(&app, &cli.format, use_color).await?;
        }
        Command::Watch => {
            let mut reconciler = app.connect_signed_in().await?;
            commands::watch::run(&mut reconciler, use_color).await?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
