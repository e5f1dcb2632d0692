use anyhow::{Context, Result};

use lumen_lib::auth::SignUpOutcome;

use crate::app::App;

pub async fn run_login(app: &App, email: &str, password: &str) -> Result<()> {
    let client = app.auth_client()?;
    let session = client.sign_in(email, password).await.context("Sign-in failed")?;
    app.sessions.save(&session).context("Failed to save session")?;
    println!("Signed in as {}", session.user.email.as_deref().unwrap_or(email));
    Ok(())
}

pub async fn run_signup(app: &App, email: &str, password: &str, display_name: Option<&str>) -> Result<()> {
    let client = app.auth_client()?;
    match client.sign_up(email, password, display_name).await.context("Sign-up failed")? {
        SignUpOutcome::SignedIn(session) => {
            app.sessions.save(&session).context("Failed to save session")?;
            println!("Account created, signed in as {}", email);
        }
        SignUpOutcome::ConfirmationRequired { email } => {
            println!("Account created. Check {} for a confirmation link, then run `lumen-cli login`.", email);
        }
    }
    Ok(())
}

/// Sign out remotely (best-effort) and forget the session and cached notes
pub async fn run_logout(app: &App) -> Result<()> {
    if let Some(session) = app.sessions.load() {
        if let Ok(client) = app.auth_client() {
            if let Err(e) = client.sign_out(&session).await {
                log::warn!("Remote sign-out failed: {}", e);
            }
        }
    }
    app.sessions.clear().context("Failed to clear session")?;

    let mut reconciler = app.connect().await?;
    reconciler.end_session();
    println!("Signed out");
    Ok(())
}

pub async fn run_reset_password(app: &App, email: &str) -> Result<()> {
    let client = app.auth_client()?;
    client.reset_password(email).await.context("Password reset failed")?;
    println!("If {} has an account, a reset link is on its way.", email);
    Ok(())
}
