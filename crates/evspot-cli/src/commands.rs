//! Command handlers. Each one drives the session manager and prints the
//! outcome; all state changes go through `SessionManager`.

use std::io::{self, Write};

use anyhow::{bail, Result};
use tracing::{debug, warn};

use evspot_core::{AuthState, Config, SessionManager};

use crate::form;

/// Log every published auth state change
pub fn watch_state(manager: &SessionManager) {
    let mut rx = manager.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            debug!(
                authenticated = state.is_authenticated(),
                loading = state.is_loading,
                "Auth state changed"
            );
        }
    });
}

/// One-line summary of who is signed in
pub fn describe(state: &AuthState) -> String {
    match (&state.user, &state.session) {
        (Some(user), Some(session)) => {
            let mut line = format!("Signed in as {} <{}>", user.display_name(), user.email);
            if let Some(minutes) = session.minutes_until_expiry() {
                line.push_str(&format!(" (session expires in {} min)", minutes));
            }
            line
        }
        _ => "Not signed in".to_string(),
    }
}

/// JSON view of the state with the bearer token left out
pub fn redacted_json(state: &AuthState) -> serde_json::Value {
    serde_json::json!({
        "is_authenticated": state.is_authenticated(),
        "is_loading": state.is_loading,
        "user": state.user,
        "session_expires_at": state.session.as_ref().map(|s| s.expires_at.as_str()),
    })
}

pub fn status(manager: &SessionManager, json: bool) -> Result<()> {
    let state = manager.state();
    if json {
        println!("{}", serde_json::to_string_pretty(&redacted_json(&state))?);
    } else {
        println!("{}", describe(&state));
    }
    Ok(())
}

pub async fn login(manager: &SessionManager, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    if email.trim().is_empty() {
        bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    manager.login(email.trim(), &password).await?;
    remember_email(config, email.trim());
    println!("{}", describe(&manager.state()));
    Ok(())
}

pub async fn register(
    manager: &SessionManager,
    config: &mut Config,
    name: &str,
    email: &str,
) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;

    let errors = form::validate_signup(name, email, &password, &confirm);
    if let Some(first) = errors.first() {
        for error in &errors {
            eprintln!("{}: {}", error.field, error.message);
        }
        bail!("{}", first.message);
    }

    manager.register(name.trim(), email.trim(), &password).await?;
    remember_email(config, email.trim());
    println!("{}", describe(&manager.state()));
    Ok(())
}

pub async fn logout(manager: &SessionManager) -> Result<()> {
    manager.logout().await?;
    println!("Signed out");
    Ok(())
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}
