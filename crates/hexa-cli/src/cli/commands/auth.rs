//! Sign-in, sign-up, sign-out and password commands.

use anyhow::{Result, bail};
use hexa_core::screens::{AccountScreen, ChangePasswordForm, LoginForm, RegisterForm};

use super::require_session;
use crate::cli::App;

pub async fn login(app: &App, email: &str, password: &str) -> Result<()> {
    let form = LoginForm::new(app.ctx());
    let Some(session) = form.submit(email, password).await else {
        bail!("Sign in failed");
    };
    println!(
        "Signed in as {}",
        session.user.email.as_deref().unwrap_or(session.user_id())
    );
    Ok(())
}

pub async fn register(app: &App, email: &str, password: &str) -> Result<()> {
    let form = RegisterForm::new(app.ctx());
    let Some(outcome) = form.submit(email, password).await else {
        bail!("Sign up failed");
    };
    if let Some(session) = outcome.session {
        println!("Account created, signed in as {}", session.user_id());
    }
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    if app.client().current_session().is_none() {
        println!("Not signed in");
        return Ok(());
    }
    if !AccountScreen::new(app.ctx()).sign_out().await {
        bail!("Sign out failed");
    }
    println!("Signed out");
    Ok(())
}

pub async fn change_password(app: &App, password: &str, confirm: &str) -> Result<()> {
    require_session(app).await?;
    if !ChangePasswordForm::new(app.ctx())
        .submit(password, confirm)
        .await
    {
        bail!("Password not changed");
    }
    Ok(())
}
