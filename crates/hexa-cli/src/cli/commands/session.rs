//! Session gate commands.

use std::sync::Arc;

use anyhow::Result;
use hexa_core::gate::{GateOptions, GateSnapshot, GateState, SessionGate};
use hexa_core::interrupt;
use hexa_core::navigation::Navigator;

use crate::cli::App;

fn activate(app: &App) -> Result<SessionGate> {
    let options = GateOptions::from_config(&app.ctx().config);
    Ok(SessionGate::activate(Arc::new(app.client().clone()), options)?)
}

fn print_snapshot(snapshot: &GateSnapshot) {
    println!("state: {}", snapshot.state);
    println!("screen: {}", snapshot.screen_group());
    if let Some(session) = &snapshot.session {
        println!("user: {}", session.user_id());
        if let Some(email) = &session.user.email {
            println!("email: {email}");
        }
    }
    if let Some(error) = &snapshot.error {
        println!("error: {error}");
    }
}

pub async fn status(app: &App) -> Result<()> {
    let gate = activate(app)?;
    let snapshot = gate.wait_initialized().await;
    print_snapshot(&snapshot);
    gate.teardown();
    Ok(())
}

/// Prints every screen change until Ctrl+C.
pub async fn watch(app: &mut App) -> Result<()> {
    let gate = activate(app)?;
    let refresh = app
        .ctx()
        .config
        .auth
        .auto_refresh
        .then(|| app.client().start_auto_refresh());

    let mut rx = gate.watch();
    let mut navigator = Navigator::new();
    let mut first = true;
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if navigator.sync(&snapshot) || first {
            println!("screen: {} ({})", navigator.group(), navigator.current());
            if snapshot.state == GateState::LookupFailed {
                print_snapshot(&snapshot);
            }
        }
        first = false;
        app.flush_notices();

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = interrupt::wait_for_interrupt() => break,
        }
    }

    if let Some(refresh) = refresh {
        refresh.unsubscribe();
    }
    gate.teardown();
    Ok(())
}
