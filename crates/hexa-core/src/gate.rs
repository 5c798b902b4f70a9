//! Session gate: decides which top-level screen group is mounted.
//!
//! The gate issues one session lookup on activation and keeps one
//! subscription to session-change events for the rest of its life. A single
//! driver task owns all writes; observers read [`GateSnapshot`]s from a
//! `watch` channel.
//!
//! ```text
//! Initializing ──lookup Some──▶ Authenticated ◀──event Some── ┐
//!      │                            │                          │
//!      ├──lookup None──▶ Unauthenticated ◀──event None─────────┘
//!      └──lookup Err──▶ Unauthenticated | LookupFailed (policy)
//! ```
//!
//! `Initializing` is left exactly once and never re-entered.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::backend::{AuthEvent, BackendClient, BackendResult, Session};
use crate::navigation::ScreenGroup;

/// Where the gate gets sessions from.
pub trait SessionSource: Send + Sync + 'static {
    /// One-shot lookup of the current session.
    fn lookup_session(&self) -> impl Future<Output = BackendResult<Option<Session>>> + Send;

    /// Opens a subscription to session-change events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Lease allowing at most one live gate per source.
    fn gate_lease(&self) -> &GateLease;
}

impl SessionSource for BackendClient {
    fn lookup_session(&self) -> impl Future<Output = BackendResult<Option<Session>>> + Send {
        self.get_session()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        BackendClient::subscribe(self)
    }

    fn gate_lease(&self) -> &GateLease {
        BackendClient::gate_lease(self)
    }
}

/// Exclusive right to run a gate against a source.
#[derive(Debug, Default)]
pub struct GateLease {
    active: Arc<AtomicBool>,
}

impl GateLease {
    fn try_acquire(&self) -> Option<LeaseGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LeaseGuard {
                active: Arc::clone(&self.active),
            })
    }

    /// Returns true while a gate is active on this source.
    pub fn is_held(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct LeaseGuard {
    active: Arc<AtomicBool>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// How a failed initial lookup is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    /// Treat the failure as "no session"
    #[default]
    Collapse,
    /// Enter [`GateState::LookupFailed`]
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Initializing,
    Unauthenticated,
    Authenticated,
    /// The initial lookup failed; navigates like `Unauthenticated`.
    LookupFailed,
}

/// Inputs to the gate state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateInput {
    LookupResolved { present: bool },
    LookupFailed,
    SessionChanged { present: bool },
}

impl GateState {
    /// Transition table. `None` means the input is not accepted in this state.
    pub fn transition(self, input: GateInput, policy: LookupFailurePolicy) -> Option<GateState> {
        use GateInput::{LookupFailed, LookupResolved, SessionChanged};

        match (self, input) {
            (Self::Initializing, LookupResolved { present }) => Some(Self::from_presence(present)),
            (Self::Initializing, LookupFailed) => Some(match policy {
                LookupFailurePolicy::Collapse => Self::Unauthenticated,
                LookupFailurePolicy::Surface => Self::LookupFailed,
            }),
            // Events during the lookup are held back by the driver.
            (Self::Initializing, SessionChanged { .. }) => None,
            (_, LookupResolved { .. } | LookupFailed) => None,
            (_, SessionChanged { present }) => Some(Self::from_presence(present)),
        }
    }

    fn from_presence(present: bool) -> Self {
        if present {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }

    pub fn screen_group(self) -> ScreenGroup {
        match self {
            Self::Initializing => ScreenGroup::Loading,
            Self::Unauthenticated | Self::LookupFailed => ScreenGroup::AuthFlow,
            Self::Authenticated => ScreenGroup::MainTabs,
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initializing => "initializing",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::LookupFailed => "lookup failed",
        };
        f.write_str(label)
    }
}

/// Identity of the mounted screen stack.
///
/// Changes only when the screen group changes, so repeated events with the
/// same session presence never remount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId(u64);

impl StackId {
    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// What observers see.
#[derive(Debug, Clone)]
pub struct GateSnapshot {
    pub state: GateState,
    pub session: Option<Session>,
    /// True until the initial lookup resolves; never set again.
    pub initializing: bool,
    pub stack: StackId,
    /// Lookup failure message under [`LookupFailurePolicy::Surface`].
    pub error: Option<String>,
}

impl GateSnapshot {
    fn initial() -> Self {
        Self {
            state: GateState::Initializing,
            session: None,
            initializing: true,
            stack: StackId::default(),
            error: None,
        }
    }

    pub fn screen_group(&self) -> ScreenGroup {
        self.state.screen_group()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == GateState::Authenticated
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GateOptions {
    pub lookup_failure: LookupFailurePolicy,
}

impl GateOptions {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            lookup_failure: config.gate.lookup_failure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// Another gate is live on the same source.
    AlreadyActive,
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => f.write_str("A session gate is already active"),
        }
    }
}

impl std::error::Error for GateError {}

/// State shared between the handle and the driver task.
struct Shared {
    tx: watch::Sender<GateSnapshot>,
    torn_down: AtomicBool,
    policy: LookupFailurePolicy,
}

impl Shared {
    fn apply_lookup(&self, result: BackendResult<Option<Session>>) {
        let (input, session, error) = match result {
            Ok(session) => (
                GateInput::LookupResolved {
                    present: session.is_some(),
                },
                session,
                None,
            ),
            Err(err) => {
                tracing::warn!(error = %err, policy = ?self.policy, "initial session lookup failed");
                let error = match self.policy {
                    LookupFailurePolicy::Collapse => None,
                    LookupFailurePolicy::Surface => Some(err.to_string()),
                };
                (GateInput::LookupFailed, None, error)
            }
        };
        self.apply(input, session, error);
    }

    fn apply_session(&self, session: Option<Session>) {
        let input = GateInput::SessionChanged {
            present: session.is_some(),
        };
        self.apply(input, session, None);
    }

    /// Applies one input. Dropped silently once torn down.
    fn apply(&self, input: GateInput, session: Option<Session>, error: Option<String>) {
        self.tx.send_if_modified(|snapshot| {
            if self.torn_down.load(Ordering::Acquire) {
                return false;
            }
            let Some(next) = snapshot.state.transition(input, self.policy) else {
                tracing::debug!(state = %snapshot.state, ?input, "gate input ignored");
                return false;
            };

            let previous = snapshot.state;
            let regrouped = previous.screen_group() != next.screen_group();
            if regrouped {
                snapshot.stack = snapshot.stack.next();
            }
            if previous != next {
                tracing::info!(from = %previous, to = %next, "gate transition");
            }

            let notify = regrouped || previous != next || snapshot.initializing;
            snapshot.state = next;
            snapshot.session = session;
            snapshot.initializing = false;
            snapshot.error = error;
            notify
        });
    }

    fn tear_down(&self) {
        // Set under the channel lock so no in-progress apply can land after.
        self.tx.send_if_modified(|_| {
            self.torn_down.store(true, Ordering::Release);
            false
        });
    }
}

/// A live session gate.
///
/// Dropping the gate tears it down: the subscription is released, the
/// pending lookup is abandoned, and no further state changes are published.
pub struct SessionGate {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _lease: LeaseGuard,
}

impl SessionGate {
    /// Starts the gate: subscribes to session changes, then issues the one
    /// initial lookup. Must be called within a Tokio runtime.
    pub fn activate<S: SessionSource>(
        source: Arc<S>,
        options: GateOptions,
    ) -> Result<Self, GateError> {
        let lease = source
            .gate_lease()
            .try_acquire()
            .ok_or(GateError::AlreadyActive)?;

        // Subscribe before the lookup is issued so no change slips between.
        let events = source.subscribe();
        let (tx, _) = watch::channel(GateSnapshot::initial());
        let shared = Arc::new(Shared {
            tx,
            torn_down: AtomicBool::new(false),
            policy: options.lookup_failure,
        });
        let cancel = CancellationToken::new();

        tokio::spawn(drive(
            source,
            events,
            Arc::clone(&shared),
            cancel.clone(),
        ));
        tracing::debug!(policy = ?options.lookup_failure, "session gate activated");

        Ok(Self {
            shared,
            cancel,
            _lease: lease,
        })
    }

    pub fn snapshot(&self) -> GateSnapshot {
        self.shared.tx.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn watch(&self) -> watch::Receiver<GateSnapshot> {
        self.shared.tx.subscribe()
    }

    /// Waits until the initial lookup has resolved.
    pub async fn wait_initialized(&self) -> GateSnapshot {
        let mut rx = self.watch();
        match rx.wait_for(|snapshot| !snapshot.initializing).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Tears the gate down. Equivalent to dropping it.
    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.shared.tear_down();
        self.cancel.cancel();
        tracing::debug!("session gate torn down");
    }
}

async fn drive<S: SessionSource>(
    source: Arc<S>,
    mut events: broadcast::Receiver<AuthEvent>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let lookup = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = source.lookup_session() => result,
    };
    shared.apply_lookup(lookup);

    // Events that arrived during the lookup are still queued and apply now.
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    tracing::debug!(kind = ?event.kind, "session changed");
                    shared.apply_session(event.session);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "gate lagged behind session events, resyncing");
                    let resync = tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        result = source.lookup_session() => result,
                    };
                    match resync {
                        Ok(session) => shared.apply_session(session),
                        Err(err) => tracing::warn!(error = %err, "gate resync failed"),
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
