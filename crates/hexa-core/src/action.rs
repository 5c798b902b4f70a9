//! Async action wrapper with an in-flight flag.
//!
//! Every user-triggered backend call runs through [`InFlight::run`]: the flag
//! is raised for the duration of the call and always lowered when it settles,
//! whether it succeeds, fails, panics, or is dropped mid-way. Failures are
//! logged and swallowed; callers get `None`.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// What a trigger does while the same action is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Skip the new trigger
    #[default]
    SingleFlight,
    /// Run it; the flag stays raised until the last run settles
    Concurrent,
}

#[derive(Debug)]
struct FlagInner {
    /// Runs in progress; only touched under the channel lock.
    active: AtomicUsize,
    tx: watch::Sender<bool>,
}

/// Shared in-flight flag. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct InFlight {
    inner: Arc<FlagInner>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlight {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(FlagInner {
                active: AtomicUsize::new(0),
                tx,
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        *self.inner.tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.tx.subscribe()
    }

    fn enter(&self, policy: ReentryPolicy) -> Option<FlightGuard> {
        let mut admitted = false;
        self.inner.tx.send_if_modified(|flag| {
            let active = self.inner.active.load(Ordering::Relaxed);
            if active > 0 && policy == ReentryPolicy::SingleFlight {
                return false;
            }
            self.inner.active.store(active + 1, Ordering::Relaxed);
            admitted = true;
            let raised = !*flag;
            *flag = true;
            raised
        });
        admitted.then(|| FlightGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Runs `action` with the flag raised.
    ///
    /// Returns the value on success. Returns `None` when the action fails or
    /// panics (logged at error level) or when a single-flight trigger is
    /// skipped because a run is already in progress.
    pub async fn run<T, E, Fut>(&self, name: &str, policy: ReentryPolicy, action: Fut) -> Option<T>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.admit(name, policy)?;
        self.settle(guard, name, action).await
    }

    fn admit(&self, name: &str, policy: ReentryPolicy) -> Option<FlightGuard> {
        let guard = self.enter(policy);
        if guard.is_none() {
            tracing::debug!(action = name, "already in flight, trigger skipped");
        }
        guard
    }

    /// Awaits an admitted run; `_guard` lowers the flag on every exit.
    async fn settle<T, E, Fut>(&self, _guard: FlightGuard, name: &str, action: Fut) -> Option<T>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        tracing::debug!(action = name, "action started");
        let outcome = AssertUnwindSafe(action).catch_unwind().await;
        let elapsed_ms = started.elapsed().as_millis();

        match outcome {
            Ok(Ok(value)) => {
                tracing::debug!(action = name, elapsed_ms, "action succeeded");
                Some(value)
            }
            Ok(Err(err)) => {
                tracing::error!(action = name, elapsed_ms, error = %err, "action failed");
                None
            }
            Err(_) => {
                tracing::error!(action = name, elapsed_ms, "action panicked");
                None
            }
        }
    }
}

/// Lowers the flag when the last concurrent run settles.
struct FlightGuard {
    inner: Arc<FlagInner>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let inner = &self.inner;
        inner.tx.send_if_modified(|flag| {
            let remaining = inner.active.load(Ordering::Relaxed).saturating_sub(1);
            inner.active.store(remaining, Ordering::Relaxed);
            if remaining == 0 && *flag {
                *flag = false;
                true
            } else {
                false
            }
        });
    }
}

/// A named action bound to one in-flight flag.
pub struct AsyncAction<F> {
    name: String,
    action: F,
    policy: ReentryPolicy,
    flag: InFlight,
}

impl<F, Fut, T, E> AsyncAction<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            action,
            policy: ReentryPolicy::default(),
            flag: InFlight::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReentryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn in_flight(&self) -> bool {
        self.flag.is_set()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.flag.watch()
    }

    /// Runs the action once. See [`InFlight::run`].
    ///
    /// The action is only invoked after the trigger is admitted.
    pub async fn trigger(&self) -> Option<T> {
        let guard = self.flag.admit(&self.name, self.policy)?;
        self.flag.settle(guard, &self.name, (self.action)()).await
    }
}

impl<F> fmt::Debug for AsyncAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncAction")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("in_flight", &self.flag.is_set())
            .finish_non_exhaustive()
    }
}
