//! Change-notification callbacks and the ordered registry kept by an authority.

use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

type CallbackFn = dyn Fn(bool) -> anyhow::Result<()> + Send + Sync;

/// A change callback. Receives `true` after login and `false` after logout.
///
/// Equality is reference identity: two handles are equal only when they were
/// cloned from the same original.
#[derive(Clone)]
pub struct ChangeCallback(Arc<CallbackFn>);

impl ChangeCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        ChangeCallback(Arc::new(f))
    }

    /// Wrap a callback that cannot fail.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        ChangeCallback(Arc::new(move |logged_in| {
            f(logged_in);
            Ok(())
        }))
    }

    pub fn call(&self, logged_in: bool) -> anyhow::Result<()> { (self.0)(logged_in) }

    fn addr(&self) -> *const () { Arc::as_ptr(&self.0).cast::<()>() }
}

impl PartialEq for ChangeCallback {
    fn eq(&self, other: &Self) -> bool { self.addr() == other.addr() }
}

impl Eq for ChangeCallback {}

impl Debug for ChangeCallback {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChangeCallback({:p})", self.addr())
    }
}

/// Which callbacks a login/logout leaves out of its fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Suppress {
    #[default]
    None,
    All,
    Only(ChangeCallback),
}

impl Suppress {
    /// Suppression for a call forwarded from a delegate: without an explicit
    /// choice, the delegate's own callback is left out.
    pub fn or_own(self, own: Option<&ChangeCallback>) -> Self {
        match (self, own) {
            (Suppress::None, Some(cb)) => Suppress::Only(cb.clone()),
            (s, _) => s,
        }
    }

    fn skips(&self, cb: &ChangeCallback) -> bool {
        match self {
            Suppress::None => false,
            Suppress::All => true,
            Suppress::Only(other) => other == cb,
        }
    }
}

impl From<bool> for Suppress {
    fn from(all: bool) -> Self { if all { Suppress::All } else { Suppress::None } }
}

impl From<ChangeCallback> for Suppress {
    fn from(cb: ChangeCallback) -> Self { Suppress::Only(cb) }
}

/// Ordered callback list owned by an authority.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    callbacks: Mutex<Vec<ChangeCallback>>,
}

impl CallbackRegistry {
    pub fn new(seed: Option<ChangeCallback>) -> Self {
        Self { callbacks: Mutex::new(seed.into_iter().collect()) }
    }

    pub fn register(&self, cb: ChangeCallback) { self.callbacks.lock().push(cb); }

    pub fn len(&self) -> usize { self.callbacks.lock().len() }

    pub fn is_empty(&self) -> bool { self.callbacks.lock().is_empty() }

    /// Invoke every callback in registration order except the suppressed
    /// ones. A callback that errors or panics is logged and skipped; the
    /// remaining callbacks still run. Returns how many were invoked.
    pub fn fan_out(&self, logged_in: bool, suppress: &Suppress) -> usize {
        if matches!(suppress, Suppress::All) { return 0; }
        // snapshot so a callback may register or inspect without deadlocking
        let callbacks: Vec<ChangeCallback> = self.callbacks.lock().clone();
        let mut invoked = 0usize;
        for (idx, cb) in callbacks.iter().enumerate() {
            if suppress.skips(cb) { continue; }
            invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| cb.call(logged_in))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(target: "gallery_auth::session", "onchange callback #{} failed: {}", idx, e),
                Err(_) => warn!(target: "gallery_auth::session", "onchange callback #{} panicked", idx),
            }
        }
        invoked
    }
}
