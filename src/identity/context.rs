//! Enclosing widget instances and the resolver that elects one authority per realm.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tracing::debug;

use crate::error::AuthResult;

use super::realm::Realm;
use super::session::UserSession;

/// A widget instance that may enclose other instances and may host a user
/// session sub-instance.
#[async_trait]
pub trait Host: Send + Sync {
    fn name(&self) -> &str;
    fn parent(&self) -> Option<Arc<dyn Host>>;
    /// The user session hosted by this instance, if any.
    fn user(&self) -> Option<Arc<UserSession>>;
    /// (Re)render this instance.
    async fn start(&self) -> AuthResult<()>;
}

/// Walk the enclosing instances upward and return the authority of the
/// topmost hosted user session in `realm`, or `None` when no ancestor
/// participates in that realm.
pub fn resolve_authority(parent: Option<Arc<dyn Host>>, realm: &Realm) -> Option<Arc<UserSession>> {
    let mut found: Option<(usize, String, Arc<UserSession>)> = None;
    let mut depth = 0usize;
    let mut cursor = parent;
    while let Some(host) = cursor {
        depth += 1;
        if let Some(user) = host.user() {
            if user.realm() == realm {
                found = Some((depth, host.name().to_string(), user));
            }
        }
        cursor = host.parent();
    }
    match found {
        Some((depth, name, user)) => {
            debug!(target: "gallery_auth::resolver", "realm={} delegates to ancestor {} at depth={}", realm, name, depth);
            Some(user.authority_handle())
        }
        None => {
            debug!(target: "gallery_auth::resolver", "realm={} has no ancestor session; instance is authority", realm);
            None
        }
    }
}

/// Generic host: a named node in the instance tree.
pub struct WidgetNode {
    name: String,
    parent: Option<Weak<dyn Host>>,
    user: OnceLock<Arc<UserSession>>,
    starts: AtomicUsize,
}

impl WidgetNode {
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into(), parent: None, user: OnceLock::new(), starts: AtomicUsize::new(0) })
    }

    pub fn child(name: impl Into<String>, parent: &Arc<dyn Host>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(Arc::downgrade(parent)),
            user: OnceLock::new(),
            starts: AtomicUsize::new(0),
        })
    }

    /// Host `user` in this node. Returns false if a user was already attached.
    pub fn attach_user(&self, user: Arc<UserSession>) -> bool { self.user.set(user).is_ok() }

    /// How many times `start` ran.
    pub fn starts(&self) -> usize { self.starts.load(Ordering::SeqCst) }

    pub fn as_host(self: &Arc<Self>) -> Arc<dyn Host> { self.clone() }
}

#[async_trait]
impl Host for WidgetNode {
    fn name(&self) -> &str { &self.name }

    fn parent(&self) -> Option<Arc<dyn Host>> { self.parent.as_ref().and_then(Weak::upgrade) }

    fn user(&self) -> Option<Arc<UserSession>> { self.user.get().cloned() }

    async fn start(&self) -> AuthResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        debug!(target: "gallery_auth::resolver", "host {} started", self.name);
        if let Some(user) = self.user.get() {
            user.start().await?;
        }
        Ok(())
    }
}
