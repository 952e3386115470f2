//! The user session widget instance.
//!
//! Every instance resolves, once at construction, whether it is the authority
//! of its realm or a delegate of a higher instance in the same realm. Only the
//! authority owns the session record, the persisted copy and the callback
//! registry; a delegate forwards every call to its authority.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::UserConfig;
use crate::error::{AuthError, AuthResult};
use crate::render::{self, ButtonAction, Element, ViewKind};
use crate::storage::SessionStore;

use super::callbacks::{CallbackRegistry, ChangeCallback, Suppress};
use super::context::{resolve_authority, Host};
use super::prompt::FailureNotifier;
use super::provider::{AuthGateway, GatewayRequest};
use super::realm::{Realm, SessionKey};
use super::record::UserRecord;

/// External collaborators of a session. Every instance receives them, only
/// the authority uses them.
#[derive(Clone)]
pub struct SessionDeps {
    pub gateway: Arc<dyn AuthGateway>,
    pub store: Arc<dyn SessionStore>,
    pub notifier: Arc<dyn FailureNotifier>,
}

impl SessionDeps {
    pub fn new(gateway: Arc<dyn AuthGateway>, store: Arc<dyn SessionStore>, notifier: Arc<dyn FailureNotifier>) -> Self {
        Self { gateway, store, notifier }
    }
}

struct AuthorityState {
    record: Mutex<Option<UserRecord>>,
    callbacks: CallbackRegistry,
    /// Serializes login/logout so a second caller sees the first one's outcome.
    transition: tokio::sync::Mutex<()>,
}

impl AuthorityState {
    fn new(own: Option<ChangeCallback>) -> Self {
        Self { record: Mutex::new(None), callbacks: CallbackRegistry::new(own), transition: tokio::sync::Mutex::new(()) }
    }

    fn current(&self) -> Option<UserRecord> { self.record.lock().clone() }
}

enum Role {
    Authority(AuthorityState),
    Delegate(Arc<UserSession>),
}

pub struct UserSession {
    config: UserConfig,
    realm: Realm,
    parent: Option<Weak<dyn Host>>,
    role: Role,
    deps: SessionDeps,
    element: Mutex<Element>,
}

impl UserSession {
    /// Construct an instance under `parent` and resolve its authority.
    ///
    /// If an enclosing instance hosts a session in the same realm, the topmost
    /// one becomes this instance's authority and this instance's `onchange`
    /// callback is appended to the authority's registry. Otherwise this
    /// instance is its own authority, seeded with its own callback.
    pub fn new(config: UserConfig, deps: SessionDeps, parent: Option<&Arc<dyn Host>>) -> Arc<Self> {
        let realm = config.realm();
        let role = match resolve_authority(parent.cloned(), &realm) {
            Some(authority) => {
                if let Some(cb) = &config.onchange {
                    authority.register(cb.clone());
                }
                Role::Delegate(authority)
            }
            None => Role::Authority(AuthorityState::new(config.onchange.clone())),
        };
        Arc::new(Self {
            realm,
            parent: parent.map(Arc::downgrade),
            role,
            deps,
            element: Mutex::new(Element::default()),
            config,
        })
    }

    /// Construct, make ready (possibly logging in) and render.
    pub async fn create(config: UserConfig, deps: SessionDeps, parent: Option<&Arc<dyn Host>>) -> AuthResult<Arc<Self>> {
        let session = Self::new(config, deps, parent);
        session.ready().await?;
        session.start().await?;
        Ok(session)
    }

    pub fn realm(&self) -> &Realm { &self.realm }

    pub fn config(&self) -> &UserConfig { &self.config }

    pub fn is_authority(&self) -> bool { matches!(self.role, Role::Authority(_)) }

    /// Handle to the authority this instance forwards to (itself when it is one).
    pub fn authority_handle(self: &Arc<Self>) -> Arc<UserSession> {
        match &self.role {
            Role::Authority(_) => self.clone(),
            Role::Delegate(authority) => authority.clone(),
        }
    }

    /// Size of the callback registry, or `None` for a delegate, which has none.
    pub fn registered_callbacks(&self) -> Option<usize> {
        match &self.role {
            Role::Authority(state) => Some(state.callbacks.len()),
            Role::Delegate(_) => None,
        }
    }

    pub fn session_key(&self) -> SessionKey { SessionKey::new(self.config.component.clone(), self.realm.clone()) }

    /// Snapshot of this instance's own rendered content.
    pub fn root(&self) -> Element { self.element.lock().clone() }

    fn authority(&self) -> &UserSession {
        match &self.role {
            Role::Authority(_) => self,
            Role::Delegate(authority) => authority,
        }
    }

    fn state(&self) -> &AuthorityState {
        match &self.role {
            Role::Authority(state) => state,
            Role::Delegate(authority) => authority.state(),
        }
    }

    fn register(&self, cb: ChangeCallback) { self.state().callbacks.register(cb); }

    /// Calls forwarded from a delegate leave its own callback out unless the
    /// caller chose otherwise.
    fn forwarded(&self, suppress: Suppress) -> Suppress {
        match &self.role {
            Role::Authority(_) => suppress,
            Role::Delegate(_) => suppress.or_own(self.config.onchange.as_ref()),
        }
    }

    fn gateway_request(&self) -> GatewayRequest {
        GatewayRequest { realm: self.realm.clone(), pseudo: self.config.pseudo }
    }

    fn parent_host(&self) -> Option<Arc<dyn Host>> { self.parent.as_ref().and_then(Weak::upgrade) }

    /// Clear the own view, then log in without notifying anyone when the
    /// `logged_in` option is set or a persisted record exists.
    pub async fn ready(&self) -> AuthResult<()> {
        self.element.lock().clear();
        let auto = self.config.logged_in || self.authority().has_persisted().await;
        if auto {
            self.login(Suppress::All).await?;
        }
        Ok(())
    }

    async fn has_persisted(&self) -> bool {
        match self.deps.store.get(&self.session_key()).await {
            Ok(v) => v.is_some(),
            Err(e) => {
                warn!(target: "gallery_auth::session", "session store read failed for {}: {}", self.session_key(), e);
                false
            }
        }
    }

    /// Render the current state. Delegates render their authority.
    pub async fn start(&self) -> AuthResult<()> {
        self.authority().render();
        Ok(())
    }

    fn render(&self) {
        if self.config.norender { return; }
        let current = self.value();
        let kind = if current.is_some() { ViewKind::LoggedIn } else { ViewKind::LoggedOut };
        if self.element.lock().shows(kind) { return; }
        let next = match current {
            Some(rec) => render::logged_in_view(&self.config.html, &self.username_of(&rec), rec.picture().unwrap_or_default()),
            None => render::logged_out_view(&self.config.html),
        };
        *self.element.lock() = next;
    }

    /// Perform the action of the rendered button, if any.
    pub async fn click(&self) -> AuthResult<Option<ButtonAction>> {
        let action = self.element.lock().button();
        match action {
            Some(ButtonAction::Login) => { self.login(Suppress::None).await?; }
            Some(ButtonAction::Logout) => self.logout(Suppress::None).await?,
            None => {}
        }
        Ok(action)
    }

    /// Log in and return a copy of the user record.
    ///
    /// Already logged in: returns the current record without side effects.
    /// Otherwise the persisted record is reused if present, else the gateway
    /// is asked until it returns a valid record, with the notifier
    /// acknowledging each failure before the next attempt. A failure the
    /// notifier does not acknowledge ends the login with that error.
    pub async fn login(&self, suppress: Suppress) -> AuthResult<UserRecord> {
        let suppress = self.forwarded(suppress);
        self.authority().login_as_authority(suppress).await
    }

    async fn login_as_authority(&self, suppress: Suppress) -> AuthResult<UserRecord> {
        let state = self.state();
        let _guard = state.transition.lock().await;
        if let Some(rec) = state.current() {
            return Ok(rec);
        }

        let key = self.session_key();
        let (mut data, source) = match self.restore(&key).await {
            Some(rec) => (rec, "store"),
            None => (self.authenticate().await?, "gateway"),
        };
        data.set("realm", self.realm.as_str());
        if data.picture().is_none() {
            if let Some(picture) = &self.config.picture {
                data.set("picture", picture.as_str());
            }
        }

        self.deps.store.set(&key, data.to_json()?).await?;
        *state.record.lock() = Some(data.clone());
        info!(target: "gallery_auth::session", "login user={} realm={} source={}", data.key().unwrap_or_default(), self.realm, source);

        self.render();
        let notified = state.callbacks.fan_out(true, &suppress);
        debug!(target: "gallery_auth::session", "login notified {} callback(s)", notified);
        Ok(data)
    }

    async fn restore(&self, key: &SessionKey) -> Option<UserRecord> {
        let text = match self.deps.store.get(key).await {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(target: "gallery_auth::session", "session store read failed for {}: {}", key, e);
                return None;
            }
        };
        match UserRecord::from_json(&text) {
            Ok(rec) => Some(rec),
            Err(e) => {
                warn!(target: "gallery_auth::session", "discarding unusable persisted record {}: {}", key, e);
                if let Err(e) = self.deps.store.remove(key).await {
                    warn!(target: "gallery_auth::session", "could not remove {}: {}", key, e);
                }
                None
            }
        }
    }

    async fn authenticate(&self) -> AuthResult<UserRecord> {
        let req = self.gateway_request();
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            let err = match self.deps.gateway.login(&req).await {
                Ok(raw) => match UserRecord::from_gateway(raw) {
                    Ok(rec) => return Ok(rec),
                    Err(e) => e,
                },
                Err(e) => AuthError::gateway("gateway_unreachable", e.to_string()),
            };
            warn!(target: "gallery_auth::session", "login attempt {} realm={} failed: {}", attempt, self.realm, err);
            if !self.deps.notifier.authentication_failed(&err).await {
                return Err(err);
            }
        }
    }

    /// Log out. The gateway is told on a best-effort basis; locally the
    /// session always ends.
    pub async fn logout(&self, suppress: Suppress) -> AuthResult<()> {
        let suppress = self.forwarded(suppress);
        self.authority().logout_as_authority(suppress).await
    }

    async fn logout_as_authority(&self, suppress: Suppress) -> AuthResult<()> {
        let state = self.state();
        let _guard = state.transition.lock().await;
        if state.current().is_none() {
            return Ok(());
        }

        if let Err(e) = self.deps.gateway.logout(&self.gateway_request()).await {
            warn!(target: "gallery_auth::gateway", "logout request failed (ignored): {}", e);
        }
        let previous = state.record.lock().take();
        let key = self.session_key();
        if let Err(e) = self.deps.store.remove(&key).await {
            warn!(target: "gallery_auth::session", "could not remove persisted session {}: {}", key, e);
        }
        info!(
            target: "gallery_auth::session",
            "logout user={} realm={}",
            previous.as_ref().and_then(UserRecord::key).unwrap_or_default(),
            self.realm
        );

        let rendered = match self.parent_host() {
            Some(parent) if self.config.restart => parent.start().await,
            _ => {
                self.render();
                Ok(())
            }
        };
        let notified = state.callbacks.fan_out(false, &suppress);
        debug!(target: "gallery_auth::session", "logout notified {} callback(s)", notified);
        rendered
    }

    pub fn is_logged_in(&self) -> bool { self.state().record.lock().is_some() }

    /// Copy of the current user record, `None` when logged out.
    pub fn value(&self) -> Option<UserRecord> { self.state().current() }

    /// Display name: the configured map first, then `name`, `user`, `key`.
    pub fn username(&self) -> Option<String> { self.value().map(|rec| self.username_of(&rec)) }

    fn username_of(&self, rec: &UserRecord) -> String {
        self.config.map.as_ref().and_then(|m| m.apply(rec)).filter(|s| !s.is_empty())
            .or_else(|| rec.non_empty("name").map(str::to_string))
            .or_else(|| rec.non_empty("user").map(str::to_string))
            .or_else(|| rec.non_empty("key").map(str::to_string))
            .unwrap_or_default()
    }
}
