//! Options recognized by the user session widget, plus the environment-driven
//! settings of the demo binary.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::identity::{ChangeCallback, Realm, UserRecord};

pub const DEFAULT_COMPONENT: &str = "user";
pub const DEFAULT_PICTURE: &str = "resources/icon.svg";

/// Maps a full user record to the name shown in the logged-in view.
#[derive(Clone)]
pub struct UsernameMap(Arc<dyn Fn(&UserRecord) -> Option<String> + Send + Sync>);

impl UsernameMap {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&UserRecord) -> Option<String> + Send + Sync + 'static,
    {
        UsernameMap(Arc::new(f))
    }

    pub fn apply(&self, rec: &UserRecord) -> Option<String> { (self.0)(rec) }
}

impl Debug for UsernameMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("UsernameMap(..)") }
}

/// Markup for the two mutually exclusive views. `%user%` and `%picture%`
/// are substituted in the logged-in view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub logged_in: String,
    pub logged_out: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            logged_in: concat!(
                r#"<div id="logged_in"><div id="user"><img src="%picture%" alt="User" height="24px">%user%</div>"#,
                r#"<button id="button">Logout</button></div>"#
            ).to_string(),
            logged_out: r#"<div id="logged_out"><button id="button">Login</button></div>"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Component identity; together with the realm it keys the persisted session.
    pub component: String,
    /// Log in at ready time even without a persisted record.
    pub logged_in: bool,
    /// Never render the login/logout views.
    pub norender: bool,
    /// Avatar used when the gateway record carries none.
    pub picture: Option<String>,
    /// Pseudonymous realm and login endpoint.
    pub pseudo: bool,
    /// On logout, restart the enclosing instance instead of re-rendering self.
    pub restart: bool,
    pub html: Templates,
    #[serde(skip)]
    pub map: Option<UsernameMap>,
    #[serde(skip)]
    pub onchange: Option<ChangeCallback>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            component: DEFAULT_COMPONENT.to_string(),
            logged_in: false,
            norender: false,
            picture: Some(DEFAULT_PICTURE.to_string()),
            pseudo: false,
            restart: false,
            html: Templates::default(),
            map: None,
            onchange: None,
        }
    }
}

impl UserConfig {
    pub fn from_json_str(text: &str) -> AuthResult<Self> {
        serde_json::from_str(text).map_err(|e| AuthError::config("config_parse", e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuthError::config("config_read", format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn realm(&self) -> Realm { Realm::for_mode(self.pseudo) }

    pub fn with_onchange(mut self, cb: ChangeCallback) -> Self { self.onchange = Some(cb); self }

    pub fn with_map(mut self, map: UsernameMap) -> Self { self.map = Some(map); self }

    pub fn with_pseudo(mut self, pseudo: bool) -> Self { self.pseudo = pseudo; self }

    pub fn with_restart(mut self, restart: bool) -> Self { self.restart = restart; self }

    pub fn with_logged_in(mut self, logged_in: bool) -> Self { self.logged_in = logged_in; self }

    pub fn with_norender(mut self, norender: bool) -> Self { self.norender = norender; self }

    pub fn with_component(mut self, component: impl Into<String>) -> Self { self.component = component.into(); self }
}

/// Settings of the demo binary, read from the environment.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Gateway base URL. Unset means the offline static gateway.
    pub gateway_url: Option<String>,
    pub user_config: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
    pub session_idle: Option<Duration>,
    pub gallery_data: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> AuthResult<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let session_idle = match var("GALLERY_SESSION_IDLE_SECS") {
            Some(v) => Some(Duration::from_secs(v.trim().parse::<u64>().map_err(|e| {
                AuthError::config("config_env", format!("GALLERY_SESSION_IDLE_SECS='{}': {}", v, e))
            })?)),
            None => None,
        };
        Ok(Self {
            gateway_url: var("GALLERY_AUTH_URL"),
            user_config: var("GALLERY_USER_CONFIG").map(PathBuf::from),
            session_file: var("GALLERY_SESSION_FILE").map(PathBuf::from),
            session_idle,
            gallery_data: var("GALLERY_DATA").map(PathBuf::from),
        })
    }

    pub fn load_user_config(&self) -> AuthResult<UserConfig> {
        match &self.user_config {
            Some(p) => UserConfig::from_path(p),
            None => Ok(UserConfig::default()),
        }
    }
}
