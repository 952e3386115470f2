use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub const NAMED_REALM: &str = "hbrsinfkaul";
pub const PSEUDO_REALM: &str = "hbrsinfpseudo";

/// Authentication domain. Instances in different realms never share a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Realm(String);

impl Realm {
    /// Realm selected by the `pseudo` option: pseudonymous or named accounts.
    pub fn for_mode(pseudo: bool) -> Self {
        Realm(if pseudo { PSEUDO_REALM } else { NAMED_REALM }.to_string())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for Realm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Identity of one persisted session record: the component name plus the realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub component: String,
    pub realm: Realm,
}

impl SessionKey {
    pub fn new(component: impl Into<String>, realm: Realm) -> Self {
        Self { component: component.into(), realm }
    }

    /// Flat string form used as the storage key.
    pub fn storage_key(&self) -> String {
        format!("session:{}:{}", self.component, self.realm)
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.storage_key()) }
}
