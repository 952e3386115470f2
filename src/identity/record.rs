use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

use super::realm::Realm;

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid key pattern"));

/// Whether a string is usable as a user key.
pub fn is_valid_key(s: &str) -> bool { KEY_PATTERN.is_match(s) }

/// User data returned by the auth gateway: an open key/value map that always
/// carries a unique `key` and an opaque `token`.
///
/// Cloning deep-copies the map, so a clone handed to a caller never aliases
/// the record held by the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    /// Accept a raw gateway login response.
    ///
    /// The response must be an object with a `user` matching the key pattern
    /// and a string `token`. The accepted record gets `key = user` and a token
    /// prefixed with the user (`<user>#<token>`).
    pub fn from_gateway(raw: Value) -> AuthResult<Self> {
        let Value::Object(mut map) = raw else {
            return Err(AuthError::malformed("malformed_record", "gateway response is not an object"));
        };
        let user = match map.get("user").and_then(Value::as_str) {
            Some(u) if !u.is_empty() && is_valid_key(u) => u.to_string(),
            Some(_) => return Err(AuthError::malformed("malformed_record", "gateway user is not a valid key")),
            None => return Err(AuthError::malformed("malformed_record", "gateway response has no user")),
        };
        let Some(token) = map.get("token").and_then(Value::as_str).map(str::to_string) else {
            return Err(AuthError::malformed("malformed_record", "gateway response has no string token"));
        };
        map.insert("key".into(), Value::String(user.clone()));
        map.insert("token".into(), Value::String(format!("{}#{}", user, token)));
        Ok(UserRecord(map))
    }

    /// Parse a record previously written by [`UserRecord::to_json`].
    pub fn from_json(text: &str) -> AuthResult<Self> {
        let rec: UserRecord = serde_json::from_str(text)
            .map_err(|e| AuthError::store("corrupt_record", format!("persisted record is not valid JSON: {}", e)))?;
        rec.validate()?;
        Ok(rec)
    }

    pub fn to_json(&self) -> AuthResult<String> {
        serde_json::to_string(&self.0).map_err(|e| AuthError::store("serialize_record", e.to_string()))
    }

    /// Check the mandatory fields without normalizing anything.
    pub fn validate(&self) -> AuthResult<()> {
        if !self.key().map(is_valid_key).unwrap_or(false) {
            return Err(AuthError::malformed("malformed_record", "record key missing or invalid"));
        }
        if self.token().is_none() {
            return Err(AuthError::malformed("malformed_record", "record token missing"));
        }
        Ok(())
    }

    pub fn key(&self) -> Option<&str> { self.get_str("key") }
    pub fn token(&self) -> Option<&str> { self.get_str("token") }
    pub fn picture(&self) -> Option<&str> { self.non_empty("picture") }

    pub fn realm(&self) -> Option<Realm> {
        self.get("realm").and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

    pub fn get_str(&self, field: &str) -> Option<&str> { self.0.get(field).and_then(Value::as_str) }

    /// String field that is present and not empty.
    pub fn non_empty(&self, field: &str) -> Option<&str> {
        self.get_str(field).filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> { self.0.remove(field) }

    pub fn as_map(&self) -> &Map<String, Value> { &self.0 }

    pub fn into_value(self) -> Value { Value::Object(self.0) }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(map: Map<String, Value>) -> Self { UserRecord(map) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gateway_record_is_normalized() {
        let rec = UserRecord::from_gateway(json!({"user": "jdoe2s", "token": "abc", "name": "John"})).unwrap();
        assert_eq!(rec.key(), Some("jdoe2s"));
        assert_eq!(rec.token(), Some("jdoe2s#abc"));
        assert_eq!(rec.get_str("name"), Some("John"));
    }

    #[test]
    fn gateway_rejects_non_objects_and_bad_users() {
        assert!(UserRecord::from_gateway(json!(null)).is_err());
        assert!(UserRecord::from_gateway(json!("jdoe")).is_err());
        assert!(UserRecord::from_gateway(json!({"token": "t"})).is_err());
        assert!(UserRecord::from_gateway(json!({"user": "", "token": "t"})).is_err());
        assert!(UserRecord::from_gateway(json!({"user": "j doe", "token": "t"})).is_err());
        assert!(UserRecord::from_gateway(json!({"user": "jdoe", "token": 42})).is_err());
        assert!(UserRecord::from_gateway(json!({"user": "jdoe"})).is_err());
    }

    #[test]
    fn rejected_records_are_retryable() {
        let err = UserRecord::from_gateway(json!([])).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn persisted_json_must_carry_key_and_token() {
        let rec = UserRecord::from_gateway(json!({"user": "amy", "token": "t"})).unwrap();
        let text = rec.to_json().unwrap();
        assert_eq!(UserRecord::from_json(&text).unwrap(), rec);
        assert!(UserRecord::from_json("{\"key\":\"amy\"}").is_err());
        assert!(UserRecord::from_json("not json").is_err());
    }

    #[test]
    fn clones_do_not_alias() {
        let rec = UserRecord::from_gateway(json!({"user": "amy", "token": "t"})).unwrap();
        let mut copy = rec.clone();
        copy.set("key", "mallory");
        assert_eq!(rec.key(), Some("amy"));
    }
}
