use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::realm::Realm;

pub const DEFAULT_GATEWAY_URL: &str = "https://kaul.inf.h-brs.de/login/";

/// Parameters sent with every gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayRequest {
    pub realm: Realm,
    /// Pseudonymous login endpoint instead of the named one.
    #[serde(skip)]
    pub pseudo: bool,
}

/// Remote login/logout. `login` returns the raw, untrusted response; the
/// session validates it.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, req: &GatewayRequest) -> Result<Value>;
    async fn logout(&self, req: &GatewayRequest) -> Result<()>;
}

pub struct HttpAuthGateway {
    base: Url,
    client: reqwest::Client,
}

impl HttpAuthGateway {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).context("invalid gateway base URL")?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        self.base.join(name).with_context(|| format!("invalid gateway endpoint {}", name))
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self, req: &GatewayRequest) -> Result<Value> {
        let url = self.endpoint(if req.pseudo { "login_pseudonym.php" } else { "login.php" })?;
        debug!(target: "gallery_auth::gateway", "login request url={} realm={}", url, req.realm);
        let resp = self.client.get(url).query(req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("login failed: HTTP {}", resp.status()));
        }
        // a body that is not JSON is a malformed answer, not a transport error
        Ok(resp.json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn logout(&self, req: &GatewayRequest) -> Result<()> {
        let url = self.endpoint("logout.php")?;
        debug!(target: "gallery_auth::gateway", "logout request url={} realm={}", url, req.realm);
        let resp = self.client.get(url).query(req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("logout failed: HTTP {}", resp.status()));
        }
        Ok(())
    }
}

/// Answers logins from a fixed script of responses; the last response is
/// repeated once the script is exhausted. Logout always succeeds.
pub struct StaticAuthGateway {
    responses: Vec<Value>,
    cursor: Mutex<usize>,
    logins: Mutex<Vec<GatewayRequest>>,
    logouts: Mutex<Vec<GatewayRequest>>,
}

impl StaticAuthGateway {
    pub fn new(responses: Vec<Value>) -> Self {
        Self { responses, cursor: Mutex::new(0), logins: Mutex::new(Vec::new()), logouts: Mutex::new(Vec::new()) }
    }

    /// Gateway that always logs in the given user.
    pub fn single_user(user: &str) -> Self {
        Self::new(vec![serde_json::json!({ "user": user, "token": format!("static-{}", user), "name": user })])
    }

    pub fn login_calls(&self) -> usize { self.logins.lock().len() }
    pub fn logout_calls(&self) -> usize { self.logouts.lock().len() }
    pub fn last_login(&self) -> Option<GatewayRequest> { self.logins.lock().last().cloned() }
}

#[async_trait]
impl AuthGateway for StaticAuthGateway {
    async fn login(&self, req: &GatewayRequest) -> Result<Value> {
        self.logins.lock().push(req.clone());
        let mut cursor = self.cursor.lock();
        let Some(last) = self.responses.len().checked_sub(1) else {
            return Err(anyhow!("static gateway has no responses"));
        };
        let idx = (*cursor).min(last);
        *cursor += 1;
        Ok(self.responses[idx].clone())
    }

    async fn logout(&self, req: &GatewayRequest) -> Result<()> {
        self.logouts.lock().push(req.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req() -> GatewayRequest { GatewayRequest { realm: Realm::for_mode(false), pseudo: false } }

    #[tokio::test]
    async fn static_gateway_walks_script_then_repeats_last() {
        let gw = StaticAuthGateway::new(vec![json!(null), json!({"user": "amy", "token": "t"})]);
        assert_eq!(gw.login(&req()).await.unwrap(), json!(null));
        assert_eq!(gw.login(&req()).await.unwrap()["user"], "amy");
        assert_eq!(gw.login(&req()).await.unwrap()["user"], "amy");
        assert_eq!(gw.login_calls(), 3);
    }

    #[tokio::test]
    async fn empty_script_is_a_gateway_error() {
        let gw = StaticAuthGateway::new(Vec::new());
        assert!(gw.login(&req()).await.is_err());
    }

    #[test]
    fn request_serializes_realm_only() {
        let v = serde_json::to_value(GatewayRequest { realm: Realm::for_mode(true), pseudo: true }).unwrap();
        assert_eq!(v, json!({"realm": "hbrsinfpseudo"}));
    }

    #[test]
    fn http_gateway_builds_endpoints_under_base() {
        let gw = HttpAuthGateway::new(DEFAULT_GATEWAY_URL).unwrap();
        assert_eq!(gw.endpoint("logout.php").unwrap().as_str(), "https://kaul.inf.h-brs.de/login/logout.php");
        assert!(HttpAuthGateway::new("not a url").is_err());
    }
}
