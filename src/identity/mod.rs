//! Realm-scoped user sessions shared across a tree of widget instances.
//! Keep the public surface thin and split implementation across sub-modules.

mod callbacks;
mod context;
mod prompt;
mod provider;
mod realm;
mod record;
mod session;

pub use callbacks::{CallbackRegistry, ChangeCallback, Suppress};
pub use context::{resolve_authority, Host, WidgetNode};
pub use prompt::{FailureNotifier, StdinNotifier, TracingNotifier};
pub use provider::{AuthGateway, GatewayRequest, HttpAuthGateway, StaticAuthGateway, DEFAULT_GATEWAY_URL};
pub use realm::{Realm, SessionKey, NAMED_REALM, PSEUDO_REALM};
pub use record::{is_valid_key, UserRecord};
pub use session::{SessionDeps, UserSession};
