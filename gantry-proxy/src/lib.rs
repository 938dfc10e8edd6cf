//! Upstream proxy engine for the Gantry gateway
//!
//! Owns connections to upstream MCP servers: one fresh JSON-RPC session per
//! operation (open, initialize, call, close), per-upstream credential
//! injection, per-upstream timeouts, and the broadcast fan-out engine.

pub mod broadcast;
pub mod credentials;
pub mod error;
pub mod proxy;
pub mod session;
pub mod transport;

pub use broadcast::BroadcastResult;
pub use credentials::{format_credential, resolve_credential, AppliedAuth, CredentialError};
pub use error::{ProxyError, ProxyResult};
pub use proxy::McpProxy;
pub use session::{McpSession, SessionError};
pub use transport::TransportError;
