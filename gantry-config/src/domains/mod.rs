//! Domain-specific configuration modules

pub mod audit;
pub mod auth;
pub mod gateway;
pub mod proxy;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

pub use audit::AuditConfig;
pub use auth::AuthConfig;
pub use gateway::GatewayConfig;
pub use proxy::ProxyConfig;

/// Root configuration for the gateway process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GantryConfig {
    /// Listener and file locations
    pub gateway: GatewayConfig,

    /// Bearer-token verification
    pub auth: AuthConfig,

    /// Audit trail sinks
    pub audit: AuditConfig,

    /// Upstream proxy defaults
    pub proxy: ProxyConfig,
}

impl GantryConfig {
    /// Validate every domain
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.gateway.validate()?;
        self.auth.validate()?;
        self.audit.validate()?;
        self.proxy.validate()?;
        Ok(())
    }
}
