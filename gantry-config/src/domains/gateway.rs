//! Gateway listener configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// HTTP listener and file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Upstream server registry file
    pub mcp_servers_file: String,

    /// Policy document file
    pub policy_file: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mcp_servers_file: "mcp_servers.yaml".to_string(),
            policy_file: "policies/policy.yaml".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Base URL clients use to reach this gateway
    pub fn base_url(&self) -> String {
        let host = if self.host == "0.0.0.0" { "localhost" } else { self.host.as_str() };
        format!("http://{}:{}", host, self.port)
    }
}

impl Validatable for GatewayConfig {
    fn validate(&self) -> ConfigResult<()> {
        crate::validation::validate_port_range(self.port, "port", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "gateway"
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}
