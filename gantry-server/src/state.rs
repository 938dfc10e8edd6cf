//! Server context
//!
//! Every collaborator a request handler needs, constructed once at startup
//! and threaded through axum state. No globals: tests build a context with
//! whatever pieces they want to exercise.

use gantry_audit::{AuditLogger, AuditStore, JsonLinesSink};
use gantry_auth::TokenVerifier;
use gantry_config::{GantryConfig, UpstreamRegistry};
use gantry_policy::PolicyEngine;
use gantry_proxy::McpProxy;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state behind the axum router
pub struct ServerContext {
    pub config: GantryConfig,
    pub registry: Arc<UpstreamRegistry>,
    pub policy: Arc<PolicyEngine>,
    pub audit: Arc<AuditLogger>,
    pub proxy: Arc<McpProxy>,
    pub verifier: Option<Arc<TokenVerifier>>,
}

/// Axum state alias
pub type AppState = Arc<ServerContext>;

impl ServerContext {
    /// Assemble the full context from configuration
    pub async fn from_config(config: GantryConfig) -> anyhow::Result<AppState> {
        let registry = Arc::new(UpstreamRegistry::load(&config.gateway.mcp_servers_file)?);
        let policy = Arc::new(PolicyEngine::load(&config.gateway.policy_file)?);

        let sink = JsonLinesSink::open(&config.audit.log_file, config.audit.to_stdout)?;
        let store = match AuditStore::connect(&config.audit.database_url).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "audit history store unavailable, continuing with file sink only");
                None
            }
        };
        let audit = Arc::new(AuditLogger::new(Some(sink), store));

        let proxy = Arc::new(McpProxy::new(
            registry.clone(),
            config.proxy.clone(),
            audit.clone(),
        ));

        let verifier = if config.auth.enabled {
            info!(
                issuer = %config.auth.issuer(),
                scopes = %config.auth.required_scopes,
                "bearer authentication enabled"
            );
            Some(Arc::new(TokenVerifier::new(config.auth.clone())))
        } else {
            info!("bearer authentication disabled");
            None
        };

        Ok(Arc::new(Self {
            config,
            registry,
            policy,
            audit,
            proxy,
            verifier,
        }))
    }

    /// Build a context from parts (tests and embedded use)
    pub fn from_parts(
        config: GantryConfig,
        registry: Arc<UpstreamRegistry>,
        policy: Arc<PolicyEngine>,
        audit: Arc<AuditLogger>,
        verifier: Option<Arc<TokenVerifier>>,
    ) -> AppState {
        let proxy = Arc::new(McpProxy::new(
            registry.clone(),
            config.proxy.clone(),
            audit.clone(),
        ));
        Arc::new(Self {
            config,
            registry,
            policy,
            audit,
            proxy,
            verifier,
        })
    }

    /// Whether bearer authentication is enforced
    pub fn auth_enabled(&self) -> bool {
        self.verifier.is_some()
    }
}
