//! Domain-driven configuration for the Gantry gateway
//!
//! Configuration is split by functional domain with validation, defaults, and
//! environment variable support. The upstream server registry lives here too:
//! it is pure data, reloaded as an atomic snapshot that the proxy captures at
//! the start of each request.

pub mod domains;
pub mod error;
pub mod loader;
pub mod registry;
pub mod upstream;
pub mod validation;

pub use domains::{AuditConfig, AuthConfig, GantryConfig, GatewayConfig, ProxyConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use registry::{SnapshotQueries, UpstreamRegistry, UpstreamSnapshot};
pub use upstream::{AuthFormat, AuthLocation, AuthMethod, AuthSpec, TransportKind, UpstreamConfig};
