//! Upstream server registry backed by `mcp_servers.yaml`
//!
//! The registry hands out immutable snapshots. Mutation (reload, register,
//! remove) builds a fresh map and swaps the shared `Arc`, so a concurrent
//! reader always observes either the old or the new set, never a partial one.

use crate::error::{ConfigError, ConfigResult};
use crate::upstream::UpstreamConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// One immutable view of the configured upstreams
pub type UpstreamSnapshot = Arc<BTreeMap<String, UpstreamConfig>>;

/// On-disk document shape: a single `servers:` map
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    servers: BTreeMap<String, UpstreamConfig>,
}

/// Registry of upstream MCP servers
pub struct UpstreamRegistry {
    path: PathBuf,
    current: RwLock<UpstreamSnapshot>,
}

impl UpstreamRegistry {
    /// Load the registry from a YAML file; a missing file yields an empty set
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let servers = Self::read_file(&path)?;
        info!(servers = servers.len(), file = %path.display(), "loaded upstream registry");
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(servers)),
        })
    }

    /// Build a registry from an in-memory map (tests, embedded use)
    pub fn from_map(servers: BTreeMap<String, UpstreamConfig>) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(Arc::new(servers)),
        }
    }

    fn read_file(path: &Path) -> ConfigResult<BTreeMap<String, UpstreamConfig>> {
        if !path.exists() {
            warn!(file = %path.display(), "upstream registry file not found, starting empty");
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_yaml::from_str(&content)?;
        for (name, upstream) in &file.servers {
            upstream.validate(name)?;
        }
        Ok(file.servers)
    }

    fn persist(&self, servers: &BTreeMap<String, UpstreamConfig>) -> ConfigResult<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let file = RegistryFile {
            servers: servers.clone(),
        };
        let content = serde_yaml::to_string(&file)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn swap(&self, servers: BTreeMap<String, UpstreamConfig>) {
        let mut guard = self.current.write().expect("registry lock poisoned");
        *guard = Arc::new(servers);
    }

    /// Re-read the registry file and swap the snapshot atomically
    pub fn reload(&self) -> ConfigResult<()> {
        let servers = Self::read_file(&self.path)?;
        info!(servers = servers.len(), "reloaded upstream registry");
        self.swap(servers);
        Ok(())
    }

    /// Current immutable snapshot
    pub fn snapshot(&self) -> UpstreamSnapshot {
        self.current.read().expect("registry lock poisoned").clone()
    }

    /// Look up one upstream by name
    pub fn get(&self, name: &str) -> Option<UpstreamConfig> {
        self.snapshot().get(name).cloned()
    }

    /// All configured upstream names
    pub fn names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Register or replace an upstream, persisting to disk
    pub fn register(&self, name: &str, upstream: UpstreamConfig) -> ConfigResult<()> {
        upstream.validate(name)?;
        let mut servers = self.snapshot().as_ref().clone();
        servers.insert(name.to_string(), upstream);
        self.persist(&servers)?;
        self.swap(servers);
        info!(server = name, "registered upstream");
        Ok(())
    }

    /// Remove an upstream, persisting to disk
    pub fn remove(&self, name: &str) -> ConfigResult<()> {
        let mut servers = self.snapshot().as_ref().clone();
        if servers.remove(name).is_none() {
            return Err(ConfigError::UnknownServer {
                name: name.to_string(),
            });
        }
        self.persist(&servers)?;
        self.swap(servers);
        info!(server = name, "removed upstream");
        Ok(())
    }
}

/// Snapshot queries used by the aggregator and the broadcast engine
pub trait SnapshotQueries {
    /// Enabled upstreams, in name order
    fn enabled(&self) -> Vec<(String, UpstreamConfig)>;

    /// Enabled upstreams whose tag set intersects `tags`
    fn with_tags(&self, tags: &[String]) -> Vec<String>;

    /// Enabled upstreams declaring `tool` (directly or via `"*"`)
    fn with_tool(&self, tool: &str) -> Vec<String>;
}

impl SnapshotQueries for UpstreamSnapshot {
    fn enabled(&self) -> Vec<(String, UpstreamConfig)> {
        self.iter()
            .filter(|(_, u)| u.enabled)
            .map(|(n, u)| (n.clone(), u.clone()))
            .collect()
    }

    fn with_tags(&self, tags: &[String]) -> Vec<String> {
        self.iter()
            .filter(|(_, u)| u.enabled && tags.iter().any(|t| u.tags.contains(t)))
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn with_tool(&self, tool: &str) -> Vec<String> {
        self.iter()
            .filter(|(_, u)| u.enabled && u.declares_tool(tool))
            .map(|(n, _)| n.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::TransportKind;

    fn upstream(url: &str, enabled: bool, tags: &[&str], tools: &[&str]) -> UpstreamConfig {
        UpstreamConfig {
            url: url.to_string(),
            transport: TransportKind::StreamableHttp,
            timeout: None,
            enabled,
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            metadata: Default::default(),
            auth: None,
        }
    }

    #[test]
    fn roundtrip_through_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_servers.yaml");

        let registry = UpstreamRegistry::load(&path).unwrap();
        assert!(registry.names().is_empty());

        registry
            .register("alpha", upstream("http://localhost:3001/mcp", true, &["logs"], &["echo"]))
            .unwrap();
        registry
            .register("beta", upstream("http://localhost:3002/mcp", false, &[], &[]))
            .unwrap();

        // A second registry over the same file sees the persisted state.
        let reopened = UpstreamRegistry::load(&path).unwrap();
        assert_eq!(reopened.names(), vec!["alpha", "beta"]);
        assert!(reopened.get("beta").map(|u| !u.enabled).unwrap_or(false));
    }

    #[test]
    fn remove_unknown_server_errors() {
        let registry = UpstreamRegistry::from_map(BTreeMap::new());
        assert!(matches!(
            registry.remove("ghost"),
            Err(ConfigError::UnknownServer { .. })
        ));
    }

    #[test]
    fn snapshot_isolated_from_later_mutation() {
        let mut servers = BTreeMap::new();
        servers.insert("alpha".to_string(), upstream("http://localhost:1/mcp", true, &[], &[]));
        let registry = UpstreamRegistry::from_map(servers);

        let before = registry.snapshot();
        registry
            .register("beta", upstream("http://localhost:2/mcp", true, &[], &[]))
            .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn snapshot_queries() {
        let mut servers = BTreeMap::new();
        servers.insert("a".to_string(), upstream("http://localhost:1/mcp", true, &["logs"], &["echo"]));
        servers.insert("b".to_string(), upstream("http://localhost:2/mcp", true, &["logs"], &["*"]));
        servers.insert("c".to_string(), upstream("http://localhost:3/mcp", false, &["logs"], &["echo"]));
        let registry = UpstreamRegistry::from_map(servers);
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.enabled().len(), 2);
        assert_eq!(snapshot.with_tags(&["logs".to_string()]), vec!["a", "b"]);
        assert_eq!(snapshot.with_tool("echo"), vec!["a", "b"]);
        assert_eq!(snapshot.with_tool("other"), vec!["b"]);
    }
}
