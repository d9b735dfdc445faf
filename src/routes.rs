//! Host route management
//!
//! Maintains the domain -> backend routing table inside the config file the
//! downstream proxy reads, and notifies the embedding layer after every
//! change so it can get the proxy to reload. Backends are opaque strings
//! (the UI produces `"<container>:<port>"`); this module never parses them.

use crate::store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Top-level shape of the proxy config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub config: ConfigSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub lite: LiteSettings,
}

/// The `lite` block of the proxy config: the routing table plus its
/// enabled flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Routes in insertion order. Duplicate hosts may coexist here; the
    /// derived map view resolves them last-write-wins.
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl Default for LiteSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            routes: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One domain -> backend mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub host: String,
    pub backend: String,
}

/// Callback fired after every successful route mutation; the embedding
/// layer uses it to trigger a proxy reload.
pub type ReloadSignal = Box<dyn Fn() + Send + Sync>;

/// The domain -> backend routing table, persisted to the proxy config file.
///
/// Every mutation persists synchronously before returning and then fires
/// the reload signal exactly once. Removals of absent hosts are silent
/// no-ops: nothing is written and no signal fires.
pub struct RouteTable {
    store: DocumentStore<ConfigFile>,
    reload: ReloadSignal,
}

impl RouteTable {
    pub fn open(path: impl Into<PathBuf>, reload: ReloadSignal) -> Self {
        Self {
            store: DocumentStore::open(path),
            reload,
        }
    }

    /// Routes as a host -> backend map. For duplicate hosts the
    /// last-inserted backend wins.
    pub fn hosts(&self) -> HashMap<String, String> {
        self.store
            .current()
            .config
            .lite
            .routes
            .iter()
            .map(|r| (r.host.clone(), r.backend.clone()))
            .collect()
    }

    /// Routes in insertion order, as stored.
    pub fn routes(&self) -> Vec<Route> {
        self.store.current().config.lite.routes.clone()
    }

    /// Whether routing is enabled in the persisted config.
    pub fn enabled(&self) -> bool {
        self.store.current().config.lite.enabled
    }

    /// Append a route and persist. No uniqueness check: adding an existing
    /// host leaves both entries in storage.
    pub fn add_host(&self, host: &str, backend: &str) -> Result<(), StoreError> {
        self.store.mutate(|state| {
            let mut next = state.clone();
            next.config.lite.routes.push(Route {
                host: host.to_string(),
                backend: backend.to_string(),
            });
            next
        })?;

        info!(host, backend, "Route added, proxy reload required");
        (self.reload)();
        Ok(())
    }

    /// Remove every route for `host` and persist. If no route matches this
    /// is a no-op: no write, no reload signal.
    pub fn remove_host(&self, host: &str) -> Result<(), StoreError> {
        let changed = self.store.update(|state| {
            if !state.config.lite.routes.iter().any(|r| r.host == host) {
                return None;
            }
            let mut next = state.clone();
            next.config.lite.routes.retain(|r| r.host != host);
            Some(next)
        })?;

        if changed {
            info!(host, "Route removed, proxy reload required");
            (self.reload)();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn counting_table(path: PathBuf) -> (RouteTable, Arc<AtomicUsize>) {
        let reloads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reloads);
        let table = RouteTable::open(path, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (table, reloads)
    }

    #[test]
    fn test_add_and_remove_host() {
        let dir = tempdir().unwrap();
        let (table, reloads) = counting_table(dir.path().join("config.yml"));

        table.add_host("a.example.com", "1.2.3.4:25565").unwrap();
        assert_eq!(
            table.hosts().get("a.example.com"),
            Some(&"1.2.3.4:25565".to_string())
        );
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        table.remove_host("a.example.com").unwrap();
        assert!(table.hosts().is_empty());
        assert_eq!(reloads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_absent_host_is_silent_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let (table, reloads) = counting_table(path.clone());

        table.add_host("a.example.com", "1.2.3.4:25565").unwrap();
        let before = std::fs::read(&path).unwrap();

        table.remove_host("missing.example.com").unwrap();
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_duplicate_hosts_last_write_wins_in_map_view() {
        let dir = tempdir().unwrap();
        let (table, _) = counting_table(dir.path().join("config.yml"));

        table.add_host("a.example.com", "old:25565").unwrap();
        table.add_host("b.example.com", "other:25566").unwrap();
        table.add_host("a.example.com", "new:25565").unwrap();

        // Storage keeps all three, in insertion order.
        let routes = table.routes();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].backend, "old:25565");
        assert_eq!(routes[2].backend, "new:25565");

        // The map view resolves the duplicate to the latest entry.
        let hosts = table.hosts();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts.get("a.example.com"), Some(&"new:25565".to_string()));
    }

    #[test]
    fn test_remove_clears_all_duplicates() {
        let dir = tempdir().unwrap();
        let (table, reloads) = counting_table(dir.path().join("config.yml"));

        table.add_host("a.example.com", "old:25565").unwrap();
        table.add_host("a.example.com", "new:25565").unwrap();
        table.remove_host("a.example.com").unwrap();

        assert!(table.routes().is_empty());
        assert_eq!(reloads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_routes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");

        {
            let (table, _) = counting_table(path.clone());
            table.add_host("a.example.com", "1.2.3.4:25565").unwrap();
            table.add_host("b.example.com", "5.6.7.8:25565").unwrap();
        }

        let (reopened, reloads) = counting_table(path);
        let routes = reopened.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].host, "a.example.com");
        assert_eq!(routes[1].host, "b.example.com");
        assert!(reopened.enabled());
        // Opening never fires the signal.
        assert_eq!(reloads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_config_is_enabled_and_empty() {
        let dir = tempdir().unwrap();
        let (table, _) = counting_table(dir.path().join("config.yml"));
        assert!(table.enabled());
        assert!(table.hosts().is_empty());
    }

    #[test]
    fn test_reads_existing_proxy_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "config:\n  lite:\n    enabled: false\n    routes:\n      - host: a.example.com\n        backend: \"abc123:25565\"\n",
        )
        .unwrap();

        let (table, _) = counting_table(path);
        assert!(!table.enabled());
        assert_eq!(
            table.hosts().get("a.example.com"),
            Some(&"abc123:25565".to_string())
        );
    }
}
