//! Route manifest for background revalidation
//!
//! Records when each route was last generated so the server can tell stale
//! pages apart from fresh ones. A stale page is still served; it is
//! regenerated in the background.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Cache directory, relative to the site root
pub const CACHE_DIR: &str = ".spacetraveling";

/// Manifest file name inside [`CACHE_DIR`]
const CACHE_FILE: &str = "routes.json";

/// A generated route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Generation time (unix timestamp)
    pub generated_at: u64,
    /// Output path relative to public dir
    pub output_path: String,
}

/// Manifest of generated routes, keyed by URL path
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouteCache {
    /// Version of the manifest format
    pub version: u32,
    pub routes: HashMap<String, RouteEntry>,
}

impl RouteCache {
    /// Current manifest format version
    const VERSION: u32 = 1;

    /// Create an empty manifest with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    /// Load the manifest from disk, or start an empty one
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_DIR).join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            match serde_json::from_str::<RouteCache>(&content) {
                Ok(cache) if cache.version == Self::VERSION => return cache,
                Ok(_) => tracing::info!("Route manifest version mismatch, starting fresh"),
                Err(e) => tracing::warn!("Ignoring corrupt route manifest: {}", e),
            }
        }
        Self::new()
    }

    /// Save the manifest to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let cache_dir = base_dir.join(CACHE_DIR);
        fs::create_dir_all(&cache_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(cache_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Record that a route was just generated
    pub fn record(&mut self, route: &str, output_path: &str) {
        self.record_at(route, output_path, now());
    }

    fn record_at(&mut self, route: &str, output_path: &str, generated_at: u64) {
        self.routes.insert(
            route.to_string(),
            RouteEntry {
                generated_at,
                output_path: output_path.to_string(),
            },
        );
    }

    /// Forget a route, returning its entry
    pub fn remove(&mut self, route: &str) -> Option<RouteEntry> {
        self.routes.remove(route)
    }

    /// Whether a route is older than `revalidate` seconds (or unknown)
    pub fn is_stale(&self, route: &str, revalidate: u64) -> bool {
        self.is_stale_at(route, revalidate, now())
    }

    fn is_stale_at(&self, route: &str, revalidate: u64, now: u64) -> bool {
        match self.routes.get(route) {
            Some(entry) => now.saturating_sub(entry.generated_at) >= revalidate,
            None => true,
        }
    }
}

/// Current unix timestamp
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
