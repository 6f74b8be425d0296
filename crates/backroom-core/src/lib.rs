pub mod error;
pub mod inventory;
pub mod menu;
pub mod orders;
pub mod repo;
pub mod scope;
pub mod sequence;
pub mod store;
pub mod summary;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub use error::{CatalogError, OrderError, ScopeError, SequenceError, StoreError};
pub use inventory::{Inventory, InventoryItem};
pub use menu::{format_price, MenuCatalog, MenuCategory, MenuItem};
pub use orders::{LineRequest, OrderLine, OrderStatus, TakeoutDesk, TakeoutOrder};
pub use repo::{Record, Repository};
pub use scope::{Partition, TenantScope};
pub use sequence::{Clock, CounterRecord, DayStamp, LocalClock, SequenceCounter, SequenceId};
pub use store::file::FileStore;
pub use store::memory::MemoryStore;
pub use store::{transact, DocKey, Document, DocumentStore, RetryPolicy};
pub use summary::{summarize, DashboardSummary};

// --- Storage location ---

/// Resolve the data directory: `$BACKROOM_HOME`, else `~/.backroom/`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("BACKROOM_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".backroom")
}

/// Directory the default [`FileStore`] keeps its documents in.
pub fn store_dir() -> PathBuf {
    data_dir().join("store")
}

// --- Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

/// Transaction retry knobs, persisted in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl StoreSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub fn read_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    match fs::read_to_string(&path).map(|s| serde_json::from_str(&s)) {
        Ok(Ok(settings)) => settings,
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings");
            Settings::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
