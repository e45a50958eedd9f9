//! Policy document ownership and hot reload
//!
//! The store is the single writer of the policy file and the in-memory
//! snapshot. Readers take an `Arc` snapshot on demand and never hold a
//! reference into mutable state, so a reload can never be observed mid-use.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::constants::{APP_DIR_NAME, POLICY_FILE_NAME};
use crate::models::PolicyConfiguration;

/// Default policy document location for this machine
pub fn default_policy_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join(APP_DIR_NAME).join(POLICY_FILE_NAME),
        None => PathBuf::from(POLICY_FILE_NAME),
    }
}

struct StoreState {
    config: Arc<PolicyConfiguration>,
    loaded_mtime: Option<SystemTime>,
}

pub struct PolicyStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl PolicyStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: RwLock::new(StoreState {
                config: Arc::new(PolicyConfiguration::default()),
                loaded_mtime: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot. Cheap to call; safe to hold across a reload.
    pub fn snapshot(&self) -> Arc<PolicyConfiguration> {
        self.read_state().config.clone()
    }

    /// Load the policy file. A missing file synthesizes and persists the
    /// starter configuration; an unparseable file falls back to the
    /// disabled default. Neither case is allowed to take the daemon down.
    pub fn load(&self) {
        if !self.path.exists() {
            warn!(
                "policy file not found at {}, writing starter configuration",
                self.path.display()
            );
            let starter = PolicyConfiguration::starter();
            if let Err(err) = self.save(&starter) {
                error!("failed to write starter policy file: {err:#}");
            }
            self.swap(starter);
            return;
        }

        match self.read_file() {
            Ok(config) => {
                info!(
                    "policy loaded: {} rules, {} legacy policies",
                    config.rules.len(),
                    config.policies.len()
                );
                self.swap(config);
            }
            Err(err) => {
                error!("failed to load policy file, monitoring disabled: {err:#}");
                self.swap(PolicyConfiguration::disabled());
            }
        }
    }

    /// Reload only when the file's mtime is strictly newer than the one
    /// recorded at the last load. Returns whether a reload happened.
    pub fn reload_if_changed(&self) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return false;
        };
        let Ok(mtime) = metadata.modified() else {
            return false;
        };

        let stale = match self.read_state().loaded_mtime {
            Some(recorded) => mtime > recorded,
            None => true,
        };
        if !stale {
            return false;
        }

        match self.read_file() {
            Ok(config) => {
                info!(
                    "policy file changed, reloaded: {} rules, {} legacy policies",
                    config.rules.len(),
                    config.policies.len()
                );
                self.swap(config);
                true
            }
            Err(err) => {
                // Keep the last-known configuration, but record the mtime so
                // a broken file is not re-parsed every tick.
                warn!("policy file changed but could not be parsed, keeping previous: {err:#}");
                self.write_state().loaded_mtime = Some(mtime);
                false
            }
        }
    }

    /// Save the given configuration and make it the live snapshot.
    /// Used when an updated configuration arrives from the sync channel.
    pub fn update(&self, config: PolicyConfiguration) {
        if let Err(err) = self.save(&config) {
            error!("failed to persist updated policy: {err:#}");
        }
        info!(
            "policy updated: {} rules, {} legacy policies",
            config.rules.len(),
            config.policies.len()
        );
        self.swap(config);
    }

    /// Serialize and write the policy file, indented for hand editing
    pub fn save(&self, config: &PolicyConfiguration) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create policy directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(config).context("failed to render policy JSON")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write policy file {}", self.path.display()))?;
        Ok(())
    }

    fn read_file(&self) -> Result<PolicyConfiguration> {
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read policy file {}", self.path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("failed to parse policy file {}", self.path.display()))
    }

    fn swap(&self, config: PolicyConfiguration) {
        let mtime = std::fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .ok();
        let mut state = self.write_state();
        state.config = Arc::new(config);
        state.loaded_mtime = mtime;
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
