use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_SYNC_CONFIG: &str = include_str!("data/sync_config.json");

/// Seat counts are persisted as a single byte.
pub const MAX_LOBBY_SLOTS: usize = u8::MAX as usize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    lobby: LobbyConfig,
    saves: SavesConfig,
    snapshot: SnapshotConfig,
}

impl SyncConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_SYNC_CONFIG).expect("builtin sync config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, SyncConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| SyncConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = SyncConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn lobby(&self) -> &LobbyConfig {
        &self.lobby
    }

    pub fn saves(&self) -> &SavesConfig {
        &self.saves
    }

    pub fn snapshot(&self) -> &SnapshotConfig {
        &self.snapshot
    }
}

#[derive(Debug, Error)]
pub enum SyncConfigError {
    #[error("failed to parse sync config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read sync config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    pub(crate) max_slots: usize,
    pub(crate) computer_fills_vacant: bool,
}

impl LobbyConfig {
    pub fn max_slots(&self) -> usize {
        self.max_slots.min(MAX_LOBBY_SLOTS)
    }

    pub fn computer_fills_vacant(&self) -> bool {
        self.computer_fills_vacant
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_slots: 8,
            computer_fills_vacant: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SavesConfig {
    autosave_title: String,
    extension: String,
}

impl SavesConfig {
    pub fn autosave_title(&self) -> &str {
        &self.autosave_title
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl Default for SavesConfig {
    fn default() -> Self {
        Self {
            autosave_title: "Autosave".to_string(),
            extension: "sav".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    parallel_min_players: usize,
    compact_managers: bool,
}

impl SnapshotConfig {
    /// Below this many players, per-player snapshots are built sequentially.
    pub fn parallel_min_players(&self) -> usize {
        self.parallel_min_players
    }

    pub fn compact_managers(&self) -> bool {
        self.compact_managers
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            parallel_min_players: 4,
            compact_managers: true,
        }
    }
}

pub fn load_sync_config_from_env() -> (Arc<SyncConfig>, Option<PathBuf>) {
    let Some(path) = env::var("SYNC_CONFIG_PATH").ok().map(PathBuf::from) else {
        tracing::info!(target: "empire_sync::config", "sync_config.loaded=builtin");
        return (SyncConfig::builtin(), None);
    };

    match SyncConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "empire_sync::config",
                path = %path.display(),
                "sync_config.loaded=file"
            );
            (Arc::new(config), Some(path))
        }
        Err(err) => {
            tracing::warn!(
                target: "empire_sync::config",
                path = %path.display(),
                error = %err,
                "sync_config.load_failed"
            );
            tracing::info!(target: "empire_sync::config", "sync_config.loaded=builtin");
            (SyncConfig::builtin(), None)
        }
    }
}
