//! JSON file-backed settings store
//!
//! Keeps all settings in a single JSON object on disk. All writes use atomic
//! temp-file + rename to prevent corruption on crash, and a tokio Mutex
//! serializes concurrent writes from admin requests.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::{BoxFuture, SettingsStore};

/// Thread-safe settings file manager.
///
/// Reads clone from the in-memory copy; the file is only touched on load and
/// on writes.
pub struct FileSettingsStore {
    path: PathBuf,
    state: Mutex<Map<String, Value>>,
}

impl FileSettingsStore {
    /// Load settings from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with no
    /// credentials configured).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading settings file: {e}")))?;
            let settings: Map<String, Value> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing settings file: {e}")))?;
            info!(path = %path.display(), keys = settings.len(), "loaded settings");
            settings
        } else {
            info!(path = %path.display(), "settings file not found, starting empty");
            let settings = Map::new();
            write_atomic(&path, &settings).await?;
            settings
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(key.to_string(), value);
            debug!(key, "updated setting");
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write settings to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 since the file holds the API
/// client secret.
async fn write_atomic(path: &Path, data: &Map<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing settings: {e}")))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".settings.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp settings file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting settings file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp settings file: {e}")))?;

    debug!(path = %path.display(), "persisted settings");
    Ok(())
}
