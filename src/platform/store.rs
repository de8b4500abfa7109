use super::{KeyValueCapability, PlatformResult, ResourceEntry};
use crate::error::PlatformError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Key-value capability backed by a single pretty-printed JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> PlatformResult<BTreeMap<String, Value>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "kv file missing, treating as empty");
                return Ok(BTreeMap::new());
            }
            Err(err) => {
                return Err(PlatformError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&data).map_err(|err| {
            PlatformError::Storage(format!("failed to parse {}: {err}", self.path.display()))
        })
    }

    async fn write_map(&self, map: &BTreeMap<String, Value>) -> PlatformResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|err| PlatformError::Storage(err.to_string()))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, bytes).await?;
        match fs::rename(&tmp_path, &self.path).await {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                // Some platforms refuse to rename over an existing file.
                if fs::try_exists(&self.path).await.unwrap_or(false) {
                    warn!(path = %self.path.display(), "rename failed, replacing kv file");
                    fs::remove_file(&self.path).await?;
                    fs::rename(&tmp_path, &self.path).await?;
                    Ok(())
                } else {
                    Err(rename_err.into())
                }
            }
        }
    }
}

#[async_trait]
impl KeyValueCapability for JsonFileStore {
    async fn list(&self, include_metadata: bool) -> PlatformResult<Vec<ResourceEntry>> {
        let _guard = self.io_lock.lock().await;
        let map = self.read_map().await?;
        Ok(map
            .into_iter()
            .map(|(key, value)| ResourceEntry {
                key,
                value: if include_metadata { value } else { Value::Null },
            })
            .collect())
    }

    async fn set(&self, key: &str, value: Value) -> PlatformResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);
        self.write_map(&map).await
    }

    async fn del(&self, key: &str) -> PlatformResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_none() {
            debug!(key, "delete of absent key");
            return Ok(());
        }
        self.write_map(&map).await
    }
}
