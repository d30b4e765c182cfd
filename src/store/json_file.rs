use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::KeyValueStore;

/// [KeyValueStore] backed by a single JSON document on disk. Every access
/// takes a file lock for its duration, but separate read-then-write pairs
/// are still racy across processes.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: &Path) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(dir)?;

        Ok(Self {
            path: dir.join("store.json"),
        })
    }

    async fn read_document(file: &mut File) -> Result<HashMap<String, Value>> {
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }

        match serde_json::from_str::<HashMap<String, Value>>(&contents) {
            Ok(v) => Ok(v),
            Err(e) => {
                // Might happen after a shutdown cut a write short. Dropping
                // the document loses telemetry, not correctness.
                warn!("Store document is corrupted, starting over: {e}");
                Ok(HashMap::new())
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        debug!("Reading {:?} from {:?}", keys, self.path);
        let mut file = match File::open(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let result = Self::read_document(&mut file).await;
        file.unlock_async().await?;

        let mut document = result?;
        document.retain(|k, _| keys.contains(&k.as_str()));
        Ok(document)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        file.lock_exclusive()?;
        let result = async {
            let mut document = Self::read_document(&mut file).await?;
            document.extend(entries);

            let buffer = serde_json::to_vec(&document)?;
            file.set_len(0).await?;
            file.seek(std::io::SeekFrom::Start(0)).await?;
            file.write_all(&buffer).await?;
            file.flush().await?;
            Ok(())
        }
        .await;
        file.unlock_async().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::store::{KeyValueStore, json_file::JsonFileStore};

    #[tokio::test]
    async fn missing_file_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path())?;

        assert!(store.get(&["timeConfig"]).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn set_then_get_returns_requested_keys_only() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path())?;

        store
            .set(HashMap::from([
                ("a".to_string(), json!({"x": 1})),
                ("b".to_string(), json!([1, 2, 3])),
            ]))
            .await?;

        let read = store.get(&["a"]).await?;
        assert_eq!(read.len(), 1);
        assert_eq!(read["a"], json!({"x": 1}));
        Ok(())
    }

    #[tokio::test]
    async fn set_preserves_unrelated_keys() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path())?;

        store
            .set(HashMap::from([("a".to_string(), json!(1))]))
            .await?;
        store
            .set(HashMap::from([("b".to_string(), json!(2))]))
            .await?;

        let read = store.get(&["a", "b"]).await?;
        assert_eq!(read["a"], json!(1));
        assert_eq!(read["b"], json!(2));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_document_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path())?;

        std::fs::write(dir.path().join("store.json"), b"{not json")?;

        assert!(store.get(&["a"]).await?.is_empty());

        // And a subsequent write starts a fresh document.
        store
            .set(HashMap::from([("a".to_string(), json!(true))]))
            .await?;
        assert_eq!(store.get(&["a"]).await?["a"], json!(true));
        Ok(())
    }
}
