use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

/// Key-value medium the user store persists into.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
}

/// Process-local map. Contents die with the process.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON file per key under a directory, the closest thing to browser
/// local storage on a device.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub async fn new(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create data dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let dir = self.dir.clone();
        let target = path.clone();
        let bytes = value.len();
        // each write gets its own temp file; readers only ever see a whole blob
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .with_context(|| format!("temp file in {}", dir.display()))?;
            tmp.write_all(value.as_bytes())
                .with_context(|| format!("write {}", tmp.path().display()))?;
            tmp.persist(&target)
                .map_err(|e| e.error)
                .with_context(|| format!("persist into {}", target.display()))?;
            Ok(())
        })
        .await
        .context("blob writer task")??;
        debug!(path = %path.display(), bytes, "blob written");
        Ok(())
    }
}

/// Single-table key/value store in Postgres.
#[derive(Clone)]
pub struct PgBackend {
    db: PgPool,
}

impl PgBackend {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: PgPool) -> anyhow::Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await
        .context("create kv_store table")?;
        Ok(Self { db })
    }
}

#[async_trait]
impl KvBackend for PgBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT value
              FROM kv_store
             WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .context("kv_store get")?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .context("kv_store set")?;
        Ok(())
    }
}

#[cfg(test)]
mod storage_tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_get_and_overwrite() {
        let kv = MemoryBackend::new();
        assert_eq!(kv.get("users_db").await.unwrap(), None);

        kv.set("users_db", "[]".into()).await.unwrap();
        assert_eq!(kv.get("users_db").await.unwrap().as_deref(), Some("[]"));

        kv.set("users_db", "[1]".into()).await.unwrap();
        assert_eq!(kv.get("users_db").await.unwrap().as_deref(), Some("[1]"));
        assert_eq!(kv.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_backend_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileBackend::new(dir.path()).await.unwrap();
        assert_eq!(kv.get("users_db").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_backend_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("data");

        let kv = FileBackend::new(&nested).await.unwrap();
        kv.set("users_db", r#"[{"a":1}]"#.into()).await.unwrap();
        assert!(nested.join("users_db.json").exists());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 1);

        let reopened = FileBackend::new(&nested).await.unwrap();
        assert_eq!(
            reopened.get("users_db").await.unwrap().as_deref(),
            Some(r#"[{"a":1}]"#)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn file_backend_overlapping_sets_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let kv = std::sync::Arc::new(FileBackend::new(dir.path()).await.unwrap());
        kv.set("users_db", serde_json::to_string(&vec![0u32; 64]).unwrap())
            .await
            .unwrap();

        for round in 1..=100u32 {
            let writers: Vec<_> = (0..2u32)
                .map(|w| {
                    let kv = kv.clone();
                    let blob = serde_json::to_string(&vec![round * 10 + w; 64]).unwrap();
                    tokio::spawn(async move { kv.set("users_db", blob).await })
                })
                .collect();
            let reader = {
                let kv = kv.clone();
                tokio::spawn(async move {
                    for _ in 0..5 {
                        let raw = kv.get("users_db").await.unwrap().expect("blob present");
                        let parsed: Vec<u32> = serde_json::from_str(&raw).expect("whole blob");
                        assert_eq!(parsed.len(), 64);
                    }
                })
            };
            for w in writers {
                w.await.unwrap().expect("set succeeds");
            }
            reader.await.unwrap();
        }

        let raw = kv.get("users_db").await.unwrap().unwrap();
        let parsed: Vec<u32> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 64);
        // no temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
