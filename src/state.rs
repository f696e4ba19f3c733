use std::sync::Arc;

use crate::config::{AppConfig, BackendKind, StoreConfig};
use crate::storage::{FileBackend, KvBackend, MemoryBackend, PgBackend};
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub users: UserStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let users = open_user_store(&config.store).await?;
        Ok(Self { users, config })
    }

    pub fn from_parts(users: UserStore, config: Arc<AppConfig>) -> Self {
        Self { users, config }
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreConfig {
                backend: BackendKind::Memory,
                data_dir: "./data".into(),
                database_url: None,
                serialize_writes: false,
            },
        });
        let users = UserStore::new(Arc::new(MemoryBackend::new()));
        Self { users, config }
    }
}

pub async fn open_user_store(cfg: &StoreConfig) -> anyhow::Result<UserStore> {
    let backend: Option<Arc<dyn KvBackend>> = match cfg.backend {
        BackendKind::Memory => Some(Arc::new(MemoryBackend::new())),
        BackendKind::File => Some(Arc::new(FileBackend::new(&cfg.data_dir).await?)),
        BackendKind::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL missing"))?;
            Some(Arc::new(PgBackend::connect(url).await?))
        }
        BackendKind::None => None,
    };

    let store = match backend {
        Some(kv) => UserStore::new(kv),
        None => {
            tracing::warn!("no persistence medium configured; users will not be kept");
            UserStore::detached()
        }
    };
    if cfg.serialize_writes {
        tracing::info!("user store writes are serialized");
        Ok(store.serialized())
    } else {
        Ok(store)
    }
}
