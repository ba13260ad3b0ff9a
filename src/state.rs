use crate::auth::repo::{PgSessionStore, PgUserStore, SessionStore, UserStore};
use crate::config::AppConfig;
use crate::yandex::{DiskClient, YandexDisk};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub disk: Arc<dyn DiskClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let disk = Arc::new(YandexDisk::new(&config.yandex).context("build Yandex.Disk client")?)
            as Arc<dyn DiskClient>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgSessionStore::new(db)),
            disk,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        disk: Arc<dyn DiskClient>,
    ) -> Self {
        Self {
            config,
            users,
            sessions,
            disk,
        }
    }
}
