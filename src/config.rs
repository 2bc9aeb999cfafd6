use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::images::FsImageStore;

/// Runtime settings shared by every subcommand. Each can come from the
/// environment instead of the command line.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Base directory for relative photo paths
    #[arg(long, env = "KANT_IMAGE_ROOT")]
    pub image_root: Option<PathBuf>,

    /// Pool size; also bounds how many schools are fetched at once
    #[arg(long, env = "KANT_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Seconds before a single school fetch is abandoned
    #[arg(long, env = "KANT_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,
}

impl Config {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .connect(&self.database_url)
            .await
            .context("failed to connect to Postgres")?;
        info!(max_connections = self.max_connections, "connected to Postgres");
        Ok(pool)
    }

    pub fn image_store(&self) -> FsImageStore {
        FsImageStore::new(self.image_root.clone())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// School fetches in flight at once; never more than the pool can serve.
    pub fn fetch_concurrency(&self) -> usize {
        self.max_connections.max(1) as usize
    }
}
