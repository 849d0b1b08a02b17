//! PostgreSQL-backed consumer registry and favorites lists

use crate::error::StoreError;
use crate::services::favorites::FavoritesResolver;
use crate::ConsumerId;
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

const FAVORITES_QUERY: &str = "SELECT ut.name_ticker
     FROM user_tickers ut
     JOIN users u ON u.id = ut.user_id
     WHERE u.telegram_id = $1
     ORDER BY ut.id";

const REGISTER_QUERY: &str = "INSERT INTO users (telegram_id, created_at)
     VALUES ($1, now())
     ON CONFLICT (telegram_id) DO NOTHING";

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self { client })
    }

    /// Ensure a `users` row exists for the consumer. Idempotent.
    pub async fn register_consumer(&self, consumer_id: ConsumerId) -> Result<bool, StoreError> {
        let inserted = self.client.execute(REGISTER_QUERY, &[&consumer_id]).await?;
        debug!(consumer_id, inserted, "Consumer registration");
        Ok(inserted > 0)
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

#[async_trait]
impl FavoritesResolver for PostgresStore {
    async fn fetch_favorites(&self, consumer_id: ConsumerId) -> Result<Vec<String>, StoreError> {
        let rows = self.client.query(FAVORITES_QUERY, &[&consumer_id]).await?;
        let mut symbols = Vec::with_capacity(rows.len());
        for row in &rows {
            // name_ticker is nullable; blank entries are not instruments.
            match row.try_get::<_, Option<String>>(0)? {
                Some(symbol) if !symbol.trim().is_empty() => symbols.push(symbol),
                _ => debug!(consumer_id, "Skipping empty favorite ticker"),
            }
        }
        Ok(symbols)
    }
}
