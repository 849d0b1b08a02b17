//! Consumer favorites lookup.

use crate::error::StoreError;
use crate::ConsumerId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Resolves a consumer's chosen instruments. An empty list is a valid
/// answer and means "nothing to monitor", not a failure.
#[async_trait]
pub trait FavoritesResolver: Send + Sync {
    async fn fetch_favorites(&self, consumer_id: ConsumerId) -> Result<Vec<String>, StoreError>;
}

/// In-memory favorites, for runs without a database.
#[derive(Debug, Default)]
pub struct StaticFavorites {
    favorites: RwLock<HashMap<ConsumerId, Vec<String>>>,
}

impl StaticFavorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, consumer_id: ConsumerId, symbols: Vec<String>) {
        self.favorites.write().await.insert(consumer_id, symbols);
    }
}

#[async_trait]
impl FavoritesResolver for StaticFavorites {
    async fn fetch_favorites(&self, consumer_id: ConsumerId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .favorites
            .read()
            .await
            .get(&consumer_id)
            .cloned()
            .unwrap_or_default())
    }
}
