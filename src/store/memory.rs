//! In-memory game store

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::{GameId, GameRecord, GameStore, StoreError};

/// Game store backed by a process-local map
pub struct MemoryGameStore {
    games: RwLock<HashMap<GameId, GameRecord>>,
}

impl MemoryGameStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore for MemoryGameStore {
    async fn create(&self, mut record: GameRecord) -> Result<GameId, StoreError> {
        let id = GameId::generate();
        let now = Utc::now();
        record.id = Some(id.clone());
        record.created_at = Some(now);
        record.last_updated = Some(now);

        let mut games = self.games.write().await;
        games.insert(id.clone(), record);

        tracing::debug!(game_id = %id, "Game created");
        Ok(id)
    }

    async fn fetch(&self, id: &GameId) -> Result<GameRecord, StoreError> {
        let games = self.games.read().await;
        games
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update(&self, id: &GameId, mut record: GameRecord) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let existing = games
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        // The id and creation time survive a replace
        record.id = Some(id.clone());
        record.created_at = existing.created_at;
        record.last_updated = Some(Utc::now());
        games.insert(id.clone(), record);

        tracing::debug!(game_id = %id, "Game updated");
        Ok(())
    }

    async fn delete(&self, id: &GameId) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        if games.remove(id).is_none() {
            return Err(StoreError::NotFound(id.clone()));
        }

        tracing::debug!(game_id = %id, "Game deleted");
        Ok(())
    }
}
