//! Game record store
//!
//! The persistence collaborator for game records. It shares the process
//! with the hub but never interacts with it: four operations over records
//! identified by an opaque id.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryGameStore;

/// Opaque identifier of a game record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl From<String> for GameId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Record id; assigned by the store on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<GameId>,

    /// First player name
    pub player1: String,

    /// Second player name
    pub player2: String,

    /// Moves played so far, in order
    #[serde(default)]
    pub moves: Vec<String>,

    /// Creation time; assigned by the store on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last modification time; refreshed by the store on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl GameRecord {
    /// Create a record for two players with no moves yet
    pub fn new(player1: impl Into<String>, player2: impl Into<String>) -> Self {
        Self {
            id: None,
            player1: player1.into(),
            player2: player2.into(),
            moves: Vec::new(),
            created_at: None,
            last_updated: None,
        }
    }
}

/// Error type for store operations
#[derive(Debug, Clone)]
pub enum StoreError {
    /// No record with the given id
    NotFound(GameId),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Game not found: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

/// Storage interface for game records
///
/// The hub has no dependency on this trait; it exists so the process can
/// swap the in-memory store for a database-backed one without touching
/// callers.
pub trait GameStore: Send + Sync {
    /// Store a new record, assigning its id and timestamps
    async fn create(&self, record: GameRecord) -> Result<GameId, StoreError>;

    /// Fetch a record by id
    async fn fetch(&self, id: &GameId) -> Result<GameRecord, StoreError>;

    /// Replace a record by id, refreshing its modification time
    async fn update(&self, id: &GameId, record: GameRecord) -> Result<(), StoreError>;

    /// Delete a record by id
    async fn delete(&self, id: &GameId) -> Result<(), StoreError>;
}
