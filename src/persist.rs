//! Persisted credentials.
//!
//! The token pair is the only durable client state. It is read at startup
//! (hydration) and written by every mutating session operation. Both tokens
//! live in one record so that save and clear are a single transaction.

use crate::token_pair::TokenPair;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::{Arc, Mutex};

const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");
const TOKEN_PAIR_KEY: &str = "token_pair";

/// Where the session keeps its tokens. `SessionManager` is the only writer.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, StoreError>;
    fn save(&self, tokens: &TokenPair) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

// ── redb-backed store ──────────────────────────────────────────

/// Thin handle to the redb credentials file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct CredentialFile {
    db: Arc<Database>,
}

impl CredentialFile {
    /// Open (or create) the credentials file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(CREDENTIALS)?;
        }
        txn.commit()?;

        Ok(CredentialFile { db: Arc::new(db) })
    }
}

impl CredentialStore for CredentialFile {
    fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CREDENTIALS)?;

        match table.get(TOKEN_PAIR_KEY)? {
            Some(value) => {
                let tokens: TokenPair = postcard::from_bytes(value.value())
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(Some(tokens))
            }
            None => Ok(None),
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(tokens)
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CREDENTIALS)?;
            table.insert(TOKEN_PAIR_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        tracing::debug!("credentials saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CREDENTIALS)?;
            table.remove(TOKEN_PAIR_KEY)?;
        }
        txn.commit()?;
        tracing::debug!("credentials cleared");
        Ok(())
    }
}

// ── In-memory store ────────────────────────────────────────────

/// Process-local store; nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryCredentials {
    slot: Arc<Mutex<Option<TokenPair>>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tokens))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TokenPair>> {
        // Poison is ignored; the slot only ever holds a whole value.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentials {
    fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.lock().clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        *self.lock() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = None;
        Ok(())
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("redb: {0}")]
    Redb(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("encode: {0}")]
    Encode(String),
}

// redb 2.x has many error types. Blanket them all into StoreError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for StoreError {
            fn from(e: $t) -> Self { StoreError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

// ── Tests ──────────────────────────────────────────────────────
