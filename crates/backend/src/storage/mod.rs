use membermap_shared::models::{AddressKey, Coordinates};
use redb::{Database, ReadableDatabase, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const GEOCODE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("geocode_cache");

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to open geocode cache: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("geocode cache transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("geocode cache table unavailable: {0}")]
    Table(#[from] redb::TableError),
    #[error("geocode cache storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("geocode cache commit failed: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("corrupt geocode cache entry: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("geocode cache file unavailable: {0}")]
    Io(#[from] std::io::Error),
}

/// Persisted form of a cache entry. The key is the address hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    lat: f64,
    lng: f64,
    cached_at: String,
}

/// Lowercase hex SHA-1 of the address key, used as the table key.
pub fn address_hash(key: &AddressKey) -> String {
    hex::encode(Sha1::digest(key.as_str().as_bytes()))
}

/// Permanent address → coordinates store.
///
/// Unresolvable addresses are stored as [`Coordinates::UNRESOLVABLE`] and
/// come back from [`GeocodeCache::get`] as such; `None` means the address was
/// never looked up. Entries never expire and are never invalidated.
pub struct GeocodeCache {
    db: Database,
    path: PathBuf,
}

impl GeocodeCache {
    pub fn open(path: &Path) -> Result<Arc<Self>, CacheError> {
        let db = Database::create(path)?;

        // Ensure table exists so readers never see TableDoesNotExist
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(GEOCODE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Arc::new(GeocodeCache {
            db,
            path: path.to_path_buf(),
        }))
    }

    pub fn get(&self, key: &AddressKey) -> Result<Option<Coordinates>, CacheError> {
        let hash = address_hash(key);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(GEOCODE_TABLE)?;

        match table.get(hash.as_str())? {
            Some(value) => {
                let entry: StoredEntry = serde_json::from_slice(value.value())?;
                Ok(Some(Coordinates::new(entry.lat, entry.lng)))
            }
            None => Ok(None),
        }
    }

    /// Upsert by address hash. Returns the number of entries written.
    pub fn put(&self, key: &AddressKey, location: Coordinates) -> Result<usize, CacheError> {
        let hash = address_hash(key);
        let entry = StoredEntry {
            lat: location.lat,
            lng: location.lng,
            cached_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_vec(&entry)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(GEOCODE_TABLE)?;
            table.insert(hash.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    pub fn len(&self) -> Result<u64, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(GEOCODE_TABLE)?;
        Ok(table.len()?)
    }

    pub fn db_size_bytes(&self) -> Result<u64, CacheError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}
