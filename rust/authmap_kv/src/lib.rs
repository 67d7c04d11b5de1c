//! Ordered transactional key-value contract consumed by the mapping layer.
//!
//! The mapping store never talks to a database directly; it goes through the
//! narrow surface defined here: a [`Store`] hands out transactions, a
//! transaction ([`Tx`]) opens named [`Table`]s, and a table supports point
//! reads, writes, and forward-only ordered [`Cursor`]s with an optional
//! prefix bound and key-test hint.
//!
//! [`RedbStore`] is the shipped binding over the redb embedded database.
//! Cursor release maps onto `Drop`: dropping a cursor (on any exit path)
//! releases whatever the backend holds for it. A terminal cursor error is an
//! `Err` from [`Cursor::next`]; exhaustion is `Ok(None)`.

mod redb_store;

pub use redb_store::RedbStore;

use thiserror::Error;

/// Errors raised by the storage binding.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("table `{0}` is not writable in a read transaction")]
    ReadOnlyTable(&'static str),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// Key-level test applied by a cursor before yielding an entry.
///
/// Lets a scan skip non-matching keys without handing the value to the
/// caller for decoding.
pub type KeyTest = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Bounds and hints for an ordered table scan.
#[derive(Default)]
pub struct ScanOptions {
    /// Restrict the scan to keys starting with this prefix.
    pub prefix: Option<Vec<u8>>,
    /// Skip entries whose key fails this test.
    pub key_test: Option<KeyTest>,
}

impl ScanOptions {
    pub fn with_prefix(prefix: Vec<u8>) -> Self {
        Self {
            prefix: Some(prefix),
            key_test: None,
        }
    }

    pub fn with_key_test(key_test: KeyTest) -> Self {
        Self {
            prefix: None,
            key_test: Some(key_test),
        }
    }
}

/// Forward-only ordered cursor over a table.
///
/// Single-pass: there is no rewind; callers re-scan by opening a new cursor.
pub trait Cursor {
    /// Advance and return the next entry, `Ok(None)` once exhausted.
    ///
    /// An `Err` is terminal; the cursor must not be advanced further.
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
}

/// A named table inside a transaction.
pub trait Table {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite. Fails with [`KvError::ReadOnlyTable`] inside a
    /// read transaction.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error. Fails with
    /// [`KvError::ReadOnlyTable`] inside a read transaction.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Open an ordered cursor over the table.
    fn cursor(&self, opts: ScanOptions) -> Result<Box<dyn Cursor + '_>>;
}

/// A transaction handing out tables.
///
/// Table names must be known statically; callers keep them as constants.
pub trait Tx {
    fn table(&self, name: &'static str) -> Result<Box<dyn Table + '_>>;
}

/// The store: source of read and write transactions.
///
/// `view` runs against a consistent snapshot. `update` commits when the
/// closure returns `Ok` and aborts (rolls back) when it returns `Err`.
/// Both are generic over the caller's error type so domain errors pass
/// through unchanged; storage failures convert via `E: From<KvError>`.
pub trait Store {
    fn view<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<KvError>,
        F: FnOnce(&dyn Tx) -> std::result::Result<T, E>;

    fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<KvError>,
        F: FnOnce(&dyn Tx) -> std::result::Result<T, E>;
}

/// Successor of a byte prefix, for half-open range scans.
///
/// `None` when the prefix is empty or all 0xFF (no finite upper bound).
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    loop {
        match upper.pop() {
            None => return None,
            Some(0xFF) => continue,
            Some(b) => {
                upper.push(b + 1);
                return Some(upper);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::prefix_upper_bound;

    #[test]
    fn test_prefix_upper_bound() {
        assert_eq!(prefix_upper_bound(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(prefix_upper_bound(b"ab\xff"), Some(b"ac".to_vec()));
        assert_eq!(prefix_upper_bound(b"\xff\xff"), None);
        assert_eq!(prefix_upper_bound(b""), None);
    }
}
