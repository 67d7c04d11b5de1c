//! redb binding for the [`Store`] contract.
//!
//! One `TableDefinition<&[u8], &[u8]>` per named table. Tables are created
//! when the store is opened so readers never observe a missing table.
//!
//! Cursors materialize their bounded range up front: redb iterators borrow
//! the transaction, and the contract's cursors must be handed across call
//! boundaries as plain trait objects.

use std::ops::Bound;
use std::path::Path;

use redb::{Database, ReadOnlyTable, ReadableTable, TableDefinition};

use crate::{
    prefix_upper_bound, Cursor, KeyTest, KvError, Result, ScanOptions, Store, Table, Tx,
};

type Def = TableDefinition<'static, &'static [u8], &'static [u8]>;

fn def(name: &'static str) -> Def {
    TableDefinition::new(name)
}

/// Embedded store backed by a single redb database file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database and ensure every named table exists.
    pub fn open<P: AsRef<Path>>(path: P, tables: &[&'static str]) -> Result<Self> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        for name in tables {
            txn.open_table(def(name))?;
        }
        txn.commit()?;
        Ok(Self { db })
    }
}

impl Store for RedbStore {
    fn view<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<KvError>,
        F: FnOnce(&dyn Tx) -> std::result::Result<T, E>,
    {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| E::from(KvError::from(e)))?;
        f(&RedbReadTx { txn })
    }

    fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<KvError>,
        F: FnOnce(&dyn Tx) -> std::result::Result<T, E>,
    {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| E::from(KvError::from(e)))?;
        let tx = RedbWriteTx { txn };
        // Dropping the transaction on the error path aborts it.
        let out = f(&tx)?;
        tx.txn.commit().map_err(|e| E::from(KvError::from(e)))?;
        Ok(out)
    }
}

struct RedbReadTx {
    txn: redb::ReadTransaction,
}

impl Tx for RedbReadTx {
    fn table(&self, name: &'static str) -> Result<Box<dyn Table + '_>> {
        let table = self.txn.open_table(def(name))?;
        Ok(Box::new(RedbReadTable { name, table }))
    }
}

struct RedbWriteTx {
    txn: redb::WriteTransaction,
}

impl Tx for RedbWriteTx {
    fn table(&self, name: &'static str) -> Result<Box<dyn Table + '_>> {
        let table = self.txn.open_table(def(name))?;
        Ok(Box::new(RedbWriteTable { table }))
    }
}

struct RedbReadTable {
    name: &'static str,
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
}

impl Table for RedbReadTable {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(KvError::ReadOnlyTable(self.name))
    }

    fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(KvError::ReadOnlyTable(self.name))
    }

    fn cursor(&self, opts: ScanOptions) -> Result<Box<dyn Cursor + '_>> {
        let entries = collect_bounded(&self.table, opts.prefix.as_deref());
        Ok(Box::new(BufferedCursor::new(entries, opts.key_test)))
    }
}

struct RedbWriteTable<'txn> {
    table: redb::Table<'txn, &'static [u8], &'static [u8]>,
}

impl Table for RedbWriteTable<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.table.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.table.remove(key)?;
        Ok(())
    }

    fn cursor(&self, opts: ScanOptions) -> Result<Box<dyn Cursor + '_>> {
        let entries = collect_bounded(&self.table, opts.prefix.as_deref());
        Ok(Box::new(BufferedCursor::new(entries, opts.key_test)))
    }
}

/// Run the (optionally prefix-bounded) range and buffer it.
///
/// Per-entry errors stay in the buffer so a mid-scan storage failure
/// surfaces from `Cursor::next` as a terminal error, after the entries that
/// preceded it.
fn collect_bounded<T>(table: &T, prefix: Option<&[u8]>) -> Vec<Result<(Vec<u8>, Vec<u8>)>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let upper = prefix.and_then(prefix_upper_bound);
    let lower: Bound<&[u8]> = match prefix {
        Some(p) => Bound::Included(p),
        None => Bound::Unbounded,
    };
    let upper: Bound<&[u8]> = match &upper {
        Some(u) => Bound::Excluded(u.as_slice()),
        None => Bound::Unbounded,
    };

    match table.range::<&[u8]>((lower, upper)) {
        Ok(iter) => iter
            .map(|entry| {
                entry
                    .map(|(k, v)| (k.value().to_vec(), v.value().to_vec()))
                    .map_err(KvError::from)
            })
            .collect(),
        Err(e) => vec![Err(KvError::from(e))],
    }
}

struct BufferedCursor {
    entries: std::vec::IntoIter<Result<(Vec<u8>, Vec<u8>)>>,
    key_test: Option<KeyTest>,
}

impl BufferedCursor {
    fn new(entries: Vec<Result<(Vec<u8>, Vec<u8>)>>, key_test: Option<KeyTest>) -> Self {
        Self {
            entries: entries.into_iter(),
            key_test,
        }
    }
}

impl Cursor for BufferedCursor {
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        for entry in self.entries.by_ref() {
            let (key, value) = entry?;
            if let Some(test) = &self.key_test {
                if !test(&key) {
                    continue;
                }
            }
            return Ok(Some((key, value)));
        }
        Ok(None)
    }
}
