//! Two-phase mapping lookup: index first, full scan as fallback.
//!
//! Queries that pin a principal try the secondary index, bounded by the
//! principal's key prefix. A non-empty index result is final. An empty one
//! falls through to an ordered scan of the primary table with the filter's
//! key test pushed down, and the scan's results are queued for background
//! index repair, since the index may simply not have been populated yet
//! for this principal.
//!
//! Results come back in primary-table key order, or index key order when
//! served from the index. Scans are single-pass; a fresh call re-scans.

use std::collections::BTreeSet;

use authmap_kv::{ScanOptions, Tx};

use crate::error::{MappingError, Result};
use crate::id::Id;
use crate::index::Indexer;
use crate::keys::{self, MAPPINGS_INDEX_TABLE, MAPPINGS_TABLE};
use crate::mapping::{decode_value, Mapping, MappingFilter};
use crate::scan::mapping_key_predicate;

/// Per-lookup options threaded down the call chain.
///
/// The skip-set holds primary keys the caller has already disposed of;
/// index entries resolving to them are stepped over, not errors. Cascade
/// revoke seeds it with the organization's own key so a reused lookup path
/// cannot resurface a row that is already gone.
#[derive(Debug, Default)]
pub struct FindOptions {
    skip_keys: BTreeSet<Vec<u8>>,
}

impl FindOptions {
    pub fn skip_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.skip_keys.insert(key.into());
        self
    }

    fn skip(&self, key: &[u8]) -> bool {
        self.skip_keys.contains(key)
    }
}

/// All mappings matching `filter`, inside an existing transaction.
pub fn find_in_tx(
    tx: &dyn Tx,
    filter: &MappingFilter,
    opts: &FindOptions,
    indexer: &Indexer,
) -> Result<Vec<Mapping>> {
    let principal = filter.indexed_principal();

    if let Some(principal_id) = principal {
        let ms = find_by_index(tx, principal_id, filter, opts)?;
        // Trust the index once it says anything; empty may just mean the
        // index was never populated for this principal.
        if !ms.is_empty() {
            return Ok(ms);
        }
    }

    let mut ms = Vec::new();
    for_each_mapping(tx, filter, |m| ms.push(m))?;

    if principal.is_some() && !ms.is_empty() {
        let mut entries = Vec::with_capacity(ms.len());
        for m in &ms {
            let pkey = keys::primary_key(m)?;
            let ikey = keys::index_key(m)?;
            entries.push((ikey.to_vec(), pkey.to_vec()));
        }
        indexer.add_to_index(entries);
    }

    Ok(ms)
}

/// First match for `filter`, or [`MappingError::MappingNotFound`].
pub fn find_one_in_tx(
    tx: &dyn Tx,
    filter: &MappingFilter,
    opts: &FindOptions,
    indexer: &Indexer,
) -> Result<Mapping> {
    find_in_tx(tx, filter, opts, indexer)?
        .into_iter()
        .next()
        .ok_or(MappingError::MappingNotFound)
}

fn find_by_index(
    tx: &dyn Tx,
    principal_id: Id,
    filter: &MappingFilter,
    opts: &FindOptions,
) -> Result<Vec<Mapping>> {
    let primary = tx.table(MAPPINGS_TABLE)?;
    let index = tx.table(MAPPINGS_INDEX_TABLE)?;

    let prefix = keys::index_prefix(principal_id)?;
    let mut cursor = index.cursor(ScanOptions::with_prefix(prefix.to_vec()))?;

    let mut ms = Vec::new();
    while let Some((_ikey, pkey)) = cursor.next()? {
        if opts.skip(&pkey) {
            continue;
        }

        let Some(value) = primary.get(&pkey)? else {
            // Dangling entry: the mapping was deleted out from under the
            // index. Tolerated; the entry is simply not a result.
            tracing::info!(
                key = %String::from_utf8_lossy(&pkey),
                "index entry resolves to a missing mapping, skipping"
            );
            continue;
        };

        let m = decode_value(&value)?;
        if filter.matches(&m) {
            ms.push(m);
        }
    }

    Ok(ms)
}

/// Ordered scan of the primary table with the filter's key test pushed
/// down; only keys passing the test have their value decoded.
fn for_each_mapping(
    tx: &dyn Tx,
    filter: &MappingFilter,
    mut f: impl FnMut(Mapping),
) -> Result<()> {
    let primary = tx.table(MAPPINGS_TABLE)?;
    let mut cursor = primary.cursor(ScanOptions {
        prefix: None,
        key_test: mapping_key_predicate(filter),
    })?;

    while let Some((_key, value)) = cursor.next()? {
        let m = decode_value(&value)?;
        if filter.matches(&m) {
            f(m);
        }
    }
    Ok(())
}
