//! Mutation coordinator: grants and revokes as atomic units.
//!
//! Every operation runs inside a single store transaction; organization
//! cascades share the transaction of the grant or revoke that triggered
//! them, so the whole unit commits or aborts together. The one deliberate
//! exception is index self-healing, which [`crate::query`] hands to the
//! background [`Indexer`] after a read completes.

use std::sync::Arc;

use authmap_kv::{Store, Tx};

use crate::cascade::{self, BucketCatalog};
use crate::error::{MappingError, Result};
use crate::id::Id;
use crate::index::Indexer;
use crate::keys::{self, MAPPINGS_INDEX_TABLE, MAPPINGS_TABLE};
use crate::mapping::{encode_value, Mapping, MappingFilter, PrincipalRole, ResourceKind};
use crate::query::{self, FindOptions};

/// Collaborator accessor for the identity driving the current request.
pub trait PrincipalSource {
    fn current_principal(&self) -> Result<Id>;
}

/// The mapping store service.
///
/// Owns the background index healer; dropping the service drains and joins
/// it. The store is shared (`Arc`) so the healer can open its own write
/// transactions.
pub struct MappingService<S, C> {
    store: Arc<S>,
    catalog: C,
    indexer: Indexer,
}

impl<S, C> MappingService<S, C>
where
    S: Store + Send + Sync + 'static,
    C: BucketCatalog,
{
    pub fn new(store: Arc<S>, catalog: C) -> Self {
        let indexer = Indexer::spawn(Arc::clone(&store));
        Self {
            store,
            catalog,
            indexer,
        }
    }

    /// All mappings matching `filter`.
    pub fn find(&self, filter: &MappingFilter) -> Result<Vec<Mapping>> {
        self.store
            .view(|tx| query::find_in_tx(tx, filter, &FindOptions::default(), &self.indexer))
    }

    /// First mapping matching `filter`, or [`MappingError::MappingNotFound`].
    pub fn find_one(&self, filter: &MappingFilter) -> Result<Mapping> {
        self.store
            .view(|tx| query::find_one_in_tx(tx, filter, &FindOptions::default(), &self.indexer))
    }

    /// Record a mapping. Fails with [`MappingError::DuplicateMapping`] if
    /// the `(resource, principal)` pair already exists. Organization-kind
    /// grants cascade to the organization's buckets; any child failure
    /// aborts the whole grant.
    pub fn grant(&self, m: &Mapping) -> Result<()> {
        self.store.update(|tx| self.grant_in_tx(tx, m))
    }

    /// Remove the mapping for `(resource, principal)`. Organization-kind
    /// revokes cascade to the organization's buckets; a bucket mapping that
    /// is already gone is tolerated.
    pub fn revoke(&self, resource_id: Id, principal_id: Id) -> Result<()> {
        self.store.update(|tx| {
            let filter = MappingFilter {
                resource_id: Some(resource_id),
                principal_id: Some(principal_id),
                ..MappingFilter::default()
            };
            let m = query::find_one_in_tx(tx, &filter, &FindOptions::default(), &self.indexer)?;
            // TODO: delete_mapping_in_tx repeats this lookup; a keyed delete
            // would save a scan.
            self.delete_mapping_in_tx(tx, &filter, &FindOptions::default())?;

            if m.resource_kind == ResourceKind::Organization {
                // Seed the skip-set with the organization's own key so a
                // reused lookup path cannot resurface the row we just
                // deleted.
                let own_key = keys::primary_key(&m)?;
                let opts = FindOptions::default().skip_key(own_key.to_vec());
                self.revoke_dependents_in_tx(tx, &m, &opts)?;
            }
            Ok(())
        })
    }

    /// Remove every mapping matching `filter`. Any individually missing
    /// record fails the whole batch. Does not cascade, even when matches
    /// include Organization-kind mappings; callers drive cascades through
    /// [`Self::revoke`].
    pub fn revoke_all(&self, filter: &MappingFilter) -> Result<()> {
        self.store.update(|tx| {
            let ms = query::find_in_tx(tx, filter, &FindOptions::default(), &self.indexer)?;
            for m in &ms {
                self.delete_record_in_tx(tx, m)?;
            }
            Ok(())
        })
    }

    /// Grant `Owner` on a resource to whoever is driving the current
    /// request.
    pub fn grant_owner(
        &self,
        principals: &dyn PrincipalSource,
        resource_kind: ResourceKind,
        resource_id: Id,
    ) -> Result<()> {
        let principal_id = principals.current_principal()?;
        self.grant(&Mapping {
            principal_id,
            resource_id,
            principal_role: PrincipalRole::Owner,
            resource_kind,
        })
    }

    /// Barrier for the background index healer. Mainly for tests and
    /// orderly shutdown; normal operation never waits on it.
    pub fn flush_index(&self) {
        self.indexer.flush();
    }

    fn grant_in_tx(&self, tx: &dyn Tx, m: &Mapping) -> Result<()> {
        self.put_mapping_in_tx(tx, m)?;

        if m.resource_kind == ResourceKind::Organization {
            for child in cascade::dependent_grants(&self.catalog, tx, m)? {
                self.put_mapping_in_tx(tx, &child)?;
            }
        }
        Ok(())
    }

    /// Uniqueness check + primary write + index write.
    fn put_mapping_in_tx(&self, tx: &dyn Tx, m: &Mapping) -> Result<()> {
        let pkey = keys::primary_key(m)?;
        let ikey = keys::index_key(m)?;
        let value = encode_value(m)?;

        let mut primary = tx.table(MAPPINGS_TABLE)?;
        if primary.get(&pkey)?.is_some() {
            return Err(MappingError::DuplicateMapping {
                principal: m.principal_id,
                resource: m.resource_id,
            });
        }
        primary.put(&pkey, &value)?;
        drop(primary);

        tx.table(MAPPINGS_INDEX_TABLE)?.put(&ikey, &pkey)?;
        Ok(())
    }

    /// Find the first match for `filter` and delete its primary and index
    /// records. [`MappingError::MappingNotFound`] when nothing matches.
    fn delete_mapping_in_tx(
        &self,
        tx: &dyn Tx,
        filter: &MappingFilter,
        opts: &FindOptions,
    ) -> Result<()> {
        let ms = query::find_in_tx(tx, filter, opts, &self.indexer)?;
        let m = ms.first().ok_or(MappingError::MappingNotFound)?;
        self.delete_record_in_tx(tx, m)
    }

    fn delete_record_in_tx(&self, tx: &dyn Tx, m: &Mapping) -> Result<()> {
        let pkey = keys::primary_key(m)?;
        let ikey = keys::index_key(m)?;

        let mut primary = tx.table(MAPPINGS_TABLE)?;
        if primary.get(&pkey)?.is_none() {
            return Err(MappingError::MappingNotFound);
        }
        primary.delete(&pkey)?;
        drop(primary);

        tx.table(MAPPINGS_INDEX_TABLE)?.delete(&ikey)?;
        Ok(())
    }

    fn revoke_dependents_in_tx(
        &self,
        tx: &dyn Tx,
        m: &Mapping,
        opts: &FindOptions,
    ) -> Result<()> {
        for filter in cascade::dependent_revocations(&self.catalog, tx, m)? {
            match self.delete_mapping_in_tx(tx, &filter, opts) {
                // Partial pre-existing coverage of an organization's
                // buckets is expected, not a cascade failure.
                Err(MappingError::MappingNotFound) => {
                    tracing::info!(
                        organization = %m.resource_id,
                        principal = %m.principal_id,
                        "bucket mapping already absent during cascade revoke"
                    );
                }
                other => other?,
            }
        }
        Ok(())
    }
}
