//! Expansion of organization-level mappings to dependent resources.
//!
//! An organization is a container: granting or revoking a principal on it
//! propagates to every bucket the organization owns. The expansion runs
//! exactly once per grant/revoke; dependents are Bucket-kind, which never
//! expands further, so adding new container kinds later cannot create
//! unbounded recursion.

use authmap_kv::Tx;

use crate::error::Result;
use crate::id::Id;
use crate::mapping::{Mapping, MappingFilter, ResourceKind};

/// Collaborator lookup of the buckets an organization owns.
///
/// Runs against the caller's transaction so a cascade observes the same
/// snapshot as the grant or revoke that triggered it.
pub trait BucketCatalog {
    fn bucket_ids(&self, tx: &dyn Tx, organization_id: Id) -> Result<Vec<Id>>;
}

/// Derived mappings to create alongside an organization-level grant: one
/// Bucket-kind mapping per owned bucket, same principal and role.
pub(crate) fn dependent_grants<C: BucketCatalog>(
    catalog: &C,
    tx: &dyn Tx,
    m: &Mapping,
) -> Result<Vec<Mapping>> {
    let mut dependents = Vec::new();
    for bucket_id in catalog.bucket_ids(tx, m.resource_id)? {
        dependents.push(Mapping {
            principal_id: m.principal_id,
            resource_id: bucket_id,
            principal_role: m.principal_role,
            resource_kind: ResourceKind::Bucket,
        });
    }
    Ok(dependents)
}

/// Per-bucket filters to revoke alongside an organization-level revoke.
pub(crate) fn dependent_revocations<C: BucketCatalog>(
    catalog: &C,
    tx: &dyn Tx,
    m: &Mapping,
) -> Result<Vec<MappingFilter>> {
    let mut filters = Vec::new();
    for bucket_id in catalog.bucket_ids(tx, m.resource_id)? {
        filters.push(MappingFilter {
            principal_id: Some(m.principal_id),
            resource_id: Some(bucket_id),
            resource_kind: Some(ResourceKind::Bucket),
            principal_role: None,
        });
    }
    Ok(filters)
}
