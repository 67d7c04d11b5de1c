//! The mapping entity and its query filter.
//!
//! A mapping records that a principal holds a role on a resource. The pair
//! `(resource, principal)` is unique; role or kind changes are expressed as
//! revoke + grant, never in-place update. Records are stored as JSON
//! documents; compatibility only requires that the four fields round-trip.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};
use crate::id::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalRole {
    Member,
    Owner,
}

impl fmt::Display for PrincipalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalRole::Member => f.write_str("member"),
            PrincipalRole::Owner => f.write_str("owner"),
        }
    }
}

/// Resource categories. `Organization` is the only container kind: grants
/// and revokes on it cascade to the organization's buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Organization,
    Bucket,
    Dashboard,
    Task,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Organization => f.write_str("organization"),
            ResourceKind::Bucket => f.write_str("bucket"),
            ResourceKind::Dashboard => f.write_str("dashboard"),
            ResourceKind::Task => f.write_str("task"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub principal_id: Id,
    pub resource_id: Id,
    pub principal_role: PrincipalRole,
    pub resource_kind: ResourceKind,
}

/// Conjunctive filter over mappings. `None` fields match anything.
///
/// Only the identifier fields can be pushed down to key level (see
/// [`crate::scan`]); role and kind always apply after decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingFilter {
    pub principal_id: Option<Id>,
    pub resource_id: Option<Id>,
    pub principal_role: Option<PrincipalRole>,
    pub resource_kind: Option<ResourceKind>,
}

impl MappingFilter {
    pub fn by_principal(principal_id: Id) -> Self {
        Self {
            principal_id: Some(principal_id),
            ..Self::default()
        }
    }

    pub fn by_resource(resource_id: Id) -> Self {
        Self {
            resource_id: Some(resource_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, m: &Mapping) -> bool {
        self.principal_id.is_none_or(|id| id == m.principal_id)
            && self.resource_id.is_none_or(|id| id == m.resource_id)
            && self.principal_role.is_none_or(|role| role == m.principal_role)
            && self.resource_kind.is_none_or(|kind| kind == m.resource_kind)
    }

    /// The principal this filter pins down, when it is usable for index
    /// lookups and pushdown.
    pub(crate) fn indexed_principal(&self) -> Option<Id> {
        self.principal_id.filter(Id::valid)
    }
}

pub(crate) fn encode_value(m: &Mapping) -> Result<Vec<u8>> {
    serde_json::to_vec(m).map_err(MappingError::UnprocessableMapping)
}

pub(crate) fn decode_value(bytes: &[u8]) -> Result<Mapping> {
    serde_json::from_slice(bytes).map_err(MappingError::CorruptRecord)
}
