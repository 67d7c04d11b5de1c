//! Persistence and query layer for principal ↔ resource authorization
//! mappings over an ordered transactional KV store.
//!
//! The primary table is keyed by `(resource, principal)` and is the source
//! of truth. A secondary index keyed by `(principal, resource)` accelerates
//! principal-scoped queries; it is derived, lazily maintained, and
//! self-healing: reads that fall back to a full scan repair it in the
//! background. Grants and revokes on an organization cascade to the
//! organization's buckets inside the same transaction.

pub mod cascade;
pub mod error;
pub mod id;
pub mod index;
pub mod keys;
pub mod mapping;
pub mod query;
pub mod scan;
pub mod service;

pub use crate::cascade::BucketCatalog;
pub use crate::error::{MappingError, Result};
pub use crate::id::Id;
pub use crate::index::Indexer;
pub use crate::mapping::{Mapping, MappingFilter, PrincipalRole, ResourceKind};
pub use crate::query::FindOptions;
pub use crate::service::{MappingService, PrincipalSource};
