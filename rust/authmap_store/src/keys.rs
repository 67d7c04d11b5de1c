//! Composite key codec for the primary table and the secondary index.
//!
//! Primary key: `resource(16) ++ principal(16)` (32 bytes, no separator).
//! Index key: `principal(16) ++ '/' ++ resource(16)` (33 bytes); the
//! separator lets `index_prefix` bound an ordered scan to one principal.
//! Both rely on the fixed identifier width: consumers slice keys at byte
//! offsets, never parse them.

use crate::error::{MappingError, Result};
use crate::id::{Id, ENCODED_ID_LEN};
use crate::mapping::Mapping;

/// Primary table: `(resource, principal)` → mapping record.
pub const MAPPINGS_TABLE: &str = "mappingsv1";

/// Secondary index: `(principal, resource)` → primary key.
pub const MAPPINGS_INDEX_TABLE: &str = "mappingsindexv1";

pub const INDEX_SEPARATOR: u8 = b'/';

pub const PRIMARY_KEY_LEN: usize = 2 * ENCODED_ID_LEN;
pub const INDEX_KEY_LEN: usize = 2 * ENCODED_ID_LEN + 1;
pub const INDEX_PREFIX_LEN: usize = ENCODED_ID_LEN + 1;

fn encode_id(id: Id) -> Result<[u8; ENCODED_ID_LEN]> {
    id.encode().ok_or(MappingError::InvalidIdentifier)
}

pub fn primary_key(m: &Mapping) -> Result<[u8; PRIMARY_KEY_LEN]> {
    let resource = encode_id(m.resource_id)?;
    let principal = encode_id(m.principal_id)?;

    let mut key = [0u8; PRIMARY_KEY_LEN];
    key[..ENCODED_ID_LEN].copy_from_slice(&resource);
    key[ENCODED_ID_LEN..].copy_from_slice(&principal);
    Ok(key)
}

pub fn index_key(m: &Mapping) -> Result<[u8; INDEX_KEY_LEN]> {
    let principal = encode_id(m.principal_id)?;
    let resource = encode_id(m.resource_id)?;

    let mut key = [0u8; INDEX_KEY_LEN];
    key[..ENCODED_ID_LEN].copy_from_slice(&principal);
    key[ENCODED_ID_LEN] = INDEX_SEPARATOR;
    key[ENCODED_ID_LEN + 1..].copy_from_slice(&resource);
    Ok(key)
}

/// Bound for an ordered index scan over one principal's entries.
pub fn index_prefix(principal_id: Id) -> Result<[u8; INDEX_PREFIX_LEN]> {
    let principal = encode_id(principal_id)?;

    let mut prefix = [0u8; INDEX_PREFIX_LEN];
    prefix[..ENCODED_ID_LEN].copy_from_slice(&principal);
    prefix[ENCODED_ID_LEN] = INDEX_SEPARATOR;
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{PrincipalRole, ResourceKind};

    fn mapping(principal: u64, resource: u64) -> Mapping {
        Mapping {
            principal_id: Id::new(principal),
            resource_id: Id::new(resource),
            principal_role: PrincipalRole::Member,
            resource_kind: ResourceKind::Bucket,
        }
    }

    #[test]
    fn test_primary_key_layout() {
        let key = primary_key(&mapping(0xAB, 0xCD)).unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], b"00000000000000cd");
        assert_eq!(&key[16..], b"00000000000000ab");
    }

    #[test]
    fn test_index_key_layout() {
        let key = index_key(&mapping(0xAB, 0xCD)).unwrap();
        assert_eq!(key.len(), 33);
        assert_eq!(&key[..16], b"00000000000000ab");
        assert_eq!(key[16], b'/');
        assert_eq!(&key[17..], b"00000000000000cd");
    }

    #[test]
    fn test_index_prefix_bounds_one_principal() {
        let m = mapping(0xAB, 0xCD);
        let prefix = index_prefix(m.principal_id).unwrap();
        assert!(index_key(&m).unwrap().starts_with(&prefix));

        let other = index_prefix(Id::new(0xAC)).unwrap();
        assert!(!index_key(&m).unwrap().starts_with(&other));
    }

    #[test]
    fn test_index_keys_sort_by_principal_then_resource() {
        let a = index_key(&mapping(1, 2)).unwrap();
        let b = index_key(&mapping(1, 3)).unwrap();
        let c = index_key(&mapping(2, 1)).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let err = primary_key(&mapping(0, 1)).unwrap_err();
        assert!(matches!(err, MappingError::InvalidIdentifier));
        let err = index_key(&mapping(1, 0)).unwrap_err();
        assert!(matches!(err, MappingError::InvalidIdentifier));
        let err = index_prefix(Id::new(0)).unwrap_err();
        assert!(matches!(err, MappingError::InvalidIdentifier));
    }
}
