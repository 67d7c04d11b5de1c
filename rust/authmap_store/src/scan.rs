//! Predicate pushdown for full-table scans.
//!
//! A filter that pins identifiers can be checked against the primary key
//! alone, so the cursor skips non-matching entries without the caller
//! decoding their values. Role and kind live in the record body and are
//! never pushed down; [`crate::mapping::MappingFilter::matches`] applies
//! them after decoding.

use authmap_kv::KeyTest;

use crate::id::ENCODED_ID_LEN;
use crate::keys::PRIMARY_KEY_LEN;
use crate::mapping::MappingFilter;

/// Key-level test for a primary-table scan, `None` when the filter pins
/// neither identifier (every key must be decoded).
pub fn mapping_key_predicate(filter: &MappingFilter) -> Option<KeyTest> {
    let principal = filter
        .principal_id
        .filter(|id| id.valid())
        .and_then(|id| id.encode());
    let resource = filter
        .resource_id
        .filter(|id| id.valid())
        .and_then(|id| id.encode());

    match (resource, principal) {
        (Some(resource), Some(principal)) => {
            let mut want = [0u8; PRIMARY_KEY_LEN];
            want[..ENCODED_ID_LEN].copy_from_slice(&resource);
            want[ENCODED_ID_LEN..].copy_from_slice(&principal);
            Some(Box::new(move |key| {
                key.len() >= PRIMARY_KEY_LEN && key[..PRIMARY_KEY_LEN] == want
            }))
        }
        (None, Some(principal)) => Some(Box::new(move |key| {
            key.len() >= PRIMARY_KEY_LEN && key[ENCODED_ID_LEN..PRIMARY_KEY_LEN] == principal
        })),
        (Some(resource), None) => Some(Box::new(move |key| {
            key.len() >= ENCODED_ID_LEN && key[..ENCODED_ID_LEN] == resource
        })),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use crate::keys::primary_key;
    use crate::mapping::{Mapping, PrincipalRole, ResourceKind};

    fn key_for(principal: u64, resource: u64) -> Vec<u8> {
        primary_key(&Mapping {
            principal_id: Id::new(principal),
            resource_id: Id::new(resource),
            principal_role: PrincipalRole::Member,
            resource_kind: ResourceKind::Bucket,
        })
        .unwrap()
        .to_vec()
    }

    #[test]
    fn test_both_identifiers_pinned() {
        let filter = MappingFilter {
            principal_id: Some(Id::new(1)),
            resource_id: Some(Id::new(2)),
            ..MappingFilter::default()
        };
        let test = mapping_key_predicate(&filter).unwrap();
        assert!(test(&key_for(1, 2)));
        assert!(!test(&key_for(1, 3)));
        assert!(!test(&key_for(3, 2)));
        assert!(!test(b"short"));
    }

    #[test]
    fn test_principal_only_checks_second_half() {
        let filter = MappingFilter::by_principal(Id::new(1));
        let test = mapping_key_predicate(&filter).unwrap();
        assert!(test(&key_for(1, 2)));
        assert!(test(&key_for(1, 9)));
        assert!(!test(&key_for(2, 2)));
    }

    #[test]
    fn test_resource_only_checks_first_half() {
        let filter = MappingFilter::by_resource(Id::new(2));
        let test = mapping_key_predicate(&filter).unwrap();
        assert!(test(&key_for(1, 2)));
        assert!(test(&key_for(9, 2)));
        assert!(!test(&key_for(1, 3)));
    }

    #[test]
    fn test_role_and_kind_are_never_pushed_down() {
        let filter = MappingFilter {
            principal_role: Some(PrincipalRole::Owner),
            resource_kind: Some(ResourceKind::Organization),
            ..MappingFilter::default()
        };
        assert!(mapping_key_predicate(&filter).is_none());
    }

    #[test]
    fn test_invalid_identifier_contributes_no_test() {
        assert!(mapping_key_predicate(&MappingFilter::by_principal(Id::new(0))).is_none());
    }
}
