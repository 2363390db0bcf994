//! Property-based tests for cache entries and keys.
//!
//! # Properties Tested
//!
//! 1. **Roundtrip Property**: plain and logical entries decode to what was written
//! 2. **Envelope Property**: every entry carries the magic header and schema version
//! 3. **Null Marker Property**: no entry is ever confused with the null marker
//! 4. **Corruption Property**: damaged entries are rejected, never misread
//! 5. **Expiry Property**: a logical entry is expired exactly from its deadline on
//! 6. **Key Property**: value and lock keys are distinct and well-formed

use cache_shield::key::CacheKeyBuilder;
use cache_shield::serialization::{
    deserialize_from_cache, is_null_marker, serialize_for_cache, CacheEnvelope, LogicalEntry,
    CACHE_MAGIC, CURRENT_SCHEMA_VERSION, NULL_MARKER,
};
use cache_shield::{CacheEntity, Error};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Shop {
    id: u64,
    name: String,
    type_id: u32,
    tags: Vec<String>,
    score: i64,
    open: bool,
}

impl CacheEntity for Shop {
    type Key = u64;
    fn cache_key(&self) -> Self::Key {
        self.id
    }
    fn cache_prefix() -> &'static str {
        "shop"
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Voucher {
    code: String,
    stock: i32,
}

impl CacheEntity for Voucher {
    type Key = String;
    fn cache_key(&self) -> Self::Key {
        self.code.clone()
    }
    fn cache_prefix() -> &'static str {
        "voucher"
    }
}

// ============================================================================
// Arbitrary Implementations (for property-based testing)
// ============================================================================

/// Generate arbitrary Shop with any valid values
fn arb_shop() -> impl Strategy<Value = Shop> {
    (
        any::<u64>(),
        any::<String>(),
        any::<u32>(),
        prop::collection::vec(any::<String>(), 0..10),
        any::<i64>(),
        any::<bool>(),
    )
        .prop_map(|(id, name, type_id, tags, score, open)| Shop {
            id,
            name,
            type_id,
            tags,
            score,
            open,
        })
}

/// Generate arbitrary Voucher (empty codes included)
fn arb_voucher() -> impl Strategy<Value = Voucher> {
    (any::<String>(), any::<i32>()).prop_map(|(code, stock)| Voucher { code, stock })
}

// ============================================================================
// Property 1: Roundtrip Property
// ============================================================================

proptest! {
    /// Property: For any Shop, the plain entry decodes back to it
    #[test]
    fn prop_plain_entry_roundtrip(shop in arb_shop()) {
        let bytes = shop.serialize_for_cache()
            .expect("Serialization should never fail for valid Shop");

        let decoded = Shop::deserialize_from_cache(&bytes)
            .expect("Deserialization should never fail for valid bytes");

        prop_assert_eq!(shop, decoded);
    }

    /// Property: A logical entry keeps both data and deadline
    #[test]
    fn prop_logical_entry_roundtrip(shop in arb_shop(), deadline in any::<i64>()) {
        let entry = LogicalEntry::new(shop, deadline);
        let bytes = serialize_for_cache(&entry)
            .expect("Serialization should succeed");

        let decoded: LogicalEntry<Shop> = deserialize_from_cache(&bytes)
            .expect("Deserialization should succeed");

        prop_assert_eq!(entry, decoded);
    }
}

// ============================================================================
// Property 2: Envelope Format Property
// ============================================================================

proptest! {
    /// Property: All serialized entries have correct envelope
    #[test]
    fn prop_envelope_format(voucher in arb_voucher()) {
        let bytes = serialize_for_cache(&voucher)
            .expect("Serialization should succeed");

        prop_assert!(bytes.len() >= 4, "Envelope too small: {} bytes", bytes.len());
        prop_assert_eq!(&bytes[0..4], &CACHE_MAGIC[..], "Invalid magic header");

        // Version is varint-encoded, so decode the envelope to read it
        let envelope: CacheEnvelope<Voucher> = postcard::from_bytes(&bytes)
            .expect("Failed to deserialize envelope");
        prop_assert_eq!(envelope.version, CURRENT_SCHEMA_VERSION, "Invalid schema version");
    }

    /// Property: Serialization is deterministic
    #[test]
    fn prop_serialization_determinism(shop in arb_shop()) {
        let bytes1 = serialize_for_cache(&shop).expect("Serialization should succeed");
        let bytes2 = serialize_for_cache(&shop).expect("Serialization should succeed");

        prop_assert_eq!(bytes1, bytes2, "Serialization must be deterministic");
    }
}

// ============================================================================
// Property 3: Null Marker Property
// ============================================================================

proptest! {
    /// Property: No entry, however small, serializes to the null marker
    #[test]
    fn prop_entry_is_never_null_marker(voucher in arb_voucher()) {
        let bytes = serialize_for_cache(&voucher).expect("Serialization should succeed");
        prop_assert!(!is_null_marker(&bytes));

        let logical = serialize_for_cache(&LogicalEntry::new(voucher, 0))
            .expect("Serialization should succeed");
        prop_assert!(!is_null_marker(&logical));
    }
}

#[test]
fn test_null_marker_never_decodes() {
    let result = Shop::deserialize_from_cache(NULL_MARKER);
    assert!(matches!(result, Err(Error::CorruptCacheEntry(_))));

    let result: Result<LogicalEntry<Shop>, _> = deserialize_from_cache(NULL_MARKER);
    assert!(result.is_err());
}

// ============================================================================
// Property 4: Corruption Detection Property
// ============================================================================

proptest! {
    /// Property: Corrupted magic is always detected
    #[test]
    fn prop_corrupted_magic_detected(shop in arb_shop()) {
        let mut bytes = serialize_for_cache(&shop).expect("Serialization should succeed");
        bytes[0] = b'X';

        let result = Shop::deserialize_from_cache(&bytes);
        prop_assert!(result.is_err(), "Should reject corrupted magic");
        prop_assert!(result.err().map(|e| e.is_corrupt_entry()).unwrap_or(false));
    }

    /// Property: Truncated data is always detected
    #[test]
    fn prop_truncated_data_detected(shop in arb_shop(), deadline in any::<i64>()) {
        let bytes = serialize_for_cache(&LogicalEntry::new(shop, deadline))
            .expect("Serialization should succeed");

        let truncated = &bytes[..bytes.len() - 1];
        let result: Result<LogicalEntry<Shop>, _> = deserialize_from_cache(truncated);
        prop_assert!(result.is_err(), "Should reject truncated data");
    }
}

#[test]
fn test_foreign_schema_version_is_rejected() {
    let envelope = CacheEnvelope {
        magic: CACHE_MAGIC,
        version: CURRENT_SCHEMA_VERSION + 1,
        payload: Voucher {
            code: "SPRING".to_string(),
            stock: 100,
        },
    };
    let bytes = postcard::to_allocvec(&envelope).expect("Encoding should succeed");

    let result = Voucher::deserialize_from_cache(&bytes);
    assert!(matches!(result, Err(Error::VersionMismatch { .. })));
}

// ============================================================================
// Property 5: Expiry Property
// ============================================================================

proptest! {
    /// Property: expired <=> now >= deadline
    #[test]
    fn prop_expiry_boundary(deadline in any::<i64>(), now in any::<i64>()) {
        let entry = LogicalEntry::new((), deadline);
        prop_assert_eq!(entry.is_expired(now), now >= deadline);
    }
}

// ============================================================================
// Property 6: Key Property
// ============================================================================

proptest! {
    /// Property: Value and lock keys of the same id never collide
    #[test]
    fn prop_value_and_lock_keys_distinct(id in any::<u64>()) {
        let value_key = CacheKeyBuilder::build::<Shop>(&id);
        let lock_key = CacheKeyBuilder::lock::<Shop>(&id);

        prop_assert_eq!(&value_key, &format!("shop:{}", id));
        prop_assert_ne!(&value_key, &lock_key);
        prop_assert_eq!(lock_key, CacheKeyBuilder::lock_for(&value_key));
    }

    /// Property: Distinct ids map to distinct value keys
    #[test]
    fn prop_distinct_ids_distinct_keys(a in "[a-zA-Z0-9_]{1,16}", b in "[a-zA-Z0-9_]{1,16}") {
        prop_assume!(a != b);
        prop_assert_ne!(
            CacheKeyBuilder::build::<Voucher>(&a),
            CacheKeyBuilder::build::<Voucher>(&b)
        );
    }
}
