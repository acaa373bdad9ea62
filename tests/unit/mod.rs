// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for valkey-slot-audit.
//!
//! These tests run without a Valkey server and exercise the public API of
//! individual components in isolation.

mod hasher_tests {
    use valkey_slot_audit::slots::{
        ClusterSlotHasher, SlotHasher, crc16, hash_tag, key_slot, key_slot_bytes,
    };

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31c3);
        assert_eq!(crc16(b""), 0);
    }

    #[test]
    fn test_known_slots() {
        assert_eq!(key_slot("a"), 15495);
        assert_eq!(key_slot("b"), 3300);
        assert_eq!(key_slot("c"), 7365);
        assert_eq!(key_slot("foo"), 12182);
        assert_eq!(key_slot("bar"), 5061);
        assert_eq!(key_slot("hello"), 866);
        assert_eq!(key_slot("key:1"), 6657);
        assert_eq!(key_slot("key:2"), 10850);
        assert_eq!(key_slot(""), 0);
    }

    #[test]
    fn test_hash_tag_colocates_keys() {
        assert_eq!(key_slot("{user1000}.following"), key_slot("user1000"));
        assert_eq!(key_slot("{user1000}.followers"), key_slot("user1000"));
        assert_eq!(key_slot("user:{42}:profile"), key_slot("42"));
        assert_eq!(key_slot("{x}1"), 16287);
    }

    #[test]
    fn test_hash_tag_edge_cases() {
        // Empty tag: whole key is hashed.
        assert_eq!(hash_tag(b"{}"), b"{}");
        assert_eq!(key_slot("{}"), 15257);
        // Unclosed brace: whole key is hashed.
        assert_eq!(hash_tag(b"{abc"), b"{abc");
        assert_eq!(key_slot("{abc"), 444);
        // Only the first tag counts.
        assert_eq!(hash_tag(b"foo{bar}{zap}"), b"bar");
        assert_eq!(key_slot("foo{bar}{zap}"), key_slot("bar"));
        // First brace pair is empty, so the rest is not searched.
        assert_eq!(key_slot("foo{}{bar}"), 8363);
        // Nested braces: content up to the first closing brace.
        assert_eq!(hash_tag(b"{{bar}}"), b"{bar");
        assert_eq!(key_slot("{{bar}}"), 4015);
    }

    #[test]
    fn test_trait_matches_free_function() {
        let hasher = ClusterSlotHasher;
        for key in ["a", "{x}1", "user:{42}:profile", ""] {
            assert_eq!(hasher.slot(key), key_slot(key));
            assert_eq!(key_slot_bytes(key.as_bytes()), key_slot(key));
        }
    }
}

mod range_tests {
    use valkey_slot_audit::slots::{SlotRange, TOTAL_SLOTS, check_coverage};

    #[test]
    fn test_range_counts_are_inclusive() {
        assert_eq!(SlotRange::new(0, 5460).count(), 5461);
        assert_eq!(SlotRange::single(7).count(), 1);
        assert_eq!(SlotRange::full().count(), u32::from(TOTAL_SLOTS));
    }

    #[test]
    fn test_try_new_rejects_bad_bounds() {
        assert!(SlotRange::try_new(0, 16383).is_some());
        assert!(SlotRange::try_new(10, 5).is_none());
        assert!(SlotRange::try_new(-1, 5).is_none());
        assert!(SlotRange::try_new(0, 16384).is_none());
    }

    #[test]
    fn test_coverage_of_three_master_layout() {
        let ranges = [
            SlotRange::new(0, 5460),
            SlotRange::new(5461, 10922),
            SlotRange::new(10923, 16383),
        ];
        assert!(check_coverage(&ranges).is_partition());
    }

    #[test]
    fn test_coverage_reports_gap_and_overlap() {
        let ranges = [SlotRange::new(0, 100), SlotRange::new(90, 16000)];
        let coverage = check_coverage(&ranges);
        assert!(!coverage.is_partition());
        assert_eq!(coverage.unassigned, vec![SlotRange::new(16001, 16383)]);
        assert_eq!(coverage.overlapping, vec![SlotRange::new(90, 100)]);
        assert_eq!(coverage.unassigned_slots(), 383);
    }
}

mod counts_tests {
    use valkey_slot_audit::slots::{KeyIndex, SlotCounts, SlotRange};

    #[test]
    fn test_range_sums_match_direct_sums() {
        let mut counts = SlotCounts::new();
        counts.add(0, 3);
        counts.add(100, 2);
        counts.add(16383, 5);

        let sums = counts.range_sums();
        for range in [
            SlotRange::new(0, 0),
            SlotRange::new(0, 99),
            SlotRange::new(1, 16382),
            SlotRange::new(100, 16383),
            SlotRange::full(),
        ] {
            assert_eq!(sums.sum(range), counts.sum_range(range), "{}", range);
        }
        assert_eq!(counts.total(), 10);
        assert_eq!(counts.occupied_slots(), 3);
    }

    #[test]
    fn test_key_index_groups_by_slot() {
        let mut index = KeyIndex::new();
        index.insert(5, "a");
        index.insert(5, "b");
        index.insert(9, "c");
        assert_eq!(index.keys_in(5), ["a", "b"]);
        assert!(index.keys_in(6).is_empty());
        assert_eq!(index.len(), 3);
    }
}

mod client_types_tests {
    use fred::types::Value;
    use valkey_slot_audit::client::{ParseError, ScanPage, parse_cluster_slots};
    use valkey_slot_audit::slots::SlotRange;

    fn node(host: &str, port: i64) -> Value {
        Value::Array(vec![Value::from(host), Value::from(port), Value::from("id")])
    }

    #[test]
    fn test_parse_cluster_slots_reply() {
        let reply = Value::Array(vec![
            Value::Array(vec![
                Value::from(0i64),
                Value::from(8191i64),
                node("127.0.0.1", 30001),
                node("127.0.0.1", 30004),
            ]),
            Value::Array(vec![
                Value::from(8192i64),
                Value::from(16383i64),
                node("127.0.0.1", 30002),
            ]),
        ]);
        let entries = parse_cluster_slots(&reply).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].range, SlotRange::new(0, 8191));
        assert_eq!(entries[0].master.to_string(), "127.0.0.1:30001");
        assert_eq!(entries[0].replicas.len(), 1);
        assert_eq!(entries[1].master.port, 30002);
    }

    #[test]
    fn test_parse_rejects_unknown_host() {
        let reply = Value::Array(vec![Value::Array(vec![
            Value::from(0i64),
            Value::from(16383i64),
            node("?", 7000),
        ])]);
        assert!(matches!(
            parse_cluster_slots(&reply),
            Err(ParseError::MissingField(_))
        ));
    }

    #[test]
    fn test_scan_page() {
        let page = ScanPage::parse(Value::Array(vec![
            Value::from("17"),
            Value::Array(vec![Value::from("a"), Value::from("b")]),
        ]))
        .unwrap();
        assert_eq!(page.cursor, 17);
        assert_eq!(page.keys.len(), 2);
        assert_eq!(&page.keys[0][..], b"a");
    }

    #[test]
    fn test_scan_page_rejects_bad_cursor() {
        let result = ScanPage::parse(Value::Array(vec![
            Value::from("-1"),
            Value::Array(Vec::new()),
        ]));
        assert!(matches!(result, Err(ParseError::InvalidScanReply(_))));
    }
}

mod error_tests {
    use valkey_slot_audit::AuditError;
    use valkey_slot_audit::client::{ParseError, ValkeyError};

    #[test]
    fn test_error_classification() {
        let err = AuditError::from(ValkeyError::Connection("refused".to_string()));
        assert!(err.is_connection());
        assert_eq!(err.kind(), "connection");

        let err = AuditError::from(ValkeyError::Parse(ParseError::InvalidScanReply(
            "bad".to_string(),
        )));
        assert_eq!(err.kind(), "protocol");

        assert_eq!(AuditError::Encoding("x".to_string()).kind(), "encoding");
    }
}

mod config_tests {
    use clap::Parser;
    use valkey_slot_audit::audit::Routing;
    use valkey_slot_audit::{AuditConfig, ReportFormat};

    #[test]
    fn test_minimal_arguments() {
        let config = AuditConfig::try_parse_from(["valkey-slot-audit", "--host", "10.0.0.1"])
            .expect("should parse");
        assert_eq!(config.port, 6379);
        assert_eq!(config.format, ReportFormat::Text);
        assert_eq!(config.routing(), Routing::Direct);
    }

    #[test]
    fn test_tls_routes_through_entrypoint() {
        let config = AuditConfig::try_parse_from([
            "valkey-slot-audit",
            "--host",
            "lb.example.com",
            "--port",
            "6380",
            "--tls",
        ])
        .expect("should parse");
        assert_eq!(config.port, 6380);
        assert_eq!(
            config.routing(),
            Routing::Entrypoint("lb.example.com".to_string())
        );
    }
}
