//! Integration tests for parsing DFW section data.
//!
//! These tests validate that the vcd-dfw models decode a layer-3 section as
//! returned by the backend and re-encode it without loss.

use std::fs;
use std::path::PathBuf;
use vcd_dfw::models::{entry_type, RuleAction, RuleSection};

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load the section fixture from disk.
fn load_section_fixture() -> String {
    let fixture_path = fixtures_dir().join("layer3_section.xml");
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read section fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

fn decode_fixture() -> RuleSection {
    let xml = load_section_fixture();
    RuleSection::from_xml(&xml)
        .unwrap_or_else(|e| panic!("Failed to decode section data: {}\nXML: {}", e, xml))
}

#[test]
fn test_decode_section_attributes() {
    let section = decode_fixture();

    assert_eq!(section.id, 1012);
    assert_eq!(
        section.name,
        "org-vdc (6cd9f1ea-55d2-4c2e-a9a8-5e1b3a8a5b1f)"
    );
    assert_eq!(section.generation_number, "1571922153437");
    assert!(section.tcp_strict);
    assert!(!section.stateless);
    assert!(!section.use_sid);
    assert_eq!(section.section_type, "LAYER3");
    assert!(section.timestamp_utc().is_some());
}

#[test]
fn test_rules_keep_document_order() {
    let section = decode_fixture();
    let ids: Vec<i64> = section.rules.iter().map(|rule| rule.id).collect();
    assert_eq!(ids, vec![1020, 1019, 1018]);
}

#[test]
fn test_fully_specified_rule() {
    let section = decode_fixture();
    let rule = &section.rules[0];

    assert_eq!(rule.name.as_deref(), Some("Allow HTTPS to web tier"));
    assert_eq!(rule.action, RuleAction::Allow);
    assert!(rule.logged);
    assert!(!rule.disabled);
    assert_eq!(rule.direction, "in");
    assert_eq!(rule.tag.as_deref(), Some("web"));

    let sources = rule.sources.as_ref().expect("sources");
    assert!(sources.excluded);
    assert_eq!(sources.entries.len(), 1);
    assert_eq!(sources.entries[0].entry_type, entry_type::IPV4_ADDRESS);
    assert!(sources.entries[0].name.is_none());

    let destinations = rule.destinations.as_ref().expect("destinations");
    assert!(!destinations.excluded);
    assert_eq!(destinations.entries.len(), 2);
    assert_eq!(destinations.entries[1].entry_type, entry_type::SECURITY_GROUP);

    let services = rule.services.as_ref().expect("services");
    assert_eq!(services.entries[0].value, "application-249");
}

#[test]
fn test_partial_rule_without_name_or_sources() {
    let section = decode_fixture();
    let rule = &section.rules[1];

    assert!(rule.name.is_none());
    assert!(rule.disabled);
    assert!(rule.sources.is_none());
    assert!(rule.destinations.is_some());
    assert!(rule.services.is_none());
    assert!(!rule.is_wildcard());
    assert_eq!(rule.applied_to_list.entries[0].entry_type, entry_type::EDGE);
    assert!(!rule.applied_to_list.entries[0].is_valid);
}

#[test]
fn test_default_deny_is_last_wildcard() {
    let section = decode_fixture();
    let last = section.rules.last().expect("rules");

    assert_eq!(last.action, RuleAction::Deny);
    assert!(last.is_wildcard());
    assert!(section.validate().is_ok());
}

#[test]
fn test_reencode_is_lossless() {
    let section = decode_fixture();
    let xml = section.to_xml().expect("encode");
    let decoded = RuleSection::from_xml(&xml).expect("decode");

    assert_eq!(decoded, section);
    assert!(decoded.rules[1].sources.is_none());
    assert!(decoded.rules[2].services.is_none());
}
