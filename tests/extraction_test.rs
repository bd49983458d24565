//! Extraction scenarios run through the public library API
//!
//! These cover the behaviors a params script author relies on: last-wins
//! assignment, alias merging, tolerant recovery from broken scripts, and
//! the exact payload produced.

use mdeonboard::extract::{fallback, PROPAGATED_KEY};
use mdeonboard::{extract_params, ExtractionMethod, KeySet, OnboardPayload, ResolvedValue, Validator};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/params")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e))
}

fn payload_json(script: &str) -> serde_json::Value {
    let extraction = extract_params(script, &KeySet::mde());
    serde_json::to_value(OnboardPayload::from_fields(&extraction.fields)).unwrap()
}

#[test]
fn test_complete_script_payload() {
    let script = r#"
tenant_id = "abc-123"
subscription_id = "sub"
service_principal_id = "sp"
authType = "msi"
azurelocation = "eastus"
correlationId = "corr"
cloud_propagated = {"region": "eu"}
"#;
    assert_eq!(
        payload_json(script),
        json!({
            "OrgId": "abc-123",
            "SubscriptionId": "sub",
            "ServicePrincipalId": "sp",
            "AuthType": "msi",
            "Location": "eastus",
            "CorrelationId": "corr",
            "CloudPropagatedParameters": {"region": "eu"},
        })
    );
}

#[test]
fn test_generated_fixture() {
    let script = fixture("generated_params.py");
    let extraction = extract_params(&script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Syntax);
    assert!(Validator::default().validate(&extraction.fields).is_ok());

    let payload = serde_json::to_value(OnboardPayload::from_fields(&extraction.fields)).unwrap();
    assert_eq!(payload["OrgId"], "abc-123");
    assert_eq!(payload["CorrelationId"], "7e6d5c4b-3a29-4180-b7c6-d5e4f3a2b1c0");
    assert_eq!(payload["Cloud"], "AzureCloud");
    assert_eq!(
        payload["CloudPropagatedParameters"],
        json!({"region": "eu", "proxy": null})
    );
}

#[test]
fn test_broken_fixture_recovers_by_pattern() {
    let script = fixture("broken_params.py");
    let extraction = extract_params(&script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Fallback);
    assert!(Validator::default().validate(&extraction.fields).is_ok());

    let payload = serde_json::to_value(OnboardPayload::from_fields(&extraction.fields)).unwrap();
    assert_eq!(payload["OrgId"], "abc-123");
    assert_eq!(
        payload["CloudPropagatedParameters"],
        json!({"region": "eu", "retries": 3})
    );
    assert!(payload.get("Cloud").is_none());
}

#[test]
fn test_single_quotes_trailing_comma_and_syntax_error() {
    let script = "cloudPropagatedParameters = {'a': 'b', 'c': true,}\ndef broken(:\n";
    let extraction = extract_params(script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Fallback);
    let bucket = extraction
        .fields
        .get(PROPAGATED_KEY)
        .and_then(ResolvedValue::as_mapping)
        .expect("propagated mapping");
    assert!(!bucket.is_empty());
    assert_eq!(
        ResolvedValue::Mapping(bucket.clone()).to_json(),
        json!({"a": "b", "c": true})
    );
}

#[test]
fn test_missing_auth_type_is_reported() {
    let script = "tenant_id = 'a'\nsubscription_id = 'b'\nservice_principal_id = 'c'\nazurelocation = 'd'\ncorrelationId = 'e'\n";
    let extraction = extract_params(script, &KeySet::mde());
    let err = Validator::default()
        .validate(&extraction.fields)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("AuthType"));
    assert!(message.contains("authType"));
    assert_eq!(err.missing.len(), 1);
}

#[test]
fn test_last_assignment_wins() {
    let script = "tenant_id = 'one'\nclass Config:\n    tenant_id = 'two'\ntenant_id = 'three'\n";
    assert_eq!(payload_json(script)["OrgId"], "three");
}

#[test]
fn test_aliases_merge_with_later_values_winning() {
    let script = concat!(
        "cloudPropagatedParameters = {'region': 'us', 'tier': 'gold'}\n",
        "cloud_propagated_parameters = {'region': 'eu'}\n",
        "propagatedParams = {'extra': [1, 2]}\n",
    );
    assert_eq!(
        payload_json(script)["CloudPropagatedParameters"],
        json!({"region": "eu", "tier": "gold", "extra": [1, 2]})
    );
}

#[test]
fn test_payload_is_idempotent() {
    let script = fixture("generated_params.py");
    let extraction = extract_params(&script, &KeySet::mde());
    let first = serde_json::to_string_pretty(&OnboardPayload::from_fields(&extraction.fields)).unwrap();
    let second = serde_json::to_string_pretty(&OnboardPayload::from_fields(&extraction.fields)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_fallback_is_subset_of_syntax_extraction() {
    let script = "tenant_id = \"t\"\nsubscription_id = 's'\nauthType: str = \"msi\"\ncloud = 'AzureCloud'\n";
    let keys = KeySet::mde();

    let parsed = extract_params(script, &keys);
    assert_eq!(parsed.method, ExtractionMethod::Syntax);
    let recovered = fallback::extract(script, &keys);

    assert!(!recovered.is_empty());
    for (key, value) in recovered.iter() {
        assert_eq!(parsed.fields.get(key), Some(value), "key {}", key);
    }
}

#[test]
fn test_fallback_decodes_strings_like_the_parser() {
    let script = r##"tenant_id = """abc"""
subscription_id = 'a\tb'
authType = "say \"hi\""
correlationId = 'café'
"##;
    let keys = KeySet::mde();

    let parsed = extract_params(script, &keys);
    assert_eq!(parsed.method, ExtractionMethod::Syntax);
    assert_eq!(parsed.fields.get("authType"), Some(&ResolvedValue::str("say \"hi\"")));

    let recovered = fallback::extract(script, &keys);
    assert_eq!(recovered.len(), 4);
    for (key, value) in recovered.iter() {
        assert_eq!(parsed.fields.get(key), Some(value), "key {}", key);
    }
}

#[test]
fn test_deep_nesting_falls_back_instead_of_crashing() {
    let script = format!(
        "tenant_id = 'a'\ncloud_propagated = {}{}\n",
        "[".repeat(5000),
        "]".repeat(5000)
    );
    let extraction = extract_params(&script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Fallback);
    assert_eq!(extraction.fields.get("tenant_id"), Some(&ResolvedValue::str("a")));
    assert!(!extraction.fields.contains_key(PROPAGATED_KEY));

    let block = format!("{{'k': {}{}}}", "[".repeat(5000), "]".repeat(5000));
    let script = format!("tenant_id = 'a'\ncloud_propagated = {}\ndef (:\n", block);
    let extraction = extract_params(&script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Fallback);
    assert_eq!(
        payload_json(&script)["CloudPropagatedParameters"],
        json!({ "cloud_propagated": block })
    );
}

#[test]
fn test_generators_and_match_blocks_still_parse() {
    let script = r#"
authType = 'old'
authType = 'new'
correlationId = os.getenv('CID', 'c-1')

def gen():
    yield 1
    received = yield
    yield from range(3)

match mode:
    case "sovereign":
        cloud = "AzureUSGovernment"
    case _:
        pass
"#;
    let extraction = extract_params(script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Syntax);
    let payload = payload_json(script);
    assert_eq!(payload["AuthType"], "new");
    assert_eq!(payload["CorrelationId"], "c-1");
    assert_eq!(payload["Cloud"], "AzureUSGovernment");
}

#[test]
fn test_orphan_clause_uses_fallback() {
    let script = "tenant_id = 'a'\nelse:\n    tenant_id = 'b'\n";
    let extraction = extract_params(script, &KeySet::mde());
    assert_eq!(extraction.method, ExtractionMethod::Fallback);
    assert_eq!(extraction.fields.get("tenant_id"), Some(&ResolvedValue::str("a")));
}

#[test]
fn test_unresolvable_values_keep_source_text() {
    let script = "tenant_id = load_tenant()\nazurelocation = REGION + '-2'\n";
    let payload = payload_json(script);
    assert_eq!(payload["OrgId"], "load_tenant()");
    assert_eq!(payload["Location"], "REGION + '-2'");
}

#[test]
fn test_falsy_cloud_is_omitted() {
    let payload = payload_json("cloud = ''\n");
    assert!(payload.get("Cloud").is_none());
}
