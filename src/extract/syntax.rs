//! Syntax-aware extraction
//!
//! Parses the whole document and reads every assignment to a known key, in
//! document order, including assignments nested in function, class and
//! control-flow bodies. A later assignment to the same key overwrites an
//! earlier one.

use super::keys::{KeyKind, KeySet, PROPAGATED_KEY};
use super::resolve::resolve;
use super::value::{FieldMap, Mapping, ResolvedValue};
use crate::syntax::{parse_module, Expr, Stmt, SyntaxError};
use tracing::debug;

pub fn extract(source: &str, keys: &KeySet) -> Result<FieldMap, SyntaxError> {
    let module = parse_module(source)?;

    let mut collector = Collector {
        source,
        keys,
        fields: FieldMap::new(),
        bucket: Mapping::new(),
    };
    collector.visit(&module);
    Ok(collector.finish())
}

struct Collector<'a> {
    source: &'a str,
    keys: &'a KeySet,
    fields: FieldMap,
    bucket: Mapping,
}

impl Collector<'_> {
    fn visit(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign {
                    targets,
                    value,
                    line,
                } => {
                    for target in targets {
                        self.assign(target, value, *line);
                    }
                }
                Stmt::AnnAssign {
                    target,
                    value: Some(value),
                    line,
                    ..
                } => self.assign(target, value, *line),
                Stmt::Compound { body, .. } => self.visit(body),
                _ => {}
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, line: u32) {
        let Some(name) = target.as_name() else {
            return;
        };
        let Some(kind) = self.keys.classify(name) else {
            return;
        };

        let resolved = resolve(value, self.source);
        debug!(key = name, line, "extracted assignment");

        match kind {
            KeyKind::Alias => match resolved {
                ResolvedValue::Mapping(mapping) => self.bucket.merge(&mapping),
                other => self.bucket.insert(name, other),
            },
            KeyKind::Scalar(key) => self.fields.insert(key, resolved),
        }
    }

    fn finish(mut self) -> FieldMap {
        if !self.bucket.is_empty() {
            self.fields
                .insert(PROPAGATED_KEY, ResolvedValue::Mapping(self.bucket));
        }
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::value::Scalar;
    use serde_json::json;

    fn fields(src: &str) -> FieldMap {
        extract(src, &KeySet::mde()).expect("should parse")
    }

    #[test]
    fn test_extracts_known_keys_only() {
        let f = fields("tenant_id = 'abc'\nother = 'x'\nTenant_Id = 'no'\n");
        assert_eq!(f.len(), 1);
        assert_eq!(f.get("tenant_id"), Some(&ResolvedValue::str("abc")));
    }

    #[test]
    fn test_last_assignment_wins() {
        let f = fields("authType = 'a'\nif x:\n    authType = 'b'\nauthType = 'c'\n");
        assert_eq!(f.get("authType"), Some(&ResolvedValue::str("c")));
    }

    #[test]
    fn test_nested_assignment_after_top_level_wins() {
        let f = fields("authType = 'a'\ndef f():\n    authType = 'b'\n");
        assert_eq!(f.get("authType"), Some(&ResolvedValue::str("b")));
    }

    #[test]
    fn test_chained_and_annotated_assignments() {
        let f = fields("tenant_id = subscription_id = 'same'\nazurelocation: str = 'eu'\ncorrelationId: str\n");
        assert_eq!(f.get("tenant_id"), Some(&ResolvedValue::str("same")));
        assert_eq!(f.get("subscription_id"), Some(&ResolvedValue::str("same")));
        assert_eq!(f.get("azurelocation"), Some(&ResolvedValue::str("eu")));
        assert!(!f.contains_key("correlationId"));
    }

    #[test]
    fn test_tuple_and_attribute_targets_are_ignored() {
        let f = fields("tenant_id, x = 'a', 'b'\nself.authType = 'c'\n");
        assert!(f.is_empty());
    }

    #[test]
    fn test_cloud_is_case_insensitive() {
        let f = fields("CLOUD = 'AzureUSGovernment'\n");
        assert_eq!(f.get("cloud"), Some(&ResolvedValue::str("AzureUSGovernment")));
    }

    #[test]
    fn test_aliases_merge_into_bucket() {
        let f = fields(
            "cloudPropagatedParameters = {'a': 1, 'b': 2}\npropagatedParams = {'b': 3, 'c': 4}\n",
        );
        assert_eq!(
            f.get(PROPAGATED_KEY).map(ResolvedValue::to_json),
            Some(json!({"a": 1, "b": 3, "c": 4}))
        );
    }

    #[test]
    fn test_non_mapping_alias_is_namespaced() {
        let f = fields("cloud_propagated = build_params()\npropagated_parameters = {'k': 'v'}\n");
        assert_eq!(
            f.get(PROPAGATED_KEY).map(ResolvedValue::to_json),
            Some(json!({"cloud_propagated": "build_params()", "k": "v"}))
        );
    }

    #[test]
    fn test_empty_bucket_is_not_attached() {
        let f = fields("cloud_propagated = {}\n");
        assert!(!f.contains_key(PROPAGATED_KEY));
    }

    #[test]
    fn test_environment_lookups() {
        let f = fields("import os\ntenant_id = os.getenv('TENANT_ID', 'abc-123')\ncorrelationId = os.environ.get('CID')\n");
        assert_eq!(f.get("tenant_id"), Some(&ResolvedValue::str("abc-123")));
        assert_eq!(f.get("correlationId"), Some(&ResolvedValue::str("CID")));
    }

    #[test]
    fn test_non_string_values() {
        let f = fields("authType = 3\nazurelocation = None\n");
        assert_eq!(f.get("authType"), Some(&ResolvedValue::Scalar(Scalar::Int(3))));
        assert_eq!(f.get("azurelocation"), Some(&ResolvedValue::Scalar(Scalar::Null)));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(extract("tenant_id = 'a'\ndef (:\n", &KeySet::mde()).is_err());
    }
}
