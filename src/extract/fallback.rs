//! Pattern-based recovery for documents that do not parse
//!
//! Scalars are taken from the first `key = "value"` / `key: "value"` match
//! per key, with string escapes decoded as the lexer decodes them. The
//! propagated-parameters block is located by brace matching from the first
//! alias that opens one, then coerced into a mapping as leniently as possible.

use super::keys::{KeySet, PROPAGATED_KEY};
use super::resolve::literal_eval;
use super::value::{FieldMap, Mapping, ResolvedValue};
use crate::syntax::lexer::unescape;
use crate::syntax::parse_expression;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

pub struct FallbackExtractor {
    scalars: Vec<(&'static str, Regex)>,
    alias_block: Regex,
    trailing_comma: Regex,
    aliases: Vec<&'static str>,
}

impl FallbackExtractor {
    pub fn new(keys: &KeySet) -> Self {
        let scalars = keys
            .scalar_keys()
            .map(|key| {
                let pattern = format!(
                    r#"(?i)\b{}\b["']?\s*(?::\s*[A-Za-z_][\w.\[\]]*\s*=|[:=])\s*(?:"""((?s:.*?))"""|'''((?s:.*?))'''|"((?:[^"\\\n]|\\.)*)"|'((?:[^'\\\n]|\\.)*)')"#,
                    regex::escape(key)
                );
                (key, Regex::new(&pattern).expect("valid regex"))
            })
            .collect();

        let alternatives: Vec<String> = keys.aliases().iter().map(|a| regex::escape(a)).collect();
        let alias_block = Regex::new(&format!(
            r#"(?i)\b({})\b["']?\s*(?::\s*[A-Za-z_][\w.\[\], ]*?\s*=|[:=])\s*\{{"#,
            alternatives.join("|")
        ))
        .expect("valid regex");

        Self {
            scalars,
            alias_block,
            trailing_comma: Regex::new(r",\s*([}\]])").expect("valid regex"),
            aliases: keys.aliases().to_vec(),
        }
    }

    pub fn extract(&self, text: &str) -> FieldMap {
        let mut fields = FieldMap::new();

        for (key, pattern) in &self.scalars {
            if let Some(caps) = pattern.captures(text) {
                let body = (1..=4)
                    .find_map(|i| caps.get(i))
                    .map_or("", |m| m.as_str());
                let value = unescape(body, false).unwrap_or_else(|_| body.to_string());
                debug!(key = *key, "recovered scalar by pattern");
                fields.insert(*key, ResolvedValue::str(value));
            }
        }

        if let Some((alias, block)) = self.find_block(text) {
            let bucket = self.coerce_block(block).unwrap_or_else(|| {
                debug!(alias, "propagated block kept as raw text");
                [(alias.to_string(), ResolvedValue::str(block))]
                    .into_iter()
                    .collect()
            });
            if !bucket.is_empty() {
                fields.insert(PROPAGATED_KEY, ResolvedValue::Mapping(bucket));
            }
        }

        fields
    }

    /// First alias that opens a brace block, with the block text from the
    /// opening brace through its matching close.
    fn find_block<'t>(&self, text: &'t str) -> Option<(&'static str, &'t str)> {
        let caps = self.alias_block.captures(text)?;
        let matched = caps.get(1)?.as_str();
        let alias = self
            .aliases
            .iter()
            .copied()
            .find(|a| a.eq_ignore_ascii_case(matched))?;

        let open = caps.get(0)?.end() - 1;
        let close = matching_brace(text.as_bytes(), open)?;
        Some((alias, &text[open..=close]))
    }

    /// Strict JSON, then the literal parser, then JSON after quote and
    /// trailing-comma repair.
    pub fn coerce_block(&self, block: &str) -> Option<Mapping> {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(block) {
            return as_mapping(Value::Object(map));
        }

        if let Some(mapping) = parse_expression(block)
            .ok()
            .and_then(|expr| literal_eval(&expr).ok())
            .and_then(|value| match value {
                ResolvedValue::Mapping(m) => Some(m),
                _ => None,
            })
        {
            return Some(mapping);
        }

        let repaired = block.replace('\'', "\"");
        let repaired = self.trailing_comma.replace_all(&repaired, "$1");
        serde_json::from_str::<Value>(&repaired)
            .ok()
            .and_then(as_mapping)
    }
}

fn as_mapping(value: Value) -> Option<Mapping> {
    match ResolvedValue::from_json(value) {
        ResolvedValue::Mapping(m) => Some(m),
        _ => None,
    }
}

/// Index of the `}` closing the `{` at `open`. Quotes are not tracked.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn extract(text: &str, keys: &KeySet) -> FieldMap {
    FallbackExtractor::new(keys).extract(text)
}
