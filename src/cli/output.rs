//! Output formatting for the onboarding payload
//!
//! JSON is what mdatp reads; YAML is offered for inspection.

use anyhow::{Context, Result};

use crate::output::OnboardPayload;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format, two-space indented
    Json,
    /// YAML format
    Yaml,
}

/// Output formatter for onboarding payloads
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Serialize the payload. The result carries no trailing newline.
    pub fn format(&self, payload: &OnboardPayload) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(payload)
                .context("Failed to serialize onboarding payload to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(payload)
                .map(|s| s.trim_end().to_string())
                .context("Failed to serialize onboarding payload to YAML"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FieldMap, Mapping, ResolvedValue, PROPAGATED_KEY};

    fn create_test_payload() -> OnboardPayload {
        let mut fields = FieldMap::new();
        fields.insert("tenant_id", ResolvedValue::str("abc-123"));
        fields.insert("authType", ResolvedValue::str("msi"));
        let mut bucket = Mapping::new();
        bucket.insert("region", ResolvedValue::str("eu"));
        fields.insert(PROPAGATED_KEY, ResolvedValue::Mapping(bucket));
        OnboardPayload::from_fields(&fields)
    }

    #[test]
    fn test_json_format() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format(&create_test_payload())
            .unwrap();
        assert!(output.starts_with("{\n  \"OrgId\": \"abc-123\",\n  \"SubscriptionId\": null,"));
        assert!(output.contains("\"CloudPropagatedParameters\": {\n    \"region\": \"eu\"\n  }"));
        assert!(!output.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["AuthType"], "msi");
    }

    #[test]
    fn test_yaml_format() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format(&create_test_payload())
            .unwrap();
        assert!(output.contains("OrgId: abc-123"));
        assert!(output.contains("SubscriptionId: null"));
        assert!(output.contains("CloudPropagatedParameters:\n  region: eu"));
    }
}
