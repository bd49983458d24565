//! Onboarding payload written to `mdatp_onboard.json`

use crate::extract::keys::{
    AUTH_TYPE, CORRELATION_ID, LOCATION, SERVICE_PRINCIPAL_ID, SUBSCRIPTION_ID, TENANT_ID,
};
use crate::extract::{FieldMap, ResolvedValue, CLOUD_KEY, PROPAGATED_KEY};
use serde::Serialize;
use serde_json::{Map, Value};

/// The onboarding document, in the field order the agent expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnboardPayload {
    #[serde(rename = "OrgId")]
    pub org_id: Value,
    #[serde(rename = "SubscriptionId")]
    pub subscription_id: Value,
    #[serde(rename = "ServicePrincipalId")]
    pub service_principal_id: Value,
    #[serde(rename = "AuthType")]
    pub auth_type: Value,
    #[serde(rename = "Location")]
    pub location: Value,
    #[serde(rename = "CorrelationId")]
    pub correlation_id: Value,
    #[serde(rename = "Cloud", skip_serializing_if = "Option::is_none")]
    pub cloud: Option<Value>,
    #[serde(
        rename = "CloudPropagatedParameters",
        skip_serializing_if = "Option::is_none"
    )]
    pub cloud_propagated_parameters: Option<Map<String, Value>>,
}

impl OnboardPayload {
    pub fn from_fields(fields: &FieldMap) -> Self {
        let field = |key: &str| fields.get(key).map_or(Value::Null, ResolvedValue::to_json);

        Self {
            org_id: field(TENANT_ID.key),
            subscription_id: field(SUBSCRIPTION_ID.key),
            service_principal_id: field(SERVICE_PRINCIPAL_ID.key),
            auth_type: field(AUTH_TYPE.key),
            location: field(LOCATION.key),
            correlation_id: field(CORRELATION_ID.key),
            cloud: fields
                .get(CLOUD_KEY)
                .filter(|v| v.is_truthy())
                .map(ResolvedValue::to_json),
            cloud_propagated_parameters: fields
                .get(PROPAGATED_KEY)
                .and_then(ResolvedValue::as_mapping)
                .map(|m| m.to_json()),
        }
    }
}
